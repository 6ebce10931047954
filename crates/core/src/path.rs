//! Passage-name normalization and resolution.
//!
//! Passage names are slash-delimited absolute paths (`/act1/scene2/Intro`).
//! [`simplify`] produces the canonical form of a declared name;
//! [`canonicalize`] resolves a possibly-relative link target against the
//! name of the passage that produced it.

/// Normalize a declared passage name: collapse repeated separators and
/// enforce exactly one leading `/`.
pub fn simplify(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    out.push('/');
    let mut prev_slash = true;
    for c in name.chars() {
        if c == '/' {
            if !prev_slash {
                out.push('/');
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Resolve a link target against a base passage name.
///
/// The base is the full name of the passage containing the link; its last
/// segment (the passage itself) is discarded, leaving its enclosing scope.
/// An absolute target (leading `/`) ignores the base. Empty segments from
/// repeated separators are skipped; `..` pops one scope segment.
pub fn canonicalize(base: &str, name: &str) -> String {
    let base = if name.starts_with('/') { "/" } else { base };

    let mut segments: Vec<&str> = base.split('/').collect();
    segments.pop();

    for segment in name.split('/') {
        match segment {
            "" => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}
