//! Line-oriented passage splitting.
//!
//! A story source is a flat text file. A line whose trimmed form begins
//! with `::` opens a new passage header and finalizes the body accumulated
//! for the previous one. A `:::` line is a module header: it declares no
//! passage, but a `module=<path>` tag on it becomes the default name prefix
//! for every passage that follows, until the next module header.

use serde::Serialize;

use crate::path;

/// One passage as it appears in source text, before code generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassageSource {
    /// Resolved absolute name (module prefix applied, separators normalized).
    pub name: String,
    /// Tags in declaration order; `key=value` tags have both sides trimmed.
    pub tags: Vec<String>,
    /// Raw body text, line endings normalized to `\n`.
    pub body: String,
}

/// Split story source text into passage records.
///
/// Header lines that do not match the expected `:: name [tag]...` pattern
/// yield no passage and no diagnostic.
pub fn split_passages(text: &str) -> Vec<PassageSource> {
    let text = normalize_newlines(text);
    let mut passages = Vec::new();

    let mut path_base = String::from("/");
    let mut header: Option<String> = None;
    let mut body = String::new();

    for line in split_lines(&text) {
        let trimmed = line.trim();
        if trimmed.starts_with("::") {
            finalize(&mut passages, header.take(), &body, &path_base);
            body.clear();
            if trimmed.starts_with(":::") {
                // Module header: not a passage, may move the path base.
                for tag in extract_tags(line) {
                    if let Some(module) = tag.strip_prefix("module=") {
                        path_base = format!("{}/", module);
                    }
                }
            } else {
                header = Some(line.to_owned());
            }
        } else {
            body.push_str(line);
        }
    }
    finalize(&mut passages, header, &body, &path_base);

    passages
}

/// Collapse all line-ending styles to `\n`.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split text into lines, each retaining its trailing `\n` (except possibly
/// the last). Body reassembly depends on the terminators being preserved.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive('\n')
}

fn finalize(
    passages: &mut Vec<PassageSource>,
    header: Option<String>,
    body: &str,
    path_base: &str,
) {
    let Some(header) = header else {
        return;
    };
    let Some(name) = extract_name(&header, path_base) else {
        return;
    };
    passages.push(PassageSource {
        name,
        tags: extract_tags(&header),
        body: body.to_owned(),
    });
}

/// Parse the name segment of a passage header: everything after `::` up to
/// the first `[`, trimmed. A header whose name segment is empty or starts
/// with `[` is malformed and yields `None`.
fn extract_name(header: &str, path_base: &str) -> Option<String> {
    let rest = header.trim_start().strip_prefix("::")?;
    let name_part = match rest.find('[') {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    let name = name_part.trim();
    if name.is_empty() {
        return None;
    }
    Some(path::simplify(&format!("{}{}", path_base, name)))
}

/// Extract bracketed tag groups from a header line, in order.
/// A tag containing `=` is rejoined as `key=value` with both sides trimmed.
fn extract_tags(header: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut rest = header;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        let tag = &after[..close];
        tags.push(match tag.find('=') {
            Some(eq) => format!("{}={}", tag[..eq].trim(), tag[eq + 1..].trim()),
            None => tag.to_owned(),
        });
        rest = &after[close + 1..];
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_passages_on_headers() {
        let src = ":: First\nhello\n:: Second\nworld\n";
        let passages = split_passages(src);
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].name, "/First");
        assert_eq!(passages[0].body, "hello\n");
        assert_eq!(passages[1].name, "/Second");
        assert_eq!(passages[1].body, "world\n");
    }

    #[test]
    fn text_before_first_header_is_discarded() {
        let passages = split_passages("stray text\n:: Start\nbody\n");
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].name, "/Start");
    }

    #[test]
    fn header_tags_parse_with_key_value_trimming() {
        let passages = split_passages(":: Start [a][ key = v ]\nbody\n");
        assert_eq!(passages[0].tags, vec!["a", "key=v"]);
    }

    #[test]
    fn module_header_sets_path_base() {
        let src = "::: [module=act1]\n:: Intro\nx\n::: [module=act2/scenes]\n:: Outro\ny\n";
        let passages = split_passages(src);
        assert_eq!(passages[0].name, "/act1/Intro");
        assert_eq!(passages[1].name, "/act2/scenes/Outro");
    }

    #[test]
    fn module_header_declares_no_passage() {
        let passages = split_passages("::: [module=act1]\nloose text\n:: A\nbody\n");
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].name, "/act1/A");
    }

    #[test]
    fn malformed_header_dropped_silently() {
        // No name before the tag bracket.
        let passages = split_passages(":: [tag]\nbody\n:: Good\nok\n");
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].name, "/Good");
    }

    #[test]
    fn names_are_normalized() {
        let passages = split_passages(":: a//b\nx\n");
        assert_eq!(passages[0].name, "/a/b");
    }

    #[test]
    fn line_endings_are_normalized() {
        let passages = split_passages(":: A\r\none\r\ntwo\r:: B\r\nx\n");
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].body, "one\ntwo\n");
    }

    #[test]
    fn header_trailing_content_without_brackets_is_part_of_name() {
        let passages = split_passages("::  Spaced Name  \nx\n");
        assert_eq!(passages[0].name, "/Spaced Name");
    }
}
