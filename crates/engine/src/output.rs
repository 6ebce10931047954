//! Per-execution passage output accumulator.
//!
//! One `PassageOutput` exists per `run_passage` call, owned by the engine
//! for the call's duration and held on a strict LIFO stack while nested
//! passages run.

/// Accumulated output of one passage execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassageOutput {
    /// Emitted text, in emission order.
    pub text: String,
    /// Tag set, seeded from the passage's own tags; display handlers may
    /// overwrite it.
    pub tags: Vec<String>,
    /// Rendered-HTML cache, filled after the external renderer runs.
    pub rendered_html: Option<String>,
}

impl PassageOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh output seeded with a passage's tags.
    pub fn seeded(tags: &[String]) -> Self {
        PassageOutput {
            tags: tags.to_vec(),
            ..Self::default()
        }
    }

    /// Append emitted text.
    pub fn out(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Merge another output's emitted text into this one. Tags and the
    /// rendered cache are left untouched.
    pub fn merge_in(&mut self, other: &PassageOutput) {
        self.text.push_str(&other.text);
    }

    /// Replace the tag set wholesale.
    pub fn copy_tags_from(&mut self, tags: &[String]) {
        self.tags.clear();
        self.tags.extend_from_slice(tags);
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Escape text for literal inclusion in HTML.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
