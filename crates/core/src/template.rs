//! Template code generation.
//!
//! Turns one passage body into an executable run unit. Text runs become
//! emit-text segments; `<% ... %>` directive spans dispatch on their leading
//! characters: `==expr` emits the value raw, `=expr` emits it HTML-escaped,
//! anything else is a statement executed for its side effect only. A
//! directive span never crosses a line; a `<%` whose `%>` lies on a later
//! line is literal text.
//!
//! Alongside the segment program, a textual listing of the generated unit is
//! produced for the external compiler toolchain. Literal text is made
//! string-safe in the listing, and whitespace-only runs trimmed from the
//! start and end of the body are replaced by the equivalent number of blank
//! lines, so diagnostic line numbers in the listing approximately track the
//! original source.

use serde::Serialize;

use crate::book::CompiledPassage;
use crate::source::PassageSource;

/// One compiled step of a passage's run unit, in original order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Segment {
    /// Emit literal text.
    Text(String),
    /// Evaluate an expression and emit its value HTML-escaped.
    EmitEscaped { expr: String, line: u32 },
    /// Evaluate an expression and emit its value unescaped.
    EmitRaw { expr: String, line: u32 },
    /// Execute a statement for its side effect; nothing is emitted.
    Statement { code: String, line: u32 },
}

/// Compile one passage source into its run unit.
pub fn generate(src: &PassageSource) -> CompiledPassage {
    let body = src.body.as_str();

    // Trim whitespace-only runs at the very start and end of the body, but
    // remember how many lines each run spanned for listing padding.
    let start = body.len() - body.trim_start().len();
    let trimmed_end = body.trim_end().len();
    let (inner, leading_lines, trailing_lines) = if trimmed_end < start {
        // Whole body is whitespace.
        ("", newline_count(body), 0)
    } else {
        (
            &body[start..trimmed_end],
            newline_count(&body[..start]),
            newline_count(&body[trimmed_end..]).saturating_sub(1),
        )
    };

    let mut segments = Vec::new();
    let mut listing = String::new();
    for _ in 0..leading_lines {
        listing.push('\n');
    }
    listing.push_str("_w_.out(\"");

    // Directive line numbers are body-relative, counting the trimmed
    // leading run so they track the source.
    let mut line = 1 + leading_lines;
    let mut pos = 0usize;
    while let Some(open) = inner[pos..].find("<%") {
        let open = pos + open;
        let Some(close) = inner[open + 2..].find("%>") else {
            // Unterminated directive opener: plain text to the end.
            break;
        };
        let close = open + 2 + close;

        if inner[open + 2..close].contains('\n') {
            // Directive spans are single-line; this opener is literal.
            let text = &inner[pos..open + 2];
            line += newline_count(text);
            push_text(&mut segments, &mut listing, text);
            pos = open + 2;
            continue;
        }

        let text = &inner[pos..open];
        line += newline_count(text);
        push_text(&mut segments, &mut listing, text);

        let contents = &inner[open + 2..close];
        if let Some(expr) = contents.strip_prefix("==") {
            listing.push_str("\"); _w_.out(");
            listing.push_str(expr);
            listing.push_str("); _w_.out(\"");
            segments.push(Segment::EmitRaw {
                expr: expr.trim().to_owned(),
                line,
            });
        } else if let Some(expr) = contents.strip_prefix('=') {
            listing.push_str("\"); _w_.out(html_escape(");
            listing.push_str(expr);
            listing.push_str(")); _w_.out(\"");
            segments.push(Segment::EmitEscaped {
                expr: expr.trim().to_owned(),
                line,
            });
        } else {
            listing.push_str("\"); ");
            listing.push_str(contents);
            listing.push_str(";_w_.out(\"");
            segments.push(Segment::Statement {
                code: contents.trim().to_owned(),
                line,
            });
        }
        line += newline_count(contents);
        pos = close + 2;
    }

    let tail = &inner[pos..];
    push_text(&mut segments, &mut listing, tail);
    listing.push_str("\");");
    for _ in 0..trailing_lines {
        listing.push('\n');
    }

    CompiledPassage {
        name: src.name.clone(),
        tags: src.tags.clone(),
        segments,
        listing,
    }
}

fn push_text(segments: &mut Vec<Segment>, listing: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    listing.push_str(&escape_literal(text));
    if let Some(Segment::Text(prev)) = segments.last_mut() {
        prev.push_str(text);
    } else {
        segments.push(Segment::Text(text.to_owned()));
    }
}

/// Make text safe inside a double-quoted string literal. Newlines become a
/// string continuation so the listing keeps one listing line per source line.
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n\"\n+\""),
            _ => out.push(c),
        }
    }
    out
}

fn newline_count(text: &str) -> u32 {
    text.bytes().filter(|b| *b == b'\n').count() as u32
}
