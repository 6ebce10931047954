//! Navigation and function links.
//!
//! Rendered output carries anchors under two reserved schemes the engine
//! intercepts instead of following: `weft+passage:` for navigation targets
//! and `weft+function:` for deferred callbacks registered at run time.
//! Author shorthand (`[[target]]`, `[[label->target]]`) is rewritten into
//! navigation anchors after each passage runs; anchors are rewired to
//! canonical targets after each render.

use std::collections::BTreeMap;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::host::ScriptHost;

/// Scheme prefix of navigation-link anchors.
pub const PASSAGE_SCHEME: &str = "weft+passage:";
/// Scheme prefix of deferred-callback anchors.
pub const FUNCTION_SCHEME: &str = "weft+function:";
/// Anchor attribute naming the passage that produced the link, used to
/// resolve relative targets.
pub const BASE_ATTR: &str = "data-weft-base";
/// Anchor attribute holding the canonical intercept target after rewiring.
pub const TARGET_ATTR: &str = "data-weft-target";

/// A deferred callback minted by `fnlink`. Dispatching consumes it.
pub type LinkCallback =
    Box<dyn FnOnce(&mut Engine, &mut dyn ScriptHost) -> Result<(), EngineError>>;

/// Rewrite double-bracket author shorthand into navigation-link markup.
///
/// `[[target]]` uses the target as its label; `[[label->target]]` splits at
/// the first arrow. The target is trimmed, the label is not. Each rewritten
/// anchor carries the producing passage's name so relative targets resolve
/// correctly later. Spans without a closing `]]` on the same line are left
/// as literal text.
pub fn rewrite_shorthand(text: &str, base: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0usize;
    while let Some(open) = text[pos..].find("[[") {
        let open = pos + open;
        out.push_str(&text[pos..open]);
        let inner_start = open + 2;
        match text[inner_start..].find("]]") {
            Some(close) if !text[inner_start..inner_start + close].contains('\n') => {
                let inner = &text[inner_start..inner_start + close];
                let (label, dest) = match inner.find("->") {
                    Some(arrow) => (&inner[..arrow], &inner[arrow + 2..]),
                    None => (inner, inner),
                };
                out.push_str(&format!(
                    "<a href=\"{}{}\" {}=\"{}\">{}</a>",
                    PASSAGE_SCHEME,
                    dest.trim(),
                    BASE_ATTR,
                    base,
                    label
                ));
                pos = inner_start + close + 2;
            }
            _ => {
                out.push_str("[[");
                pos = inner_start;
            }
        }
    }
    out.push_str(&text[pos..]);
    out
}

/// Rewire every reserved-scheme anchor in rendered HTML.
///
/// Navigation hrefs are resolved through `resolve` (base attribute plus
/// relative target to canonical absolute name) and the canonical intercept
/// target is stored in [`TARGET_ATTR`]. With `hide_links`, the visible href
/// is replaced by an inert `#`.
pub(crate) fn rewire_anchors(
    html: &str,
    hide_links: bool,
    resolve: &mut dyn FnMut(&str, &str) -> String,
) -> String {
    let mut out = String::with_capacity(html.len());
    let mut pos = 0usize;
    while let Some(open) = html[pos..].find("<a") {
        let open = pos + open;
        out.push_str(&html[pos..open]);
        let Some(end) = html[open..].find('>') else {
            // Unclosed tag: emit the rest literally.
            pos = open;
            break;
        };
        let end = open + end + 1;
        let tag = &html[open..end];

        let target = attr_value(tag, "href").and_then(|(href, _)| {
            if let Some(dest) = href.strip_prefix(PASSAGE_SCHEME) {
                let base = attr_value(tag, BASE_ATTR).map(|(v, _)| v).unwrap_or("");
                Some(format!("{}{}", PASSAGE_SCHEME, resolve(base, dest)))
            } else if href.starts_with(FUNCTION_SCHEME) {
                Some(href.to_owned())
            } else {
                None
            }
        });

        match target {
            Some(target) => out.push_str(&rebuild_anchor(tag, &target, hide_links)),
            None => out.push_str(tag),
        }
        pos = end;
    }
    out.push_str(&html[pos..]);
    out
}

/// Replace the tag's href and append the canonical intercept target.
fn rebuild_anchor(tag: &str, target: &str, hide_links: bool) -> String {
    let mut rebuilt = tag.to_owned();
    if let Some((_, range)) = attr_value(tag, "href") {
        let href = if hide_links { "#" } else { target };
        rebuilt.replace_range(range, href);
    }
    if let Some(close) = rebuilt.rfind('>') {
        rebuilt.insert_str(close, &format!(" {}=\"{}\"", TARGET_ATTR, target));
    }
    rebuilt
}

/// Find `name="value"` inside a tag; returns the value and its byte range.
fn attr_value<'a>(tag: &'a str, name: &str) -> Option<(&'a str, std::ops::Range<usize>)> {
    let marker = format!("{}=\"", name);
    let start = tag.find(&marker)? + marker.len();
    let len = tag[start..].find('"')?;
    Some((&tag[start..start + len], start..start + len))
}

/// Per-turn registry of deferred-callback links.
///
/// Minting returns a monotonically increasing token embedded in a
/// [`FUNCTION_SCHEME`] href. At the end-of-show rewire, the minted table
/// becomes the wired table (replacing the previous turn's); dispatching a
/// token not in the wired table is a defined stale-token error.
#[derive(Default)]
pub(crate) struct FunctionLinks {
    next_token: u64,
    minted: BTreeMap<u64, LinkCallback>,
    wired: BTreeMap<u64, LinkCallback>,
}

impl FunctionLinks {
    /// Register a callback; returns the href to embed in output text.
    pub(crate) fn mint(&mut self, callback: LinkCallback) -> String {
        let token = self.next_token;
        self.next_token += 1;
        self.minted.insert(token, callback);
        format!("{}{}", FUNCTION_SCHEME, token)
    }

    /// Make this turn's minted callbacks dispatchable, evicting the
    /// previous turn's.
    pub(crate) fn wire(&mut self) {
        self.wired = std::mem::take(&mut self.minted);
    }

    /// Remove and return the callback for a wired token.
    pub(crate) fn dispatch(&mut self, token: u64) -> Option<LinkCallback> {
        self.wired.remove(&token)
    }

    /// Clear the per-turn mint table.
    pub(crate) fn clear_minted(&mut self) {
        self.minted.clear();
    }
}
