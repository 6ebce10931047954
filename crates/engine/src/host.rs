//! External collaborator interfaces.
//!
//! The engine consumes a Markdown renderer, a display surface, a persistent
//! history store, and a script host for directive code; none of them are
//! implemented here beyond in-memory adapters for tests and embedding
//! shells.

use std::cell::RefCell;
use std::rc::Rc;

use weft_core::CompiledPassage;

use crate::engine::Engine;
use crate::error::EngineError;

/// Renders passage text (Markdown plus embedded anchors) to HTML.
pub trait MarkupRenderer {
    fn render(&mut self, text: &str) -> String;
}

/// Where finished output lands: a main surface and a popup surface layered
/// over it.
pub trait DisplaySurface {
    fn render_main(&mut self, html: &str);
    fn render_popup(&mut self, html: &str);
}

/// Persistent navigation history holding opaque checkpoint blobs.
///
/// `replace` overwrites the current entry in place; `push` advances to a
/// new entry. Restore notifications (back/forward) are the shell's job: it
/// reads the blob back out and calls `Engine::restore_checkpoint`.
pub trait HistoryStore {
    fn replace(&mut self, blob: &str);
    fn push(&mut self, blob: &str);
}

/// Executes author directive code against the live engine.
///
/// The host is the engine's view of the backing compiler toolchain: it
/// receives each generated unit for compilation at init, and evaluates the
/// unit's expressions and statements during passage execution. Directive
/// code may call back into the engine (include, fallthrough, fnlink, ...)
/// through the `engine` argument.
///
/// # Determinism contract
///
/// Checkpoints store a snapshot plus a passage name and reconstruct the
/// screen by re-running that passage. Author code must therefore be
/// deterministic given the state restored by [`restore_snapshot`]: a
/// passage that renders differently on replay will restore to a different
/// screen than the one saved.
pub trait ScriptHost {
    /// Compile one generated unit. `Ok` carries warnings (logged, unit
    /// proceeds); `Err` means compilation failed outright and the
    /// diagnostics are surfaced on the display instead.
    fn compile_unit(&mut self, passage: &CompiledPassage) -> Result<Vec<String>, Vec<String>> {
        let _ = passage;
        Ok(Vec::new())
    }

    /// Evaluate an emit-directive expression to the text to emit.
    fn eval(&mut self, expr: &str, engine: &mut Engine) -> Result<String, EngineError>;

    /// Execute a statement directive for its side effect.
    fn exec(&mut self, stmt: &str, engine: &mut Engine) -> Result<(), EngineError>;

    /// Produce the author-defined state snapshot stored in checkpoints.
    /// `None` means no save handler is registered and no checkpoint is
    /// attempted this turn.
    fn create_snapshot(&self) -> Option<serde_json::Value> {
        None
    }

    /// Restore author-defined state from a checkpoint snapshot.
    fn restore_snapshot(&mut self, state: &serde_json::Value) {
        let _ = state;
    }
}

/// Script host that ignores all directive code. Useful for pure-markup
/// stories and tests.
#[derive(Debug, Default)]
pub struct NullScriptHost;

impl ScriptHost for NullScriptHost {
    fn eval(&mut self, expr: &str, _engine: &mut Engine) -> Result<String, EngineError> {
        tracing::debug!(expr, "no script host; emit directive yields nothing");
        Ok(String::new())
    }

    fn exec(&mut self, stmt: &str, _engine: &mut Engine) -> Result<(), EngineError> {
        tracing::debug!(stmt, "no script host; statement ignored");
        Ok(())
    }
}

/// Passthrough renderer: treats the passage text as already-rendered HTML.
#[derive(Debug, Default)]
pub struct PlainRenderer;

impl MarkupRenderer for PlainRenderer {
    fn render(&mut self, text: &str) -> String {
        text.to_owned()
    }
}

/// Captured surface content, shared between the engine-owned adapter and
/// the test or shell that inspects it.
#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub main: String,
    pub popups: Vec<String>,
}

/// In-memory display surface. Cloning shares the underlying log, so a test
/// can keep a handle while the engine owns the adapter.
#[derive(Debug, Clone, Default)]
pub struct BufferSurface {
    log: Rc<RefCell<SurfaceLog>>,
}

impl BufferSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn main(&self) -> String {
        self.log.borrow().main.clone()
    }

    pub fn popups(&self) -> Vec<String> {
        self.log.borrow().popups.clone()
    }
}

impl DisplaySurface for BufferSurface {
    fn render_main(&mut self, html: &str) {
        self.log.borrow_mut().main = html.to_owned();
    }

    fn render_popup(&mut self, html: &str) {
        self.log.borrow_mut().popups.push(html.to_owned());
    }
}

/// In-memory history store with browser-like back/forward traversal.
/// Cloning shares the underlying entry list.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    inner: Rc<RefCell<HistoryEntries>>,
}

#[derive(Debug, Default)]
struct HistoryEntries {
    entries: Vec<String>,
    cursor: usize,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step back one entry and return its blob, as a browser back button
    /// would before notifying the shell.
    pub fn back(&self) -> Option<String> {
        let mut inner = self.inner.borrow_mut();
        if inner.cursor == 0 {
            return None;
        }
        inner.cursor -= 1;
        inner.entries.get(inner.cursor).cloned()
    }

    /// Step forward one entry and return its blob.
    pub fn forward(&self) -> Option<String> {
        let mut inner = self.inner.borrow_mut();
        if inner.cursor + 1 >= inner.entries.len() {
            return None;
        }
        inner.cursor += 1;
        inner.entries.get(inner.cursor).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryHistory {
    fn replace(&mut self, blob: &str) {
        let mut inner = self.inner.borrow_mut();
        let cursor = inner.cursor;
        if inner.entries.is_empty() {
            inner.entries.push(blob.to_owned());
        } else {
            inner.entries[cursor] = blob.to_owned();
        }
    }

    fn push(&mut self, blob: &str) {
        let mut inner = self.inner.borrow_mut();
        let cursor = inner.cursor;
        // Pushing from mid-history discards the forward entries.
        inner.entries.truncate(cursor + 1);
        inner.entries.push(blob.to_owned());
        inner.cursor = inner.entries.len() - 1;
    }
}
