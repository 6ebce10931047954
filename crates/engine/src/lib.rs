//! Navigation and execution engine for compiled story books.
//!
//! `weft-core` turns passage sources into a compiled book; this crate runs
//! one. The [`Engine`] owns navigation state (current passage, visited
//! counts, output stack, link registry, checkpoint bookkeeping) and talks
//! to its embedding shell through small traits: a markup renderer, a
//! display surface, a history store, and a [`ScriptHost`] that executes
//! author directive code.

pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod host;
pub mod links;
pub mod output;

pub use checkpoint::{Checkpoint, SaveStore};
pub use engine::{
    AfterRender, DisplayHandler, Engine, EngineConfig, TAG_NOCHECKPOINT, TAG_POPUP, TAG_SILENT,
};
pub use error::EngineError;
pub use host::{
    BufferSurface, DisplaySurface, HistoryStore, MarkupRenderer, MemoryHistory, NullScriptHost,
    PlainRenderer, ScriptHost,
};
pub use links::{LinkCallback, BASE_ATTR, FUNCTION_SCHEME, PASSAGE_SCHEME, TARGET_ATTR};
pub use output::{html_escape, PassageOutput};
