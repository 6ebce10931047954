//! weft-core: passage compiler core library.
//!
//! Compiles the line-oriented passage-markup DSL into executable run units
//! registered in a hierarchical module tree.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`compile_story()`] -- compile source texts into a [`ModuleTree`]
//! - [`ModuleTree`] / [`PassageMap`] -- the passage registry
//! - [`CompiledPassage`] / [`Segment`] -- compiled run units
//! - [`PassageSource`] -- raw passage records from the parser
//! - [`path`] -- passage-name normalization and resolution

pub mod book;
pub mod compile;
pub mod path;
pub mod source;
pub mod template;

// ── Convenience re-exports ───────────────────────────────────────────

pub use book::{CompiledPassage, ModuleTree, Node, PassageMap};
pub use compile::{compile_into, compile_story};
pub use source::{split_passages, PassageSource};
pub use template::{generate, Segment};
