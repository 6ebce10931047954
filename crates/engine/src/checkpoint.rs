//! Checkpoints and named save slots.
//!
//! A checkpoint is a replay instruction, not a screen snapshot: it stores
//! the shown passage's name, the author-defined state snapshot taken before
//! that passage ran, and the visited-count table. Restoring re-runs the
//! passage against the restored state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Serialized navigation state sufficient to replay to the same screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Name of the passage shown when the checkpoint was taken.
    pub passage: String,
    /// Author-defined snapshot from the script host, opaque to the engine.
    pub state: serde_json::Value,
    /// Visited-count table at checkpoint time.
    pub visited: BTreeMap<String, u32>,
}

impl Checkpoint {
    /// Serialize to the opaque blob stored in history and save slots.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a blob leniently: malformed payloads and payloads without a
    /// passage name yield `None` rather than an error, leaving current
    /// state untouched.
    pub fn decode(blob: &str) -> Option<Checkpoint> {
        let checkpoint: Checkpoint = serde_json::from_str(blob).ok()?;
        if checkpoint.passage.is_empty() {
            return None;
        }
        Some(checkpoint)
    }
}

/// Named-slot persistent store for saves, owned by the surrounding shell.
/// Slots hold the same opaque blobs as the history store.
#[derive(Debug, Clone, Default)]
pub struct SaveStore {
    slots: BTreeMap<String, String>,
}

impl SaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, name: &str, blob: &str) {
        self.slots.insert(name.to_owned(), blob.to_owned());
    }

    pub fn load(&self, name: &str) -> Option<&str> {
        self.slots.get(name).map(String::as_str)
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.slots.remove(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }
}
