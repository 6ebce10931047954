//! Module tree and passage registry.
//!
//! Compiled passages are registered into a hierarchical namespace keyed by
//! the segments of their absolute names. Children are explicitly
//! discriminated as nested scopes or leaf passages. The tree is built once
//! at compile time and flattened once into the name-to-passage map the
//! engine reads from thereafter.
//!
//! Name collisions are not validated: registering a passage over an
//! existing entry (leaf or scope) replaces it, so the last registration
//! wins.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::template::Segment;

/// A passage compiled into its executable run unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPassage {
    /// Canonical absolute name.
    pub name: String,
    /// Tags in declaration order.
    pub tags: Vec<String>,
    /// The run unit: compiled steps in original order.
    pub segments: Vec<Segment>,
    /// Textual listing of the generated unit, for the compiler toolchain.
    pub listing: String,
}

impl CompiledPassage {
    /// Whether a plain tag is present.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether a `key=value` tag with the given key is present.
    pub fn has_tag_key(&self, key: &str) -> bool {
        self.tag_value(key).is_some()
    }

    /// The value of the first `key=value` tag with the given key.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.iter().find_map(|t| {
            let (k, v) = t.split_once('=')?;
            (k.trim() == key).then(|| v.trim())
        })
    }
}

/// A namespace entry: either a leaf passage or a nested scope.
#[derive(Debug, Clone)]
pub enum Node {
    Passage(CompiledPassage),
    Scope(BTreeMap<String, Node>),
}

/// Mapping from canonical absolute name to compiled passage.
pub type PassageMap = BTreeMap<String, CompiledPassage>;

/// The hierarchical passage namespace built during compilation.
#[derive(Debug, Clone, Default)]
pub struct ModuleTree {
    root: BTreeMap<String, Node>,
}

impl ModuleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled passage at the location implied by its name's
    /// path segments. Existing entries along the way are replaced as
    /// needed; collisions are unvalidated.
    pub fn insert(&mut self, passage: CompiledPassage) {
        let segments: Vec<String> = passage
            .name
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();

        let mut children = &mut self.root;
        let Some((leaf, scopes)) = segments.split_last() else {
            return;
        };
        for segment in scopes {
            let entry = children
                .entry(segment.clone())
                .or_insert_with(|| Node::Scope(BTreeMap::new()));
            if !matches!(entry, Node::Scope(_)) {
                *entry = Node::Scope(BTreeMap::new());
            }
            let Node::Scope(next) = entry else {
                unreachable!()
            };
            children = next;
        }
        children.insert(leaf.clone(), Node::Passage(passage));
    }

    /// Flatten the tree into the passage map the engine indexes by name.
    pub fn flatten(self) -> PassageMap {
        let mut map = PassageMap::new();
        flatten_into(self.root, &mut map);
        map
    }
}

fn flatten_into(children: BTreeMap<String, Node>, map: &mut PassageMap) {
    for node in children.into_values() {
        match node {
            Node::Passage(passage) => {
                map.insert(passage.name.clone(), passage);
            }
            Node::Scope(nested) => flatten_into(nested, map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(name: &str, tags: &[&str]) -> CompiledPassage {
        CompiledPassage {
            name: name.to_owned(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            segments: vec![],
            listing: String::new(),
        }
    }

    #[test]
    fn insert_and_flatten_round_trip() {
        let mut tree = ModuleTree::new();
        tree.insert(passage("/Start", &[]));
        tree.insert(passage("/act1/Intro", &[]));
        tree.insert(passage("/act1/scene/Deep", &[]));

        let map = tree.flatten();
        assert_eq!(map.len(), 3);
        assert!(map.contains_key("/Start"));
        assert!(map.contains_key("/act1/Intro"));
        assert!(map.contains_key("/act1/scene/Deep"));
    }

    #[test]
    fn last_registered_passage_wins_on_collision() {
        let mut tree = ModuleTree::new();
        tree.insert(passage("/Start", &["first"]));
        tree.insert(passage("/Start", &["second"]));

        let map = tree.flatten();
        assert_eq!(map.len(), 1);
        assert_eq!(map["/Start"].tags, vec!["second"]);
    }

    #[test]
    fn passage_over_scope_replaces_the_scope() {
        let mut tree = ModuleTree::new();
        tree.insert(passage("/a/b", &[]));
        tree.insert(passage("/a", &[]));

        let map = tree.flatten();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("/a"));
    }

    #[test]
    fn scope_over_passage_replaces_the_passage() {
        let mut tree = ModuleTree::new();
        tree.insert(passage("/a", &[]));
        tree.insert(passage("/a/b", &[]));

        let map = tree.flatten();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("/a/b"));
    }

    #[test]
    fn compiled_passage_serializes_for_inspection() {
        let p = passage("/Start", &["silent"]);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["name"], "/Start");
        assert_eq!(v["tags"][0], "silent");
    }

    #[test]
    fn tag_queries() {
        let p = passage("/Start", &["silent", "author=me", "pad = x "]);
        assert!(p.has_tag("silent"));
        assert!(!p.has_tag("popup"));
        assert!(p.has_tag_key("author"));
        assert_eq!(p.tag_value("author"), Some("me"));
        assert_eq!(p.tag_value("pad"), Some("x"));
        assert_eq!(p.tag_value("missing"), None);
    }
}
