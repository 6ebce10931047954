//! Compilation pipeline entry point: source text to module tree.

use crate::book::ModuleTree;
use crate::source::split_passages;
use crate::template::generate;

/// Compile one or more story source texts into a module tree.
///
/// Sources are processed in order; each contributes its passages under its
/// own module-path scoping. Name collisions across sources are unvalidated
/// (last registered wins).
pub fn compile_story<'a, I>(sources: I) -> ModuleTree
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tree = ModuleTree::new();
    for text in sources {
        compile_into(&mut tree, text);
    }
    tree
}

/// Compile a single source text into an existing tree.
pub fn compile_into(tree: &mut ModuleTree, text: &str) {
    for src in split_passages(text) {
        tree.insert(generate(&src));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_story_end_to_end() {
        let src = ":: Start\nHello [[Next]]\n:: Next [silent]\n<% done() %>\n";
        let map = compile_story([src]).flatten();
        assert_eq!(map.len(), 2);
        assert!(map["/Start"].segments.len() == 1);
        assert!(map["/Next"].has_tag("silent"));
    }

    #[test]
    fn later_sources_override_earlier_passages() {
        let map = compile_story([":: A\nold\n", ":: A\nnew\n"]).flatten();
        assert_eq!(map.len(), 1);
        assert_eq!(
            map["/A"].segments,
            vec![crate::template::Segment::Text("new".to_owned())]
        );
    }
}
