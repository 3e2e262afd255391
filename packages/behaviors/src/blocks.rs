//! Block type commands (heading, paragraph, quote) and the toolbar queries
//! that decide which of them toggles.

use crate::behavior::Behavior;
use crate::query::{selected_blocks, selected_node};
use scribe_editor::{
    CommandKey, CommandPriority, Editor, EditorResult, ElementKind, HeadingTag, Node, NodeKey,
    NodeKind, NodeStore, Propagation, Registration, Selection,
};

pub const FORMAT_HEADING: CommandKey<HeadingTag> = CommandKey::new("FORMAT_HEADING");
pub const FORMAT_PARAGRAPH: CommandKey<()> = CommandKey::new("FORMAT_PARAGRAPH");
pub const FORMAT_QUOTE: CommandKey<()> = CommandKey::new("FORMAT_QUOTE");

pub struct BlockFormat;

impl Behavior for BlockFormat {
    fn name(&self) -> &'static str {
        "block-format"
    }

    fn install(&self, editor: &mut Editor) -> Vec<Registration> {
        vec![
            editor
                .register_command(FORMAT_HEADING, CommandPriority::Editor, |editor, tag| {
                    set_blocks_kind(editor, ElementKind::Heading(*tag))
                })
                .into(),
            editor
                .register_command(FORMAT_PARAGRAPH, CommandPriority::Editor, |editor, _| {
                    set_blocks_kind(editor, ElementKind::Paragraph)
                })
                .into(),
            editor
                .register_command(FORMAT_QUOTE, CommandPriority::Editor, |editor, _| {
                    set_blocks_kind(editor, ElementKind::Quote)
                })
                .into(),
        ]
    }
}

/// Change every block touched by the range selection to `kind`. List items
/// keep their kind.
fn set_blocks_kind(editor: &mut Editor, kind: ElementKind) -> EditorResult<Propagation> {
    editor.update(|editor| {
        let tx = editor.tx()?;
        if tx.selection().as_range().is_none() {
            return Ok(Propagation::Continue);
        }
        let blocks = selected_blocks(tx.store(), tx.selection());
        for block in blocks {
            if tx.store().kind(block) == Some(NodeKind::ListItem) {
                continue;
            }
            tx.set_element_kind(block, kind.clone())?;
        }
        Ok(Propagation::Stop)
    })
}

fn heading_tag(node: &Node) -> Option<HeadingTag> {
    match node.as_element().map(|element| &element.kind) {
        Some(ElementKind::Heading(tag)) => Some(*tag),
        _ => None,
    }
}

/// Text nodes stand for their parent block
fn owning_node<'a>(store: &'a NodeStore, key: NodeKey) -> Option<&'a Node> {
    let node = store.get(key)?;
    if node.is_text() {
        store.get(node.parent()?)
    } else {
        Some(node)
    }
}

/// With several nodes selected every one must be a heading and at least
/// one must carry `tag`; a single node must be a heading with `tag`.
pub fn is_heading_at_selection(store: &NodeStore, selection: &Selection, tag: HeadingTag) -> bool {
    let Some(range) = selection.as_range() else {
        return false;
    };
    let nodes = range.nodes(store);
    if nodes.len() > 1 {
        let mut has_tag = false;
        for key in nodes {
            match owning_node(store, key).and_then(heading_tag) {
                Some(found) => has_tag |= found == tag,
                None => return false,
            }
        }
        return has_tag;
    }
    nodes
        .first()
        .and_then(|&key| owning_node(store, key))
        .and_then(heading_tag)
        .is_some_and(|found| found == tag)
}

fn has_ancestor_of_kind(store: &NodeStore, selection: &Selection, kind: NodeKind) -> bool {
    selection
        .as_range()
        .and_then(|range| selected_node(store, range))
        .and_then(|key| store.find_ancestor(key, |node| node.kind() == kind))
        .is_some()
}

pub fn is_quote_at_selection(store: &NodeStore, selection: &Selection) -> bool {
    has_ancestor_of_kind(store, selection, NodeKind::Quote)
}

pub fn is_link_at_selection(store: &NodeStore, selection: &Selection) -> bool {
    has_ancestor_of_kind(store, selection, NodeKind::Link)
}
