//! Read-only helpers shared by behaviors for resolving what a selection
//! covers

use scribe_editor::text::utf16_len;
use scribe_editor::{
    Node, NodeClass, NodeKey, NodeKind, NodeStore, PointType, RangeSelection, Selection,
};

/// A covered stretch `[start, end)` of one text node, in UTF-16 units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub key: NodeKey,
    pub start: usize,
    pub end: usize,
    /// Length of the whole node
    pub len: usize,
}

impl TextSpan {
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn is_whole(&self) -> bool {
        self.start == 0 && self.end == self.len
    }
}

/// Editable text runs (ghost suggestions excluded) covered by `range`, in
/// document order. Runs the range only touches at a boundary are skipped.
pub fn text_spans(store: &NodeStore, range: &RangeSelection) -> Vec<TextSpan> {
    let (start, end) = range.ordered(store);
    range
        .nodes(store)
        .into_iter()
        .filter(|&key| is_editable_text(store, key))
        .filter_map(|key| {
            let len = store.text(key).map(|text| utf16_len(&text.text))?;
            let from = if key == start.key && start.kind == PointType::Text {
                start.offset.min(len)
            } else {
                0
            };
            let to = if key == end.key && end.kind == PointType::Text {
                end.offset.min(len)
            } else {
                len
            };
            let span = TextSpan {
                key,
                start: from,
                end: to,
                len,
            };
            (!span.is_empty()).then_some(span)
        })
        .collect()
}

pub fn is_editable_text(store: &NodeStore, key: NodeKey) -> bool {
    store
        .get(key)
        .is_some_and(|node| node.class() == NodeClass::Text && node.kind() != NodeKind::Autocomplete)
}

/// Whether the node is a block-level container that block formatting acts on
pub fn is_block(node: &Node) -> bool {
    node.class() == NodeClass::Element && !node.is_inline() && node.kind() != NodeKind::List
}

/// Nearest block containing `key` (or `key` itself)
pub fn block_of(store: &NodeStore, key: NodeKey) -> Option<NodeKey> {
    store.find_ancestor(key, is_block)
}

/// Blocks touched by a range selection, in document order without repeats
pub fn selected_blocks(store: &NodeStore, selection: &Selection) -> Vec<NodeKey> {
    let Some(range) = selection.as_range() else {
        return Vec::new();
    };
    let mut blocks = Vec::new();
    for key in range.nodes(store) {
        if let Some(block) = block_of(store, key) {
            if !blocks.contains(&block) {
                blocks.push(block);
            }
        }
    }
    blocks
}

/// The node a range selection is considered to be "on": the anchor node
/// when both ends share it, otherwise the focus node
pub fn selected_node(store: &NodeStore, range: &RangeSelection) -> Option<NodeKey> {
    let key = if range.anchor.key == range.focus.key {
        range.anchor.key
    } else {
        range.focus.key
    };
    store.contains(key).then_some(key)
}

/// Keys of every ghost suggestion node in document order
pub fn ghost_nodes(store: &NodeStore) -> Vec<NodeKey> {
    store.nodes_of_kind(NodeKind::Autocomplete)
}
