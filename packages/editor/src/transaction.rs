//! # Transaction
//!
//! A working copy of the current snapshot plus the bookkeeping needed to
//! finish an update:
//!
//! - **Dirty set**: nodes created or changed, processed by the transform
//!   fixpoint in insertion order. Dirtying a node dirties its ancestors.
//! - **Tombstones**: where each removed node used to sit, for selection
//!   reconciliation.
//! - **Created keys**: nodes born in this transaction (`is_new`).
//!
//! Every store mutation goes through here. Writes that leave a value unchanged
//! do not dirty anything.

use crate::errors::StoreError;
use crate::history::ChangeKind;
use crate::node::{
    DecoratorNode, ElementKind, ElementNode, NodeClass, NodeData, NodeKey, TextFormat, TextNode,
};
use crate::selection::{self, Point, PointType, RangeSelection, Selection, Tombstone};
use crate::snapshot::Snapshot;
use crate::store::NodeStore;
use crate::text::{splice_utf16, split_utf16, utf16_len};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    /// The update closure is running
    Open,
    /// Transforms, housekeeping and selection reconciliation are running
    Reconciling,
}

/// Insertion-ordered set of keys
#[derive(Debug, Default, Clone)]
pub(crate) struct DirtySet {
    order: Vec<NodeKey>,
    members: HashSet<NodeKey>,
}

impl DirtySet {
    fn insert(&mut self, key: NodeKey) {
        if self.members.insert(key) {
            self.order.push(key);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn drain(&mut self) -> Vec<NodeKey> {
        self.members.clear();
        std::mem::take(&mut self.order)
    }

    fn keys(&self) -> &[NodeKey] {
        &self.order
    }
}

#[derive(Debug)]
pub struct Transaction {
    base: Arc<Snapshot>,
    store: NodeStore,
    selection: Selection,
    phase: TransactionPhase,
    /// Waiting for the next transform round
    pending: DirtySet,
    /// Everything dirtied over the whole transaction
    touched: DirtySet,
    created: HashSet<NodeKey>,
    tombstones: HashMap<NodeKey, Tombstone>,
    structural: bool,
    next_key: u64,
}

impl Transaction {
    pub(crate) fn new(base: Arc<Snapshot>, next_key: u64) -> Self {
        Self {
            store: base.store.clone(),
            selection: base.selection.clone(),
            base,
            phase: TransactionPhase::Open,
            pending: DirtySet::default(),
            touched: DirtySet::default(),
            created: HashSet::new(),
            tombstones: HashMap::new(),
            structural: false,
            next_key,
        }
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// The snapshot this transaction started from
    pub fn base(&self) -> &Arc<Snapshot> {
        &self.base
    }

    pub fn phase(&self) -> TransactionPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: TransactionPhase) {
        self.phase = phase;
    }

    pub(crate) fn next_key(&self) -> u64 {
        self.next_key
    }

    /// Whether `key` was created inside this transaction
    pub fn is_new(&self, key: NodeKey) -> bool {
        self.created.contains(&key)
    }

    /// Every key dirtied so far, in first-dirtied order
    pub fn dirty_keys(&self) -> &[NodeKey] {
        self.touched.keys()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn take_pending(&mut self) -> Vec<NodeKey> {
        self.pending.drain()
    }

    fn allocate_key(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        key
    }

    // Dirty tracking

    /// Mark `key` and its ancestors dirty so their transforms run again
    pub fn mark_dirty(&mut self, key: NodeKey) {
        if !self.store.contains(key) {
            return;
        }
        for dirty in std::iter::once(key).chain(self.store.ancestors(key)) {
            self.pending.insert(dirty);
            self.touched.insert(dirty);
        }
    }

    pub fn mark_all_dirty(&mut self) {
        for key in self.store.document_order() {
            self.pending.insert(key);
            self.touched.insert(key);
        }
    }

    // Structure

    /// Insert a new node under `parent` at `index` (clamped). Any children
    /// carried by `data` are dropped; attach children with further inserts.
    pub fn insert(
        &mut self,
        data: NodeData,
        parent: NodeKey,
        index: usize,
    ) -> Result<NodeKey, StoreError> {
        let key = self.allocate_key();
        self.store.insert(key, data.without_children(), parent, index)?;
        self.created.insert(key);
        self.structural = true;
        self.mark_dirty(key);
        Ok(key)
    }

    pub fn append(&mut self, parent: NodeKey, data: NodeData) -> Result<NodeKey, StoreError> {
        self.insert(data, parent, usize::MAX)
    }

    pub fn insert_after(&mut self, sibling: NodeKey, data: NodeData) -> Result<NodeKey, StoreError> {
        let (parent, index) = self.position_of(sibling)?;
        self.insert(data, parent, index + 1)
    }

    pub fn insert_before(&mut self, sibling: NodeKey, data: NodeData) -> Result<NodeKey, StoreError> {
        let (parent, index) = self.position_of(sibling)?;
        self.insert(data, parent, index)
    }

    fn position_of(&self, key: NodeKey) -> Result<(NodeKey, usize), StoreError> {
        let node = self.store.node(key)?;
        let parent = node.parent.ok_or_else(|| {
            StoreError::InvariantViolation("the root node has no siblings".to_string())
        })?;
        let index = self
            .store
            .index_in_parent(key)
            .ok_or(StoreError::NodeNotFound(key))?;
        Ok((parent, index))
    }

    /// Remove `key` and its subtree
    pub fn remove(&mut self, key: NodeKey) -> Result<(), StoreError> {
        if key == self.store.root() {
            return Err(StoreError::InvariantViolation(
                "the root node cannot be removed".to_string(),
            ));
        }
        let parent = self.store.node(key)?.parent;
        for gone in self.store.descendants(key) {
            let tombstone = self.tombstone_for(gone);
            self.tombstones.entry(gone).or_insert(tombstone);
        }
        self.store.remove(key)?;
        self.structural = true;
        if let Some(parent) = parent {
            self.mark_dirty(parent);
        }
        Ok(())
    }

    fn tombstone_for(&self, key: NodeKey) -> Tombstone {
        Tombstone {
            parent: self.store.parent(key),
            index: self.store.index_in_parent(key).unwrap_or(0),
            previous: self.store.previous_sibling(key),
            next: self.store.next_sibling(key),
            replaced_by: None,
        }
    }

    /// Move `key` under `new_parent` at `index`, counted before the move
    pub fn move_node(
        &mut self,
        key: NodeKey,
        new_parent: NodeKey,
        index: usize,
    ) -> Result<(), StoreError> {
        let old_parent = self.store.parent(key);
        self.store.move_node(key, new_parent, index)?;
        self.structural = true;
        if let Some(old_parent) = old_parent {
            self.mark_dirty(old_parent);
        }
        self.mark_dirty(key);
        Ok(())
    }

    /// Put a new node with `data` where `key` is. With `keep_children` the
    /// old node's children move over when the new node can own them.
    /// Selection points on `key` follow the replacement.
    pub fn replace(
        &mut self,
        key: NodeKey,
        data: NodeData,
        keep_children: bool,
    ) -> Result<NodeKey, StoreError> {
        if key == self.store.root() {
            return Err(StoreError::InvariantViolation(
                "the root node cannot be replaced".to_string(),
            ));
        }
        let (parent, index) = self.position_of(key)?;
        let replacement = self.insert(data, parent, index)?;
        if keep_children && self.store.class_of(replacement)? == NodeClass::Element {
            for child in self.store.children(key).to_vec() {
                self.move_node(child, replacement, usize::MAX)?;
            }
        }
        self.remove(key)?;
        if let Some(tombstone) = self.tombstones.get_mut(&key) {
            tombstone.replaced_by = Some(replacement);
        }
        Ok(replacement)
    }

    // Values

    /// Apply `f` to a copy of the node's data and write it back. Children
    /// cannot be changed this way. Returns whether the value changed.
    pub fn update_data(
        &mut self,
        key: NodeKey,
        f: impl FnOnce(&mut NodeData),
    ) -> Result<bool, StoreError> {
        let mut data = self.store.node(key)?.data.clone();
        f(&mut data);
        let changed = self.store.set_data(key, data)?;
        if changed {
            self.mark_dirty(key);
        }
        Ok(changed)
    }

    pub fn update_text(
        &mut self,
        key: NodeKey,
        f: impl FnOnce(&mut TextNode),
    ) -> Result<bool, StoreError> {
        if self.store.class_of(key)? != NodeClass::Text {
            return Err(StoreError::NotText(key));
        }
        self.update_data(key, |data| {
            if let NodeData::Text(text) = data {
                f(text);
            }
        })
    }

    pub fn update_element(
        &mut self,
        key: NodeKey,
        f: impl FnOnce(&mut ElementNode),
    ) -> Result<bool, StoreError> {
        if self.store.class_of(key)? != NodeClass::Element {
            return Err(StoreError::NotAnElement(key));
        }
        self.update_data(key, |data| {
            if let NodeData::Element(element) = data {
                f(element);
            }
        })
    }

    pub fn set_text(&mut self, key: NodeKey, text: impl Into<String>) -> Result<bool, StoreError> {
        let text = text.into();
        self.update_text(key, |node| node.text = text)
    }

    /// Replace `delete` UTF-16 units at `offset` with `insert`
    pub fn splice_text(
        &mut self,
        key: NodeKey,
        offset: usize,
        delete: usize,
        insert: &str,
    ) -> Result<bool, StoreError> {
        self.update_text(key, |node| {
            node.text = splice_utf16(&node.text, offset, delete, insert);
        })
    }

    pub fn set_format(&mut self, key: NodeKey, format: TextFormat) -> Result<bool, StoreError> {
        self.update_text(key, |node| node.format = format)
    }

    /// Flip `format` on a text node; returns whether it is now set
    pub fn toggle_format(&mut self, key: NodeKey, format: TextFormat) -> Result<bool, StoreError> {
        self.update_text(key, |node| node.format.toggle(format))?;
        Ok(self
            .store
            .text(key)
            .is_some_and(|node| node.has_format(format)))
    }

    pub fn set_element_kind(&mut self, key: NodeKey, kind: ElementKind) -> Result<bool, StoreError> {
        self.update_element(key, |element| element.kind = kind)
    }

    pub fn set_decorator(
        &mut self,
        key: NodeKey,
        decorator: DecoratorNode,
    ) -> Result<bool, StoreError> {
        if self.store.class_of(key)? != NodeClass::Decorator {
            return Err(StoreError::NotDecorator(key));
        }
        self.update_data(key, |data| *data = NodeData::Decorator(decorator))
    }

    /// Split a text node at UTF-16 `offsets`. The first piece keeps `key`;
    /// later pieces become new siblings with the same formatting. Selection
    /// points move into the piece that now holds their character. Returns
    /// the keys of all pieces in order.
    pub fn split_text(&mut self, key: NodeKey, offsets: &[usize]) -> Result<Vec<NodeKey>, StoreError> {
        let node = self.store.text(key).cloned().ok_or_else(|| {
            if self.store.contains(key) {
                StoreError::NotText(key)
            } else {
                StoreError::NodeNotFound(key)
            }
        })?;
        let pieces: Vec<String> = split_utf16(&node.text, offsets)
            .into_iter()
            .map(str::to_string)
            .collect();
        if pieces.len() < 2 {
            return Ok(vec![key]);
        }

        let mut bounds = Vec::with_capacity(pieces.len());
        let mut end = 0;
        for piece in &pieces {
            end += utf16_len(piece);
            bounds.push(end);
        }

        self.set_text(key, pieces[0].clone())?;
        let mut keys = vec![key];
        for piece in &pieces[1..] {
            let previous = keys[keys.len() - 1];
            let sibling = self.insert_after(previous, NodeData::Text(node.sibling_with(piece.clone())))?;
            keys.push(sibling);
        }

        if let Some(range) = self.selection.as_range().cloned() {
            let relocate = |point: Point| -> Point {
                if point.key != key || point.kind != PointType::Text {
                    return point;
                }
                let piece = bounds
                    .iter()
                    .position(|&end| point.offset <= end)
                    .unwrap_or(bounds.len() - 1);
                let start = if piece == 0 { 0 } else { bounds[piece - 1] };
                Point::text(keys[piece], point.offset.saturating_sub(start))
            };
            self.selection = Selection::Range(RangeSelection::new(
                relocate(range.anchor),
                relocate(range.focus),
            ));
        }
        Ok(keys)
    }

    // Selection

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    /// Collapsed caret at `offset`: a text point on text nodes, an element
    /// point otherwise
    pub fn select_caret(&mut self, key: NodeKey, offset: usize) {
        let point = match self.store.get(key).map(|node| node.class()) {
            Some(NodeClass::Text) => Point::text(key, offset),
            _ => Point::element(key, offset),
        };
        self.selection = Selection::Range(RangeSelection::collapsed(point));
    }

    pub fn select_end(&mut self, key: NodeKey) {
        let point = selection::end_of(key, &self.store);
        self.selection = Selection::Range(RangeSelection::collapsed(point));
    }

    pub fn select_start(&mut self, key: NodeKey) {
        let point = selection::start_of(key, &self.store);
        self.selection = Selection::Range(RangeSelection::collapsed(point));
    }

    pub fn select_nodes(&mut self, keys: impl IntoIterator<Item = NodeKey>) {
        self.selection = Selection::nodes(keys);
    }

    // Finalization

    pub(crate) fn reconcile_selection(&mut self) {
        self.selection = selection::reconcile(&self.selection, &self.store, &self.tombstones);
    }

    /// What this transaction changed relative to its base, or `None`
    pub(crate) fn change_kind(&self) -> Option<ChangeKind> {
        let selection_changed = self.selection != self.base.selection;
        if self.store == self.base.store {
            return selection_changed.then_some(ChangeKind::SelectionOnly);
        }
        if self.structural {
            return Some(ChangeKind::Structural);
        }

        let mut texts = BTreeSet::new();
        for &key in self.touched.keys() {
            match (self.base.store.get(key), self.store.get(key)) {
                (Some(before), Some(after)) if before.data == after.data => {}
                (Some(before), Some(after))
                    if before.is_text() && before.kind() == after.kind() =>
                {
                    texts.insert(key);
                }
                _ => return Some(ChangeKind::Structural),
            }
        }
        if texts.is_empty() {
            Some(ChangeKind::Structural)
        } else {
            Some(ChangeKind::Text(texts))
        }
    }

    pub(crate) fn into_parts(self) -> (NodeStore, Selection, Vec<NodeKey>) {
        (self.store, self.selection, self.touched.order)
    }
}
