//! # Selection Model
//!
//! What is selected, relative to one [`NodeStore`]:
//! - **Range**: anchor and focus points inside text or at element boundaries
//! - **Node**: whole nodes (decorators are not text-addressable)
//! - **None**
//!
//! Points hold keys only. After every transaction the engine runs
//! [`reconcile`] so no point survives that references a removed node.

use crate::node::{NodeClass, NodeKey};
use crate::store::NodeStore;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointType {
    /// Offset in UTF-16 code units into a text node
    Text,
    /// Child index into an element or the root
    Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
    pub kind: PointType,
}

impl Point {
    pub fn text(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            kind: PointType::Text,
        }
    }

    pub fn element(key: NodeKey, offset: usize) -> Self {
        Self {
            key,
            offset,
            kind: PointType::Element,
        }
    }

    /// Document-order comparison; `None` when either point is detached
    pub fn compare(&self, other: &Point, store: &NodeStore) -> Option<Ordering> {
        if self.key == other.key {
            return Some(self.offset.cmp(&other.offset));
        }
        store.compare_document_order(self.key, other.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSelection {
    pub anchor: Point,
    pub focus: Point,
}

impl RangeSelection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self::new(point, point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_backward(&self, store: &NodeStore) -> bool {
        self.focus.compare(&self.anchor, store) == Some(Ordering::Less)
    }

    /// Anchor and focus in document order
    pub fn ordered(&self, store: &NodeStore) -> (Point, Point) {
        if self.is_backward(store) {
            (self.focus, self.anchor)
        } else {
            (self.anchor, self.focus)
        }
    }

    /// Every node touched by the range, in document order. Element points
    /// contribute the child they sit before.
    pub fn nodes(&self, store: &NodeStore) -> Vec<NodeKey> {
        let (start, end) = self.ordered(store);
        let start_key = resolve_leafward(store, start);
        let end_key = resolve_leafward(store, end);
        if start_key == end_key {
            return vec![start_key];
        }

        let order = store.document_order();
        let from = order.iter().position(|&k| k == start_key);
        let to = order.iter().position(|&k| k == end_key);
        match (from, to) {
            (Some(from), Some(to)) if from <= to => order[from..=to].to_vec(),
            _ => vec![start_key],
        }
    }
}

fn resolve_leafward(store: &NodeStore, point: Point) -> NodeKey {
    if point.kind == PointType::Element {
        let children = store.children(point.key);
        if let Some(&child) = children.get(point.offset).or(children.last()) {
            return child;
        }
    }
    point.key
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    Range(RangeSelection),
    /// Whole-node selection, in selection order without duplicates
    Node(Vec<NodeKey>),
    #[default]
    None,
}

impl Selection {
    pub fn caret(key: NodeKey, offset: usize) -> Self {
        Selection::Range(RangeSelection::collapsed(Point::text(key, offset)))
    }

    pub fn text_range(key: NodeKey, start: usize, end: usize) -> Self {
        Selection::Range(RangeSelection::new(Point::text(key, start), Point::text(key, end)))
    }

    pub fn nodes(keys: impl IntoIterator<Item = NodeKey>) -> Self {
        let mut unique = Vec::new();
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        if unique.is_empty() {
            Selection::None
        } else {
            Selection::Node(unique)
        }
    }

    pub fn as_range(&self) -> Option<&RangeSelection> {
        match self {
            Selection::Range(range) => Some(range),
            _ => None,
        }
    }

    /// Collapsed range selection, if that is what this is
    pub fn caret_point(&self) -> Option<Point> {
        self.as_range()
            .filter(|range| range.is_collapsed())
            .map(|range| range.anchor)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Selection::None)
    }

    /// Whether any point or node entry refers to `key`
    pub fn references(&self, key: NodeKey) -> bool {
        match self {
            Selection::Range(range) => range.anchor.key == key || range.focus.key == key,
            Selection::Node(keys) => keys.contains(&key),
            Selection::None => false,
        }
    }
}

/// Where a removed node used to be, captured at removal time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub parent: Option<NodeKey>,
    pub index: usize,
    pub previous: Option<NodeKey>,
    pub next: Option<NodeKey>,
    /// Node that took this one's place via `replace`
    pub replaced_by: Option<NodeKey>,
}

/// Remap a selection onto the surviving tree.
///
/// A point whose node survives keeps its place with the offset clamped. A
/// point on a removed node moves to the end of the previous sibling, else the
/// start of the next sibling, else the parent at the former index. If the
/// parent was removed too the same rule is applied one level up. A point with
/// no surviving ancestor collapses the whole selection to `None`.
pub fn reconcile(
    selection: &Selection,
    store: &NodeStore,
    tombstones: &HashMap<NodeKey, Tombstone>,
) -> Selection {
    match selection {
        Selection::None => Selection::None,
        Selection::Node(keys) => {
            Selection::nodes(keys.iter().copied().filter(|&key| store.contains(key)))
        }
        Selection::Range(range) => {
            let anchor = remap_point(range.anchor, store, tombstones);
            let focus = remap_point(range.focus, store, tombstones);
            match (anchor, focus) {
                (Some(anchor), Some(focus)) => Selection::Range(RangeSelection::new(anchor, focus)),
                _ => Selection::None,
            }
        }
    }
}

fn remap_point(
    point: Point,
    store: &NodeStore,
    tombstones: &HashMap<NodeKey, Tombstone>,
) -> Option<Point> {
    let mut point = point;
    // Follow replacement chains first; each hop keeps the offset
    let mut hops = 0;
    while !store.contains(point.key) && hops <= tombstones.len() {
        match tombstones.get(&point.key).and_then(|t| t.replaced_by) {
            Some(replacement) => {
                point.key = replacement;
                hops += 1;
            }
            None => break,
        }
    }

    if store.contains(point.key) {
        return Some(clamp(point, store));
    }

    let mut removed = point.key;
    let mut visited = 0;
    while let Some(tombstone) = tombstones.get(&removed) {
        if let Some(previous) = tombstone.previous.filter(|&k| store.contains(k)) {
            return Some(end_of(previous, store));
        }
        if let Some(next) = tombstone.next.filter(|&k| store.contains(k)) {
            return Some(start_of(next, store));
        }
        let parent = tombstone.parent?;
        if store.contains(parent) {
            let index = tombstone.index.min(store.children(parent).len());
            return Some(Point::element(parent, index));
        }
        removed = parent;
        visited += 1;
        if visited > tombstones.len() {
            break;
        }
    }
    None
}

fn clamp(point: Point, store: &NodeStore) -> Point {
    let is_text = store
        .get(point.key)
        .is_some_and(|node| node.class() == NodeClass::Text);
    match (point.kind, is_text) {
        (PointType::Text, true) | (PointType::Element, false) => {
            let size = store.content_size(point.key);
            Point {
                offset: point.offset.min(size),
                ..point
            }
        }
        // The point type no longer matches the node class
        (PointType::Text, false) => start_of(point.key, store),
        (PointType::Element, true) => Point::text(point.key, point.offset.min(store.content_size(point.key))),
    }
}

/// Point at the end of `key`'s content
pub fn end_of(key: NodeKey, store: &NodeStore) -> Point {
    match store.get(key).map(|node| node.class()) {
        Some(NodeClass::Text) => Point::text(key, store.content_size(key)),
        Some(NodeClass::Decorator) => match (store.parent(key), store.index_in_parent(key)) {
            (Some(parent), Some(index)) => Point::element(parent, index + 1),
            _ => Point::element(key, 0),
        },
        _ => Point::element(key, store.content_size(key)),
    }
}

/// Point at the start of `key`'s content
pub fn start_of(key: NodeKey, store: &NodeStore) -> Point {
    match store.get(key).map(|node| node.class()) {
        Some(NodeClass::Text) => Point::text(key, 0),
        Some(NodeClass::Decorator) => match (store.parent(key), store.index_in_parent(key)) {
            (Some(parent), Some(index)) => Point::element(parent, index),
            _ => Point::element(key, 0),
        },
        _ => Point::element(key, 0),
    }
}
