//! # Node Store
//!
//! Flat arena owning every node of one document version.
//!
//! ## Mutation Semantics
//!
//! ### Insert
//! - Allocated key must be fresh
//! - Parent must be the root or an element (text and decorators are leaves)
//! - Index is clamped to the child count
//!
//! ### Move
//! - Atomic relocation of a node to a new parent
//! - Fails if the new parent is the node itself or one of its descendants
//!
//! ### Remove
//! - Removes the node and all descendants
//! - The root can never be removed
//!
//! The raw mutators are crate-private: outside code reaches them only through
//! an open [`crate::Transaction`], which records dirtiness and removal history
//! for the reconciliation step.

use crate::errors::StoreError;
use crate::node::{DecoratorNode, ElementNode, Node, NodeClass, NodeData, NodeKey, NodeKind, TextNode};
use crate::text::utf16_len;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeStore {
    nodes: HashMap<NodeKey, Node>,
    root: NodeKey,
}

impl NodeStore {
    /// A store holding only an empty root under `root`
    pub(crate) fn with_root(root: NodeKey) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                key: root,
                parent: None,
                data: NodeData::Root {
                    children: Vec::new(),
                    attrs: Default::default(),
                },
            },
        );
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root is always present
        false
    }

    pub(crate) fn node(&self, key: NodeKey) -> Result<&Node, StoreError> {
        self.nodes.get(&key).ok_or(StoreError::NodeNotFound(key))
    }

    pub(crate) fn node_mut(&mut self, key: NodeKey) -> Result<&mut Node, StoreError> {
        self.nodes.get_mut(&key).ok_or(StoreError::NodeNotFound(key))
    }

    pub fn kind(&self, key: NodeKey) -> Option<NodeKind> {
        self.get(key).map(Node::kind)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.get(key).and_then(Node::parent)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.get(key).map(Node::children).unwrap_or(&[])
    }

    pub fn text(&self, key: NodeKey) -> Option<&TextNode> {
        self.get(key).and_then(Node::as_text)
    }

    pub fn index_in_parent(&self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.children(parent).iter().position(|&child| child == key)
    }

    pub fn previous_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let index = self.index_in_parent(key)?;
        index
            .checked_sub(1)
            .and_then(|previous| self.children(parent).get(previous).copied())
    }

    pub fn next_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let index = self.index_in_parent(key)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_siblings(&self, key: NodeKey) -> Vec<NodeKey> {
        match (self.parent(key), self.index_in_parent(key)) {
            (Some(parent), Some(index)) => self.children(parent)[..index].to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn next_siblings(&self, key: NodeKey) -> Vec<NodeKey> {
        match (self.parent(key), self.index_in_parent(key)) {
            (Some(parent), Some(index)) => self.children(parent)[index + 1..].to_vec(),
            _ => Vec::new(),
        }
    }

    /// Ancestors from the parent up to and including the root
    pub fn ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(key);
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.parent(parent);
        }
        ancestors
    }

    /// Whether `ancestor` is a strict ancestor of `key`
    pub fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        self.ancestors(key).contains(&ancestor)
    }

    /// The child of the root that contains `key` (or `key` itself)
    pub fn top_level_element(&self, key: NodeKey) -> Option<NodeKey> {
        if key == self.root || !self.contains(key) {
            return None;
        }
        let mut current = key;
        while let Some(parent) = self.parent(current) {
            if parent == self.root {
                return Some(current);
            }
            current = parent;
        }
        None
    }

    /// Nearest ancestor-or-self matching `predicate`
    pub fn find_ancestor(&self, key: NodeKey, predicate: impl Fn(&Node) -> bool) -> Option<NodeKey> {
        let mut current = Some(key);
        while let Some(candidate) = current {
            let node = self.get(candidate)?;
            if predicate(node) {
                return Some(candidate);
            }
            current = node.parent;
        }
        None
    }

    /// Pre-order traversal of the subtree rooted at `key`
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut order = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            order.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        order
    }

    /// All nodes in document order
    pub fn document_order(&self) -> Vec<NodeKey> {
        self.descendants(self.root)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeKey> {
        self.document_order()
            .into_iter()
            .filter(|&key| self.kind(key) == Some(kind))
            .collect()
    }

    /// Text nodes of the subtree in document order
    pub fn text_descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        self.descendants(key)
            .into_iter()
            .filter(|&k| self.get(k).is_some_and(Node::is_text))
            .collect()
    }

    /// Index path from the root, used for document-order comparisons
    pub fn path(&self, key: NodeKey) -> Option<Vec<usize>> {
        if !self.contains(key) {
            return None;
        }
        let mut path = Vec::new();
        let mut current = key;
        while current != self.root {
            path.push(self.index_in_parent(current)?);
            current = self.parent(current)?;
        }
        path.reverse();
        Some(path)
    }

    pub fn compare_document_order(&self, a: NodeKey, b: NodeKey) -> Option<Ordering> {
        Some(self.path(a)?.cmp(&self.path(b)?))
    }

    /// Size of the addressable content of a node: UTF-16 length for text,
    /// child count for containers, zero for decorators
    pub fn content_size(&self, key: NodeKey) -> usize {
        match self.get(key).map(Node::data) {
            Some(NodeData::Text(text)) => utf16_len(&text.text),
            Some(data) => data.children().len(),
            None => 0,
        }
    }

    /// Plain text of a subtree
    pub fn text_content(&self, key: NodeKey) -> String {
        let Some(node) = self.get(key) else {
            return String::new();
        };
        match &node.data {
            NodeData::Text(text) => text.text.clone(),
            NodeData::Decorator(decorator) => match decorator {
                DecoratorNode::HorizontalDivider => "\n".to_string(),
                DecoratorNode::Equation(equation) => equation.equation.clone(),
                DecoratorNode::Image(_) => String::new(),
            },
            NodeData::Root { children, .. } | NodeData::Element(ElementNode { children, .. }) => {
                let mut content = String::new();
                for (index, &child) in children.iter().enumerate() {
                    content.push_str(&self.text_content(child));
                    let block = self.get(child).is_some_and(|c| !c.is_inline());
                    if block && index + 1 < children.len() {
                        content.push_str("\n\n");
                    }
                }
                content
            }
        }
    }

    /// Verify parent/child ownership, acyclicity and leaf rules
    pub fn check_integrity(&self) -> Result<(), StoreError> {
        let root = self.node(self.root)?;
        if root.parent.is_some() || root.kind() != NodeKind::Root {
            return Err(StoreError::InvariantViolation("malformed root".to_string()));
        }

        let mut seen = HashSet::new();
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            if !seen.insert(key) {
                return Err(StoreError::InvariantViolation(format!(
                    "{} is reachable twice",
                    key
                )));
            }
            let node = self.node(key)?;
            if node.key != key {
                return Err(StoreError::InvariantViolation(format!(
                    "{} stored under {}",
                    node.key, key
                )));
            }
            if !node.kind().can_have_children() && !node.children().is_empty() {
                return Err(StoreError::InvariantViolation(format!(
                    "leaf {} owns children",
                    key
                )));
            }
            for &child in node.children() {
                let child_node = self.node(child)?;
                if child_node.parent != Some(key) {
                    return Err(StoreError::InvariantViolation(format!(
                        "{} does not point back to parent {}",
                        child, key
                    )));
                }
                if child_node.kind() == NodeKind::Root {
                    return Err(StoreError::InvariantViolation(
                        "root nested inside the tree".to_string(),
                    ));
                }
                stack.push(child);
            }
        }

        if seen.len() != self.nodes.len() {
            return Err(StoreError::InvariantViolation(format!(
                "{} unreachable nodes",
                self.nodes.len() - seen.len()
            )));
        }
        Ok(())
    }

    // Raw mutators, reached through `Transaction`

    pub(crate) fn insert(
        &mut self,
        key: NodeKey,
        data: NodeData,
        parent: NodeKey,
        index: usize,
    ) -> Result<usize, StoreError> {
        if self.contains(key) {
            return Err(StoreError::InvariantViolation(format!(
                "key {} already in use",
                key
            )));
        }
        if matches!(data, NodeData::Root { .. }) {
            return Err(StoreError::InvariantViolation(
                "a document has exactly one root".to_string(),
            ));
        }
        if !data.children().is_empty() {
            return Err(StoreError::InvariantViolation(
                "inserted nodes must not carry children".to_string(),
            ));
        }

        let index = self.attach(key, parent, index)?;
        self.nodes.insert(
            key,
            Node {
                key,
                parent: Some(parent),
                data,
            },
        );
        Ok(index)
    }

    /// Add `key` to `parent`'s child list; returns the clamped index
    fn attach(&mut self, key: NodeKey, parent: NodeKey, index: usize) -> Result<usize, StoreError> {
        let parent_node = self.node_mut(parent)?;
        let children = parent_node.data.children_mut().ok_or_else(|| {
            StoreError::InvariantViolation(format!("{} cannot own children", parent))
        })?;
        let index = index.min(children.len());
        children.insert(index, key);
        Ok(index)
    }

    fn detach(&mut self, key: NodeKey) -> Result<(), StoreError> {
        let parent = self
            .node(key)?
            .parent
            .ok_or_else(|| StoreError::InvariantViolation("cannot detach the root".to_string()))?;
        if let Some(children) = self.node_mut(parent)?.data.children_mut() {
            children.retain(|&child| child != key);
        }
        Ok(())
    }

    /// Remove `key` and its subtree; returns the removed keys in pre-order
    pub(crate) fn remove(&mut self, key: NodeKey) -> Result<Vec<NodeKey>, StoreError> {
        if key == self.root {
            return Err(StoreError::InvariantViolation(
                "the root node cannot be removed".to_string(),
            ));
        }
        self.node(key)?;
        let removed = self.descendants(key);
        self.detach(key)?;
        for &gone in &removed {
            self.nodes.remove(&gone);
        }
        Ok(removed)
    }

    pub(crate) fn move_node(
        &mut self,
        key: NodeKey,
        new_parent: NodeKey,
        index: usize,
    ) -> Result<usize, StoreError> {
        if key == self.root {
            return Err(StoreError::InvariantViolation(
                "the root node cannot be moved".to_string(),
            ));
        }
        self.node(key)?;
        self.node(new_parent)?;
        if new_parent == key || self.is_ancestor(key, new_parent) {
            return Err(StoreError::CycleDetected {
                node: key,
                parent: new_parent,
            });
        }
        if !self.node(new_parent)?.kind().can_have_children() {
            return Err(StoreError::InvariantViolation(format!(
                "{} cannot own children",
                new_parent
            )));
        }

        // Index refers to the child list before removal of `key`
        let mut index = index;
        if self.parent(key) == Some(new_parent) {
            if let Some(current) = self.index_in_parent(key) {
                if current < index {
                    index -= 1;
                }
            }
        }
        self.detach(key)?;
        let index = self.attach(key, new_parent, index)?;
        self.node_mut(key)?.parent = Some(new_parent);
        Ok(index)
    }

    /// Swap the value of a node in place, keeping its key, parent and children
    pub(crate) fn set_data(&mut self, key: NodeKey, data: NodeData) -> Result<bool, StoreError> {
        let node = self.node_mut(key)?;
        if data.kind().class() != node.class() {
            return Err(StoreError::InvariantViolation(format!(
                "{} cannot change class from {:?} to {:?}",
                key,
                node.class(),
                data.kind().class()
            )));
        }
        let mut data = data;
        let children = node.data.children().to_vec();
        if let Some(slot) = data.children_mut() {
            *slot = children;
        }
        if node.data == data {
            return Ok(false);
        }
        node.data = data;
        Ok(true)
    }

    pub(crate) fn class_of(&self, key: NodeKey) -> Result<NodeClass, StoreError> {
        Ok(self.node(key)?.class())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{DecoratorNode, ElementKind, NodeData};

    fn key(n: u64) -> NodeKey {
        NodeKey(n)
    }

    fn sample() -> NodeStore {
        let mut store = NodeStore::with_root(key(0));
        store.insert(key(1), NodeData::paragraph(), key(0), 0).unwrap();
        store.insert(key(2), NodeData::text("hello"), key(1), 0).unwrap();
        store.insert(key(3), NodeData::paragraph(), key(0), 1).unwrap();
        store
    }

    #[test]
    fn test_insert_and_read_back() {
        let store = sample();
        assert_eq!(store.children(key(0)), &[key(1), key(3)]);
        assert_eq!(store.parent(key(2)), Some(key(1)));
        assert_eq!(store.text_content(key(0)), "hello\n\n");
        store.check_integrity().unwrap();
    }

    #[test]
    fn test_cannot_insert_under_leaf() {
        let mut store = sample();
        let result = store.insert(key(9), NodeData::text("x"), key(2), 0);
        assert!(matches!(result, Err(StoreError::InvariantViolation(_))));

        store
            .insert(key(4), NodeData::Decorator(DecoratorNode::HorizontalDivider), key(0), 2)
            .unwrap();
        let result = store.insert(key(5), NodeData::text("x"), key(4), 0);
        assert!(matches!(result, Err(StoreError::InvariantViolation(_))));
    }

    #[test]
    fn test_remove_root_fails() {
        let mut store = sample();
        assert!(matches!(
            store.remove(key(0)),
            Err(StoreError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_remove_is_recursive() {
        let mut store = sample();
        let removed = store.remove(key(1)).unwrap();
        assert_eq!(removed, vec![key(1), key(2)]);
        assert!(!store.contains(key(2)));
        store.check_integrity().unwrap();
    }

    #[test]
    fn test_move_into_descendant_is_cycle() {
        let mut store = sample();
        assert_eq!(
            store.move_node(key(1), key(1), 0),
            Err(StoreError::CycleDetected {
                node: key(1),
                parent: key(1)
            })
        );
        store.insert(key(4), NodeData::paragraph(), key(1), 1).unwrap();
        assert!(matches!(
            store.move_node(key(1), key(4), 0),
            Err(StoreError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_move_within_same_parent() {
        let mut store = sample();
        store.move_node(key(1), key(0), 2).unwrap();
        assert_eq!(store.children(key(0)), &[key(3), key(1)]);
        store.check_integrity().unwrap();
    }

    #[test]
    fn test_document_order_comparison() {
        let store = sample();
        assert_eq!(store.compare_document_order(key(2), key(3)), Some(Ordering::Less));
        assert_eq!(store.top_level_element(key(2)), Some(key(1)));
        assert_eq!(store.document_order(), vec![key(0), key(1), key(2), key(3)]);
    }

    #[test]
    fn test_set_data_keeps_children() {
        let mut store = sample();
        let changed = store
            .set_data(key(1), NodeData::element(ElementKind::Quote))
            .unwrap();
        assert!(changed);
        assert_eq!(store.children(key(1)), &[key(2)]);
        assert!(!store.set_data(key(2), NodeData::text("hello")).unwrap());
    }
}
