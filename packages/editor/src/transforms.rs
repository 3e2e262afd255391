//! # Transform Registry
//!
//! Node transforms are rules keyed by node kind. The editor runs them to a
//! fixpoint at the end of every update: each dirty node gets the transforms
//! registered for its kind, in registration order, and anything they dirty
//! is processed in the next round.
//!
//! Transforms receive the editor and may call any mutator through
//! `editor.tx()`. They must converge: a transform that keeps dirtying
//! nodes aborts the update once `max_transform_rounds` is exceeded.

use crate::editor::Editor;
use crate::errors::EditorResult;
use crate::node::{NodeKey, NodeKind};
use std::collections::HashMap;
use std::rc::Rc;

pub type TransformFn = Rc<dyn Fn(&mut Editor, NodeKey) -> EditorResult<()>>;

/// Identifies one registered transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformHandle {
    kind: NodeKind,
    id: u64,
}

impl TransformHandle {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

#[derive(Default)]
pub struct TransformRegistry {
    next_id: u64,
    transforms: HashMap<NodeKind, Vec<(u64, TransformFn)>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: NodeKind, transform: TransformFn) -> TransformHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.transforms.entry(kind).or_default().push((id, transform));
        TransformHandle { kind, id }
    }

    /// Remove a transform; returns whether it was still registered
    pub fn unregister(&mut self, handle: TransformHandle) -> bool {
        let Some(list) = self.transforms.get_mut(&handle.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != handle.id);
        before != list.len()
    }

    pub fn is_registered(&self, handle: TransformHandle) -> bool {
        self.transforms
            .get(&handle.kind)
            .is_some_and(|list| list.iter().any(|(id, _)| *id == handle.id))
    }

    /// Transforms for `kind` in registration order
    pub fn for_kind(&self, kind: NodeKind) -> Vec<(TransformHandle, TransformFn)> {
        self.transforms
            .get(&kind)
            .map(|list| {
                list.iter()
                    .map(|(id, transform)| (TransformHandle { kind, id: *id }, Rc::clone(transform)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.transforms.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &format!("{} transforms", self.len()))
            .finish()
    }
}
