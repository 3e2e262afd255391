//! # Document Snapshot
//!
//! One committed version of a document: the node tree, the selection and a
//! version number. Snapshots are shared behind `Arc` between the editor, its
//! history and any listener, and are never mutated after creation.

use crate::node::NodeKey;
use crate::selection::Selection;
use crate::store::NodeStore;

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub(crate) store: NodeStore,
    pub(crate) selection: Selection,
    pub(crate) version: u64,
}

impl Snapshot {
    pub(crate) fn new(store: NodeStore, selection: Selection, version: u64) -> Self {
        Self {
            store,
            selection,
            version,
        }
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn root(&self) -> NodeKey {
        self.store.root()
    }

    /// Plain text of the whole document
    pub fn text_content(&self) -> String {
        self.store.text_content(self.store.root())
    }

    /// Same tree and selection, ignoring the version stamp
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.store == other.store && self.selection == other.selection
    }
}
