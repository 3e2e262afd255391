//! Error types for the editor

use crate::node::NodeKey;
use thiserror::Error;

/// Failures raised by node store mutations and lookups
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Would create cycle: {node} cannot be moved under {parent}")]
    CycleDetected { node: NodeKey, parent: NodeKey },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Node {0} is not an element")]
    NotAnElement(NodeKey),

    #[error("Node {0} is not text")]
    NotText(NodeKey),

    #[error("Node {0} is not a decorator")]
    NotDecorator(NodeKey),
}

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Transforms did not settle within {limit} rounds")]
    TransformLoopExceeded { limit: usize },

    #[error("Malformed import: {0}")]
    MalformedImport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditorError {
    /// Whether this error came from a broken structural invariant
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            EditorError::InvariantViolation(_)
                | EditorError::Store(StoreError::InvariantViolation(_))
                | EditorError::Store(StoreError::CycleDetected { .. })
        )
    }
}

pub type EditorResult<T> = Result<T, EditorError>;
