//! # History Manager
//!
//! Undo/redo over committed snapshots.
//!
//! ## Design
//!
//! - Entries are whole snapshots; undo makes an older one current again
//! - The initial snapshot sits at index 0 and can't be undone past
//! - A commit after an undo drops the redo tail
//! - Selection-only commits overwrite the entry at the cursor
//! - Text edits on the same nodes inside the merge window share one entry
//! - The oldest entries are evicted past `max_entries`

use crate::config::HistoryConfig;
use crate::node::NodeKey;
use crate::snapshot::Snapshot;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Classification of a committed change, used for coalescing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// Only the selection moved
    SelectionOnly,
    /// Only text node values changed, on these keys
    Text(BTreeSet<NodeKey>),
    /// Nodes were added, removed, moved or changed kind
    Structural,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    snapshot: Arc<Snapshot>,
    change: ChangeKind,
    at: Instant,
}

#[derive(Debug)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    config: HistoryConfig,
}

impl History {
    pub fn new(initial: Arc<Snapshot>, config: HistoryConfig) -> Self {
        Self {
            entries: vec![HistoryEntry {
                snapshot: initial,
                change: ChangeKind::Structural,
                at: Instant::now(),
            }],
            cursor: 0,
            config,
        }
    }

    /// Forget everything and start over from `initial`
    pub fn reset(&mut self, initial: Arc<Snapshot>) {
        *self = Self::new(initial, self.config.clone());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn current(&self) -> Option<&Arc<Snapshot>> {
        self.entries.get(self.cursor).map(|entry| &entry.snapshot)
    }

    fn at_newest(&self) -> bool {
        self.cursor + 1 == self.entries.len()
    }

    /// Record a committed snapshot
    pub fn record(&mut self, snapshot: Arc<Snapshot>, change: ChangeKind, now: Instant) {
        match &change {
            ChangeKind::SelectionOnly => {
                // Replaces the entry at the cursor, so the redo tail survives
                if let Some(current) = self.entries.get_mut(self.cursor) {
                    current.snapshot = snapshot;
                }
                return;
            }
            ChangeKind::Text(keys) if self.should_merge(keys, now) => {
                if let Some(newest) = self.entries.last_mut() {
                    newest.snapshot = snapshot;
                    newest.at = now;
                }
                return;
            }
            _ => {}
        }

        self.entries.truncate(self.cursor + 1);
        self.entries.push(HistoryEntry {
            snapshot,
            change,
            at: now,
        });
        let max = self.config.max_entries.max(1);
        if self.entries.len() > max {
            let excess = self.entries.len() - max;
            self.entries.drain(..excess);
        }
        self.cursor = self.entries.len() - 1;
    }

    fn should_merge(&self, keys: &BTreeSet<NodeKey>, now: Instant) -> bool {
        if !self.config.coalesce_text || self.cursor == 0 || !self.at_newest() {
            return false;
        }
        let Some(newest) = self.entries.last() else {
            return false;
        };
        let window = Duration::from_millis(self.config.merge_window_ms);
        matches!(&newest.change, ChangeKind::Text(previous) if previous == keys)
            && now.saturating_duration_since(newest.at) < window
    }

    /// Step back; returns the snapshot to make current
    pub fn undo(&mut self) -> Option<Arc<Snapshot>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.current().cloned()
    }

    /// Step forward; returns the snapshot to make current
    pub fn redo(&mut self) -> Option<Arc<Snapshot>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.current().cloned()
    }
}
