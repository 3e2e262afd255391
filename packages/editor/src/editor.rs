//! # Editor
//!
//! Owns the current snapshot and drives the update cycle:
//!
//! ```text
//! update(f)
//!   Open:        f(&mut editor) mutates the working copy via editor.tx()
//!   Reconciling: transform fixpoint → empty-text pruning → integrity check
//!                → selection reconciliation
//!   Commit:      new snapshot → history → listeners → SELECTION_CHANGE
//!   (any error → Aborted: working copy dropped, previous snapshot kept)
//! ```
//!
//! Updates started while another one is open (from a transform, a command
//! handler or the closure itself) run inside the enclosing transaction.

use crate::commands::{
    CommandBus, CommandHandle, CommandKey, CommandPriority, Propagation, REDO, SELECTION_CHANGE,
    UNDO,
};
use crate::config::EditorConfig;
use crate::errors::{EditorError, EditorResult};
use crate::history::{ChangeKind, History};
use crate::node::{Node, NodeClass, NodeData, NodeKey, NodeKind};
use crate::selection::Selection;
use crate::serialize::{build_store, parse_serialized, serialize_store};
use crate::snapshot::Snapshot;
use crate::store::NodeStore;
use crate::transaction::{Transaction, TransactionPhase};
use crate::transforms::{TransformHandle, TransformRegistry};
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

/// Where a new current snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    Update,
    Undo,
    Redo,
    Import,
}

/// Delivered to update listeners after the current snapshot changes
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    pub snapshot: Arc<Snapshot>,
    pub previous: Arc<Snapshot>,
    /// Keys dirtied by the transaction, empty for undo, redo and import
    pub dirty: Vec<NodeKey>,
    /// `None` unless the snapshot was committed by an update
    pub change: Option<ChangeKind>,
    pub origin: UpdateOrigin,
}

impl UpdateEvent {
    pub fn selection_changed(&self) -> bool {
        self.snapshot.selection != self.previous.selection
    }
}

pub type ListenerFn = Rc<dyn Fn(&UpdateEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Anything installed on an editor that can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Registration {
    Command(CommandHandle),
    Transform(TransformHandle),
    Listener(ListenerHandle),
}

impl From<CommandHandle> for Registration {
    fn from(handle: CommandHandle) -> Self {
        Registration::Command(handle)
    }
}

impl From<TransformHandle> for Registration {
    fn from(handle: TransformHandle) -> Self {
        Registration::Transform(handle)
    }
}

impl From<ListenerHandle> for Registration {
    fn from(handle: ListenerHandle) -> Self {
        Registration::Listener(handle)
    }
}

pub struct Editor {
    config: EditorConfig,
    current: Arc<Snapshot>,
    active: Option<Transaction>,
    next_key: u64,
    clock: u64,
    transforms: TransformRegistry,
    commands: CommandBus,
    history: History,
    listeners: Vec<(ListenerHandle, ListenerFn)>,
    next_listener: u64,
    in_selection_change: bool,
}

impl Editor {
    /// An editor holding an empty root
    pub fn new(config: EditorConfig) -> Self {
        let root = NodeKey(0);
        let current = Arc::new(Snapshot::new(NodeStore::with_root(root), Selection::None, 0));
        let history = History::new(Arc::clone(&current), config.history.clone());
        let mut editor = Self {
            config,
            current,
            active: None,
            next_key: 1,
            clock: 0,
            transforms: TransformRegistry::new(),
            commands: CommandBus::new(),
            history,
            listeners: Vec::new(),
            next_listener: 0,
            in_selection_change: false,
        };
        editor.register_command(UNDO, CommandPriority::Editor, |editor, _| {
            Ok(handled(editor.undo()?))
        });
        editor.register_command(REDO, CommandPriority::Editor, |editor, _| {
            Ok(handled(editor.redo()?))
        });
        editor
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The current committed snapshot
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.current
    }

    pub fn store(&self) -> &NodeStore {
        &self.current.store
    }

    pub fn selection(&self) -> &Selection {
        &self.current.selection
    }

    pub fn version(&self) -> u64 {
        self.current.version
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn text_content(&self) -> String {
        self.current.text_content()
    }

    pub fn in_update(&self) -> bool {
        self.active.is_some()
    }

    /// The open transaction
    pub fn tx(&mut self) -> EditorResult<&mut Transaction> {
        self.active.as_mut().ok_or(EditorError::NoActiveTransaction)
    }

    /// Run `f` inside a transaction and commit the result.
    ///
    /// Nested calls run `f` in the already open transaction and leave
    /// finalization to the outermost call.
    #[instrument(skip(self, f), fields(version = self.current.version))]
    pub fn update<T>(&mut self, f: impl FnOnce(&mut Editor) -> EditorResult<T>) -> EditorResult<T> {
        if self.active.is_some() {
            return f(self);
        }

        self.active = Some(Transaction::new(Arc::clone(&self.current), self.next_key));
        let result = f(self).and_then(|value| self.finalize().map(|()| value));
        let tx = self.active.take().ok_or_else(|| {
            EditorError::InvariantViolation("transaction closed while still running".to_string())
        })?;
        // Keys handed out by an aborted transaction stay spent
        self.next_key = self.next_key.max(tx.next_key());

        match result {
            Ok(value) => {
                self.commit(tx);
                Ok(value)
            }
            Err(err) => {
                if err.is_invariant_violation()
                    || matches!(err, EditorError::TransformLoopExceeded { .. })
                {
                    error!(error = %err, "update aborted");
                } else {
                    warn!(error = %err, "update aborted");
                }
                Err(err)
            }
        }
    }

    fn finalize(&mut self) -> EditorResult<()> {
        self.tx()?.set_phase(TransactionPhase::Reconciling);

        let limit = self.config.max_transform_rounds;
        let mut rounds = 0;
        while self.tx()?.has_pending() {
            if rounds >= limit {
                return Err(EditorError::TransformLoopExceeded { limit });
            }
            rounds += 1;
            let dirty = self.tx()?.take_pending();
            debug!(round = rounds, nodes = dirty.len(), "transform round");
            for key in dirty {
                self.run_transforms(key)?;
            }
        }

        let tx = self.tx()?;
        tx.store().check_integrity()?;
        tx.reconcile_selection();
        Ok(())
    }

    fn run_transforms(&mut self, key: NodeKey) -> EditorResult<()> {
        let Some(kind) = self.tx()?.store().kind(key) else {
            return Ok(());
        };
        if kind.class() == NodeClass::Text && self.prune_empty_text(key)? {
            return Ok(());
        }
        for (handle, transform) in self.transforms.for_kind(kind) {
            if !self.transforms.is_registered(handle) {
                continue;
            }
            // Stop once the node is gone or has turned into another kind
            if self.tx()?.store().kind(key) != Some(kind) {
                break;
            }
            transform(self, key)?;
        }
        Ok(())
    }

    /// Remove an empty text node unless the selection rests in it and there
    /// is no text next to it to take the caret
    fn prune_empty_text(&mut self, key: NodeKey) -> EditorResult<bool> {
        let tx = self.tx()?;
        let store = tx.store();
        if !store.text(key).is_some_and(|text| text.text.is_empty()) {
            return Ok(false);
        }
        let text_neighbor = [store.previous_sibling(key), store.next_sibling(key)]
            .into_iter()
            .flatten()
            .any(|sibling| store.get(sibling).is_some_and(Node::is_text));
        if tx.selection().references(key) && !text_neighbor {
            return Ok(false);
        }
        tx.remove(key)?;
        Ok(true)
    }

    fn commit(&mut self, tx: Transaction) {
        let Some(change) = tx.change_kind() else {
            debug!("update changed nothing");
            return;
        };
        let (store, selection, dirty) = tx.into_parts();
        self.clock += 1;
        let snapshot = Arc::new(Snapshot::new(store, selection, self.clock));
        let previous = std::mem::replace(&mut self.current, Arc::clone(&snapshot));
        self.history
            .record(Arc::clone(&snapshot), change.clone(), Instant::now());
        debug!(version = self.clock, ?change, "committed");

        self.publish(UpdateEvent {
            snapshot,
            previous,
            dirty,
            change: Some(change),
            origin: UpdateOrigin::Update,
        });
    }

    fn publish(&mut self, event: UpdateEvent) {
        let listeners: Vec<ListenerFn> = self
            .listeners
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
        if event.selection_changed() {
            self.dispatch_selection_change();
        }
    }

    fn dispatch_selection_change(&mut self) {
        if self.in_selection_change {
            return;
        }
        self.in_selection_change = true;
        let result = self.dispatch(SELECTION_CHANGE, &());
        self.in_selection_change = false;
        if let Err(err) = result {
            warn!(error = %err, "selection change handler failed");
        }
    }

    // History

    pub fn undo(&mut self) -> EditorResult<bool> {
        self.ensure_idle("undo")?;
        match self.history.undo() {
            Some(snapshot) => {
                self.restore(snapshot, UpdateOrigin::Undo);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> EditorResult<bool> {
        self.ensure_idle("redo")?;
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(snapshot, UpdateOrigin::Redo);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ensure_idle(&self, operation: &str) -> EditorResult<()> {
        if self.active.is_some() {
            return Err(EditorError::InvariantViolation(format!(
                "{} is not allowed inside an update",
                operation
            )));
        }
        Ok(())
    }

    fn restore(&mut self, snapshot: Arc<Snapshot>, origin: UpdateOrigin) {
        let previous = std::mem::replace(&mut self.current, Arc::clone(&snapshot));
        debug!(version = snapshot.version, ?origin, "restored snapshot");
        self.publish(UpdateEvent {
            snapshot,
            previous,
            dirty: Vec::new(),
            change: None,
            origin,
        });
    }

    // Persisted format

    pub fn export_state(&self) -> EditorResult<String> {
        serialize_store(&self.current.store)
    }

    /// Replace the document with a persisted one. Nodes get fresh keys, the
    /// selection is cleared and history restarts from the imported snapshot.
    pub fn import_state(&mut self, json: &str) -> EditorResult<Arc<Snapshot>> {
        self.ensure_idle("import")?;
        let state = parse_serialized(json)?;
        let store = build_store(&state, &mut self.next_key)?;
        self.clock += 1;
        let snapshot = Arc::new(Snapshot::new(store, Selection::None, self.clock));
        self.history.reset(Arc::clone(&snapshot));
        self.restore(Arc::clone(&snapshot), UpdateOrigin::Import);
        Ok(snapshot)
    }

    // Registration

    pub fn register_transform<F>(&mut self, kind: NodeKind, transform: F) -> TransformHandle
    where
        F: Fn(&mut Editor, NodeKey) -> EditorResult<()> + 'static,
    {
        self.transforms.register(kind, Rc::new(transform))
    }

    pub fn unregister_transform(&mut self, handle: TransformHandle) -> bool {
        self.transforms.unregister(handle)
    }

    pub fn register_command<P, F>(
        &mut self,
        key: CommandKey<P>,
        priority: CommandPriority,
        handler: F,
    ) -> CommandHandle
    where
        P: 'static,
        F: Fn(&mut Editor, &P) -> EditorResult<Propagation> + 'static,
    {
        self.commands.register(key, priority, handler)
    }

    pub fn unregister_command(&mut self, handle: CommandHandle) -> bool {
        self.commands.unregister(handle)
    }

    pub fn register_update_listener(&mut self, listener: impl Fn(&UpdateEvent) + 'static) -> ListenerHandle {
        let handle = ListenerHandle(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((handle, Rc::new(listener)));
        handle
    }

    pub fn unregister_listener(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(registered, _)| *registered != handle);
        before != self.listeners.len()
    }

    pub fn unregister(&mut self, registration: Registration) -> bool {
        match registration {
            Registration::Command(handle) => self.unregister_command(handle),
            Registration::Transform(handle) => self.unregister_transform(handle),
            Registration::Listener(handle) => self.unregister_listener(handle),
        }
    }

    /// Run the handlers registered for `key`, highest priority first.
    /// Returns whether one of them stopped propagation.
    pub fn dispatch<P: 'static>(&mut self, key: CommandKey<P>, payload: &P) -> EditorResult<bool> {
        let handlers = self.commands.dispatch_order(key.name());
        debug!(command = key.name(), handlers = handlers.len(), "dispatch");
        let payload = payload as &dyn Any;
        for (handle, handler) in handlers {
            // Unregistered by an earlier handler of this dispatch
            if !self.commands.is_registered(handle) {
                continue;
            }
            if handler(self, payload)? == Propagation::Stop {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Convenience: replace the selection in its own update
    pub fn select(&mut self, selection: Selection) -> EditorResult<()> {
        self.update(|editor| {
            editor.tx()?.set_selection(selection);
            Ok(())
        })
    }

    /// Convenience: append a new top-level block in its own update
    pub fn append_block(&mut self, data: NodeData) -> EditorResult<NodeKey> {
        self.update(|editor| {
            let tx = editor.tx()?;
            let root = tx.store().root();
            Ok(tx.append(root, data)?)
        })
    }
}

fn handled(stopped: bool) -> Propagation {
    if stopped {
        Propagation::Stop
    } else {
        Propagation::Continue
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("version", &self.current.version)
            .field("nodes", &self.current.store.len())
            .field("transforms", &self.transforms)
            .field("commands", &self.commands)
            .field("listeners", &self.listeners.len())
            .field("in_update", &self.active.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_outside_update_fails() {
        let mut editor = Editor::default();
        assert!(matches!(editor.tx(), Err(EditorError::NoActiveTransaction)));
    }

    #[test]
    fn test_noop_update_keeps_version() {
        let mut editor = Editor::default();
        editor.update(|_| Ok(())).unwrap();
        assert_eq!(editor.version(), 0);
        assert_eq!(editor.history().len(), 1);
    }

    #[test]
    fn test_abort_keeps_previous_snapshot_and_burns_keys() {
        let mut editor = Editor::default();
        let before = Arc::clone(editor.snapshot());
        let result: EditorResult<()> = editor.update(|editor| {
            let tx = editor.tx()?;
            let root = tx.store().root();
            tx.append(root, NodeData::paragraph())?;
            Err(EditorError::InvariantViolation("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(Arc::ptr_eq(editor.snapshot(), &before));

        let key = editor.append_block(NodeData::paragraph()).unwrap();
        assert_eq!(key, NodeKey(2));
    }

    #[test]
    fn test_nested_update_shares_transaction() {
        let mut editor = Editor::default();
        editor
            .update(|editor| {
                editor.append_block(NodeData::paragraph())?;
                editor.append_block(NodeData::paragraph())?;
                Ok(())
            })
            .unwrap();
        assert_eq!(editor.version(), 1);
        assert_eq!(editor.store().children(editor.store().root()).len(), 2);
    }

    #[test]
    fn test_undo_inside_update_is_rejected() {
        let mut editor = Editor::default();
        let result = editor.update(|editor| editor.undo());
        assert!(matches!(result, Err(EditorError::InvariantViolation(_))));
    }
}
