//! # Scribe Editor
//!
//! Rich-text document engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ command bus: named commands, priority tiers │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor.update(f)                            │
//! │  - transaction over a working copy          │
//! │  - transform fixpoint over dirty nodes      │
//! │  - selection reconciliation                 │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ snapshot (immutable, Arc-shared)            │
//! │  → history → update listeners               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Snapshots are values**: a committed snapshot never changes
//! 2. **All writes go through a transaction**: outside `update` there is
//!    no way to mutate the tree
//! 3. **Behaviors compose through transforms and commands**: they never call
//!    each other directly
//!
//! ## Usage
//!
//! ```rust
//! use scribe_editor::{Editor, NodeData, Selection};
//!
//! let mut editor = Editor::default();
//! editor
//!     .update(|editor| {
//!         let tx = editor.tx()?;
//!         let root = tx.store().root();
//!         let paragraph = tx.append(root, NodeData::paragraph())?;
//!         let text = tx.append(paragraph, NodeData::text("Hello"))?;
//!         tx.set_selection(Selection::caret(text, 5));
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(editor.text_content(), "Hello");
//! editor.undo().unwrap();
//! assert_eq!(editor.text_content(), "");
//! ```

pub mod commands;
pub mod config;
pub mod editor;
pub mod errors;
pub mod history;
pub mod node;
pub mod selection;
pub mod serialize;
pub mod snapshot;
pub mod store;
pub mod text;
pub mod transaction;
pub mod transforms;

pub use commands::{
    CommandBus, CommandHandle, CommandKey, CommandPriority, Propagation, FORMAT_TEXT, INSERT_TEXT,
    KEY_BACKSPACE, KEY_DELETE, KEY_TAB, REDO, SELECTION_CHANGE, UNDO,
};
pub use config::{EditorConfig, HistoryConfig};
pub use editor::{Editor, ListenerHandle, Registration, UpdateEvent, UpdateOrigin};
pub use errors::{EditorError, EditorResult, StoreError};
pub use history::{ChangeKind, History};
pub use node::{
    DecoratorNode, ElementAttrs, ElementKind, ElementNode, EquationPayload, HeadingTag,
    ImagePayload, ListType, Node, NodeClass, NodeData, NodeKey, NodeKind, TextFormat,
    TextFormatType, TextNode, TextVariant,
};
pub use selection::{Point, PointType, RangeSelection, Selection};
pub use serialize::{parse_state, serialize_store, SerializedNode, SerializedState};
pub use snapshot::Snapshot;
pub use store::NodeStore;
pub use transaction::{Transaction, TransactionPhase};
pub use transforms::{TransformHandle, TransformRegistry};
