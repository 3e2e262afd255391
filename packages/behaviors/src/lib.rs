//! # Scribe Behaviors
//!
//! Editing behaviors layered on the document engine. Each behavior is a
//! bundle of transforms and command handlers installed into an [`Editor`](scribe_editor::Editor)
//! and removed again through the registrations it returned.
//!
//! ```rust
//! use scribe_behaviors::{BehaviorConfig, BehaviorSet, FORMAT_QUOTE};
//! use scribe_editor::{Editor, NodeData, NodeKind, Selection};
//!
//! let mut editor = Editor::default();
//! let mut behaviors = BehaviorSet::standard(&BehaviorConfig::default());
//! behaviors.install(&mut editor);
//!
//! let paragraph = editor.append_block(NodeData::paragraph()).unwrap();
//! let text = editor
//!     .update(|editor| Ok(editor.tx()?.append(paragraph, NodeData::text("quoted"))?))
//!     .unwrap();
//! editor.select(Selection::caret(text, 3)).unwrap();
//! editor.dispatch(FORMAT_QUOTE, &()).unwrap();
//! assert_eq!(editor.store().kind(paragraph), Some(NodeKind::Quote));
//! ```

pub mod ai_edit;
pub mod autocomplete;
pub mod behavior;
pub mod blocks;
pub mod config;
pub mod decorators;
pub mod equation;
pub mod housekeeping;
pub mod links;
pub mod persistence;
pub mod query;
pub mod rich_text;

pub use ai_edit::{
    AiEdit, EditContext, EditInstruction, EditProvider, EditRequest, AI_EDIT, DEFAULT_TEMPERATURE,
};
pub use autocomplete::{
    Autocomplete, ProviderError, ResolveOutcome, SuggestionContext, SuggestionProvider,
    SuggestionRequest, REQUEST_SUGGESTION,
};
pub use behavior::{Behavior, BehaviorSet};
pub use blocks::{
    is_heading_at_selection, is_link_at_selection, is_quote_at_selection, BlockFormat,
    FORMAT_HEADING, FORMAT_PARAGRAPH, FORMAT_QUOTE,
};
pub use config::BehaviorConfig;
pub use decorators::{
    Decorators, EquationUpdate, INSERT_EQUATION, INSERT_HORIZONTAL_DIVIDER, INSERT_IMAGE,
    UPDATE_EQUATION,
};
pub use equation::EquationDetection;
pub use housekeeping::Housekeeping;
pub use links::{Links, TOGGLE_LINK};
pub use persistence::{
    load_initial_state, save_state, FileTransport, LoadSource, SaveStatus, StateTransport,
    TransportError, DEFAULT_STATE,
};
pub use rich_text::RichText;
