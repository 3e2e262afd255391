//! # Autocomplete
//!
//! Ghost-text suggestions shown after the caret.
//!
//! ```text
//! commit touches the document
//!   root transform: drop old ghosts, queue SuggestionRequest{context, stamp}
//! host: take_request() → provider (async, outside any update) → resolve()
//!   resolve: stale generation or moved selection → discarded
//!            otherwise a ghost node is inserted after the caret's text run
//! SELECTION_CHANGE: caret inside the ghost → back to the text before it
//!                   selection elsewhere → ghost deleted
//! KEY_TAB: ghost becomes ordinary text
//! ```
//!
//! At most one ghost node exists at any time.

use crate::behavior::Behavior;
use crate::query::ghost_nodes;
use scribe_editor::{
    CommandKey, CommandPriority, Editor, EditorError, EditorResult, NodeData, NodeKey, NodeKind,
    NodeStore, PointType, Propagation, Registration, Selection, TextNode, KEY_TAB,
    SELECTION_CHANGE,
};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

/// Ask for a suggestion at the current caret without waiting for an edit
pub const REQUEST_SUGGESTION: CommandKey<()> = CommandKey::new("REQUEST_SUGGESTION");

/// What the provider gets to see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionContext {
    /// Text of the blocks before the caret's block, one per line
    pub preceding_context: String,
    /// Text of the blocks after the caret's block, one per line
    pub following_context: String,
    pub current_block_text: String,
    pub model: String,
}

/// A suggestion request stamped with the state it was made for
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionRequest {
    pub context: SuggestionContext,
    pub generation: u64,
    anchor: NodeKey,
    selection: Selection,
}

impl SuggestionRequest {
    /// Text run the suggestion would follow
    pub fn anchor(&self) -> NodeKey {
        self.anchor
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Suggestion request failed: {0}")]
    Failed(String),
}

/// The external completion service
pub trait SuggestionProvider {
    fn suggest(&self, context: &SuggestionContext) -> Result<Option<String>, ProviderError>;
}

/// Result of handing a provider answer back to the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The answer went into the document at this node
    Applied(NodeKey),
    /// A newer request exists or the state it was asked for is gone
    Stale,
    Empty,
    Failed,
}

#[derive(Debug)]
struct State {
    model: String,
    generation: u64,
    pending: Option<SuggestionRequest>,
}

/// Autocomplete behavior plus the host-side handle for its request queue.
/// Clones share the same queue.
#[derive(Debug, Clone)]
pub struct Autocomplete {
    state: Rc<RefCell<State>>,
}

impl Autocomplete {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                model: model.into(),
                generation: 0,
                pending: None,
            })),
        }
    }

    pub fn model(&self) -> String {
        self.state.borrow().model.clone()
    }

    /// Generation of the newest queued request
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    pub fn pending_request(&self) -> Option<SuggestionRequest> {
        self.state.borrow().pending.clone()
    }

    /// Hand the newest request to the host
    pub fn take_request(&self) -> Option<SuggestionRequest> {
        self.state.borrow_mut().pending.take()
    }

    /// Apply a provider answer if it still matches the editor
    pub fn resolve(
        &self,
        editor: &mut Editor,
        request: &SuggestionRequest,
        result: Result<Option<String>, ProviderError>,
    ) -> EditorResult<ResolveOutcome> {
        let text = match result {
            Ok(Some(text)) if !text.is_empty() => text,
            Ok(_) => {
                debug!(generation = request.generation, "empty suggestion");
                return Ok(ResolveOutcome::Empty);
            }
            Err(err) => {
                warn!(error = %err, generation = request.generation, "suggestion failed");
                return Ok(ResolveOutcome::Failed);
            }
        };
        if request.generation != self.generation() || editor.selection() != &request.selection {
            warn!(generation = request.generation, "discarding stale suggestion");
            return Ok(ResolveOutcome::Stale);
        }
        let anchor = request.anchor;
        let still_last = editor.store().kind(anchor) == Some(NodeKind::Text)
            && editor.store().next_sibling(anchor).is_none();
        if !still_last {
            warn!(generation = request.generation, "discarding stale suggestion");
            return Ok(ResolveOutcome::Stale);
        }

        let ghost = editor.update(|editor| {
            let tx = editor.tx()?;
            for ghost in ghost_nodes(tx.store()) {
                tx.remove(ghost)?;
            }
            let ghost = tx.insert_after(anchor, NodeData::Text(TextNode::autocomplete(text)))?;
            single_ghost(tx.store())?;
            Ok(ghost)
        })?;
        debug!(?ghost, "suggestion shown");
        Ok(ResolveOutcome::Applied(ghost))
    }

    /// Take the pending request, ask `provider` synchronously and resolve
    pub fn fulfill(
        &self,
        editor: &mut Editor,
        provider: &dyn SuggestionProvider,
    ) -> EditorResult<Option<ResolveOutcome>> {
        let Some(request) = self.take_request() else {
            return Ok(None);
        };
        let result = provider.suggest(&request.context);
        self.resolve(editor, &request, result).map(Some)
    }

    fn queue(&self, request: PendingContext) {
        let mut state = self.state.borrow_mut();
        state.generation += 1;
        let generation = state.generation;
        let model = state.model.clone();
        debug!(generation, "suggestion requested");
        state.pending = Some(SuggestionRequest {
            context: SuggestionContext {
                preceding_context: request.preceding,
                following_context: request.following,
                current_block_text: request.current,
                model,
            },
            generation,
            anchor: request.anchor,
            selection: request.selection,
        });
    }

    /// Drop ghosts from earlier commits and queue a request if the caret
    /// sits at the end of a block's last text run
    fn refresh(&self, editor: &mut Editor) -> EditorResult<bool> {
        let tx = editor.tx()?;
        for ghost in ghost_nodes(tx.store()) {
            if !tx.is_new(ghost) {
                tx.remove(ghost)?;
            }
        }
        match suggestion_context(tx.store(), tx.selection()) {
            Some(context) => {
                self.queue(context);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Behavior for Autocomplete {
    fn name(&self) -> &'static str {
        "autocomplete"
    }

    fn install(&self, editor: &mut Editor) -> Vec<Registration> {
        let refresh = self.clone();
        let request = self.clone();
        vec![
            editor
                .register_transform(NodeKind::Root, move |editor, _| {
                    refresh.refresh(editor).map(|_| ())
                })
                .into(),
            editor
                .register_command(REQUEST_SUGGESTION, CommandPriority::Editor, move |editor, _| {
                    let queued = editor.update(|editor| request.refresh(editor))?;
                    Ok(if queued {
                        Propagation::Stop
                    } else {
                        Propagation::Continue
                    })
                })
                .into(),
            editor
                .register_command(SELECTION_CHANGE, CommandPriority::Normal, |editor, _| {
                    follow_selection(editor)?;
                    Ok(Propagation::Continue)
                })
                .into(),
            editor
                .register_command(KEY_TAB, CommandPriority::Low, |editor, _| {
                    editor.update(accept_suggestion)
                })
                .into(),
        ]
    }
}

struct PendingContext {
    preceding: String,
    following: String,
    current: String,
    anchor: NodeKey,
    selection: Selection,
}

fn joined_text(store: &NodeStore, keys: &[NodeKey]) -> String {
    keys.iter()
        .map(|&key| store.text_content(key))
        .collect::<Vec<_>>()
        .join("\n")
}

fn suggestion_context(store: &NodeStore, selection: &Selection) -> Option<PendingContext> {
    let point = selection.caret_point()?;
    if point.kind != PointType::Text || store.kind(point.key) != Some(NodeKind::Text) {
        return None;
    }
    let anchor = point.key;
    let parent = store.parent(anchor)?;
    let parent_kind = store.kind(parent)?;
    if !matches!(
        parent_kind,
        NodeKind::Paragraph | NodeKind::ListItem | NodeKind::Quote | NodeKind::Heading
    ) {
        return None;
    }
    if point.offset != store.content_size(anchor) || store.next_sibling(anchor).is_some() {
        return None;
    }
    let current = store.text_content(parent);
    if current.is_empty() {
        return None;
    }

    let top = store.top_level_element(anchor)?;
    let mut preceding = joined_text(store, &store.previous_siblings(top));
    let mut following = joined_text(store, &store.next_siblings(top));
    if parent_kind == NodeKind::ListItem {
        preceding = format!(
            "{}\n{}",
            preceding,
            joined_text(store, &store.previous_siblings(parent))
        );
        following = format!(
            "{}\n{}",
            joined_text(store, &store.next_siblings(parent)),
            following
        );
    }
    Some(PendingContext {
        preceding,
        following,
        current,
        anchor,
        selection: selection.clone(),
    })
}

fn single_ghost(store: &NodeStore) -> EditorResult<Option<NodeKey>> {
    let ghosts = ghost_nodes(store);
    if ghosts.len() > 1 {
        return Err(EditorError::InvariantViolation(format!(
            "{} autocomplete nodes present, expected at most one",
            ghosts.len()
        )));
    }
    Ok(ghosts.first().copied())
}

enum GhostFollow {
    Keep,
    CaretBefore(NodeKey),
    Drop,
}

/// Keep the caret out of the ghost and drop the ghost once the selection
/// leaves its block
fn follow_selection(editor: &mut Editor) -> EditorResult<()> {
    let store = editor.store();
    let Some(ghost) = single_ghost(store)? else {
        return Ok(());
    };
    let ghost_parent = store.parent(ghost);

    let follow = match editor.selection().as_range() {
        Some(range) if range.is_collapsed() => {
            if range.anchor.key == ghost {
                store
                    .previous_sibling(ghost)
                    .map_or(GhostFollow::Keep, GhostFollow::CaretBefore)
            } else if store.parent(range.anchor.key) == ghost_parent {
                GhostFollow::Keep
            } else {
                GhostFollow::Drop
            }
        }
        // A range lying entirely inside the ghost leaves it alone
        Some(range) if range.nodes(store) == [ghost] => GhostFollow::Keep,
        _ => GhostFollow::Drop,
    };

    match follow {
        GhostFollow::Keep => Ok(()),
        GhostFollow::CaretBefore(previous) => editor.update(|editor| {
            editor.tx()?.select_end(previous);
            Ok(())
        }),
        GhostFollow::Drop => {
            debug!(?ghost, "selection left the suggestion");
            editor.update(|editor| {
                let tx = editor.tx()?;
                for ghost in ghost_nodes(tx.store()) {
                    tx.remove(ghost)?;
                }
                Ok(())
            })
        }
    }
}

/// Turn the ghost into ordinary text and put the caret after it
fn accept_suggestion(editor: &mut Editor) -> EditorResult<Propagation> {
    let tx = editor.tx()?;
    let Some(point) = tx.selection().caret_point() else {
        return Ok(Propagation::Continue);
    };
    let Some(ghost) = single_ghost(tx.store())? else {
        return Ok(Propagation::Continue);
    };
    let store = tx.store();
    if store.parent(point.key) != store.parent(ghost) {
        return Ok(Propagation::Continue);
    }
    let text = store.text(ghost).map(|ghost| ghost.text.clone()).unwrap_or_default();
    let accepted = tx.replace(ghost, NodeData::text(text), false)?;
    tx.select_end(accepted);
    debug!(?accepted, "suggestion accepted");
    Ok(Propagation::Stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl SuggestionProvider for Fixed {
        fn suggest(&self, context: &SuggestionContext) -> Result<Option<String>, ProviderError> {
            assert!(!context.current_block_text.is_empty());
            Ok(Some(self.0.to_string()))
        }
    }

    fn typed(text: &str) -> (Editor, Autocomplete, NodeKey) {
        let mut editor = Editor::default();
        let autocomplete = Autocomplete::new("test-model");
        autocomplete.install(&mut editor);
        let key = editor
            .update(|editor| {
                let tx = editor.tx()?;
                let root = tx.store().root();
                let paragraph = tx.append(root, NodeData::paragraph())?;
                let key = tx.append(paragraph, NodeData::text(text))?;
                tx.select_end(key);
                Ok(key)
            })
            .unwrap();
        (editor, autocomplete, key)
    }

    #[test]
    fn test_edit_at_block_end_queues_request() {
        let (_, autocomplete, key) = typed("The quick");
        let request = autocomplete.pending_request().unwrap();
        assert_eq!(request.anchor(), key);
        assert_eq!(request.context.current_block_text, "The quick");
        assert_eq!(request.context.model, "test-model");
    }

    #[test]
    fn test_caret_mid_text_queues_nothing() {
        let mut editor = Editor::default();
        let autocomplete = Autocomplete::new("m");
        autocomplete.install(&mut editor);
        editor
            .update(|editor| {
                let tx = editor.tx()?;
                let root = tx.store().root();
                let paragraph = tx.append(root, NodeData::paragraph())?;
                let key = tx.append(paragraph, NodeData::text("abc"))?;
                tx.set_selection(Selection::caret(key, 1));
                Ok(())
            })
            .unwrap();
        assert!(autocomplete.pending_request().is_none());
    }

    #[test]
    fn test_newer_request_supersedes_older() {
        let (mut editor, autocomplete, key) = typed("abc");
        let old = autocomplete.pending_request().unwrap();
        editor
            .update(|editor| {
                let tx = editor.tx()?;
                tx.splice_text(key, 3, 0, "d")?;
                tx.select_end(key);
                Ok(())
            })
            .unwrap();
        let outcome = autocomplete
            .resolve(&mut editor, &old, Ok(Some("ef".to_string())))
            .unwrap();
        assert_eq!(outcome, ResolveOutcome::Stale);
        assert!(ghost_nodes(editor.store()).is_empty());
    }

    #[test]
    fn test_fulfill_inserts_one_ghost() {
        let (mut editor, autocomplete, key) = typed("Hello");
        let outcome = autocomplete.fulfill(&mut editor, &Fixed(" world")).unwrap();
        let Some(ResolveOutcome::Applied(ghost)) = outcome else {
            panic!("expected a ghost, got {:?}", outcome);
        };
        assert_eq!(editor.store().next_sibling(key), Some(ghost));
        assert_eq!(editor.store().text(ghost).unwrap().text, " world");
        assert_eq!(editor.selection(), &Selection::caret(key, 5));
        // The ghost's own insertion asks for nothing new
        assert!(autocomplete.pending_request().is_none());
    }

    #[test]
    fn test_provider_errors_are_swallowed() {
        let (mut editor, autocomplete, _) = typed("Hello");
        let request = autocomplete.take_request().unwrap();
        let version = editor.version();
        let outcome = autocomplete
            .resolve(&mut editor, &request, Err(ProviderError::Unavailable("offline".into())))
            .unwrap();
        assert_eq!(outcome, ResolveOutcome::Failed);
        assert_eq!(editor.version(), version);
    }

    #[test]
    fn test_caret_inside_ghost_moves_back() {
        let (mut editor, autocomplete, key) = typed("Hello");
        autocomplete.fulfill(&mut editor, &Fixed(" world")).unwrap();
        let ghost = editor.store().next_sibling(key).unwrap();

        editor.select(Selection::caret(ghost, 2)).unwrap();
        assert_eq!(editor.selection(), &Selection::caret(key, 5));
        assert!(editor.store().contains(ghost));
    }

    #[test]
    fn test_two_ghosts_violate_the_invariant() {
        let (mut editor, _, key) = typed("Hello");
        let result = editor.update(|editor| {
            let tx = editor.tx()?;
            tx.insert_after(key, NodeData::Text(TextNode::autocomplete("a")))?;
            tx.insert_after(key, NodeData::Text(TextNode::autocomplete("b")))?;
            single_ghost(tx.store())?;
            Ok(())
        });
        assert!(matches!(result, Err(EditorError::InvariantViolation(_))));
    }
}
