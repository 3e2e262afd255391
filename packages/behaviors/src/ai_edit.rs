//! # AI edit
//!
//! Rewrites the selected text following a free-form instruction.
//!
//! ```text
//! AI_EDIT{instruction, temperature} over a non-empty range
//!   queue EditRequest{context, generation, spans}
//! host: take_request() → provider (outside any update) → resolve()
//!   resolve: newer request, or a covered run changed → discarded
//!            otherwise the covered text is replaced by the cleaned answer
//! ```
//!
//! The edit lands on the range that was selected when it was asked for,
//! wherever the caret has gone since.

use crate::autocomplete::{ProviderError, ResolveOutcome};
use crate::behavior::Behavior;
use crate::query::{block_of, text_spans, TextSpan};
use scribe_editor::text::{byte_index, utf16_len};
use scribe_editor::{
    CommandKey, CommandPriority, Editor, EditorResult, NodeStore, Propagation, Registration,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

pub const AI_EDIT: CommandKey<EditInstruction> = CommandKey::new("AI_EDIT");

pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct EditInstruction {
    pub instruction: String,
    /// Sampling temperature in `0.0..=1.0`
    pub temperature: f32,
}

impl EditInstruction {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// What the provider gets to see
#[derive(Debug, Clone, PartialEq)]
pub struct EditContext {
    pub instruction: String,
    /// Covered text, blocks separated by a newline
    pub selected_text: String,
    pub temperature: f32,
    pub model: String,
}

/// An edit request stamped with the text runs it covers
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub context: EditContext,
    pub generation: u64,
    /// Covered spans with the full text of their run when asked
    spans: Vec<(TextSpan, String)>,
}

impl EditRequest {
    pub fn spans(&self) -> impl Iterator<Item = &TextSpan> {
        self.spans.iter().map(|(span, _)| span)
    }
}

/// The external rewriting service
pub trait EditProvider {
    fn edit(&self, context: &EditContext) -> Result<Option<String>, ProviderError>;
}

#[derive(Debug)]
struct State {
    model: String,
    generation: u64,
    pending: Option<EditRequest>,
}

/// AI edit behavior plus the host-side handle for its request queue.
/// Clones share the same queue.
#[derive(Debug, Clone)]
pub struct AiEdit {
    state: Rc<RefCell<State>>,
}

impl AiEdit {
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

    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    pub fn pending_request(&self) -> Option<EditRequest> {
        self.state.borrow().pending.clone()
    }

    pub fn take_request(&self) -> Option<EditRequest> {
        self.state.borrow_mut().pending.take()
    }

    /// Replace the covered text with the provider answer if none of the
    /// covered runs changed in the meantime
    pub fn resolve(
        &self,
        editor: &mut Editor,
        request: &EditRequest,
        result: Result<Option<String>, ProviderError>,
    ) -> EditorResult<ResolveOutcome> {
        let text = match result {
            Ok(Some(text)) => clean_answer(&text),
            Ok(None) => String::new(),
            Err(err) => {
                warn!(error = %err, generation = request.generation, "edit failed");
                return Ok(ResolveOutcome::Failed);
            }
        };
        if text.is_empty() {
            debug!(generation = request.generation, "empty edit");
            return Ok(ResolveOutcome::Empty);
        }
        if request.generation != self.generation() || !spans_unchanged(editor.store(), request) {
            warn!(generation = request.generation, "discarding stale edit");
            return Ok(ResolveOutcome::Stale);
        }

        let Some((first, _)) = request.spans.first().cloned() else {
            return Ok(ResolveOutcome::Empty);
        };
        editor.update(|editor| {
            let tx = editor.tx()?;
            for (span, _) in request.spans.iter().skip(1).rev() {
                tx.splice_text(span.key, span.start, span.end - span.start, "")?;
            }
            tx.splice_text(first.key, first.start, first.end - first.start, &text)?;
            tx.select_caret(first.key, first.start + utf16_len(&text));
            Ok(())
        })?;
        debug!(key = ?first.key, "edit applied");
        Ok(ResolveOutcome::Applied(first.key))
    }

    /// Take the pending request, ask `provider` synchronously and resolve
    pub fn fulfill(
        &self,
        editor: &mut Editor,
        provider: &dyn EditProvider,
    ) -> EditorResult<Option<ResolveOutcome>> {
        let Some(request) = self.take_request() else {
            return Ok(None);
        };
        let result = provider.edit(&request.context);
        self.resolve(editor, &request, result).map(Some)
    }

    fn request(&self, editor: &Editor, instruction: &EditInstruction) -> bool {
        if instruction.instruction.trim().is_empty() {
            return false;
        }
        let Some(range) = editor.selection().as_range() else {
            return false;
        };
        if range.is_collapsed() {
            return false;
        }
        let store = editor.store();
        let spans: Vec<(TextSpan, String)> = text_spans(store, range)
            .into_iter()
            .filter_map(|span| Some((span, store.text(span.key)?.text.clone())))
            .collect();
        let selected_text = covered_text(store, &spans);
        if selected_text.trim().is_empty() {
            return false;
        }

        let mut state = self.state.borrow_mut();
        state.generation += 1;
        let generation = state.generation;
        let model = state.model.clone();
        debug!(generation, spans = spans.len(), "edit requested");
        state.pending = Some(EditRequest {
            context: EditContext {
                instruction: instruction.instruction.clone(),
                selected_text,
                temperature: instruction.temperature.clamp(0.0, 1.0),
                model,
            },
            generation,
            spans,
        });
        true
    }
}

impl Behavior for AiEdit {
    fn name(&self) -> &'static str {
        "ai-edit"
    }

    fn install(&self, editor: &mut Editor) -> Vec<Registration> {
        let handle = self.clone();
        vec![editor
            .register_command(AI_EDIT, CommandPriority::Editor, move |editor, instruction| {
                Ok(if handle.request(editor, instruction) {
                    Propagation::Stop
                } else {
                    Propagation::Continue
                })
            })
            .into()]
    }
}

fn slice(text: &str, span: &TextSpan) -> String {
    text[byte_index(text, span.start)..byte_index(text, span.end)].to_string()
}

fn covered_text(store: &NodeStore, spans: &[(TextSpan, String)]) -> String {
    let mut out = String::new();
    let mut block = None;
    for (span, text) in spans {
        let current = block_of(store, span.key);
        if block.is_some() && current != block {
            out.push('\n');
        }
        block = current;
        out.push_str(&slice(text, span));
    }
    out
}

fn spans_unchanged(store: &NodeStore, request: &EditRequest) -> bool {
    request
        .spans
        .iter()
        .all(|(span, text)| store.text(span.key).is_some_and(|node| &node.text == text))
}

/// Trailing whitespace and tabs go, as does one quote at either end
fn clean_answer(answer: &str) -> String {
    const QUOTES: &[char] = &['"', '\''];
    let answer = answer.trim_end().replace('\t', "");
    let answer = answer.strip_prefix(QUOTES).unwrap_or(&answer);
    answer.strip_suffix(QUOTES).unwrap_or(answer).to_string()
}
