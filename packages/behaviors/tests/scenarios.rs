//! End-to-end editing scenarios with the standard behavior set installed

use scribe_behaviors::{
    BehaviorConfig, BehaviorSet, EditContext, EditInstruction, EditProvider, ProviderError,
    ResolveOutcome, SuggestionContext, SuggestionProvider, AI_EDIT, FORMAT_QUOTE,
    REQUEST_SUGGESTION,
};
use scribe_editor::{
    DecoratorNode, Editor, NodeData, NodeKey, NodeKind, Selection, INSERT_TEXT, KEY_TAB,
};

struct Fixed(&'static str);

impl SuggestionProvider for Fixed {
    fn suggest(&self, _context: &SuggestionContext) -> Result<Option<String>, ProviderError> {
        Ok(Some(self.0.to_string()))
    }
}

struct Rewrite(&'static str);

impl EditProvider for Rewrite {
    fn edit(&self, _context: &EditContext) -> Result<Option<String>, ProviderError> {
        Ok(Some(self.0.to_string()))
    }
}

fn editor_with(config: &BehaviorConfig) -> (Editor, BehaviorSet) {
    let mut editor = Editor::default();
    let mut behaviors = BehaviorSet::standard(config);
    behaviors.install(&mut editor);
    (editor, behaviors)
}

/// Paragraphs with one text run each; the caret ends up at the end of the
/// last one
fn paragraphs(editor: &mut Editor, texts: &[&str]) -> Vec<(NodeKey, NodeKey)> {
    editor
        .update(|editor| {
            let tx = editor.tx()?;
            let root = tx.store().root();
            let mut created = Vec::new();
            for text in texts {
                let paragraph = tx.append(root, NodeData::paragraph())?;
                let run = tx.append(paragraph, NodeData::text(*text))?;
                created.push((paragraph, run));
            }
            if let Some(&(_, last)) = created.last() {
                tx.select_end(last);
            }
            Ok(created)
        })
        .unwrap()
}

fn ghosts(editor: &Editor) -> usize {
    editor.store().nodes_of_kind(NodeKind::Autocomplete).len()
}

#[test]
fn test_typing_closes_an_inline_equation() {
    let (mut editor, _) = editor_with(&BehaviorConfig::default());
    let blocks = paragraphs(&mut editor, &["area is $a^2"]);
    let (paragraph, _) = blocks[0];

    editor.dispatch(INSERT_TEXT, &"$".to_string()).unwrap();
    editor.dispatch(INSERT_TEXT, &"now".to_string()).unwrap();

    let store = editor.store();
    let children = store.children(paragraph).to_vec();
    assert_eq!(children.len(), 3);
    assert_eq!(store.text(children[0]).unwrap().text, "area is ");
    match store.get(children[1]).unwrap().as_decorator() {
        Some(DecoratorNode::Equation(payload)) => {
            assert_eq!(payload.equation, "a^2");
            assert!(payload.inline);
        }
        other => panic!("expected an equation, got {:?}", other),
    }
    assert_eq!(store.text(children[2]).unwrap().text, " now");
    assert_eq!(editor.selection(), &Selection::caret(children[2], 4));
}

#[test]
fn test_suggestion_lifecycle() {
    let config = BehaviorConfig {
        autocomplete_model: Some("test-model".to_string()),
        ..Default::default()
    };
    let (mut editor, behaviors) = editor_with(&config);
    let autocomplete = behaviors.autocomplete().unwrap().clone();
    let blocks = paragraphs(&mut editor, &["first", "Hello wor"]);
    let (first_text, second) = (blocks[0].1, blocks[1]);

    let request = autocomplete.pending_request().unwrap();
    assert_eq!(request.context.current_block_text, "Hello wor");
    assert_eq!(request.context.preceding_context, "first");
    assert_eq!(request.context.model, "test-model");

    // Shown, then dropped when the caret moves to another block
    let outcome = autocomplete.fulfill(&mut editor, &Fixed("ld")).unwrap();
    assert!(matches!(outcome, Some(ResolveOutcome::Applied(_))));
    assert_eq!(ghosts(&editor), 1);
    editor.select(Selection::caret(first_text, 2)).unwrap();
    assert_eq!(ghosts(&editor), 0);

    // Shown again on request, then accepted
    editor.select(Selection::caret(second.1, 9)).unwrap();
    assert!(editor.dispatch(REQUEST_SUGGESTION, &()).unwrap());
    autocomplete.fulfill(&mut editor, &Fixed("ld")).unwrap();
    assert_eq!(ghosts(&editor), 1);

    assert!(editor.dispatch(KEY_TAB, &()).unwrap());
    assert_eq!(ghosts(&editor), 0);
    assert_eq!(editor.store().text_content(second.0), "Hello world");
    let accepted = *editor.store().children(second.0).last().unwrap();
    assert_eq!(editor.selection(), &Selection::caret(accepted, 2));
}

#[test]
fn test_suggestion_for_a_moved_caret_is_discarded() {
    let config = BehaviorConfig {
        autocomplete_model: Some("test-model".to_string()),
        ..Default::default()
    };
    let (mut editor, behaviors) = editor_with(&config);
    let autocomplete = behaviors.autocomplete().unwrap().clone();
    let blocks = paragraphs(&mut editor, &["Hello"]);

    let request = autocomplete.take_request().unwrap();
    editor.select(Selection::caret(blocks[0].1, 1)).unwrap();
    let outcome = autocomplete
        .resolve(&mut editor, &request, Ok(Some(" there".to_string())))
        .unwrap();
    assert_eq!(outcome, ResolveOutcome::Stale);
    assert_eq!(ghosts(&editor), 0);
}

#[test]
fn test_ai_edit_output_is_normalized() {
    let config = BehaviorConfig {
        autocomplete_model: Some("test-model".to_string()),
        edit_model: Some("edit-model".to_string()),
    };
    let (mut editor, behaviors) = editor_with(&config);
    let ai_edit = behaviors.ai_edit().unwrap().clone();
    let blocks = paragraphs(&mut editor, &["the quick fox"]);
    let text = blocks[0].1;

    editor.select(Selection::text_range(text, 4, 9)).unwrap();
    assert!(editor
        .dispatch(AI_EDIT, &EditInstruction::new("slower"))
        .unwrap());
    let outcome = ai_edit.fulfill(&mut editor, &Rewrite("'very  slow'")).unwrap();
    assert_eq!(outcome, Some(ResolveOutcome::Applied(text)));
    assert_eq!(editor.text_content(), "the very slow fox");
    assert_eq!(ghosts(&editor), 0);
}

#[test]
fn test_uninstalled_set_stops_handling_commands() {
    let (mut editor, mut behaviors) = editor_with(&BehaviorConfig::default());
    let blocks = paragraphs(&mut editor, &["quote me"]);
    assert!(editor.dispatch(FORMAT_QUOTE, &()).unwrap());
    assert_eq!(editor.store().kind(blocks[0].0), Some(NodeKind::Quote));

    behaviors.uninstall(&mut editor);
    assert!(!behaviors.is_installed());
    assert!(!editor.dispatch(FORMAT_QUOTE, &()).unwrap());
}

#[test]
fn test_normalizing_twice_is_stable() {
    let (mut editor, _) = editor_with(&BehaviorConfig::default());
    paragraphs(&mut editor, &["too   many  spaces", "```"]);
    let once = editor.export_state().unwrap();

    editor
        .update(|editor| {
            editor.tx()?.mark_all_dirty();
            Ok(())
        })
        .unwrap();
    assert_eq!(editor.export_state().unwrap(), once);
    assert_eq!(editor.text_content(), "too many spaces\n\n\n\n");
}
