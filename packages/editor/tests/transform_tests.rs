//! Transform fixpoint behavior

use scribe_editor::{
    Editor, EditorConfig, EditorError, NodeData, NodeKey, NodeKind, Selection,
};
use std::cell::Cell;
use std::rc::Rc;

fn paragraph_with(editor: &mut Editor, text: &str) -> (NodeKey, NodeKey) {
    editor
        .update(|editor| {
            let tx = editor.tx()?;
            let root = tx.store().root();
            let paragraph = tx.append(root, NodeData::paragraph())?;
            let text = tx.append(paragraph, NodeData::text(text))?;
            Ok((paragraph, text))
        })
        .unwrap()
}

fn uppercase(editor: &mut Editor) {
    editor.register_transform(NodeKind::Text, |editor, key| {
        let tx = editor.tx()?;
        let upper = tx
            .store()
            .text(key)
            .map(|text| text.text.to_uppercase())
            .unwrap_or_default();
        tx.set_text(key, upper)?;
        Ok(())
    });
}

#[test]
fn test_transforms_run_to_fixpoint() {
    let mut editor = Editor::default();
    uppercase(&mut editor);
    let (_, text) = paragraph_with(&mut editor, "quiet");
    assert_eq!(editor.store().text(text).unwrap().text, "QUIET");
}

#[test]
fn test_rerunning_transforms_changes_nothing() {
    let mut editor = Editor::default();
    uppercase(&mut editor);
    paragraph_with(&mut editor, "quiet");
    let exported = editor.export_state().unwrap();
    let version = editor.version();

    editor
        .update(|editor| {
            editor.tx()?.mark_all_dirty();
            Ok(())
        })
        .unwrap();
    assert_eq!(editor.export_state().unwrap(), exported);
    assert_eq!(editor.version(), version);
}

#[test]
fn test_ancestors_of_dirty_nodes_are_visited() {
    let mut editor = Editor::default();
    let (_, text) = paragraph_with(&mut editor, "a");

    let paragraph_runs = Rc::new(Cell::new(0));
    let root_runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&paragraph_runs);
    editor.register_transform(NodeKind::Paragraph, move |_, _| {
        counter.set(counter.get() + 1);
        Ok(())
    });
    let counter = Rc::clone(&root_runs);
    editor.register_transform(NodeKind::Root, move |_, _| {
        counter.set(counter.get() + 1);
        Ok(())
    });

    editor
        .update(|editor| {
            editor.tx()?.set_text(text, "b")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(paragraph_runs.get(), 1);
    assert_eq!(root_runs.get(), 1);
}

#[test]
fn test_noop_writes_do_not_trigger_transforms() {
    let mut editor = Editor::default();
    let (_, text) = paragraph_with(&mut editor, "same");
    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    editor.register_transform(NodeKind::Text, move |_, _| {
        counter.set(counter.get() + 1);
        Ok(())
    });

    editor
        .update(|editor| {
            editor.tx()?.set_text(text, "same")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(runs.get(), 0);
}

#[test]
fn test_runaway_transform_aborts() {
    let config = EditorConfig {
        max_transform_rounds: 5,
        ..EditorConfig::default()
    };
    let mut editor = Editor::new(config);
    let (_, text) = paragraph_with(&mut editor, "x");
    let version = editor.version();

    editor.register_transform(NodeKind::Text, |editor, key| {
        let tx = editor.tx()?;
        let grown = format!("{}x", tx.store().text(key).map(|t| t.text.as_str()).unwrap_or(""));
        tx.set_text(key, grown)?;
        Ok(())
    });

    let result = editor.update(|editor| {
        editor.tx()?.mark_dirty(text);
        Ok(())
    });
    assert!(matches!(
        result,
        Err(EditorError::TransformLoopExceeded { limit: 5 })
    ));
    assert_eq!(editor.version(), version);
    assert_eq!(editor.store().text(text).unwrap().text, "x");
}

#[test]
fn test_unregistered_transform_stops_running() {
    let mut editor = Editor::default();
    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    let handle = editor.register_transform(NodeKind::Text, move |_, _| {
        counter.set(counter.get() + 1);
        Ok(())
    });
    paragraph_with(&mut editor, "a");
    assert_eq!(runs.get(), 1);

    assert!(editor.unregister_transform(handle));
    assert!(!editor.unregister_transform(handle));
    paragraph_with(&mut editor, "b");
    assert_eq!(runs.get(), 1);
}

#[test]
fn test_transform_stops_when_node_disappears() {
    let mut editor = Editor::default();
    let later_runs = Rc::new(Cell::new(0));
    editor.register_transform(NodeKind::Text, |editor, key| {
        let tx = editor.tx()?;
        if tx.store().text(key).is_some_and(|text| text.text == "drop") {
            tx.remove(key)?;
        }
        Ok(())
    });
    let counter = Rc::clone(&later_runs);
    editor.register_transform(NodeKind::Text, move |_, _| {
        counter.set(counter.get() + 1);
        Ok(())
    });

    let (paragraph, _) = paragraph_with(&mut editor, "drop");
    assert!(editor.store().children(paragraph).is_empty());
    assert_eq!(later_runs.get(), 0);
}

#[test]
fn test_empty_text_is_pruned() {
    let mut editor = Editor::default();
    let (paragraph, text) = paragraph_with(&mut editor, "gone");
    editor
        .update(|editor| {
            editor.tx()?.set_text(text, "")?;
            Ok(())
        })
        .unwrap();
    assert!(editor.store().children(paragraph).is_empty());
}

#[test]
fn test_empty_text_holding_the_caret_is_kept() {
    let mut editor = Editor::default();
    let (paragraph, text) = paragraph_with(&mut editor, "kept");
    editor
        .update(|editor| {
            let tx = editor.tx()?;
            tx.set_text(text, "")?;
            tx.set_selection(Selection::caret(text, 0));
            Ok(())
        })
        .unwrap();
    assert_eq!(editor.store().children(paragraph), &[text]);
    assert_eq!(editor.selection(), &Selection::caret(text, 0));
}

#[test]
fn test_empty_text_next_to_text_gives_up_the_caret() {
    let mut editor = Editor::default();
    let (paragraph, text) = paragraph_with(&mut editor, "before");
    editor
        .update(|editor| {
            let tx = editor.tx()?;
            let empty = tx.append(paragraph, NodeData::text(""))?;
            tx.set_selection(Selection::caret(empty, 0));
            Ok(())
        })
        .unwrap();
    assert_eq!(editor.store().children(paragraph), &[text]);
    assert_eq!(editor.selection(), &Selection::caret(text, 6));
}
