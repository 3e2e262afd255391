//! End-to-end editor lifecycle: updates, listeners, import/export

use scribe_editor::{
    EditorError, Editor, NodeData, NodeKind, Selection, UpdateOrigin,
};
use std::cell::RefCell;
use std::rc::Rc;

const DOCUMENT: &str = r#"{
    "root": {
        "type": "root",
        "version": 1,
        "children": [
            {
                "type": "heading",
                "tag": "h1",
                "version": 1,
                "children": [{ "type": "text", "text": "Notes", "format": 0, "version": 1 }]
            },
            {
                "type": "paragraph",
                "version": 1,
                "children": [
                    { "type": "text", "text": "area is ", "version": 1 },
                    { "type": "equation", "equation": "a^2", "inline": true, "version": 1 },
                    { "type": "text", "text": " now", "format": 2, "version": 1 }
                ]
            },
            {
                "type": "list",
                "listType": "bullet",
                "version": 1,
                "children": [
                    { "type": "listitem", "value": 1, "version": 1,
                      "children": [{ "type": "text", "text": "first", "version": 1 }] }
                ]
            },
            { "type": "horizontal-divider", "version": 1 },
            {
                "type": "image",
                "src": "https://example.com/cat.png",
                "altText": "cat",
                "width": 0,
                "height": 0,
                "maxWidth": 500,
                "version": 1
            }
        ]
    }
}"#;

#[test]
fn test_document_lifecycle() {
    let mut editor = Editor::default();
    assert_eq!(editor.version(), 0);

    let text = editor
        .update(|editor| {
            let tx = editor.tx()?;
            let root = tx.store().root();
            let paragraph = tx.append(root, NodeData::paragraph())?;
            let text = tx.append(paragraph, NodeData::text("Hello"))?;
            tx.set_selection(Selection::caret(text, 5));
            Ok(text)
        })
        .unwrap();

    assert_eq!(editor.version(), 1);
    assert_eq!(editor.text_content(), "Hello");
    assert_eq!(editor.selection(), &Selection::caret(text, 5));
    editor.store().check_integrity().unwrap();

    editor
        .update(|editor| {
            editor.tx()?.splice_text(text, 5, 0, ", world")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(editor.text_content(), "Hello, world");
    assert_eq!(editor.version(), 2);
}

#[test]
fn test_listeners_see_every_commit() {
    let mut editor = Editor::default();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let handle = editor.register_update_listener(move |event| {
        sink.borrow_mut()
            .push((event.origin, event.snapshot.version(), event.dirty.clone()));
    });

    let paragraph = editor.append_block(NodeData::paragraph()).unwrap();
    editor.undo().unwrap();
    editor.redo().unwrap();

    {
        let events = events.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].0, UpdateOrigin::Update);
        assert!(events[0].2.contains(&paragraph));
        assert_eq!((events[1].0, events[1].1), (UpdateOrigin::Undo, 0));
        assert_eq!((events[2].0, events[2].1), (UpdateOrigin::Redo, 1));
    }

    assert!(editor.unregister_listener(handle));
    editor.append_block(NodeData::paragraph()).unwrap();
    assert_eq!(events.borrow().len(), 3);
}

#[test]
fn test_import_export_round_trip() {
    let mut editor = Editor::default();
    editor.import_state(DOCUMENT).unwrap();
    editor.store().check_integrity().unwrap();

    let exported = editor.export_state().unwrap();
    let mut other = Editor::default();
    other.import_state(&exported).unwrap();
    assert_eq!(other.export_state().unwrap(), exported);

    let store = editor.store();
    assert_eq!(store.nodes_of_kind(NodeKind::Equation).len(), 1);
    assert_eq!(store.nodes_of_kind(NodeKind::ListItem).len(), 1);
    assert_eq!(
        editor.text_content(),
        "Notes\n\narea is a^2 now\n\nfirst\n\n\n\n\n"
    );
}

#[test]
fn test_import_resets_history_and_uses_fresh_keys() {
    let mut editor = Editor::default();
    let used = editor.append_block(NodeData::paragraph()).unwrap();
    let snapshot = editor.import_state(DOCUMENT).unwrap();

    assert!(!editor.history().can_undo());
    assert_eq!(editor.history().len(), 1);
    assert!(snapshot.selection().is_none());
    assert!(snapshot
        .store()
        .document_order()
        .iter()
        .all(|&key| key.as_u64() > used.as_u64()));
}

#[test]
fn test_malformed_import_keeps_document() {
    let mut editor = Editor::default();
    editor.append_block(NodeData::paragraph()).unwrap();
    let before = editor.export_state().unwrap();

    let result = editor.import_state(r#"{"root": {"type": "root", "children": [{"type": "table"}]}}"#);
    assert!(matches!(result, Err(EditorError::MalformedImport(_))));
    let result = editor.import_state("not json");
    assert!(matches!(result, Err(EditorError::MalformedImport(_))));
    assert_eq!(editor.export_state().unwrap(), before);
}

#[test]
fn test_keys_are_never_reused() {
    let mut editor = Editor::default();
    let first = editor.append_block(NodeData::paragraph()).unwrap();
    editor.undo().unwrap();
    let second = editor.append_block(NodeData::paragraph()).unwrap();
    assert_ne!(first, second);
    assert!(second > first);
}
