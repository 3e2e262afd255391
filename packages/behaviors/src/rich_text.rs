//! Text input, inline formatting and character deletion

use crate::behavior::Behavior;
use crate::query::{is_editable_text, text_spans, TextSpan};
use scribe_editor::text::{byte_index, utf16_len};
use scribe_editor::{
    CommandPriority, Editor, EditorResult, NodeClass, NodeData, NodeKey, Point, PointType,
    Propagation, RangeSelection, Registration, Selection, TextFormatType, FORMAT_TEXT,
    INSERT_TEXT, KEY_BACKSPACE,
};
use tracing::debug;

pub struct RichText;

impl Behavior for RichText {
    fn name(&self) -> &'static str {
        "rich-text"
    }

    fn install(&self, editor: &mut Editor) -> Vec<Registration> {
        vec![
            editor
                .register_command(INSERT_TEXT, CommandPriority::Editor, |editor, text: &String| {
                    editor.update(|editor| insert_text(editor, text))
                })
                .into(),
            editor
                .register_command(FORMAT_TEXT, CommandPriority::Editor, |editor, format| {
                    let format = *format;
                    editor.update(|editor| format_text(editor, format))
                })
                .into(),
            editor
                .register_command(KEY_BACKSPACE, CommandPriority::Editor, |editor, _| {
                    editor.update(delete_backward)
                })
                .into(),
        ]
    }
}

fn stop_if(handled: bool) -> Propagation {
    if handled {
        Propagation::Stop
    } else {
        Propagation::Continue
    }
}

fn insert_text(editor: &mut Editor, text: &str) -> EditorResult<Propagation> {
    let tx = editor.tx()?;
    let Some(range) = tx.selection().as_range().cloned() else {
        return Ok(Propagation::Continue);
    };
    let (start, end) = range.ordered(tx.store());
    let inserted = utf16_len(text);

    if start.key == end.key && start.kind == PointType::Text {
        if !is_editable_text(tx.store(), start.key) {
            return Ok(Propagation::Continue);
        }
        tx.splice_text(start.key, start.offset, end.offset - start.offset, text)?;
        tx.select_caret(start.key, start.offset + inserted);
        return Ok(Propagation::Stop);
    }

    if range.is_collapsed() && start.kind == PointType::Element {
        let mut parent = start.key;
        let mut index = start.offset;
        if parent == tx.store().root() {
            // Text cannot live directly under the root
            parent = tx.insert(NodeData::paragraph(), parent, index)?;
            index = 0;
        } else if tx.store().get(parent).map(|node| node.class()) != Some(NodeClass::Element) {
            return Ok(Propagation::Continue);
        }
        let key = tx.insert(NodeData::text(text), parent, index)?;
        tx.select_caret(key, inserted);
        return Ok(Propagation::Stop);
    }

    debug!("insert over a multi-node range is not handled here");
    Ok(Propagation::Continue)
}

/// Toggle `format` across the selected text. If every covered run already
/// has it, it is removed; otherwise it is added everywhere.
fn format_text(editor: &mut Editor, format: TextFormatType) -> EditorResult<Propagation> {
    let flag = format.flag();
    let tx = editor.tx()?;
    let Some(range) = tx.selection().as_range().cloned() else {
        return Ok(Propagation::Continue);
    };
    if range.is_collapsed() {
        return Ok(Propagation::Continue);
    }
    let backward = range.is_backward(tx.store());
    let spans = text_spans(tx.store(), &range);
    if spans.is_empty() {
        return Ok(Propagation::Continue);
    }
    let remove = spans
        .iter()
        .all(|span| tx.store().text(span.key).is_some_and(|text| text.has_format(flag)));

    let mut pieces = Vec::with_capacity(spans.len());
    for span in &spans {
        pieces.push(isolate(editor, span)?);
    }

    let tx = editor.tx()?;
    for &key in &pieces {
        tx.update_text(key, |text| text.format.set(flag, !remove))?;
    }

    if let (Some(&first), Some(&last)) = (pieces.first(), pieces.last()) {
        let start = Point::text(first, 0);
        let end = Point::text(last, tx.store().content_size(last));
        let selection = if backward {
            RangeSelection::new(end, start)
        } else {
            RangeSelection::new(start, end)
        };
        tx.set_selection(Selection::Range(selection));
    }
    Ok(Propagation::Stop)
}

/// Split a span's node so the covered stretch is its own node
fn isolate(editor: &mut Editor, span: &TextSpan) -> EditorResult<NodeKey> {
    if span.is_whole() {
        return Ok(span.key);
    }
    let pieces = editor.tx()?.split_text(span.key, &[span.start, span.end])?;
    let index = usize::from(span.start > 0);
    Ok(pieces.get(index).copied().unwrap_or(span.key))
}

/// Delete the character before a collapsed caret, or the selected stretch
/// of a single text node
fn delete_backward(editor: &mut Editor) -> EditorResult<Propagation> {
    let tx = editor.tx()?;
    let Some(range) = tx.selection().as_range().cloned() else {
        return Ok(Propagation::Continue);
    };
    let (start, end) = range.ordered(tx.store());
    if start.key != end.key
        || start.kind != PointType::Text
        || !is_editable_text(tx.store(), start.key)
    {
        return Ok(Propagation::Continue);
    }

    if !range.is_collapsed() {
        tx.splice_text(start.key, start.offset, end.offset - start.offset, "")?;
        tx.select_caret(start.key, start.offset);
        return Ok(Propagation::Stop);
    }
    if start.offset == 0 {
        return Ok(Propagation::Continue);
    }

    let width = tx
        .store()
        .text(start.key)
        .and_then(|text| {
            let at = byte_index(&text.text, start.offset);
            text.text[..at].chars().next_back().map(char::len_utf16)
        })
        .unwrap_or(0);
    let deleted = tx.splice_text(start.key, start.offset - width, width, "")?;
    tx.select_caret(start.key, start.offset - width);
    Ok(stop_if(deleted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_editor::TextFormat;

    fn editor_with(text: &str) -> (Editor, NodeKey, NodeKey) {
        let mut editor = Editor::default();
        RichText.install(&mut editor);
        let (paragraph, text) = editor
            .update(|editor| {
                let tx = editor.tx()?;
                let root = tx.store().root();
                let paragraph = tx.append(root, NodeData::paragraph())?;
                let text = tx.append(paragraph, NodeData::text(text))?;
                Ok((paragraph, text))
            })
            .unwrap();
        (editor, paragraph, text)
    }

    #[test]
    fn test_insert_text_at_caret() {
        let (mut editor, _, text) = editor_with("helo");
        editor.select(Selection::caret(text, 3)).unwrap();
        assert!(editor.dispatch(INSERT_TEXT, &"l".to_string()).unwrap());
        assert_eq!(editor.text_content(), "hello");
        assert_eq!(editor.selection(), &Selection::caret(text, 4));
    }

    #[test]
    fn test_insert_text_replaces_single_node_range() {
        let (mut editor, _, text) = editor_with("hello world");
        editor.select(Selection::text_range(text, 6, 11)).unwrap();
        editor.dispatch(INSERT_TEXT, &"there".to_string()).unwrap();
        assert_eq!(editor.text_content(), "hello there");
        assert_eq!(editor.selection(), &Selection::caret(text, 11));
    }

    #[test]
    fn test_insert_text_into_empty_paragraph() {
        let mut editor = Editor::default();
        RichText.install(&mut editor);
        let paragraph = editor.append_block(NodeData::paragraph()).unwrap();
        editor
            .select(Selection::Range(RangeSelection::collapsed(Point::element(paragraph, 0))))
            .unwrap();
        editor.dispatch(INSERT_TEXT, &"hi".to_string()).unwrap();
        let text = editor.store().children(paragraph)[0];
        assert_eq!(editor.store().text(text).unwrap().text, "hi");
        assert_eq!(editor.selection(), &Selection::caret(text, 2));
    }

    #[test]
    fn test_format_splits_and_toggles() {
        let (mut editor, paragraph, text) = editor_with("make this bold");
        editor.select(Selection::text_range(text, 5, 9)).unwrap();
        editor.dispatch(FORMAT_TEXT, &TextFormatType::Bold).unwrap();

        let children = editor.store().children(paragraph).to_vec();
        assert_eq!(children.len(), 3);
        let bold = editor.store().text(children[1]).unwrap();
        assert_eq!(bold.text, "this");
        assert!(bold.has_format(TextFormat::BOLD));
        assert!(!editor.store().text(children[0]).unwrap().has_format(TextFormat::BOLD));

        // Same selection again removes it
        editor.dispatch(FORMAT_TEXT, &TextFormatType::Bold).unwrap();
        assert!(!editor.store().text(children[1]).unwrap().has_format(TextFormat::BOLD));
    }

    #[test]
    fn test_collapsed_format_is_unhandled() {
        let (mut editor, _, text) = editor_with("abc");
        editor.select(Selection::caret(text, 1)).unwrap();
        assert!(!editor.dispatch(FORMAT_TEXT, &TextFormatType::Italic).unwrap());
    }

    #[test]
    fn test_backspace_deletes_one_character() {
        let (mut editor, _, text) = editor_with("cats");
        editor.select(Selection::caret(text, 4)).unwrap();
        assert!(editor.dispatch(KEY_BACKSPACE, &()).unwrap());
        assert_eq!(editor.text_content(), "cat");
        assert_eq!(editor.selection(), &Selection::caret(text, 3));
    }

    #[test]
    fn test_backspace_removes_whole_surrogate_pair() {
        let (mut editor, _, text) = editor_with("a😀");
        editor.select(Selection::caret(text, 3)).unwrap();
        editor.dispatch(KEY_BACKSPACE, &()).unwrap();
        assert_eq!(editor.text_content(), "a");
    }

    #[test]
    fn test_backspace_at_start_is_unhandled() {
        let (mut editor, _, text) = editor_with("a");
        editor.select(Selection::caret(text, 0)).unwrap();
        assert!(!editor.dispatch(KEY_BACKSPACE, &()).unwrap());
    }
}
