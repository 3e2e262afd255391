//! Small normalizing transforms that keep typed content tidy

use crate::behavior::Behavior;
use crate::query::block_of;
use once_cell::sync::Lazy;
use regex::Regex;
use scribe_editor::text::{byte_index, utf16_len};
use scribe_editor::{
    Editor, EditorResult, ElementKind, NodeData, NodeKey, NodeKind, Point, PointType,
    RangeSelection, Registration, Selection, TextFormat, TextNode,
};
use tracing::debug;

static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(" {2,}").expect("space run pattern"));

const CODE_FENCE: &str = "```";

pub struct Housekeeping;

impl Behavior for Housekeeping {
    fn name(&self) -> &'static str {
        "housekeeping"
    }

    fn install(&self, editor: &mut Editor) -> Vec<Registration> {
        vec![
            editor.register_transform(NodeKind::Text, collapse_spaces).into(),
            editor.register_transform(NodeKind::Root, trim_space_before_caret).into(),
            editor.register_transform(NodeKind::Text, space_after_inline_code).into(),
            editor.register_transform(NodeKind::Text, code_fence_to_block).into(),
            editor.register_transform(NodeKind::Heading, clean_heading).into(),
            editor.register_transform(NodeKind::Root, paragraph_at_end).into(),
        ]
    }
}

fn collapsed(text: &str) -> String {
    SPACE_RUN.replace_all(text, " ").into_owned()
}

/// Collapse runs of spaces to one. Selection points in the node keep their
/// position relative to the surrounding characters.
fn collapse_spaces(editor: &mut Editor, key: NodeKey) -> EditorResult<()> {
    let tx = editor.tx()?;
    let store = tx.store();
    let in_code = store
        .parent(key)
        .is_some_and(|parent| store.kind(parent) == Some(NodeKind::Code));
    let Some(text) = store.text(key).map(|node| node.text.clone()) else {
        return Ok(());
    };
    if in_code || !SPACE_RUN.is_match(&text) {
        return Ok(());
    }

    let remap = |point: Point| -> Point {
        if point.key != key || point.kind != PointType::Text {
            return point;
        }
        let prefix = &text[..byte_index(&text, point.offset)];
        Point::text(key, utf16_len(&collapsed(prefix)))
    };
    let selection = match tx.selection() {
        Selection::Range(range) => Some(Selection::Range(RangeSelection::new(
            remap(range.anchor),
            remap(range.focus),
        ))),
        _ => None,
    };

    tx.set_text(key, collapsed(&text))?;
    if let Some(selection) = selection {
        tx.set_selection(selection);
    }
    Ok(())
}

/// Drop the trailing space of the last text run in a block when the caret
/// sits just before it
fn trim_space_before_caret(editor: &mut Editor, _root: NodeKey) -> EditorResult<()> {
    let tx = editor.tx()?;
    let Some(point) = tx.selection().caret_point() else {
        return Ok(());
    };
    let store = tx.store();
    if point.kind != PointType::Text
        || store.kind(point.key) != Some(NodeKind::Text)
        || store.next_sibling(point.key).is_some()
    {
        return Ok(());
    }
    let Some(text) = store.text(point.key) else {
        return Ok(());
    };
    let size = utf16_len(&text.text);
    if text.text.ends_with(' ') && point.offset + 1 == size {
        tx.splice_text(point.key, size - 1, 1, "")?;
    }
    Ok(())
}

/// A trailing inline-code run gets a plain space after it so typing can
/// continue outside the code format
fn space_after_inline_code(editor: &mut Editor, key: NodeKey) -> EditorResult<()> {
    let tx = editor.tx()?;
    let is_code = tx
        .store()
        .text(key)
        .is_some_and(|text| text.has_format(TextFormat::CODE));
    if is_code && tx.store().next_sibling(key).is_none() {
        tx.insert_after(key, NodeData::Text(TextNode::new(" ")))?;
    }
    Ok(())
}

/// A block containing just "```" turns into a code block
fn code_fence_to_block(editor: &mut Editor, key: NodeKey) -> EditorResult<()> {
    let tx = editor.tx()?;
    if !tx.store().text(key).is_some_and(|text| text.text == CODE_FENCE) {
        return Ok(());
    }
    let Some(block) = block_of(tx.store(), key) else {
        return Ok(());
    };
    if matches!(
        tx.store().kind(block),
        Some(NodeKind::Code | NodeKind::ListItem)
    ) {
        return Ok(());
    }
    tx.set_element_kind(block, ElementKind::Code { language: None })?;
    tx.remove(key)?;
    debug!(?block, "code fence converted");
    Ok(())
}

/// Headings hold plain, unformatted text only
fn clean_heading(editor: &mut Editor, key: NodeKey) -> EditorResult<()> {
    let tx = editor.tx()?;
    for child in tx.store().children(key).to_vec() {
        if tx.store().get(child).is_some_and(|node| node.is_text()) {
            tx.set_format(child, TextFormat::empty())?;
        } else {
            tx.remove(child)?;
        }
    }
    Ok(())
}

/// Keep a paragraph after a trailing decorator or code block so the caret
/// has somewhere to go
fn paragraph_at_end(editor: &mut Editor, key: NodeKey) -> EditorResult<()> {
    let tx = editor.tx()?;
    let Some(&last) = tx.store().children(key).last() else {
        return Ok(());
    };
    let needs_paragraph = tx
        .store()
        .get(last)
        .is_some_and(|node| node.is_decorator() || node.kind() == NodeKind::Code);
    if needs_paragraph {
        tx.append(key, NodeData::paragraph())?;
    }
    Ok(())
}
