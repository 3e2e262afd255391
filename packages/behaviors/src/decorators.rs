//! Inserting and deleting decorator nodes (dividers, images, equations)

use crate::behavior::Behavior;
use scribe_editor::{
    CommandKey, CommandPriority, DecoratorNode, Editor, EditorError, EditorResult, EquationPayload,
    ImagePayload, NodeData, NodeKey, NodeKind, PointType, Propagation, Registration, Selection,
    Transaction, KEY_BACKSPACE, KEY_DELETE,
};
use tracing::debug;

pub const INSERT_HORIZONTAL_DIVIDER: CommandKey<()> = CommandKey::new("INSERT_HORIZONTAL_DIVIDER");
pub const INSERT_IMAGE: CommandKey<ImagePayload> = CommandKey::new("INSERT_IMAGE");
pub const INSERT_EQUATION: CommandKey<EquationPayload> = CommandKey::new("INSERT_EQUATION");
pub const UPDATE_EQUATION: CommandKey<EquationUpdate> = CommandKey::new("UPDATE_EQUATION");

/// New source and display mode for an existing equation node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquationUpdate {
    pub key: NodeKey,
    pub equation: String,
    pub inline: bool,
}

pub struct Decorators;

impl Behavior for Decorators {
    fn name(&self) -> &'static str {
        "decorators"
    }

    fn install(&self, editor: &mut Editor) -> Vec<Registration> {
        vec![
            editor
                .register_command(INSERT_HORIZONTAL_DIVIDER, CommandPriority::Editor, |editor, _| {
                    editor.update(insert_divider)
                })
                .into(),
            editor
                .register_command(INSERT_IMAGE, CommandPriority::Editor, |editor, image| {
                    let data = NodeData::Decorator(DecoratorNode::Image(image.clone()));
                    editor.update(|editor| insert_block(editor.tx()?, data).map(handled))
                })
                .into(),
            editor
                .register_command(INSERT_EQUATION, CommandPriority::Editor, |editor, equation| {
                    let equation = equation.clone();
                    editor.update(|editor| insert_equation(editor.tx()?, equation))
                })
                .into(),
            editor
                .register_command(UPDATE_EQUATION, CommandPriority::Editor, |editor, update| {
                    let update = update.clone();
                    editor.update(|editor| update_equation(editor.tx()?, update))
                })
                .into(),
            editor
                .register_command(KEY_BACKSPACE, CommandPriority::High, |editor, _| {
                    editor.update(select_preceding_decorator)
                })
                .into(),
            editor
                .register_command(KEY_BACKSPACE, CommandPriority::Low, |editor, _| {
                    editor.update(delete_selected_decorators)
                })
                .into(),
            editor
                .register_command(KEY_DELETE, CommandPriority::Low, |editor, _| {
                    editor.update(delete_selected_decorators)
                })
                .into(),
        ]
    }
}

fn handled(inserted: Option<NodeKey>) -> Propagation {
    if inserted.is_some() {
        Propagation::Stop
    } else {
        Propagation::Continue
    }
}

/// Insert `data` as a top-level block right after the block holding the
/// focus. Needs a range selection.
fn insert_block(tx: &mut Transaction, data: NodeData) -> EditorResult<Option<NodeKey>> {
    let Some(range) = tx.selection().as_range() else {
        return Ok(None);
    };
    let focus = range.focus;
    let root = tx.store().root();
    let key = if focus.key == root {
        tx.insert(data, root, focus.offset)?
    } else {
        match tx.store().top_level_element(focus.key) {
            Some(block) => tx.insert_after(block, data)?,
            None => tx.append(root, data)?,
        }
    };
    Ok(Some(key))
}

fn insert_divider(editor: &mut Editor) -> EditorResult<Propagation> {
    let tx = editor.tx()?;
    let Some(divider) = insert_block(tx, NodeData::Decorator(DecoratorNode::HorizontalDivider))?
    else {
        return Ok(Propagation::Continue);
    };
    if let Some(next) = tx.store().next_sibling(divider) {
        let empty_paragraph = tx.store().kind(next) == Some(NodeKind::Paragraph)
            && tx.store().text_content(next).is_empty();
        if empty_paragraph {
            tx.remove(next)?;
        }
    }
    Ok(Propagation::Stop)
}

/// Inline equations go at the caret, splitting the text it sits in; block
/// equations become their own top-level block
fn insert_equation(tx: &mut Transaction, equation: EquationPayload) -> EditorResult<Propagation> {
    let inline = equation.inline;
    let data = NodeData::Decorator(DecoratorNode::Equation(equation));
    if !inline {
        return Ok(handled(insert_block(tx, data)?));
    }
    let Some(point) = tx.selection().caret_point() else {
        return Ok(Propagation::Continue);
    };

    let key = match point.kind {
        PointType::Text => {
            let size = tx.store().content_size(point.key);
            if point.offset == 0 {
                tx.insert_before(point.key, data)?
            } else if point.offset >= size {
                tx.insert_after(point.key, data)?
            } else {
                let pieces = tx.split_text(point.key, &[point.offset])?;
                tx.insert_after(pieces[0], data)?
            }
        }
        PointType::Element if point.key == tx.store().root() => {
            let paragraph = tx.insert(NodeData::paragraph(), point.key, point.offset)?;
            tx.append(paragraph, data)?
        }
        PointType::Element => tx.insert(data, point.key, point.offset)?,
    };

    match tx.store().next_sibling(key) {
        Some(next) if tx.store().get(next).is_some_and(|node| node.is_text()) => {
            tx.select_start(next)
        }
        _ => tx.select_end(key),
    }
    Ok(Propagation::Stop)
}

fn update_equation(tx: &mut Transaction, update: EquationUpdate) -> EditorResult<Propagation> {
    if tx.store().kind(update.key) != Some(NodeKind::Equation) {
        return Err(EditorError::InvariantViolation(format!(
            "{} is not an equation",
            update.key
        )));
    }
    tx.set_decorator(update.key, DecoratorNode::equation(update.equation, update.inline))?;
    Ok(Propagation::Stop)
}

/// Backspace at the very start of a text run right after an equation or
/// image selects that decorator instead of deleting anything
fn select_preceding_decorator(editor: &mut Editor) -> EditorResult<Propagation> {
    let tx = editor.tx()?;
    let Some(point) = tx.selection().caret_point() else {
        return Ok(Propagation::Continue);
    };
    if point.kind != PointType::Text || point.offset != 0 {
        return Ok(Propagation::Continue);
    }
    let store = tx.store();
    let previous = store.previous_sibling(point.key).or_else(|| {
        store
            .parent(point.key)
            .and_then(|parent| store.previous_sibling(parent))
    });
    let Some(previous) = previous else {
        return Ok(Propagation::Continue);
    };
    if !matches!(
        store.kind(previous),
        Some(NodeKind::Equation) | Some(NodeKind::Image)
    ) {
        return Ok(Propagation::Continue);
    }
    tx.select_nodes([previous]);
    Ok(Propagation::Stop)
}

/// Remove node-selected decorators and move the caret to the nearest
/// surviving neighbor of the first one
fn delete_selected_decorators(editor: &mut Editor) -> EditorResult<Propagation> {
    let tx = editor.tx()?;
    let Selection::Node(keys) = tx.selection().clone() else {
        return Ok(Propagation::Continue);
    };
    let store = tx.store();
    let decorators: Vec<NodeKey> = keys
        .into_iter()
        .filter(|&key| store.get(key).is_some_and(|node| node.is_decorator()))
        .collect();
    let Some(&first) = decorators.first() else {
        return Ok(Propagation::Continue);
    };

    let is_content = |key: &NodeKey| {
        !decorators.contains(key) && store.get(*key).is_some_and(|node| !node.is_decorator())
    };
    let previous = store.previous_siblings(first).into_iter().rev().find(is_content);
    let next = store.next_siblings(first).into_iter().find(is_content);
    let parent = store.parent(first);

    match (previous, next, parent) {
        (Some(previous), _, _) => tx.select_end(previous),
        (None, Some(next), _) => tx.select_start(next),
        (None, None, Some(parent)) => tx.select_end(parent),
        (None, None, None) => tx.set_selection(Selection::None),
    }
    for &key in &decorators {
        tx.remove(key)?;
    }
    debug!(removed = decorators.len(), "deleted selected decorators");
    Ok(Propagation::Stop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_editor::{Point, RangeSelection};

    fn with_paragraphs(texts: &[&str]) -> (Editor, Vec<NodeKey>) {
        let mut editor = Editor::default();
        Decorators.install(&mut editor);
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let keys = editor
            .update(|editor| {
                let tx = editor.tx()?;
                let root = tx.store().root();
                let mut keys = Vec::new();
                for text in texts {
                    let paragraph = tx.append(root, NodeData::paragraph())?;
                    keys.push(tx.append(paragraph, NodeData::text(text))?);
                }
                Ok(keys)
            })
            .unwrap();
        (editor, keys)
    }

    #[test]
    fn test_divider_goes_after_focus_block_and_eats_empty_paragraph() {
        let mut editor = Editor::default();
        Decorators.install(&mut editor);
        let (first, empty) = editor
            .update(|editor| {
                let tx = editor.tx()?;
                let root = tx.store().root();
                let first = tx.append(root, NodeData::paragraph())?;
                let text = tx.append(first, NodeData::text("above"))?;
                let empty = tx.append(root, NodeData::paragraph())?;
                tx.set_selection(Selection::caret(text, 5));
                Ok((first, empty))
            })
            .unwrap();

        assert!(editor.dispatch(INSERT_HORIZONTAL_DIVIDER, &()).unwrap());
        let root = editor.store().root();
        let children = editor.store().children(root).to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], first);
        assert_eq!(editor.store().kind(children[1]), Some(NodeKind::HorizontalDivider));
        assert!(!editor.store().contains(empty));
    }

    #[test]
    fn test_inline_equation_splits_text_at_caret() {
        let (mut editor, keys) = with_paragraphs(&["ab"]);
        editor.select(Selection::caret(keys[0], 1)).unwrap();
        let payload = EquationPayload {
            equation: "x".to_string(),
            inline: true,
        };
        editor.dispatch(INSERT_EQUATION, &payload).unwrap();

        let paragraph = editor.store().parent(keys[0]).unwrap();
        let kinds: Vec<_> = editor
            .store()
            .children(paragraph)
            .iter()
            .map(|&k| editor.store().kind(k).unwrap())
            .collect();
        assert_eq!(kinds, vec![NodeKind::Text, NodeKind::Equation, NodeKind::Text]);
        let after = editor.store().children(paragraph)[2];
        assert_eq!(editor.selection(), &Selection::caret(after, 0));
    }

    #[test]
    fn test_image_becomes_top_level_block() {
        let (mut editor, keys) = with_paragraphs(&["one", "two"]);
        editor.select(Selection::caret(keys[0], 1)).unwrap();
        editor
            .dispatch(INSERT_IMAGE, &ImagePayload::new("cat.png"))
            .unwrap();
        let root = editor.store().root();
        let second = editor.store().children(root)[1];
        assert_eq!(editor.store().kind(second), Some(NodeKind::Image));
    }

    #[test]
    fn test_delete_selected_divider_moves_caret_to_previous_block() {
        let (mut editor, keys) = with_paragraphs(&["one", "two"]);
        let first_block = editor.store().parent(keys[0]).unwrap();
        editor.select(Selection::caret(keys[0], 3)).unwrap();
        editor.dispatch(INSERT_HORIZONTAL_DIVIDER, &()).unwrap();
        let root = editor.store().root();
        let divider = editor.store().children(root)[1];

        editor.select(Selection::nodes([divider])).unwrap();
        assert!(editor.dispatch(KEY_DELETE, &()).unwrap());
        assert!(!editor.store().contains(divider));
        assert_eq!(
            editor.selection(),
            &Selection::Range(RangeSelection::collapsed(Point::element(first_block, 1)))
        );
    }

    #[test]
    fn test_delete_first_divider_moves_caret_to_next_block() {
        let mut editor = Editor::default();
        Decorators.install(&mut editor);
        let (divider, text) = editor
            .update(|editor| {
                let tx = editor.tx()?;
                let root = tx.store().root();
                let divider =
                    tx.append(root, NodeData::Decorator(DecoratorNode::HorizontalDivider))?;
                let paragraph = tx.append(root, NodeData::paragraph())?;
                let text = tx.append(paragraph, NodeData::text("below"))?;
                tx.select_nodes([divider]);
                Ok((divider, text))
            })
            .unwrap();
        let paragraph = editor.store().parent(text).unwrap();

        editor.dispatch(KEY_BACKSPACE, &()).unwrap();
        assert!(!editor.store().contains(divider));
        assert_eq!(
            editor.selection(),
            &Selection::Range(RangeSelection::collapsed(Point::element(paragraph, 0)))
        );
    }

    #[test]
    fn test_backspace_after_equation_selects_it() {
        let (mut editor, keys) = with_paragraphs(&["ab"]);
        editor.select(Selection::caret(keys[0], 1)).unwrap();
        let payload = EquationPayload {
            equation: "x".to_string(),
            inline: true,
        };
        editor.dispatch(INSERT_EQUATION, &payload).unwrap();
        let paragraph = editor.store().parent(keys[0]).unwrap();
        let equation = editor.store().children(paragraph)[1];

        assert!(editor.dispatch(KEY_BACKSPACE, &()).unwrap());
        assert_eq!(editor.selection(), &Selection::nodes([equation]));

        // A second backspace deletes it
        editor.dispatch(KEY_BACKSPACE, &()).unwrap();
        assert!(!editor.store().contains(equation));
        assert_eq!(editor.text_content(), "ab");
    }

    #[test]
    fn test_update_equation_rewrites_source() {
        let (mut editor, keys) = with_paragraphs(&["ab"]);
        editor.select(Selection::caret(keys[0], 1)).unwrap();
        let payload = EquationPayload {
            equation: "x".to_string(),
            inline: true,
        };
        editor.dispatch(INSERT_EQUATION, &payload).unwrap();
        let paragraph = editor.store().parent(keys[0]).unwrap();
        let equation = editor.store().children(paragraph)[1];

        let update = EquationUpdate {
            key: equation,
            equation: "y^2".to_string(),
            inline: true,
        };
        assert!(editor.dispatch(UPDATE_EQUATION, &update).unwrap());
        let node = editor.store().get(equation).unwrap();
        assert_eq!(
            node.data(),
            &NodeData::Decorator(DecoratorNode::equation("y^2", true))
        );
        assert_eq!(editor.text_content(), "ay^2b");
    }

    #[test]
    fn test_update_equation_rejects_other_nodes() {
        let (mut editor, keys) = with_paragraphs(&["ab"]);
        let update = EquationUpdate {
            key: keys[0],
            equation: "y".to_string(),
            inline: true,
        };
        let err = editor.dispatch(UPDATE_EQUATION, &update).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(editor.text_content(), "ab");
    }
}
