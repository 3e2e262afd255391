//! Link toggling

use crate::behavior::Behavior;
use crate::query::{selected_node, text_spans};
use scribe_editor::{
    CommandKey, CommandPriority, Editor, EditorResult, ElementKind, NodeData, NodeKey, NodeKind,
    NodeStore, Point, Propagation, RangeSelection, Registration, Selection, StoreError,
};
use tracing::debug;

/// `Some(url)` links the selected text, `None` unwraps enclosing links
pub const TOGGLE_LINK: CommandKey<Option<String>> = CommandKey::new("TOGGLE_LINK");

pub struct Links;

impl Behavior for Links {
    fn name(&self) -> &'static str {
        "links"
    }

    fn install(&self, editor: &mut Editor) -> Vec<Registration> {
        vec![editor
            .register_command(TOGGLE_LINK, CommandPriority::Editor, |editor, url| {
                editor.update(|editor| match url {
                    Some(url) => link_selection(editor, url),
                    None => unlink_selection(editor),
                })
            })
            .into()]
    }
}

fn enclosing_link(store: &NodeStore, key: NodeKey) -> Option<NodeKey> {
    store.find_ancestor(key, |node| node.kind() == NodeKind::Link)
}

fn set_url(editor: &mut Editor, link: NodeKey, url: &str) -> EditorResult<()> {
    editor.tx()?.update_element(link, |element| {
        if let ElementKind::Link { url: current, .. } = &mut element.kind {
            *current = url.to_string();
        }
    })?;
    Ok(())
}

fn link_selection(editor: &mut Editor, url: &str) -> EditorResult<Propagation> {
    let tx = editor.tx()?;
    let Some(range) = tx.selection().as_range().cloned() else {
        return Ok(Propagation::Continue);
    };

    if range.is_collapsed() {
        // A caret inside a link edits that link
        let link = selected_node(tx.store(), &range)
            .and_then(|key| enclosing_link(tx.store(), key));
        return match link {
            Some(link) => {
                set_url(editor, link, url)?;
                Ok(Propagation::Stop)
            }
            None => Ok(Propagation::Continue),
        };
    }

    let backward = range.is_backward(tx.store());
    let spans = text_spans(tx.store(), &range);
    if spans.is_empty() {
        return Ok(Propagation::Continue);
    }

    let mut pieces = Vec::with_capacity(spans.len());
    for span in &spans {
        let key = if span.is_whole() {
            span.key
        } else {
            let split = editor.tx()?.split_text(span.key, &[span.start, span.end])?;
            split
                .get(usize::from(span.start > 0))
                .copied()
                .unwrap_or(span.key)
        };
        pieces.push(key);
    }

    let mut last_link: Option<NodeKey> = None;
    for &piece in &pieces {
        let tx = editor.tx()?;
        if let Some(link) = enclosing_link(tx.store(), piece) {
            set_url(editor, link, url)?;
            last_link = Some(link);
            continue;
        }
        let previous = tx.store().previous_sibling(piece);
        let link = match (previous, last_link) {
            (Some(previous), Some(link)) if previous == link => link,
            _ => {
                let parent = tx
                    .store()
                    .parent(piece)
                    .ok_or(StoreError::NodeNotFound(piece))?;
                let index = tx.store().index_in_parent(piece).unwrap_or(0);
                tx.insert(NodeData::element(ElementKind::link(url)), parent, index)?
            }
        };
        tx.move_node(piece, link, usize::MAX)?;
        last_link = Some(link);
    }

    let tx = editor.tx()?;
    if let (Some(&first), Some(&last)) = (pieces.first(), pieces.last()) {
        let start = Point::text(first, 0);
        let end = Point::text(last, tx.store().content_size(last));
        tx.set_selection(Selection::Range(if backward {
            RangeSelection::new(end, start)
        } else {
            RangeSelection::new(start, end)
        }));
    }
    debug!(pieces = pieces.len(), "linked selection");
    Ok(Propagation::Stop)
}

/// Replace every link touched by the selection with its children
fn unlink_selection(editor: &mut Editor) -> EditorResult<Propagation> {
    let tx = editor.tx()?;
    let Some(range) = tx.selection().as_range().cloned() else {
        return Ok(Propagation::Continue);
    };
    let mut links = Vec::new();
    for key in range.nodes(tx.store()) {
        if let Some(link) = enclosing_link(tx.store(), key) {
            if !links.contains(&link) {
                links.push(link);
            }
        }
    }
    if links.is_empty() {
        return Ok(Propagation::Continue);
    }

    for link in links {
        let store = tx.store();
        let (Some(parent), Some(index)) = (store.parent(link), store.index_in_parent(link)) else {
            continue;
        };
        let children = store.children(link).to_vec();
        for (offset, child) in children.into_iter().enumerate() {
            tx.move_node(child, parent, index + offset)?;
        }
        tx.remove(link)?;
    }
    Ok(Propagation::Stop)
}
