//! Turns `$…$` (inline) and `$$…$$` (block) typed into text into equation
//! nodes.

use crate::behavior::Behavior;
use once_cell::sync::Lazy;
use regex::Regex;
use scribe_editor::text::utf16_offset;
use scribe_editor::{
    DecoratorNode, Editor, EditorResult, NodeData, NodeKey, NodeKind, Registration, StoreError,
    TextNode,
};
use tracing::debug;

static INLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[^$]+\$").expect("inline pattern"));
static BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$[^$]+\$\$").expect("block pattern"));

pub struct EquationDetection;

impl Behavior for EquationDetection {
    fn name(&self) -> &'static str {
        "equation-detection"
    }

    fn install(&self, editor: &mut Editor) -> Vec<Registration> {
        vec![editor.register_transform(NodeKind::Text, detect_equation).into()]
    }
}

/// Byte range of a delimited equation and whether it is inline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EquationMatch {
    start: usize,
    end: usize,
    inline: bool,
}

impl EquationMatch {
    fn body<'a>(&self, text: &'a str) -> &'a str {
        let delimiter = if self.inline { 1 } else { 2 };
        &text[self.start + delimiter..self.end - delimiter]
    }
}

/// The first inline match wins unless another `$` touches it, in which case
/// only a block match is considered
fn find_equation(text: &str) -> Option<EquationMatch> {
    if !text.contains('$') {
        return None;
    }
    if let Some(found) = INLINE.find(text) {
        let bytes = text.as_bytes();
        let touches_before = found.start() > 0 && bytes[found.start() - 1] == b'$';
        let touches_after = found.end() < bytes.len() && bytes[found.end()] == b'$';
        if !touches_before && !touches_after {
            return Some(EquationMatch {
                start: found.start(),
                end: found.end(),
                inline: true,
            });
        }
    }
    BLOCK.find(text).map(|found| EquationMatch {
        start: found.start(),
        end: found.end(),
        inline: false,
    })
}

fn detect_equation(editor: &mut Editor, key: NodeKey) -> EditorResult<()> {
    let tx = editor.tx()?;
    let Some(text) = tx.store().text(key).map(|node| node.text.clone()) else {
        return Ok(());
    };
    let Some(found) = find_equation(&text) else {
        return Ok(());
    };
    let equation = found.body(&text).to_string();
    let start = utf16_offset(&text, found.start);
    let end = utf16_offset(&text, found.end);

    let pieces = tx.split_text(key, &[start, end])?;
    let matched = if start == 0 { pieces[0] } else { pieces[1] };
    let previous = tx.store().previous_sibling(matched);
    let parent = tx
        .store()
        .parent(matched)
        .ok_or(StoreError::NodeNotFound(matched))?;
    let index = tx
        .store()
        .index_in_parent(matched)
        .ok_or(StoreError::NodeNotFound(matched))?;

    // Removing the matched run hands a caret inside it to the run before
    let caret = tx.selection().caret_point().map(|point| point.key);
    let caret_before = previous.is_some() && (caret == previous || caret == Some(matched));

    tx.remove(matched)?;
    let node = tx.insert(
        NodeData::Decorator(DecoratorNode::equation(equation, found.inline)),
        parent,
        index,
    )?;
    debug!(?node, inline = found.inline, "equation detected");

    if caret_before {
        let next_text = tx
            .store()
            .next_sibling(node)
            .filter(|&next| tx.store().get(next).is_some_and(|n| n.is_text()));
        match next_text {
            Some(next) => tx.select_caret(next, 0),
            None => {
                let space = tx.insert_after(node, NodeData::Text(TextNode::new(" ")))?;
                tx.select_end(space);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_match() {
        let found = find_equation("area is $a^2$ now").unwrap();
        assert!(found.inline);
        assert_eq!(found.body("area is $a^2$ now"), "a^2");
    }

    #[test]
    fn test_double_dollar_is_a_block() {
        let text = "see $$x+1$$";
        let found = find_equation(text).unwrap();
        assert!(!found.inline);
        assert_eq!(found.body(text), "x+1");
    }

    #[test]
    fn test_unclosed_is_ignored() {
        assert_eq!(find_equation("costs $5"), None);
        assert_eq!(find_equation("plain"), None);
    }

    #[test]
    fn test_offsets_count_utf16_units() {
        let mut editor = Editor::default();
        EquationDetection.install(&mut editor);
        let paragraph = editor
            .update(|editor| {
                let tx = editor.tx()?;
                let root = tx.store().root();
                let paragraph = tx.append(root, NodeData::paragraph())?;
                tx.append(paragraph, NodeData::text("😀 $x$ y"))?;
                Ok(paragraph)
            })
            .unwrap();
        let children = editor.store().children(paragraph).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(editor.store().text(children[0]).unwrap().text, "😀 ");
        assert_eq!(editor.store().kind(children[1]), Some(NodeKind::Equation));
        assert_eq!(editor.store().text(children[2]).unwrap().text, " y");
    }
}
