//! # Persisted Format
//!
//! JSON document `{ "root": { "type": "root", "children": [...] } }`. Every
//! node record carries `type` and `version`; optional fields default when
//! absent. Image `width`/`height` of `0` mean "inherit".
//!
//! ```json
//! { "root": { "type": "root", "version": 1, "children": [
//!     { "type": "paragraph", "version": 1, "children": [
//!         { "type": "text", "version": 1, "text": "hi", "format": 1 }
//!     ] }
//! ] } }
//! ```

use crate::errors::{EditorError, EditorResult};
use crate::node::{
    DecoratorNode, ElementAttrs, ElementKind, ElementNode, EquationPayload, HeadingTag,
    ImagePayload, ListType, NodeData, NodeKey, TextFormat, TextNode, TextVariant,
};
use crate::store::NodeStore;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedState {
    pub root: SerializedNode,
}

fn default_version() -> u32 {
    1
}

fn default_one() -> u32 {
    1
}

fn default_mode() -> String {
    "normal".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementFields {
    #[serde(default)]
    pub children: Vec<SerializedNode>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub indent: u32,
    #[serde(default = "default_version")]
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFields {
    #[serde(default)]
    pub detail: u32,
    #[serde(default)]
    pub format: u32,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_version")]
    pub version: u32,
}

/// One node record, tagged by its persisted type name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SerializedNode {
    #[serde(rename = "root")]
    Root(ElementFields),
    #[serde(rename = "paragraph")]
    Paragraph(ElementFields),
    #[serde(rename = "heading")]
    Heading {
        #[serde(flatten)]
        element: ElementFields,
        tag: HeadingTag,
    },
    #[serde(rename = "quote")]
    Quote(ElementFields),
    #[serde(rename = "code")]
    Code {
        #[serde(flatten)]
        element: ElementFields,
        #[serde(default)]
        language: Option<String>,
    },
    #[serde(rename = "list")]
    List {
        #[serde(flatten)]
        element: ElementFields,
        #[serde(rename = "listType")]
        list_type: ListType,
        #[serde(default = "default_one")]
        start: u32,
        /// Derived from the list type; ignored on import
        #[serde(default)]
        tag: Option<String>,
    },
    #[serde(rename = "listitem")]
    ListItem {
        #[serde(flatten)]
        element: ElementFields,
        #[serde(default = "default_one")]
        value: u32,
        #[serde(default)]
        checked: Option<bool>,
    },
    #[serde(rename = "link")]
    Link {
        #[serde(flatten)]
        element: ElementFields,
        url: String,
        #[serde(default)]
        rel: Option<String>,
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
    #[serde(rename = "text")]
    Text(TextFields),
    #[serde(rename = "autocomplete")]
    Autocomplete(TextFields),
    #[serde(rename = "code-highlight")]
    CodeHighlight {
        #[serde(flatten)]
        text: TextFields,
        #[serde(rename = "highlightType", default)]
        highlight_type: Option<String>,
    },
    #[serde(rename = "image")]
    Image {
        #[serde(rename = "altText", default)]
        alt_text: String,
        #[serde(default)]
        height: u32,
        #[serde(rename = "maxWidth", default)]
        max_width: Option<u32>,
        src: String,
        #[serde(default)]
        width: u32,
        #[serde(default)]
        caption: Option<String>,
        #[serde(default = "default_version")]
        version: u32,
    },
    #[serde(rename = "equation")]
    Equation {
        equation: String,
        #[serde(default)]
        inline: bool,
        #[serde(default = "default_version")]
        version: u32,
    },
    #[serde(rename = "horizontal-divider")]
    HorizontalDivider {
        #[serde(default = "default_version")]
        version: u32,
    },
}

/// Parse a persisted document into a store with keys allocated from zero
pub fn parse_state(json: &str) -> EditorResult<NodeStore> {
    let state = parse_serialized(json)?;
    let mut next_key = 0;
    build_store(&state, &mut next_key)
}

pub(crate) fn parse_serialized(json: &str) -> EditorResult<SerializedState> {
    serde_json::from_str(json).map_err(|err| EditorError::MalformedImport(err.to_string()))
}

/// Build a store from a parsed document, allocating keys from `next_key`
pub(crate) fn build_store(state: &SerializedState, next_key: &mut u64) -> EditorResult<NodeStore> {
    let SerializedNode::Root(root) = &state.root else {
        return Err(EditorError::MalformedImport(
            "top-level node must be of type root".to_string(),
        ));
    };

    let root_key = allocate(next_key);
    let mut store = NodeStore::with_root(root_key);
    store.set_data(
        root_key,
        NodeData::Root {
            children: Vec::new(),
            attrs: attrs_from(root),
        },
    )?;
    for child in &root.children {
        insert_serialized(&mut store, child, root_key, next_key)?;
    }
    store.check_integrity()?;
    Ok(store)
}

fn allocate(next_key: &mut u64) -> NodeKey {
    let key = NodeKey(*next_key);
    *next_key += 1;
    key
}

fn insert_serialized(
    store: &mut NodeStore,
    node: &SerializedNode,
    parent: NodeKey,
    next_key: &mut u64,
) -> EditorResult<()> {
    let (data, children) = node_data(node)?;
    let key = allocate(next_key);
    store
        .insert(key, data, parent, usize::MAX)
        .map_err(|err| EditorError::MalformedImport(err.to_string()))?;
    for child in children {
        insert_serialized(store, child, key, next_key)?;
    }
    Ok(())
}

fn attrs_from(element: &ElementFields) -> ElementAttrs {
    ElementAttrs {
        format: element.format.clone(),
        indent: element.indent,
        direction: element.direction.clone(),
    }
}

fn element(kind: ElementKind, fields: &ElementFields) -> (NodeData, &[SerializedNode]) {
    (
        NodeData::Element(ElementNode {
            kind,
            children: Vec::new(),
            attrs: attrs_from(fields),
        }),
        &fields.children,
    )
}

fn text(fields: &TextFields, variant: TextVariant) -> EditorResult<TextNode> {
    let format = TextFormat::from_bits(fields.format).ok_or_else(|| {
        EditorError::MalformedImport(format!("unknown text format bits {:#x}", fields.format))
    })?;
    Ok(TextNode {
        text: fields.text.clone(),
        format,
        style: fields.style.clone(),
        mode: fields.mode.clone(),
        detail: fields.detail,
        variant,
    })
}


fn node_data(node: &SerializedNode) -> EditorResult<(NodeData, &[SerializedNode])> {
    let converted = match node {
        SerializedNode::Root(_) => {
            return Err(EditorError::MalformedImport(
                "root node nested inside the document".to_string(),
            ))
        }
        SerializedNode::Paragraph(fields) => element(ElementKind::Paragraph, fields),
        SerializedNode::Heading { element: fields, tag } => element(ElementKind::Heading(*tag), fields),
        SerializedNode::Quote(fields) => element(ElementKind::Quote, fields),
        SerializedNode::Code {
            element: fields,
            language,
        } => element(
            ElementKind::Code {
                language: language.clone(),
            },
            fields,
        ),
        SerializedNode::List {
            element: fields,
            list_type,
            start,
            ..
        } => element(
            ElementKind::List {
                list_type: *list_type,
                start: *start,
            },
            fields,
        ),
        SerializedNode::ListItem {
            element: fields,
            value,
            checked,
        } => element(
            ElementKind::ListItem {
                value: *value,
                checked: *checked,
            },
            fields,
        ),
        SerializedNode::Link {
            element: fields,
            url,
            rel,
            target,
            title,
        } => element(
            ElementKind::Link {
                url: url.clone(),
                rel: rel.clone(),
                target: target.clone(),
                title: title.clone(),
            },
            fields,
        ),
        SerializedNode::Text(fields) => (NodeData::Text(text(fields, TextVariant::Plain)?), &[][..]),
        SerializedNode::Autocomplete(fields) => {
            (NodeData::Text(text(fields, TextVariant::Autocomplete)?), &[][..])
        }
        SerializedNode::CodeHighlight {
            text: fields,
            highlight_type,
        } => (
            NodeData::Text(text(
                fields,
                TextVariant::CodeHighlight {
                    highlight_type: highlight_type.clone(),
                },
            )?),
            &[][..],
        ),
        SerializedNode::Image {
            alt_text,
            height,
            max_width,
            src,
            width,
            caption,
            ..
        } => (
            NodeData::Decorator(DecoratorNode::Image(ImagePayload {
                src: src.clone(),
                alt_text: alt_text.clone(),
                width: NonZeroU32::new(*width),
                height: NonZeroU32::new(*height),
                max_width: *max_width,
                caption: caption.clone(),
            })),
            &[][..],
        ),
        SerializedNode::Equation {
            equation, inline, ..
        } => (
            NodeData::Decorator(DecoratorNode::Equation(EquationPayload {
                equation: equation.clone(),
                inline: *inline,
            })),
            &[][..],
        ),
        SerializedNode::HorizontalDivider { .. } => {
            (NodeData::Decorator(DecoratorNode::HorizontalDivider), &[][..])
        }
    };
    Ok(converted)
}

/// Serialize a whole store
pub fn serialize_store(store: &NodeStore) -> EditorResult<String> {
    let state = to_serialized_state(store)?;
    serde_json::to_string(&state).map_err(|err| EditorError::InvariantViolation(err.to_string()))
}

pub fn to_serialized_state(store: &NodeStore) -> EditorResult<SerializedState> {
    Ok(SerializedState {
        root: to_serialized(store, store.root())?,
    })
}

fn element_fields(store: &NodeStore, attrs: &ElementAttrs, children: &[NodeKey]) -> EditorResult<ElementFields> {
    Ok(ElementFields {
        children: children
            .iter()
            .map(|&child| to_serialized(store, child))
            .collect::<EditorResult<Vec<_>>>()?,
        direction: attrs.direction.clone(),
        format: attrs.format.clone(),
        indent: attrs.indent,
        version: 1,
    })
}

fn text_fields(node: &TextNode) -> TextFields {
    TextFields {
        detail: node.detail,
        format: node.format.bits(),
        mode: node.mode.clone(),
        style: node.style.clone(),
        text: node.text.clone(),
        version: 1,
    }
}

/// Serialize the subtree rooted at `key`
pub fn to_serialized(store: &NodeStore, key: NodeKey) -> EditorResult<SerializedNode> {
    let node = store.node(key)?;
    let serialized = match node.data() {
        NodeData::Root { children, attrs } => {
            SerializedNode::Root(element_fields(store, attrs, children)?)
        }
        NodeData::Element(ElementNode {
            kind,
            children,
            attrs,
        }) => {
            let fields = element_fields(store, attrs, children)?;
            match kind {
                ElementKind::Paragraph => SerializedNode::Paragraph(fields),
                ElementKind::Heading(tag) => SerializedNode::Heading {
                    element: fields,
                    tag: *tag,
                },
                ElementKind::Quote => SerializedNode::Quote(fields),
                ElementKind::Code { language } => SerializedNode::Code {
                    element: fields,
                    language: language.clone(),
                },
                ElementKind::List { list_type, start } => SerializedNode::List {
                    element: fields,
                    list_type: *list_type,
                    start: *start,
                    tag: Some(list_type.tag().to_string()),
                },
                ElementKind::ListItem { value, checked } => SerializedNode::ListItem {
                    element: fields,
                    value: *value,
                    checked: *checked,
                },
                ElementKind::Link {
                    url,
                    rel,
                    target,
                    title,
                } => SerializedNode::Link {
                    element: fields,
                    url: url.clone(),
                    rel: rel.clone(),
                    target: target.clone(),
                    title: title.clone(),
                },
            }
        }
        NodeData::Text(text) => match &text.variant {
            TextVariant::Plain => SerializedNode::Text(text_fields(text)),
            TextVariant::Autocomplete => SerializedNode::Autocomplete(text_fields(text)),
            TextVariant::CodeHighlight { highlight_type } => SerializedNode::CodeHighlight {
                text: text_fields(text),
                highlight_type: highlight_type.clone(),
            },
        },
        NodeData::Decorator(DecoratorNode::Image(image)) => SerializedNode::Image {
            alt_text: image.alt_text.clone(),
            height: image.height.map_or(0, NonZeroU32::get),
            max_width: image.max_width,
            src: image.src.clone(),
            width: image.width.map_or(0, NonZeroU32::get),
            caption: image.caption.clone(),
            version: 1,
        },
        NodeData::Decorator(DecoratorNode::Equation(equation)) => SerializedNode::Equation {
            equation: equation.equation.clone(),
            inline: equation.inline,
            version: 1,
        },
        NodeData::Decorator(DecoratorNode::HorizontalDivider) => {
            SerializedNode::HorizontalDivider { version: 1 }
        }
    };
    Ok(serialized)
}
