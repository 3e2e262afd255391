//! # Node Model
//!
//! Nodes live in a flat arena ([`crate::NodeStore`]) and refer to each other
//! by [`NodeKey`]. The set of node kinds is closed: every kind maps to one
//! [`NodeClass`] and a capability row (persisted type name, whether it may
//! own children, whether it flows inline).
//!
//! ```text
//! Root ─┬─ Paragraph ─┬─ Text "area is "
//!       │             ├─ Equation a^2 (inline decorator)
//!       │             └─ Text " now"
//!       └─ HorizontalDivider (block decorator)
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Store-scoped node identifier. Never reused within one editor lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(pub(crate) u64);

impl NodeKey {
    /// Rebuild a key previously obtained from [`NodeKey::as_u64`]
    pub fn from_raw(value: u64) -> Self {
        NodeKey(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Behavioral class of a node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    Root,
    Element,
    Text,
    Decorator,
}

/// Closed set of node kinds known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Root,
    Paragraph,
    Heading,
    Quote,
    Code,
    List,
    ListItem,
    Link,
    Text,
    Autocomplete,
    CodeHighlight,
    Image,
    Equation,
    HorizontalDivider,
}

struct KindCapabilities {
    type_name: &'static str,
    class: NodeClass,
    inline: bool,
}

impl NodeKind {
    pub const ALL: [NodeKind; 14] = [
        NodeKind::Root,
        NodeKind::Paragraph,
        NodeKind::Heading,
        NodeKind::Quote,
        NodeKind::Code,
        NodeKind::List,
        NodeKind::ListItem,
        NodeKind::Link,
        NodeKind::Text,
        NodeKind::Autocomplete,
        NodeKind::CodeHighlight,
        NodeKind::Image,
        NodeKind::Equation,
        NodeKind::HorizontalDivider,
    ];

    fn capabilities(self) -> KindCapabilities {
        let (type_name, class, inline) = match self {
            NodeKind::Root => ("root", NodeClass::Root, false),
            NodeKind::Paragraph => ("paragraph", NodeClass::Element, false),
            NodeKind::Heading => ("heading", NodeClass::Element, false),
            NodeKind::Quote => ("quote", NodeClass::Element, false),
            NodeKind::Code => ("code", NodeClass::Element, false),
            NodeKind::List => ("list", NodeClass::Element, false),
            NodeKind::ListItem => ("listitem", NodeClass::Element, false),
            NodeKind::Link => ("link", NodeClass::Element, true),
            NodeKind::Text => ("text", NodeClass::Text, true),
            NodeKind::Autocomplete => ("autocomplete", NodeClass::Text, true),
            NodeKind::CodeHighlight => ("code-highlight", NodeClass::Text, true),
            NodeKind::Image => ("image", NodeClass::Decorator, false),
            NodeKind::Equation => ("equation", NodeClass::Decorator, true),
            NodeKind::HorizontalDivider => ("horizontal-divider", NodeClass::Decorator, false),
        };
        KindCapabilities {
            type_name,
            class,
            inline,
        }
    }

    /// Identifier used in the persisted format
    pub fn type_name(self) -> &'static str {
        self.capabilities().type_name
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        NodeKind::ALL.into_iter().find(|kind| kind.type_name() == name)
    }

    pub fn class(self) -> NodeClass {
        self.capabilities().class
    }

    pub fn can_have_children(self) -> bool {
        matches!(self.class(), NodeClass::Root | NodeClass::Element)
    }

    pub fn is_inline(self) -> bool {
        self.capabilities().inline
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

bitflags! {
    /// Inline text formats. Bit values match the persisted `format` field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextFormat: u32 {
        const BOLD = 1;
        const ITALIC = 1 << 1;
        const STRIKETHROUGH = 1 << 2;
        const UNDERLINE = 1 << 3;
        const CODE = 1 << 4;
        const SUBSCRIPT = 1 << 5;
        const SUPERSCRIPT = 1 << 6;
        const HIGHLIGHT = 1 << 7;
    }
}

/// Named format, as carried by the `FORMAT_TEXT` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormatType {
    Bold,
    Italic,
    Strikethrough,
    Underline,
    Code,
    Subscript,
    Superscript,
    Highlight,
}

impl TextFormatType {
    pub fn flag(self) -> TextFormat {
        match self {
            TextFormatType::Bold => TextFormat::BOLD,
            TextFormatType::Italic => TextFormat::ITALIC,
            TextFormatType::Strikethrough => TextFormat::STRIKETHROUGH,
            TextFormatType::Underline => TextFormat::UNDERLINE,
            TextFormatType::Code => TextFormat::CODE,
            TextFormatType::Subscript => TextFormat::SUBSCRIPT,
            TextFormatType::Superscript => TextFormat::SUPERSCRIPT,
            TextFormatType::Highlight => TextFormat::HIGHLIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeadingTag {
    #[serde(rename = "h1")]
    H1,
    #[serde(rename = "h2")]
    H2,
    #[serde(rename = "h3")]
    H3,
    #[serde(rename = "h4")]
    H4,
    #[serde(rename = "h5")]
    H5,
    #[serde(rename = "h6")]
    H6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Bullet,
    Number,
    Check,
}

impl ListType {
    pub fn tag(self) -> &'static str {
        match self {
            ListType::Number => "ol",
            ListType::Bullet | ListType::Check => "ul",
        }
    }
}

/// Block or inline container variant carried by an element node
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Paragraph,
    Heading(HeadingTag),
    Quote,
    Code {
        language: Option<String>,
    },
    List {
        list_type: ListType,
        start: u32,
    },
    ListItem {
        value: u32,
        checked: Option<bool>,
    },
    Link {
        url: String,
        rel: Option<String>,
        target: Option<String>,
        title: Option<String>,
    },
}

impl ElementKind {
    pub fn node_kind(&self) -> NodeKind {
        match self {
            ElementKind::Paragraph => NodeKind::Paragraph,
            ElementKind::Heading(_) => NodeKind::Heading,
            ElementKind::Quote => NodeKind::Quote,
            ElementKind::Code { .. } => NodeKind::Code,
            ElementKind::List { .. } => NodeKind::List,
            ElementKind::ListItem { .. } => NodeKind::ListItem,
            ElementKind::Link { .. } => NodeKind::Link,
        }
    }

    pub fn link(url: impl Into<String>) -> Self {
        ElementKind::Link {
            url: url.into(),
            rel: None,
            target: None,
            title: None,
        }
    }
}

/// Layout attributes shared by root and element nodes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementAttrs {
    /// Alignment (`""`, `"left"`, `"center"`, ...)
    pub format: String,
    pub indent: u32,
    pub direction: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub kind: ElementKind,
    pub children: Vec<NodeKey>,
    pub attrs: ElementAttrs,
}

/// Flavor of a text node
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TextVariant {
    #[default]
    Plain,
    /// Ghost suggestion that has not been accepted yet
    Autocomplete,
    CodeHighlight {
        highlight_type: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub format: TextFormat,
    pub style: String,
    pub mode: String,
    pub detail: u32,
    pub variant: TextVariant,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::empty(),
            style: String::new(),
            mode: "normal".to_string(),
            detail: 0,
            variant: TextVariant::Plain,
        }
    }

    pub fn autocomplete(text: impl Into<String>) -> Self {
        Self {
            variant: TextVariant::Autocomplete,
            ..Self::new(text)
        }
    }

    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }

    pub fn has_format(&self, format: TextFormat) -> bool {
        self.format.contains(format)
    }

    /// A copy carrying the same formatting with different content
    pub fn sibling_with(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub src: String,
    pub alt_text: String,
    /// `None` renders at the inherited size; a zero size is not representable
    pub width: Option<NonZeroU32>,
    pub height: Option<NonZeroU32>,
    pub max_width: Option<u32>,
    pub caption: Option<String>,
}

impl ImagePayload {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt_text: String::new(),
            width: None,
            height: None,
            max_width: None,
            caption: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationPayload {
    pub equation: String,
    pub inline: bool,
}

/// Opaque leaf payload rendered outside the engine
#[derive(Debug, Clone, PartialEq)]
pub enum DecoratorNode {
    Image(ImagePayload),
    Equation(EquationPayload),
    HorizontalDivider,
}

impl DecoratorNode {
    pub fn node_kind(&self) -> NodeKind {
        match self {
            DecoratorNode::Image(_) => NodeKind::Image,
            DecoratorNode::Equation(_) => NodeKind::Equation,
            DecoratorNode::HorizontalDivider => NodeKind::HorizontalDivider,
        }
    }

    pub fn equation(equation: impl Into<String>, inline: bool) -> Self {
        DecoratorNode::Equation(EquationPayload {
            equation: equation.into(),
            inline,
        })
    }
}

/// Kind-specific node data
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Root {
        children: Vec<NodeKey>,
        attrs: ElementAttrs,
    },
    Element(ElementNode),
    Text(TextNode),
    Decorator(DecoratorNode),
}

impl NodeData {
    pub fn element(kind: ElementKind) -> Self {
        NodeData::Element(ElementNode {
            kind,
            children: Vec::new(),
            attrs: ElementAttrs::default(),
        })
    }

    pub fn paragraph() -> Self {
        Self::element(ElementKind::Paragraph)
    }

    pub fn text(text: impl Into<String>) -> Self {
        NodeData::Text(TextNode::new(text))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Root { .. } => NodeKind::Root,
            NodeData::Element(element) => element.kind.node_kind(),
            NodeData::Text(text) => match text.variant {
                TextVariant::Plain => NodeKind::Text,
                TextVariant::Autocomplete => NodeKind::Autocomplete,
                TextVariant::CodeHighlight { .. } => NodeKind::CodeHighlight,
            },
            NodeData::Decorator(decorator) => decorator.node_kind(),
        }
    }

    pub fn children(&self) -> &[NodeKey] {
        match self {
            NodeData::Root { children, .. } => children,
            NodeData::Element(element) => &element.children,
            NodeData::Text(_) | NodeData::Decorator(_) => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeKey>> {
        match self {
            NodeData::Root { children, .. } => Some(children),
            NodeData::Element(element) => Some(&mut element.children),
            NodeData::Text(_) | NodeData::Decorator(_) => None,
        }
    }

    /// Same value with the child list emptied
    pub(crate) fn without_children(&self) -> NodeData {
        let mut data = self.clone();
        if let Some(children) = data.children_mut() {
            children.clear();
        }
        data
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) key: NodeKey,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) data: NodeData,
}

impl Node {
    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn class(&self) -> NodeClass {
        self.kind().class()
    }

    pub fn children(&self) -> &[NodeKey] {
        self.data.children()
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match &self.data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match &self.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_decorator(&self) -> Option<&DecoratorNode> {
        match &self.data {
            NodeData::Decorator(decorator) => Some(decorator),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.class() == NodeClass::Text
    }

    pub fn is_decorator(&self) -> bool {
        self.class() == NodeClass::Decorator
    }

    pub fn is_inline(&self) -> bool {
        self.kind().is_inline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_round_trip() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_type_name(kind.type_name()), Some(kind));
        }
        assert_eq!(NodeKind::from_type_name("table"), None);
    }

    #[test]
    fn test_leaf_kinds_cannot_own_children() {
        assert!(!NodeKind::Text.can_have_children());
        assert!(!NodeKind::Image.can_have_children());
        assert!(NodeKind::Paragraph.can_have_children());
        assert!(NodeKind::Root.can_have_children());
    }

    #[test]
    fn test_data_kind_follows_variant() {
        assert_eq!(NodeData::text("a").kind(), NodeKind::Text);
        assert_eq!(
            NodeData::Text(TextNode::autocomplete("a")).kind(),
            NodeKind::Autocomplete
        );
        assert_eq!(
            NodeData::Decorator(DecoratorNode::equation("x", true)).kind(),
            NodeKind::Equation
        );
        assert_eq!(
            NodeData::element(ElementKind::Heading(HeadingTag::H2)).kind(),
            NodeKind::Heading
        );
    }

    #[test]
    fn test_format_bits_match_persisted_values() {
        assert_eq!(TextFormat::BOLD.bits(), 1);
        assert_eq!(TextFormat::CODE.bits(), 16);
        assert_eq!(TextFormat::HIGHLIGHT.bits(), 128);
        assert_eq!(TextFormatType::Italic.flag(), TextFormat::ITALIC);
    }
}
