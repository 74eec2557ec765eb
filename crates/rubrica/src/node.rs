//! Node kinds, text formats and the classification used by formatting
//! commands.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a node in one [`DocumentTree`](crate::document::DocumentTree).
///
/// Keys are plain ids; they only mean something inside a read or update
/// scope of the state they were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub(crate) u32);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormatType {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Highlight,
}

impl TextFormatType {
    pub const ALL: [TextFormatType; 6] = [
        TextFormatType::Bold,
        TextFormatType::Italic,
        TextFormatType::Underline,
        TextFormatType::Strikethrough,
        TextFormatType::Code,
        TextFormatType::Highlight,
    ];

    fn bit(self) -> u8 {
        match self {
            TextFormatType::Bold => 1,
            TextFormatType::Italic => 1 << 1,
            TextFormatType::Strikethrough => 1 << 2,
            TextFormatType::Underline => 1 << 3,
            TextFormatType::Code => 1 << 4,
            TextFormatType::Highlight => 1 << 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TextFormatType::Bold => "bold",
            TextFormatType::Italic => "italic",
            TextFormatType::Underline => "underline",
            TextFormatType::Strikethrough => "strikethrough",
            TextFormatType::Code => "code",
            TextFormatType::Highlight => "highlight",
        }
    }
}

/// Set of [`TextFormatType`]s carried by a text node or a selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TextFormat(u8);

impl TextFormat {
    pub const NONE: TextFormat = TextFormat(0);

    pub fn of(formats: &[TextFormatType]) -> Self {
        formats.iter().fold(Self::NONE, |acc, f| acc.with(*f))
    }

    pub fn has(self, format: TextFormatType) -> bool {
        self.0 & format.bit() != 0
    }

    pub fn with(self, format: TextFormatType) -> Self {
        TextFormat(self.0 | format.bit())
    }

    pub fn without(self, format: TextFormatType) -> Self {
        TextFormat(self.0 & !format.bit())
    }

    pub fn toggled(self, format: TextFormatType) -> Self {
        TextFormat(self.0 ^ format.bit())
    }

    pub fn intersection(self, other: TextFormat) -> Self {
        TextFormat(self.0 & other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = TextFormatType> {
        TextFormatType::ALL.into_iter().filter(move |f| self.has(*f))
    }
}

/// Block alignment set by the toolbar's alignment buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementFormat {
    #[default]
    Unset,
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListType {
    Bullet,
    Number,
    Check,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Paragraph,
    Heading { level: u8 },
    Quote,
    List { list_type: ListType, start: usize },
    ListItem { checked: Option<bool> },
    Code { language: Option<String> },
    HorizontalRule,
    Link { url: String, title: String },
    Text { text: String, format: TextFormat },
    LineBreak,
}

/// Coarse role of a node kind. Selection-driven commands dispatch on this
/// instead of probing individual kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
    Root,
    /// Leaf block holding rich inline content.
    TextBlock,
    /// Leaf block holding literal text only.
    CodeBlock,
    /// Block whose children are other blocks.
    Container,
    /// Block without content.
    Atomic,
    InlineElement,
    Leaf,
}

impl NodeKind {
    pub fn class(&self) -> NodeClass {
        match self {
            NodeKind::Root => NodeClass::Root,
            NodeKind::Paragraph
            | NodeKind::Heading { .. }
            | NodeKind::Quote
            | NodeKind::ListItem { .. } => NodeClass::TextBlock,
            NodeKind::Code { .. } => NodeClass::CodeBlock,
            NodeKind::List { .. } => NodeClass::Container,
            NodeKind::HorizontalRule => NodeClass::Atomic,
            NodeKind::Link { .. } => NodeClass::InlineElement,
            NodeKind::Text { .. } | NodeKind::LineBreak => NodeClass::Leaf,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(
            self.class(),
            NodeClass::TextBlock | NodeClass::CodeBlock | NodeClass::Container | NodeClass::Atomic
        )
    }

    /// Blocks that directly own inline content.
    pub fn is_leaf_block(&self) -> bool {
        matches!(self.class(), NodeClass::TextBlock | NodeClass::CodeBlock)
    }

    pub fn is_element(&self) -> bool {
        !matches!(self.class(), NodeClass::Leaf | NodeClass::Atomic)
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.class(), NodeClass::InlineElement | NodeClass::Leaf)
    }

    pub fn is_code(&self) -> bool {
        self.class() == NodeClass::CodeBlock
    }

    pub fn is_text(&self) -> bool {
        matches!(self, NodeKind::Text { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            NodeKind::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn format(&self) -> TextFormat {
        match self {
            NodeKind::Text { format, .. } => *format,
            _ => TextFormat::NONE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Heading { .. } => "heading",
            NodeKind::Quote => "quote",
            NodeKind::List { .. } => "list",
            NodeKind::ListItem { .. } => "listitem",
            NodeKind::Code { .. } => "code",
            NodeKind::HorizontalRule => "horizontalrule",
            NodeKind::Link { .. } => "link",
            NodeKind::Text { .. } => "text",
            NodeKind::LineBreak => "linebreak",
        }
    }

    pub fn text_node(text: impl Into<String>, format: TextFormat) -> Self {
        NodeKind::Text {
            text: text.into(),
            format,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
    pub align: ElementFormat,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            align: ElementFormat::Unset,
        }
    }

    /// Length used for selection offsets: characters for text, one for
    /// atomic leaves, child count for elements.
    pub fn len(&self) -> usize {
        match &self.kind {
            NodeKind::Text { text, .. } => text.chars().count(),
            NodeKind::LineBreak | NodeKind::HorizontalRule => 1,
            _ => self.children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
