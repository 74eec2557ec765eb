use crate::document::DocumentTree;
use crate::node::{NodeKey, NodeKind, TextFormat, TextFormatType};

/// A caret position.
///
/// Text points count characters inside a text node; element points count
/// children of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Point {
    Text { key: NodeKey, offset: usize },
    Element { key: NodeKey, offset: usize },
}

impl Point {
    pub fn text(key: NodeKey, offset: usize) -> Self {
        Point::Text { key, offset }
    }

    pub fn element(key: NodeKey, offset: usize) -> Self {
        Point::Element { key, offset }
    }

    pub fn key(&self) -> NodeKey {
        match self {
            Point::Text { key, .. } | Point::Element { key, .. } => *key,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Point::Text { offset, .. } | Point::Element { offset, .. } => *offset,
        }
    }

    /// Sort key in document order.
    pub(crate) fn position(&self, tree: &DocumentTree) -> Vec<usize> {
        let mut position = tree.path(self.key());
        position.push(self.offset());
        position
    }

    pub fn is_before(&self, other: &Point, tree: &DocumentTree) -> bool {
        self.position(tree) < other.position(tree)
    }

    pub(crate) fn is_valid(&self, tree: &DocumentTree) -> bool {
        let Some(node) = tree.get(self.key()) else {
            return false;
        };
        let attached = self.key() == tree.root() || tree.is_ancestor(tree.root(), self.key());
        let kind_matches = match self {
            Point::Text { .. } => node.kind.is_text(),
            Point::Element { .. } => node.kind.is_element(),
        };
        attached && kind_matches && self.offset() <= node.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSelection {
    pub anchor: Point,
    pub focus: Point,
    /// Formats applied to text typed at this selection.
    pub format: TextFormat,
}

impl RangeSelection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self {
            anchor,
            focus,
            format: TextFormat::NONE,
        }
    }

    pub fn collapsed(point: Point) -> Self {
        Self::new(point, point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn has_format(&self, format: TextFormatType) -> bool {
        self.format.has(format)
    }

    pub fn is_backward(&self, tree: &DocumentTree) -> bool {
        self.focus.is_before(&self.anchor, tree)
    }

    /// `(start, end)` in document order.
    pub fn ordered(&self, tree: &DocumentTree) -> (Point, Point) {
        if self.is_backward(tree) {
            (self.focus, self.anchor)
        } else {
            (self.anchor, self.focus)
        }
    }

    /// Selected plain text. Line breaks and block boundaries become `\n`.
    pub fn text_content(&self, tree: &DocumentTree) -> String {
        let leaves = selected_leaves(tree, self);
        let mut blocks: Vec<String> = Vec::new();
        for block in selected_blocks(tree, self) {
            if !tree.is_content_block(block) {
                continue;
            }
            let mut text = String::new();
            for (leaf, from, to) in leaves.iter().filter(|(leaf, ..)| tree.leaf_block_of(*leaf) == Some(block)) {
                match tree.kind(*leaf) {
                    Some(NodeKind::Text { text: content, .. }) => {
                        text.extend(content.chars().skip(*from).take(to - from));
                    }
                    Some(NodeKind::LineBreak) => text.push('\n'),
                    _ => {}
                }
            }
            blocks.push(text);
        }
        blocks.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Range(RangeSelection),
    /// Whole nodes, e.g. a selected horizontal rule.
    Node(Vec<NodeKey>),
}

impl Selection {
    pub fn as_range(&self) -> Option<&RangeSelection> {
        match self {
            Selection::Range(range) => Some(range),
            Selection::Node(_) => None,
        }
    }
}

/// Content block holding `point`. Element points on containers resolve to
/// the first content block at or after the pointed child.
pub(crate) fn point_block(tree: &DocumentTree, point: &Point) -> Option<NodeKey> {
    if let Some(block) = tree.leaf_block_of(point.key()) {
        return Some(block);
    }
    let children = tree.children(point.key());
    let start = point.offset().min(children.len().saturating_sub(1));
    children.iter().skip(start).find_map(|child| {
        tree.descendants(*child)
            .into_iter()
            .find(|key| tree.is_content_block(*key) || matches!(tree.kind(*key), Some(NodeKind::HorizontalRule)))
    })
}

/// Content blocks and rules from the start block to the end block.
pub fn selected_blocks(tree: &DocumentTree, selection: &RangeSelection) -> Vec<NodeKey> {
    let (start, end) = selection.ordered(tree);
    let (Some(first), Some(last)) = (point_block(tree, &start), point_block(tree, &end)) else {
        return Vec::new();
    };
    let blocks = tree.blocks();
    let (Some(from), Some(to)) = (
        blocks.iter().position(|b| *b == first),
        blocks.iter().position(|b| *b == last),
    ) else {
        return Vec::new();
    };
    if from > to {
        return Vec::new();
    }
    blocks[from..=to].to_vec()
}

/// Leaves touched by the selection with the selected char range of each.
/// Line breaks report `0..1`.
pub(crate) fn selected_leaves(tree: &DocumentTree, selection: &RangeSelection) -> Vec<(NodeKey, usize, usize)> {
    let (start, end) = selection.ordered(tree);
    let start_pos = start.position(tree);
    let end_pos = end.position(tree);
    let mut out = Vec::new();

    for leaf in tree.leaves(tree.root()) {
        let Some(node) = tree.get(leaf) else {
            continue;
        };
        let len = node.len();
        let mut leaf_start = tree.path(leaf);
        let mut leaf_end = leaf_start.clone();
        leaf_start.push(0);
        leaf_end.push(len);

        let from = if start.key() == leaf {
            start.offset()
        } else if start_pos < leaf_start {
            0
        } else {
            continue;
        };
        let to = if end.key() == leaf {
            end.offset()
        } else if leaf_end <= end_pos {
            len
        } else {
            continue;
        };
        if from < to {
            out.push((leaf, from, to));
        }
    }
    out
}

/// Format of a selection: the anchor's format when collapsed, otherwise the
/// formats shared by every selected text leaf.
pub(crate) fn selection_format(tree: &DocumentTree, selection: &RangeSelection) -> TextFormat {
    let anchor_format = tree
        .kind(selection.anchor.key())
        .map(NodeKind::format)
        .unwrap_or_default();
    if selection.is_collapsed() {
        return anchor_format;
    }
    let mut formats = selected_leaves(tree, selection)
        .into_iter()
        .filter_map(|(leaf, ..)| match tree.kind(leaf) {
            Some(NodeKind::Text { format, .. }) => Some(*format),
            _ => None,
        });
    match formats.next() {
        Some(first) => formats.fold(first, TextFormat::intersection),
        None => anchor_format,
    }
}
