//! Editor state snapshots and the scope handed to update closures.

use anyhow::{bail, Result};
use std::ops::Deref;

use crate::document::DocumentTree;
use crate::node::{NodeKey, NodeKind, TextFormat};
use crate::selection::{selection_format, Point, RangeSelection, Selection};

/// Tags attached to a committed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateTag {
    /// Content replaced by the host; no change notification.
    Programmatic,
    /// Not recorded in the undo history.
    SkipHistory,
    /// Application of an undo or redo step.
    Historic,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateTags(Vec<UpdateTag>);

impl UpdateTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(tags: &[UpdateTag]) -> Self {
        let mut out = Self::new();
        for tag in tags {
            out.insert(*tag);
        }
        out
    }

    pub fn insert(&mut self, tag: UpdateTag) {
        if !self.0.contains(&tag) {
            self.0.push(tag);
        }
    }

    pub fn contains(&self, tag: UpdateTag) -> bool {
        self.0.contains(&tag)
    }

    pub fn skips_history(&self) -> bool {
        self.0
            .iter()
            .any(|tag| matches!(tag, UpdateTag::SkipHistory | UpdateTag::Historic | UpdateTag::Programmatic))
    }
}

/// Immutable snapshot of the document and selection.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub(crate) tree: DocumentTree,
    pub(crate) selection: Option<Selection>,
}

impl EditorState {
    /// A document with a single empty paragraph and no selection.
    pub fn new() -> Self {
        let mut tree = DocumentTree::new();
        let paragraph = tree.create(NodeKind::Paragraph);
        let root = tree.root();
        // A fresh root accepts any child.
        let _ = tree.append(root, paragraph);
        Self {
            tree,
            selection: None,
        }
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn range_selection(&self) -> Option<&RangeSelection> {
        self.selection.as_ref().and_then(Selection::as_range)
    }

    /// Node under the anchor of a range selection.
    pub fn anchor_node(&self) -> Option<NodeKey> {
        self.range_selection().map(|range| range.anchor.key())
    }

    /// The code block that is `key` itself or its parent.
    pub fn enclosing_code_block(&self, key: NodeKey) -> Option<NodeKey> {
        let is_code = |k: NodeKey| self.tree.kind(k).is_some_and(NodeKind::is_code);
        if is_code(key) {
            return Some(key);
        }
        self.tree.parent(key).filter(|parent| is_code(*parent))
    }

    pub fn text_content(&self) -> String {
        self.tree.text_content(self.tree.root())
    }

    pub fn find_text(&self, needle: &str) -> Option<(NodeKey, usize)> {
        self.tree.find_text(needle)
    }

    /// Top-level block kinds, handy for structural assertions.
    pub fn block_names(&self) -> Vec<&'static str> {
        self.tree
            .children(self.tree.root())
            .iter()
            .filter_map(|key| self.tree.kind(*key).map(NodeKind::name))
            .collect()
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable access to a pending state inside `Editor::update`.
///
/// Reads go through `Deref<Target = EditorState>`; every mutation marks the
/// update dirty.
pub struct UpdateScope<'a> {
    state: &'a mut EditorState,
    dirty: bool,
    tags: UpdateTags,
}

impl<'a> UpdateScope<'a> {
    pub(crate) fn new(state: &'a mut EditorState, tags: UpdateTags) -> Self {
        Self {
            state,
            dirty: false,
            tags,
        }
    }

    pub(crate) fn finish(self) -> (bool, UpdateTags) {
        (self.dirty, self.tags)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn add_tag(&mut self, tag: UpdateTag) {
        self.tags.insert(tag);
    }

    pub fn has_tag(&self, tag: UpdateTag) -> bool {
        self.tags.contains(tag)
    }

    pub(crate) fn tree_mut(&mut self) -> &mut DocumentTree {
        self.dirty = true;
        &mut self.state.tree
    }

    pub fn create(&mut self, kind: NodeKind) -> NodeKey {
        self.tree_mut().create(kind)
    }

    pub fn append(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        self.tree_mut().append(parent, child)
    }

    pub fn insert_after(&mut self, sibling: NodeKey, node: NodeKey) -> Result<()> {
        self.tree_mut().insert_after(sibling, node)
    }

    pub fn insert_before(&mut self, sibling: NodeKey, node: NodeKey) -> Result<()> {
        self.tree_mut().insert_before(sibling, node)
    }

    pub fn remove(&mut self, key: NodeKey) -> Result<()> {
        self.tree_mut().remove(key)
    }

    pub fn set_kind(&mut self, key: NodeKey, kind: NodeKind) -> Result<()> {
        self.tree_mut().node_mut(key)?.kind = kind;
        Ok(())
    }

    pub fn kind_mut(&mut self, key: NodeKey) -> Result<&mut NodeKind> {
        Ok(&mut self.tree_mut().node_mut(key)?.kind)
    }

    /// Remove every block under the root.
    pub fn clear_root(&mut self) -> Result<()> {
        let root = self.tree.root();
        self.tree_mut().clear(root)
    }

    /// Replace the whole state, e.g. with a history snapshot.
    pub(crate) fn replace_state(&mut self, state: EditorState) {
        self.dirty = true;
        *self.state = state;
    }

    /// Set the selection, recomputing its format from the document.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.state.selection = selection.map(|selection| match selection {
            Selection::Range(mut range) => {
                range.format = selection_format(&self.state.tree, &range);
                Selection::Range(range)
            }
            other => other,
        });
    }

    /// Set the selection keeping the given range format.
    pub fn set_range_with_format(&mut self, range: RangeSelection) {
        self.state.selection = Some(Selection::Range(range));
    }

    pub fn select(&mut self, anchor: Point, focus: Point) {
        self.set_selection(Some(Selection::Range(RangeSelection::new(anchor, focus))));
    }

    pub fn select_caret(&mut self, point: Point) {
        self.select(point, point);
    }

    pub fn select_nodes(&mut self, keys: Vec<NodeKey>) {
        self.set_selection(Some(Selection::Node(keys)));
    }

    /// Select `needle`'s first occurrence.
    pub fn select_text(&mut self, needle: &str) -> Result<()> {
        let Some((key, offset)) = self.state.find_text(needle) else {
            bail!("Text not found: {:?}", needle);
        };
        let len = needle.chars().count();
        self.select(Point::text(key, offset), Point::text(key, offset + len));
        Ok(())
    }

    /// Put the caret at the end of the document's last content block.
    pub fn select_end(&mut self) {
        let Some(block) = self.state.tree.blocks().into_iter().rev().find(|b| self.state.tree.is_content_block(*b)) else {
            self.state.selection = None;
            return;
        };
        let point = self.point_at_block_offset(block, usize::MAX);
        self.select_caret(point);
    }

    /// Point for a character offset inside a content block. Offsets on a
    /// boundary between two text nodes resolve to the end of the first one.
    pub fn point_at_block_offset(&self, block: NodeKey, offset: usize) -> Point {
        let tree = &self.state.tree;
        let mut remaining = offset;
        let mut last_text: Option<(NodeKey, usize)> = None;
        for leaf in tree.leaves(block) {
            let Some(node) = tree.get(leaf) else {
                continue;
            };
            let len = node.len();
            match &node.kind {
                NodeKind::Text { .. } => {
                    if remaining <= len {
                        return Point::text(leaf, remaining);
                    }
                    last_text = Some((leaf, len));
                }
                _ => {
                    if remaining == 0 {
                        return self.point_before(leaf);
                    }
                    last_text = None;
                }
            }
            remaining -= len;
        }
        match last_text {
            Some((key, len)) => Point::text(key, len),
            None => Point::element(block, tree.children(block).len()),
        }
    }

    fn point_before(&self, key: NodeKey) -> Point {
        let tree = &self.state.tree;
        match (tree.parent(key), tree.index_in_parent(key)) {
            (Some(parent), Some(index)) => Point::element(parent, index),
            _ => Point::element(tree.root(), 0),
        }
    }

    /// Content block and char offset of a point.
    pub fn block_offset(&self, point: &Point) -> Option<(NodeKey, usize)> {
        let tree = &self.state.tree;
        let block = crate::selection::point_block(tree, point)?;
        let mut offset = 0;
        let target = point.position(tree);
        for leaf in tree.leaves(block) {
            if leaf == point.key() {
                return Some((block, offset + point.offset()));
            }
            let mut leaf_pos = tree.path(leaf);
            leaf_pos.push(0);
            if leaf_pos >= target {
                break;
            }
            offset += tree.get(leaf).map(|n| n.len()).unwrap_or(0);
        }
        Some((block, offset))
    }

    /// Bring the pending tree back into canonical form before commit.
    pub(crate) fn normalize(&mut self) -> Result<()> {
        self.remove_empty_inlines()?;
        self.merge_adjacent_text()?;
        self.remove_empty_containers()?;

        let root = self.state.tree.root();
        if self.state.tree.is_empty() {
            let paragraph = self.state.tree.create(NodeKind::Paragraph);
            self.state.tree.append(root, paragraph)?;
        }

        let valid = match &self.state.selection {
            Some(Selection::Range(range)) => {
                range.anchor.is_valid(&self.state.tree) && range.focus.is_valid(&self.state.tree)
            }
            Some(Selection::Node(keys)) => keys.iter().all(|key| self.state.tree.contains(*key)),
            None => true,
        };
        if !valid {
            log::debug!("Dropping selection that no longer fits the document");
            self.state.selection = None;
        }
        Ok(())
    }

    fn referenced(&self, key: NodeKey) -> bool {
        match &self.state.selection {
            Some(Selection::Range(range)) => range.anchor.key() == key || range.focus.key() == key,
            Some(Selection::Node(keys)) => keys.contains(&key),
            None => false,
        }
    }

    fn remove_empty_inlines(&mut self) -> Result<()> {
        let root = self.state.tree.root();
        for key in self.state.tree.descendants(root).into_iter().rev() {
            let Some(node) = self.state.tree.get(key) else {
                continue;
            };
            let empty = match &node.kind {
                NodeKind::Text { text, .. } => text.is_empty() && !self.referenced(key),
                NodeKind::Link { .. } => node.children.is_empty(),
                _ => false,
            };
            if empty {
                self.retarget_points(key)?;
                self.state.tree.remove(key)?;
            }
        }
        Ok(())
    }

    /// Move points on `key` to the position it occupies in its parent.
    fn retarget_points(&mut self, key: NodeKey) -> Result<()> {
        if !self.referenced(key) {
            return Ok(());
        }
        let replacement = self.point_before(key);
        if let Some(Selection::Range(range)) = &mut self.state.selection {
            for point in [&mut range.anchor, &mut range.focus] {
                if point.key() == key {
                    *point = replacement;
                }
            }
        }
        Ok(())
    }

    fn merge_adjacent_text(&mut self) -> Result<()> {
        let root = self.state.tree.root();
        for parent in self.state.tree.descendants(root) {
            let mut index = 1;
            loop {
                let children = self.state.tree.children(parent);
                if index >= children.len() {
                    break;
                }
                let (left, right) = (children[index - 1], children[index]);
                let mergeable = match (self.state.tree.kind(left), self.state.tree.kind(right)) {
                    (
                        Some(NodeKind::Text { format: a, .. }),
                        Some(NodeKind::Text { format: b, .. }),
                    ) => a == b,
                    _ => false,
                };
                if !mergeable {
                    index += 1;
                    continue;
                }
                self.merge_text_pair(left, right)?;
            }
        }
        Ok(())
    }

    fn merge_text_pair(&mut self, left: NodeKey, right: NodeKey) -> Result<()> {
        let right_text = self
            .state
            .tree
            .kind(right)
            .and_then(NodeKind::text)
            .unwrap_or_default()
            .to_string();
        let left_len = self.state.tree.node(left)?.len();
        if let NodeKind::Text { text, .. } = &mut self.state.tree.node_mut(left)?.kind {
            text.push_str(&right_text);
        }
        if let Some(Selection::Range(range)) = &mut self.state.selection {
            for point in [&mut range.anchor, &mut range.focus] {
                if let Point::Text { key, offset } = point {
                    if *key == right {
                        *key = left;
                        *offset += left_len;
                    }
                }
            }
        }
        self.state.tree.remove(right)
    }

    fn remove_empty_containers(&mut self) -> Result<()> {
        let root = self.state.tree.root();
        for key in self.state.tree.descendants(root).into_iter().rev() {
            let is_empty_list = matches!(self.state.tree.kind(key), Some(NodeKind::List { .. }))
                && self.state.tree.children(key).is_empty();
            if !is_empty_list {
                continue;
            }
            let parent = self.state.tree.parent(key);
            self.retarget_points(key)?;
            self.state.tree.remove(key)?;
            // A nested list lives in an otherwise empty item.
            if let Some(parent) = parent {
                let empty_item = matches!(self.state.tree.kind(parent), Some(NodeKind::ListItem { .. }))
                    && self.state.tree.children(parent).is_empty();
                if empty_item && !self.referenced(parent) {
                    self.state.tree.remove(parent)?;
                }
            }
        }
        Ok(())
    }
}

impl Deref for UpdateScope<'_> {
    type Target = EditorState;

    fn deref(&self) -> &EditorState {
        self.state
    }
}

/// Format of new text typed at `point`: none inside code blocks.
pub(crate) fn typing_format(state: &EditorState, point: &Point, selection_format: TextFormat) -> TextFormat {
    if state.enclosing_code_block(point.key()).is_some() {
        TextFormat::NONE
    } else {
        selection_format
    }
}
