//! Selection-driven editing operations available inside an update scope.

use anyhow::{anyhow, bail, Result};

use crate::node::{ElementFormat, ListType, NodeKey, NodeKind, TextFormat, TextFormatType};
use crate::selection::{point_block, selected_blocks, selected_leaves, Point, RangeSelection};
use crate::state::{typing_format, UpdateScope};

fn char_to_byte(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

impl UpdateScope<'_> {
    fn node_len(&self, key: NodeKey) -> usize {
        self.tree.get(key).map(|node| node.len()).unwrap_or(0)
    }

    fn current_range(&self) -> Option<RangeSelection> {
        self.range_selection().cloned()
    }

    /// Split a text node at a char offset. Returns the new right-hand node,
    /// or `None` when the offset is on an edge. Points past the offset move
    /// to the new node.
    pub fn split_text(&mut self, key: NodeKey, offset: usize) -> Result<Option<NodeKey>> {
        let (text, format) = match self.tree.kind(key) {
            Some(NodeKind::Text { text, format }) => (text.clone(), *format),
            _ => bail!("Node {} is not a text node", key),
        };
        let len = text.chars().count();
        if offset == 0 || offset >= len {
            return Ok(None);
        }

        let byte = char_to_byte(&text, offset);
        let right = self.create(NodeKind::text_node(&text[byte..], format));
        self.set_kind(key, NodeKind::text_node(&text[..byte], format))?;
        self.insert_after(key, right)?;

        if let Some(mut range) = self.current_range() {
            for point in [&mut range.anchor, &mut range.focus] {
                if let Point::Text { key: k, offset: o } = *point {
                    if k == key && o >= offset {
                        *point = Point::text(right, o - offset);
                    }
                }
            }
            self.set_range_with_format(range);
        }
        Ok(Some(right))
    }

    /// Split text at both selection edges and return the leaves now fully
    /// inside the selection.
    fn prepare_range(&mut self) -> Result<Vec<NodeKey>> {
        let Some(range) = self.current_range() else {
            return Ok(Vec::new());
        };
        if range.is_collapsed() {
            return Ok(Vec::new());
        }

        // End first, so the start offset stays valid when both share a node.
        let (_, end) = range.ordered(&self.tree);
        if let Point::Text { key, offset } = end {
            self.split_text(key, offset)?;
        }
        let Some(range) = self.current_range() else {
            return Ok(Vec::new());
        };
        let (start, _) = range.ordered(&self.tree);
        if let Point::Text { key, offset } = start {
            self.split_text(key, offset)?;
        }

        let Some(range) = self.current_range() else {
            return Ok(Vec::new());
        };
        Ok(selected_leaves(&self.tree, &range)
            .into_iter()
            .map(|(leaf, ..)| leaf)
            .collect())
    }

    /// Put an inline node at `point`, splitting text if needed.
    fn insert_inline_at(&mut self, point: Point, node: NodeKey) -> Result<()> {
        match point {
            Point::Text { key, offset } => {
                if offset == 0 {
                    self.insert_before(key, node)
                } else {
                    self.split_text(key, offset)?;
                    self.insert_after(key, node)
                }
            }
            Point::Element { key, offset } => {
                let accepts_inline = self.tree.is_content_block(key)
                    || matches!(self.tree.kind(key), Some(NodeKind::Link { .. }));
                if !accepts_inline {
                    bail!("Cannot place inline content in {}", key);
                }
                self.tree_mut().insert_at(key, offset, node)
            }
        }
    }

    fn caret_after(&mut self, node: NodeKey) -> Result<()> {
        let parent = self
            .tree
            .parent(node)
            .ok_or_else(|| anyhow!("Node {} is detached", node))?;
        let index = self.tree.index_in_parent(node).unwrap_or(0);
        self.select_caret(Point::element(parent, index + 1));
        Ok(())
    }

    /// Remove the selected content and collapse the selection to its start.
    pub fn delete_selected(&mut self) -> Result<()> {
        let Some(range) = self.current_range() else {
            return Ok(());
        };
        if range.is_collapsed() {
            return Ok(());
        }

        let (start, end) = range.ordered(&self.tree);
        let Some((start_block, start_offset)) = self.block_offset(&start) else {
            return Ok(());
        };
        let end_block = point_block(&self.tree, &end).unwrap_or(start_block);
        let blocks = selected_blocks(&self.tree, &range);

        for leaf in self.prepare_range()? {
            self.remove(leaf)?;
        }

        if start_block != end_block {
            for block in blocks
                .iter()
                .filter(|block| **block != start_block && **block != end_block)
            {
                if self.tree.contains(*block) {
                    self.remove(*block)?;
                }
            }
            if self.tree.is_content_block(start_block) && self.tree.is_content_block(end_block) {
                self.tree_mut().move_children(end_block, 0, start_block)?;
                self.remove(end_block)?;
            } else if !self.tree.is_content_block(start_block) {
                self.remove(start_block)?;
                let caret = self.point_at_block_offset(end_block, 0);
                self.select_caret(caret);
                return Ok(());
            } else {
                self.remove(end_block)?;
            }
        }

        let caret = self.point_at_block_offset(start_block, start_offset);
        let format = range.format;
        self.set_range_with_format(RangeSelection {
            format,
            ..RangeSelection::collapsed(caret)
        });
        Ok(())
    }

    /// Type text at the selection, replacing selected content. New text takes
    /// the selection format, except inside code blocks.
    pub fn insert_text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.delete_selected()?;
        let Some(range) = self.current_range() else {
            log::debug!("insert_text without a range selection ignored");
            return Ok(());
        };

        let point = range.anchor;
        let format = typing_format(self, &point, range.format);
        let inserted = text.chars().count();

        if let Point::Text { key, offset } = point {
            let node_format = self.tree.kind(key).map(NodeKind::format).unwrap_or_default();
            if node_format == format {
                if let NodeKind::Text { text: content, .. } = self.kind_mut(key)? {
                    let byte = char_to_byte(content, offset);
                    content.insert_str(byte, text);
                }
                self.set_range_with_format(RangeSelection {
                    format,
                    ..RangeSelection::collapsed(Point::text(key, offset + inserted))
                });
                return Ok(());
            }
        }

        let node = self.create(NodeKind::text_node(text, format));
        self.insert_inline_at(point, node)?;
        self.set_range_with_format(RangeSelection {
            format,
            ..RangeSelection::collapsed(Point::text(node, inserted))
        });
        Ok(())
    }

    /// Insert text where `\n` becomes a line break.
    pub fn insert_raw_text(&mut self, text: &str) -> Result<()> {
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                self.insert_line_break()?;
            }
            self.insert_text(line)?;
        }
        Ok(())
    }

    pub fn insert_line_break(&mut self) -> Result<()> {
        self.delete_selected()?;
        let Some(range) = self.current_range() else {
            return Ok(());
        };
        let br = self.create(NodeKind::LineBreak);
        self.insert_inline_at(range.anchor, br)?;
        self.caret_after(br)
    }

    /// Split the content block at `point`; the trailing content moves into a
    /// new block of `kind` placed right after it.
    pub fn split_block_at(&mut self, point: Point, kind: NodeKind) -> Result<NodeKey> {
        let block = point_block(&self.tree, &point)
            .filter(|block| self.tree.is_content_block(*block))
            .ok_or_else(|| anyhow!("No block to split at {}", point.key()))?;

        let (mut container, mut index) = match point {
            Point::Text { key, offset } => {
                let parent = self
                    .tree
                    .parent(key)
                    .ok_or_else(|| anyhow!("Node {} is detached", key))?;
                let position = self.tree.index_in_parent(key).unwrap_or(0);
                if offset == 0 {
                    (parent, position)
                } else {
                    self.split_text(key, offset)?;
                    (parent, position + 1)
                }
            }
            Point::Element { key, offset } => (key, offset),
        };
        if container != block && !self.tree.is_ancestor(block, container) {
            bail!("Point {} is outside block {}", point.key(), block);
        }

        while container != block {
            let kind = self
                .tree
                .kind(container)
                .cloned()
                .ok_or_else(|| anyhow!("Unknown node {}", container))?;
            let clone = self.create(kind);
            self.tree_mut().move_children(container, index, clone)?;
            self.insert_after(container, clone)?;
            index = self.tree.index_in_parent(container).unwrap_or(0) + 1;
            container = self
                .tree
                .parent(container)
                .ok_or_else(|| anyhow!("Node {} is detached", container))?;
        }

        let new_block = self.create(kind);
        self.tree_mut().move_children(block, index, new_block)?;
        self.insert_after(block, new_block)?;
        Ok(new_block)
    }

    /// Insert detached nodes at the selection. Blocks split the block under
    /// the caret and empty halves are dropped.
    pub fn insert_nodes(&mut self, nodes: &[NodeKey]) -> Result<()> {
        self.delete_selected()?;
        let Some(range) = self.current_range() else {
            bail!("No selection to insert at");
        };

        let mut point = range.anchor;
        let mut last: Option<NodeKey> = None;
        for node in nodes {
            let is_block = self.tree.kind(*node).is_some_and(NodeKind::is_block);
            match (last, is_block) {
                (Some(previous), _) => self.insert_after(previous, *node)?,
                (None, true) => self.insert_block_at(point, *node)?,
                (None, false) => self.insert_inline_at(point, *node)?,
            }
            last = Some(*node);
            if !is_block {
                self.caret_after(*node)?;
                if let Some(range) = self.current_range() {
                    point = range.anchor;
                }
            }
        }

        let Some(last) = last else {
            return Ok(());
        };
        if self.tree.is_content_block(last) {
            let end = self.tree.children(last).len();
            self.select_caret(Point::element(last, end));
        } else if matches!(self.tree.kind(last), Some(NodeKind::HorizontalRule)) {
            let next = match self.tree.next_sibling(last) {
                Some(next) if self.tree.is_content_block(next) => next,
                _ => {
                    let paragraph = self.create(NodeKind::Paragraph);
                    self.insert_after(last, paragraph)?;
                    paragraph
                }
            };
            let caret = self.point_at_block_offset(next, 0);
            self.select_caret(caret);
        }
        Ok(())
    }

    fn insert_block_at(&mut self, point: Point, node: NodeKey) -> Result<()> {
        let Some(block) = point_block(&self.tree, &point) else {
            let root = self.tree.root();
            return self.append(root, node);
        };
        let at_top_level = self.tree.parent(block) == Some(self.tree.root());
        if !at_top_level || !self.tree.is_content_block(block) {
            let top = self.tree.top_level_of(block).unwrap_or(block);
            return self.insert_after(top, node);
        }

        let kind = self
            .tree
            .kind(block)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown node {}", block))?;
        let right = self.split_block_at(point, kind)?;
        self.insert_after(block, node)?;
        for half in [block, right] {
            if self.tree.children(half).is_empty() {
                self.remove(half)?;
            }
        }
        Ok(())
    }

    /// Enter: split the block at the caret.
    pub fn insert_paragraph(&mut self) -> Result<()> {
        self.delete_selected()?;
        let Some(range) = self.current_range() else {
            return Ok(());
        };
        let point = range.anchor;
        let Some(block) = point_block(&self.tree, &point) else {
            return Ok(());
        };
        let kind = self
            .tree
            .kind(block)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown node {}", block))?;

        match kind {
            NodeKind::Code { .. } => return self.insert_line_break(),
            NodeKind::ListItem { .. } if self.tree.block_len(block) == 0 => {
                return self.exit_list_item(block);
            }
            _ => {}
        }

        let offset = self.block_offset(&point).map(|(_, o)| o).unwrap_or(0);
        let at_end = offset >= self.tree.block_len(block);
        let new_kind = match kind {
            NodeKind::Heading { level } if !at_end => NodeKind::Heading { level },
            NodeKind::ListItem { checked } => NodeKind::ListItem {
                checked: checked.map(|_| false),
            },
            _ => NodeKind::Paragraph,
        };

        let align = self.tree.node(block)?.align;
        let new_block = self.split_block_at(point, new_kind)?;
        self.tree_mut().node_mut(new_block)?.align = align;
        let caret = self.point_at_block_offset(new_block, 0);
        self.select_caret(caret);
        Ok(())
    }

    /// Move a list item out of its list: one level up for nested lists,
    /// otherwise into a paragraph after the list.
    pub fn exit_list_item(&mut self, item: NodeKey) -> Result<()> {
        let list = self
            .tree
            .parent(item)
            .ok_or_else(|| anyhow!("List item {} is detached", item))?;
        let Some(NodeKind::List { list_type, start }) = self.tree.kind(list).cloned() else {
            bail!("Node {} is not inside a list", item);
        };
        let index = self.tree.index_in_parent(item).unwrap_or(0);

        let tail = if index + 1 < self.tree.children(list).len() {
            let start = if list_type == ListType::Number {
                start + index + 1
            } else {
                1
            };
            let tail = self.create(NodeKind::List { list_type, start });
            self.tree_mut().move_children(list, index + 1, tail)?;
            Some(tail)
        } else {
            None
        };

        let wrapper = self
            .tree
            .parent(list)
            .filter(|parent| matches!(self.tree.kind(*parent), Some(NodeKind::ListItem { .. })));

        let moved = match wrapper {
            Some(wrapper) => {
                let outer_type = self.tree.parent(wrapper).and_then(|outer| match self.tree.kind(outer) {
                    Some(NodeKind::List { list_type, .. }) => Some(*list_type),
                    _ => None,
                });
                let checked = match (outer_type, self.tree.kind(item)) {
                    (Some(ListType::Check), Some(NodeKind::ListItem { checked })) => {
                        Some(checked.unwrap_or(false))
                    }
                    _ => None,
                };
                self.set_kind(item, NodeKind::ListItem { checked })?;
                self.insert_after(wrapper, item)?;
                if let Some(tail) = tail {
                    let tail_wrapper = self.create(NodeKind::ListItem { checked: None });
                    self.append(tail_wrapper, tail)?;
                    self.insert_after(item, tail_wrapper)?;
                }
                item
            }
            None => {
                let paragraph = self.create(NodeKind::Paragraph);
                self.tree_mut().move_children(item, 0, paragraph)?;
                self.insert_after(list, paragraph)?;
                self.remove(item)?;
                if let Some(tail) = tail {
                    self.insert_after(paragraph, tail)?;
                }
                paragraph
            }
        };

        let caret = self.point_at_block_offset(moved, 0);
        self.select_caret(caret);
        Ok(())
    }

    /// Backspace.
    pub fn delete_backward(&mut self) -> Result<()> {
        let Some(range) = self.current_range() else {
            return Ok(());
        };
        if !range.is_collapsed() {
            return self.delete_selected();
        }
        let Some((block, offset)) = self.block_offset(&range.anchor) else {
            return Ok(());
        };

        if offset > 0 {
            let from = self.point_at_block_offset(block, offset - 1);
            self.set_range_with_format(RangeSelection {
                format: range.format,
                ..RangeSelection::new(from, range.anchor)
            });
            return self.delete_selected();
        }

        match self.tree.kind(block) {
            Some(NodeKind::ListItem { .. }) => return self.exit_list_item(block),
            Some(NodeKind::Heading { .. } | NodeKind::Quote | NodeKind::Code { .. }) => {
                return self.set_kind(block, NodeKind::Paragraph);
            }
            _ => {}
        }

        let blocks = self.tree.blocks();
        let Some(previous) = blocks
            .iter()
            .position(|b| *b == block)
            .and_then(|i| i.checked_sub(1))
            .map(|i| blocks[i])
        else {
            return Ok(());
        };

        if self.tree.is_content_block(previous) {
            let len = self.tree.block_len(previous);
            self.tree_mut().move_children(block, 0, previous)?;
            self.remove(block)?;
            let caret = self.point_at_block_offset(previous, len);
            self.select_caret(caret);
        } else {
            self.remove(previous)?;
        }
        Ok(())
    }

    /// Change the kind of every content block touched by the selection.
    /// List items are lifted out of their lists first; rules keep their kind.
    pub fn set_blocks_type<F>(&mut self, factory: F) -> Result<()>
    where
        F: Fn() -> NodeKind,
    {
        let Some(range) = self.current_range() else {
            return Ok(());
        };
        for block in selected_blocks(&self.tree, &range) {
            let skip = match self.tree.kind(block) {
                Some(NodeKind::HorizontalRule) | None => true,
                Some(_) => !self.tree.is_content_block(block),
            };
            if skip {
                continue;
            }
            if matches!(self.tree.kind(block), Some(NodeKind::ListItem { .. })) {
                self.lift_out_of_lists(block)?;
            }
            let kind = factory();
            if kind.is_code() {
                self.normalize_code_children(block)?;
            }
            self.set_kind(block, kind)?;
        }
        Ok(())
    }

    /// Pull a list item out of every list around it. Each list is split at
    /// the item and the items after it keep a list of their own.
    fn lift_out_of_lists(&mut self, item: NodeKey) -> Result<()> {
        while let Some(list) = self.tree.parent(item) {
            let Some(NodeKind::List { list_type, start }) = self.tree.kind(list).cloned() else {
                break;
            };
            let index = self.tree.index_in_parent(item).unwrap_or(0);
            let numbered = self.tree.children(list)[..index]
                .iter()
                .filter(|child| self.tree.is_content_block(**child))
                .count();

            let tail = if index + 1 < self.tree.children(list).len() {
                let start = if list_type == ListType::Number {
                    start + numbered + 1
                } else {
                    1
                };
                let tail = self.create(NodeKind::List { list_type, start });
                self.tree_mut().move_children(list, index + 1, tail)?;
                Some(tail)
            } else {
                None
            };

            let wrapper = self
                .tree
                .parent(list)
                .filter(|parent| matches!(self.tree.kind(*parent), Some(NodeKind::ListItem { .. })));
            match wrapper {
                Some(wrapper) => {
                    self.insert_after(wrapper, item)?;
                    if let Some(tail) = tail {
                        let tail_wrapper = self.create(NodeKind::ListItem { checked: None });
                        self.append(tail_wrapper, tail)?;
                        self.insert_after(item, tail_wrapper)?;
                    }
                }
                None => {
                    self.insert_after(list, item)?;
                    if let Some(tail) = tail {
                        self.insert_after(item, tail)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Code blocks hold plain text and line breaks only.
    fn normalize_code_children(&mut self, block: NodeKey) -> Result<()> {
        let links: Vec<NodeKey> = self
            .tree
            .descendants(block)
            .into_iter()
            .filter(|key| matches!(self.tree.kind(*key), Some(NodeKind::Link { .. })))
            .collect();
        for link in links.into_iter().rev() {
            self.tree_mut().unwrap_node(link)?;
        }
        for leaf in self.tree.leaves(block) {
            if let NodeKind::Text { format, .. } = self.kind_mut(leaf)? {
                *format = TextFormat::NONE;
            }
        }
        Ok(())
    }

    /// Toggle a text format over the selection. A caret toggles the format
    /// used for the next typed text. Code block text is left alone.
    pub fn format_text(&mut self, format_type: TextFormatType) -> Result<()> {
        let Some(mut range) = self.current_range() else {
            return Ok(());
        };
        if range.is_collapsed() {
            range.format = range.format.toggled(format_type);
            self.set_range_with_format(range);
            return Ok(());
        }

        let backward = range.is_backward(&self.tree);
        let leaves: Vec<NodeKey> = self
            .prepare_range()?
            .into_iter()
            .filter(|leaf| self.tree.kind(*leaf).is_some_and(NodeKind::is_text))
            .filter(|leaf| self.enclosing_code_block(*leaf).is_none())
            .collect();
        let (Some(first), Some(last)) = (leaves.first().copied(), leaves.last().copied()) else {
            return Ok(());
        };

        let shared = leaves
            .iter()
            .filter_map(|leaf| self.tree.kind(*leaf).map(NodeKind::format))
            .fold(TextFormat::of(&TextFormatType::ALL), TextFormat::intersection);
        let remove = shared.has(format_type);

        for leaf in &leaves {
            if let NodeKind::Text { format, .. } = self.kind_mut(*leaf)? {
                *format = if remove {
                    format.without(format_type)
                } else {
                    format.with(format_type)
                };
            }
        }

        let start = Point::text(first, 0);
        let end = Point::text(last, self.node_len(last));
        if backward {
            self.select(end, start);
        } else {
            self.select(start, end);
        }
        Ok(())
    }

    /// Set the alignment of every content block touched by the selection.
    pub fn format_element(&mut self, align: ElementFormat) -> Result<()> {
        let Some(range) = self.current_range() else {
            return Ok(());
        };
        for block in selected_blocks(&self.tree, &range) {
            if self.tree.is_content_block(block) {
                self.tree_mut().node_mut(block)?.align = align;
            }
        }
        Ok(())
    }

    /// Flip a check list item. Returns `false` for anything else.
    pub fn toggle_checked(&mut self, key: NodeKey) -> Result<bool> {
        if !matches!(self.tree.kind(key), Some(NodeKind::ListItem { checked: Some(_) })) {
            return Ok(false);
        }
        if let NodeKind::ListItem { checked: Some(checked) } = self.kind_mut(key)? {
            *checked = !*checked;
        }
        Ok(true)
    }

    /// Nest a list item under its previous sibling.
    pub fn indent_list_item(&mut self, item: NodeKey) -> Result<bool> {
        if !matches!(self.tree.kind(item), Some(NodeKind::ListItem { .. })) {
            return Ok(false);
        }
        let Some(previous) = self.tree.previous_sibling(item) else {
            return Ok(false);
        };
        let Some(list_kind) = self.tree.parent(item).and_then(|list| self.tree.kind(list).cloned()) else {
            return Ok(false);
        };

        let existing = if self.tree.is_content_block(previous) {
            None
        } else {
            self.tree
                .children(previous)
                .last()
                .copied()
                .filter(|child| matches!(self.tree.kind(*child), Some(NodeKind::List { .. })))
        };
        let nested = match existing {
            Some(list) => list,
            None => {
                let nested_kind = match list_kind {
                    NodeKind::List { list_type, .. } => NodeKind::List { list_type, start: 1 },
                    other => other,
                };
                let wrapper = self.create(NodeKind::ListItem { checked: None });
                let list = self.create(nested_kind);
                self.append(wrapper, list)?;
                self.insert_after(previous, wrapper)?;
                list
            }
        };
        self.append(nested, item)?;
        Ok(true)
    }

    /// Tab: indent the list item under the caret, otherwise type a tab.
    pub fn insert_tab(&mut self) -> Result<()> {
        let Some(range) = self.current_range() else {
            return Ok(());
        };
        if range.is_collapsed() {
            if let Some(block) = point_block(&self.tree, &range.anchor) {
                if self.indent_list_item(block)? {
                    return Ok(());
                }
            }
        }
        self.insert_text("\t")
    }
}

#[cfg(test)]
mod tests {
    use crate::node::{NodeKind, TextFormat, TextFormatType};
    use crate::selection::Point;
    use crate::state::{EditorState, UpdateScope, UpdateTags};
    use anyhow::Result;

    fn with_paragraph<F>(text: &str, edit: F) -> EditorState
    where
        F: FnOnce(&mut UpdateScope) -> Result<()>,
    {
        let mut state = EditorState::new();
        let mut scope = UpdateScope::new(&mut state, UpdateTags::new());
        let p = scope.tree.children(scope.tree.root())[0];
        let t = scope.create(NodeKind::text_node(text, TextFormat::NONE));
        scope.append(p, t).unwrap();
        edit(&mut scope).unwrap();
        scope.normalize().unwrap();
        state
    }

    fn texts(state: &EditorState) -> Vec<(String, TextFormat)> {
        state
            .tree
            .leaves(state.tree.root())
            .into_iter()
            .filter_map(|leaf| match state.tree.kind(leaf) {
                Some(NodeKind::Text { text, format }) => Some((text.clone(), *format)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_insert_text_at_caret() {
        let state = with_paragraph("helo", |scope| {
            let (t, _) = scope.find_text("helo").unwrap();
            scope.select_caret(Point::text(t, 3));
            scope.insert_text("l")
        });
        assert_eq!(state.text_content(), "hello");
    }

    #[test]
    fn test_insert_text_uses_pending_format() {
        let state = with_paragraph("ab", |scope| {
            let (t, _) = scope.find_text("ab").unwrap();
            scope.select_caret(Point::text(t, 1));
            scope.format_text(TextFormatType::Bold)?;
            scope.insert_text("X")
        });
        let bold = TextFormat::of(&[TextFormatType::Bold]);
        assert_eq!(
            texts(&state),
            vec![
                ("a".to_string(), TextFormat::NONE),
                ("X".to_string(), bold),
                ("b".to_string(), TextFormat::NONE),
            ]
        );
    }

    #[test]
    fn test_format_text_toggles_over_range() {
        let state = with_paragraph("one two three", |scope| {
            scope.select_text("two")?;
            scope.format_text(TextFormatType::Italic)
        });
        let italic = TextFormat::of(&[TextFormatType::Italic]);
        assert_eq!(texts(&state)[1], ("two".to_string(), italic));
        assert!(state.range_selection().unwrap().has_format(TextFormatType::Italic));

        let mut state = state;
        let mut scope = UpdateScope::new(&mut state, UpdateTags::new());
        scope.format_text(TextFormatType::Italic).unwrap();
        scope.normalize().unwrap();
        assert_eq!(texts(&state), vec![("one two three".to_string(), TextFormat::NONE)]);
    }

    #[test]
    fn test_delete_selected_across_blocks() {
        let state = with_paragraph("first", |scope| {
            let root = scope.tree.root();
            let p = scope.create(NodeKind::Paragraph);
            let t = scope.create(NodeKind::text_node("second", TextFormat::NONE));
            scope.append(p, t)?;
            scope.append(root, p)?;
            let (first, _) = scope.find_text("first").unwrap();
            scope.select(Point::text(first, 2), Point::text(t, 3));
            scope.delete_selected()
        });
        assert_eq!(state.block_names(), vec!["paragraph"]);
        assert_eq!(state.text_content(), "fiond");
    }

    #[test]
    fn test_insert_paragraph_splits_block() {
        let state = with_paragraph("hello world", |scope| {
            let (t, _) = scope.find_text("hello").unwrap();
            scope.select_caret(Point::text(t, 5));
            scope.insert_paragraph()
        });
        assert_eq!(state.block_names(), vec!["paragraph", "paragraph"]);
        assert_eq!(state.text_content(), "hello\n world");
    }

    #[test]
    fn test_insert_paragraph_in_code_adds_line_break() {
        let state = with_paragraph("let x", |scope| {
            scope.select_text("let x")?;
            scope.set_blocks_type(|| NodeKind::Code { language: None })?;
            scope.select_end();
            scope.insert_paragraph()?;
            scope.insert_text("y")
        });
        assert_eq!(state.block_names(), vec!["code"]);
        assert_eq!(state.text_content(), "let x\ny");
    }

    #[test]
    fn test_delete_backward_joins_blocks() {
        let state = with_paragraph("ab", |scope| {
            let (t, _) = scope.find_text("ab").unwrap();
            scope.select_caret(Point::text(t, 1));
            scope.insert_paragraph()?;
            scope.delete_backward()
        });
        assert_eq!(state.block_names(), vec!["paragraph"]);
        assert_eq!(state.text_content(), "ab");
    }

    #[test]
    fn test_delete_backward_removes_char() {
        let state = with_paragraph("abc", |scope| {
            let (t, _) = scope.find_text("abc").unwrap();
            scope.select_caret(Point::text(t, 2));
            scope.delete_backward()
        });
        assert_eq!(state.text_content(), "ac");
    }

    #[test]
    fn test_set_blocks_type_to_code_strips_formats() {
        let state = with_paragraph("plain bold", |scope| {
            scope.select_text("bold")?;
            scope.format_text(TextFormatType::Bold)?;
            scope.set_blocks_type(|| NodeKind::Code {
                language: Some("rust".to_string()),
            })
        });
        assert_eq!(state.block_names(), vec!["code"]);
        assert_eq!(texts(&state), vec![("plain bold".to_string(), TextFormat::NONE)]);
    }

    #[test]
    fn test_set_blocks_type_lifts_list_item() {
        use crate::markdown_import::convert_from_markdown;
        use crate::node::ListType;
        use crate::transformers::Transformers;

        let mut state = EditorState::new();
        let mut scope = UpdateScope::new(&mut state, UpdateTags::new());
        convert_from_markdown(&mut scope, "1. a\n2. b\n3. c", &Transformers::standard()).unwrap();
        scope.select_text("b").unwrap();
        scope.set_blocks_type(|| NodeKind::Paragraph).unwrap();
        scope.normalize().unwrap();

        assert_eq!(state.block_names(), vec!["list", "paragraph", "list"]);
        let blocks = state.tree.children(state.tree.root()).to_vec();
        assert_eq!(state.tree.text_content(blocks[1]), "b");
        assert_eq!(
            state.tree.kind(blocks[2]),
            Some(&NodeKind::List {
                list_type: ListType::Number,
                start: 3
            })
        );
    }

    #[test]
    fn test_set_blocks_type_lifts_nested_item_to_top() {
        use crate::markdown_import::convert_from_markdown;
        use crate::transformers::Transformers;

        let mut state = EditorState::new();
        let mut scope = UpdateScope::new(&mut state, UpdateTags::new());
        convert_from_markdown(&mut scope, "- a\n    - b\n    - c\n- d", &Transformers::standard()).unwrap();
        scope.select_text("b").unwrap();
        scope.set_blocks_type(|| NodeKind::Code { language: None }).unwrap();
        scope.normalize().unwrap();

        assert_eq!(state.block_names(), vec!["list", "code", "list"]);
        assert_eq!(state.text_content(), "a\nb\nc\nd");
    }

    #[test]
    fn test_insert_nodes_splits_paragraph() {
        let state = with_paragraph("before after", |scope| {
            let (t, _) = scope.find_text("before").unwrap();
            scope.select_caret(Point::text(t, 7));
            let rule = scope.create(NodeKind::HorizontalRule);
            scope.insert_nodes(&[rule])
        });
        assert_eq!(state.block_names(), vec!["paragraph", "horizontalrule", "paragraph"]);
        assert_eq!(state.text_content(), "before \n\nafter");
    }

    #[test]
    fn test_insert_tab_outside_list_types_tab() {
        let state = with_paragraph("x", |scope| {
            let (t, _) = scope.find_text("x").unwrap();
            scope.select_caret(Point::text(t, 0));
            scope.insert_tab()
        });
        assert_eq!(state.text_content(), "\tx");
    }
}
