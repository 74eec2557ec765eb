//! Arena-backed document tree.
//!
//! Nodes live in a map keyed by [`NodeKey`]; parent and child links are keys,
//! so a tree can be cloned wholesale for a pending update and thrown away on
//! rollback.

use anyhow::{anyhow, bail, Result};
use std::collections::BTreeMap;

use crate::node::{Node, NodeKey, NodeKind};

#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: BTreeMap<NodeKey, Node>,
    root: NodeKey,
    next_key: u32,
}

impl PartialEq for DocumentTree {
    // Key allocation is not content.
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.nodes == other.nodes
    }
}

impl DocumentTree {
    /// A tree holding only the root node.
    pub fn new() -> Self {
        let root = NodeKey(0);
        let mut nodes = BTreeMap::new();
        nodes.insert(root, Node::new(NodeKind::Root));
        Self {
            nodes,
            root,
            next_key: 1,
        }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    pub fn node(&self, key: NodeKey) -> Result<&Node> {
        self.nodes
            .get(&key)
            .ok_or_else(|| anyhow!("Unknown node {}", key))
    }

    pub(crate) fn node_mut(&mut self, key: NodeKey) -> Result<&mut Node> {
        self.nodes
            .get_mut(&key)
            .ok_or_else(|| anyhow!("Unknown node {}", key))
    }

    pub fn kind(&self, key: NodeKey) -> Option<&NodeKind> {
        self.nodes.get(&key).map(|node| &node.kind)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&key).and_then(|node| node.parent)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&key)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_in_parent(&self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.children(parent).iter().position(|child| *child == key)
    }

    pub fn previous_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let index = self.index_in_parent(key)?;
        let parent = self.parent(key)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    pub fn next_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let index = self.index_in_parent(key)?;
        let parent = self.parent(key)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut current = self.parent(key);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Child indices from the root down to `key`.
    pub fn path(&self, key: NodeKey) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = key;
        while let Some(index) = self.index_in_parent(current) {
            path.push(index);
            match self.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Create a detached node.
    pub fn create(&mut self, kind: NodeKind) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        self.nodes.insert(key, Node::new(kind));
        key
    }

    pub fn append(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let index = self.node(parent)?.children.len();
        self.insert_at(parent, index, child)
    }

    pub fn insert_at(&mut self, parent: NodeKey, index: usize, child: NodeKey) -> Result<()> {
        if parent == child || self.is_ancestor(child, parent) {
            bail!("Cannot insert {} into its own subtree", child);
        }
        self.detach(child)?;
        let parent_node = self.node_mut(parent)?;
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn insert_after(&mut self, sibling: NodeKey, node: NodeKey) -> Result<()> {
        self.detach(node)?;
        let parent = self
            .parent(sibling)
            .ok_or_else(|| anyhow!("Node {} has no parent", sibling))?;
        let index = self.index_in_parent(sibling).unwrap_or(0);
        self.insert_at(parent, index + 1, node)
    }

    pub fn insert_before(&mut self, sibling: NodeKey, node: NodeKey) -> Result<()> {
        self.detach(node)?;
        let parent = self
            .parent(sibling)
            .ok_or_else(|| anyhow!("Node {} has no parent", sibling))?;
        let index = self.index_in_parent(sibling).unwrap_or(0);
        self.insert_at(parent, index, node)
    }

    /// Unlink a node from its parent, keeping its subtree.
    pub fn detach(&mut self, key: NodeKey) -> Result<()> {
        if key == self.root {
            bail!("Cannot detach the root node");
        }
        let parent = self.node(key)?.parent;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|child| *child != key);
        }
        self.node_mut(key)?.parent = None;
        Ok(())
    }

    /// Remove a node and its whole subtree.
    pub fn remove(&mut self, key: NodeKey) -> Result<()> {
        self.detach(key)?;
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    pub fn clear(&mut self, key: NodeKey) -> Result<()> {
        for child in self.children(key).to_vec() {
            self.remove(child)?;
        }
        Ok(())
    }

    /// Move `parent`'s children from `from` onwards to the end of `target`.
    pub fn move_children(&mut self, parent: NodeKey, from: usize, target: NodeKey) -> Result<()> {
        let moved: Vec<NodeKey> = self.children(parent).iter().skip(from).copied().collect();
        for child in moved {
            self.append(target, child)?;
        }
        Ok(())
    }

    /// Replace `key` by its children.
    pub fn unwrap_node(&mut self, key: NodeKey) -> Result<()> {
        for child in self.children(key).to_vec() {
            self.insert_before(key, child)?;
        }
        self.remove(key)
    }

    /// Pre-order list of `key` and all its descendants.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Whether `key` owns inline content. A list item whose only child is a
    /// nested list is a container, not a content block.
    pub fn is_content_block(&self, key: NodeKey) -> bool {
        let Some(kind) = self.kind(key) else {
            return false;
        };
        if !kind.is_leaf_block() {
            return false;
        }
        !self
            .children(key)
            .iter()
            .any(|child| self.kind(*child).is_some_and(NodeKind::is_block))
    }

    /// Content blocks and horizontal rules in document order.
    pub fn blocks(&self) -> Vec<NodeKey> {
        self.descendants(self.root)
            .into_iter()
            .filter(|key| {
                self.is_content_block(*key)
                    || matches!(self.kind(*key), Some(NodeKind::HorizontalRule))
            })
            .collect()
    }

    /// Text nodes and line breaks in document order.
    pub fn leaves(&self, key: NodeKey) -> Vec<NodeKey> {
        self.descendants(key)
            .into_iter()
            .filter(|k| matches!(self.kind(*k), Some(NodeKind::Text { .. } | NodeKind::LineBreak)))
            .collect()
    }

    /// Nearest content block containing `key`, `key` included.
    pub fn leaf_block_of(&self, key: NodeKey) -> Option<NodeKey> {
        let mut current = Some(key);
        while let Some(node) = current {
            if self.is_content_block(node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Ancestor of `key` (or `key` itself) that is a direct child of the root.
    pub fn top_level_of(&self, key: NodeKey) -> Option<NodeKey> {
        let mut current = key;
        loop {
            let parent = self.parent(current)?;
            if parent == self.root {
                return Some(current);
            }
            current = parent;
        }
    }

    /// Plain text of a subtree. Line breaks become `\n`, sibling blocks are
    /// separated by `\n`.
    pub fn text_content(&self, key: NodeKey) -> String {
        let Some(node) = self.get(key) else {
            return String::new();
        };
        match &node.kind {
            NodeKind::Text { text, .. } => text.clone(),
            NodeKind::LineBreak => "\n".to_string(),
            NodeKind::HorizontalRule => String::new(),
            _ => {
                let mut out = String::new();
                let mut previous_block = false;
                for child in &node.children {
                    let is_block = self.kind(*child).is_some_and(NodeKind::is_block);
                    if is_block && previous_block {
                        out.push('\n');
                    }
                    out.push_str(&self.text_content(*child));
                    previous_block = is_block;
                }
                out
            }
        }
    }

    /// Character length of a content block's inline text, line breaks
    /// counting as one.
    pub fn block_len(&self, block: NodeKey) -> usize {
        self.leaves(block)
            .iter()
            .filter_map(|leaf| self.get(*leaf))
            .map(Node::len)
            .sum()
    }

    /// First text node containing `needle`, with the char offset of the match.
    pub fn find_text(&self, needle: &str) -> Option<(NodeKey, usize)> {
        self.leaves(self.root).into_iter().find_map(|leaf| {
            let text = self.kind(leaf)?.text()?;
            let byte = text.find(needle)?;
            Some((leaf, text[..byte].chars().count()))
        })
    }
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ListType, TextFormat};

    fn paragraph(tree: &mut DocumentTree, text: &str) -> (NodeKey, NodeKey) {
        let p = tree.create(NodeKind::Paragraph);
        let t = tree.create(NodeKind::text_node(text, TextFormat::NONE));
        tree.append(p, t).unwrap();
        let root = tree.root();
        tree.append(root, p).unwrap();
        (p, t)
    }

    #[test]
    fn test_append_and_paths() {
        let mut tree = DocumentTree::new();
        let (p1, t1) = paragraph(&mut tree, "one");
        let (p2, t2) = paragraph(&mut tree, "two");

        assert_eq!(tree.children(tree.root()), &[p1, p2]);
        assert_eq!(tree.path(t1), vec![0, 0]);
        assert_eq!(tree.path(t2), vec![1, 0]);
        assert_eq!(tree.leaf_block_of(t2), Some(p2));
        assert_eq!(tree.top_level_of(t2), Some(p2));
        assert_eq!(tree.next_sibling(p1), Some(p2));
        assert_eq!(tree.previous_sibling(p1), None);
    }

    #[test]
    fn test_remove_drops_subtree() {
        let mut tree = DocumentTree::new();
        let (p, t) = paragraph(&mut tree, "gone");
        tree.remove(p).unwrap();

        assert!(!tree.contains(p));
        assert!(!tree.contains(t));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_cannot_insert_into_own_subtree() {
        let mut tree = DocumentTree::new();
        let (p, t) = paragraph(&mut tree, "x");
        assert!(tree.append(t, p).is_err());
        assert!(tree.detach(tree.root()).is_err());
    }

    #[test]
    fn test_text_content_separates_blocks() {
        let mut tree = DocumentTree::new();
        paragraph(&mut tree, "first");
        let (p, _) = paragraph(&mut tree, "second");
        let br = tree.create(NodeKind::LineBreak);
        tree.append(p, br).unwrap();
        let tail = tree.create(NodeKind::text_node("line", TextFormat::NONE));
        tree.append(p, tail).unwrap();

        assert_eq!(tree.text_content(tree.root()), "first\nsecond\nline");
        assert_eq!(tree.block_len(p), 11);
    }

    #[test]
    fn test_nested_list_item_is_not_a_content_block() {
        let mut tree = DocumentTree::new();
        let list = tree.create(NodeKind::List {
            list_type: ListType::Bullet,
            start: 1,
        });
        let wrapper = tree.create(NodeKind::ListItem { checked: None });
        let nested = tree.create(NodeKind::List {
            list_type: ListType::Bullet,
            start: 1,
        });
        let item = tree.create(NodeKind::ListItem { checked: None });
        let root = tree.root();
        tree.append(root, list).unwrap();
        tree.append(list, wrapper).unwrap();
        tree.append(wrapper, nested).unwrap();
        tree.append(nested, item).unwrap();

        assert!(!tree.is_content_block(wrapper));
        assert!(tree.is_content_block(item));
        assert_eq!(tree.blocks(), vec![item]);
    }

    #[test]
    fn test_find_text_reports_char_offset() {
        let mut tree = DocumentTree::new();
        let (_, t) = paragraph(&mut tree, "ééx bold");
        assert_eq!(tree.find_text("bold"), Some((t, 4)));
        assert_eq!(tree.find_text("missing"), None);
    }

    #[test]
    fn test_equality_ignores_key_allocation() {
        let mut a = DocumentTree::new();
        paragraph(&mut a, "same");
        let mut b = a.clone();
        let scratch = b.create(NodeKind::Paragraph);
        b.remove(scratch).unwrap();
        assert_eq!(a, b);
    }
}
