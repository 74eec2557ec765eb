//! Markdown → document tree.
//!
//! Parsing is done by `mdcore`; this module maps its blocks onto node kinds,
//! honouring the registered transformer rules. Constructs without a rule are
//! kept as literal text so nothing typed by the user disappears.

use anyhow::Result;
use mdcore::{Block, Inline, ListItem as MdListItem, ListKind};

use crate::node::{ListType, NodeKey, NodeKind, TextFormat, TextFormatType};
use crate::state::UpdateScope;
use crate::transformers::{Transformer, Transformers};

/// Replace the whole document with the parsed Markdown. The selection is
/// cleared.
pub fn convert_from_markdown(scope: &mut UpdateScope, markdown: &str, rules: &Transformers) -> Result<()> {
    scope.clear_root()?;
    let root = scope.tree.root();
    let blocks = mdcore::parse(markdown);
    log::debug!("Importing {} Markdown blocks", blocks.len());
    let mut importer = Importer {
        scope: &mut *scope,
        rules,
    };
    for block in &blocks {
        importer.block(root, block)?;
    }
    scope.set_selection(None);
    Ok(())
}

/// Put `text` verbatim into a single paragraph.
pub fn import_plain_text(scope: &mut UpdateScope, text: &str) -> Result<()> {
    scope.clear_root()?;
    let root = scope.tree.root();
    let paragraph = scope.create(NodeKind::Paragraph);
    scope.append(root, paragraph)?;
    append_lines(scope, paragraph, text, TextFormat::NONE)?;
    scope.set_selection(None);
    Ok(())
}

fn append_lines(scope: &mut UpdateScope, parent: NodeKey, text: &str, format: TextFormat) -> Result<()> {
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            let br = scope.create(NodeKind::LineBreak);
            scope.append(parent, br)?;
        }
        if !line.is_empty() {
            let node = scope.create(NodeKind::text_node(line, format));
            scope.append(parent, node)?;
        }
    }
    Ok(())
}

struct Importer<'s, 'a> {
    scope: &'s mut UpdateScope<'a>,
    rules: &'s Transformers,
}

impl Importer<'_, '_> {
    fn has(&self, rule: Transformer) -> bool {
        self.rules.contains(rule)
    }

    fn new_block(&mut self, parent: NodeKey, kind: NodeKind) -> Result<NodeKey> {
        let key = self.scope.create(kind);
        self.scope.append(parent, key)?;
        Ok(key)
    }

    fn block(&mut self, parent: NodeKey, block: &Block) -> Result<()> {
        match block {
            Block::Paragraph(content) => {
                let p = self.new_block(parent, NodeKind::Paragraph)?;
                self.inlines(p, content, TextFormat::NONE)
            }
            Block::Heading { level, content } => {
                if self.has(Transformer::Heading) {
                    let h = self.new_block(parent, NodeKind::Heading { level: *level })?;
                    self.inlines(h, content, TextFormat::NONE)
                } else {
                    let p = self.new_block(parent, NodeKind::Paragraph)?;
                    self.literal(p, &format!("{} ", "#".repeat(*level as usize)))?;
                    self.inlines(p, content, TextFormat::NONE)
                }
            }
            Block::Quote(children) => {
                if self.has(Transformer::Quote) {
                    let q = self.new_block(parent, NodeKind::Quote)?;
                    self.flattened(q, children, "", 2)
                } else {
                    let p = self.new_block(parent, NodeKind::Paragraph)?;
                    self.flattened(p, children, "> ", 1)
                }
            }
            Block::List { kind, start, items } => self.list(parent, *kind, *start, items),
            Block::CodeFence { info, literal } => {
                let body = literal.strip_suffix('\n').unwrap_or(literal);
                if self.has(Transformer::CodeFence) {
                    let language = info.split_whitespace().next().map(str::to_string);
                    let code = self.new_block(parent, NodeKind::Code { language })?;
                    append_lines(self.scope, code, body, TextFormat::NONE)
                } else {
                    let p = self.new_block(parent, NodeKind::Paragraph)?;
                    let fenced = format!("```{}\n{}\n```", info, body);
                    append_lines(self.scope, p, &fenced, TextFormat::NONE)
                }
            }
            Block::ThematicBreak => {
                if self.has(Transformer::HorizontalRule) {
                    self.new_block(parent, NodeKind::HorizontalRule)?;
                    Ok(())
                } else {
                    let p = self.new_block(parent, NodeKind::Paragraph)?;
                    self.literal(p, "---")
                }
            }
            Block::Literal(text) => {
                let p = self.new_block(parent, NodeKind::Paragraph)?;
                append_lines(self.scope, p, text, TextFormat::NONE)
            }
        }
    }

    /// Inline content of several blocks joined by `breaks` line breaks, each
    /// block prefixed with `marker`.
    fn flattened(&mut self, target: NodeKey, blocks: &[Block], marker: &str, breaks: usize) -> Result<()> {
        for (index, block) in blocks.iter().enumerate() {
            if index > 0 {
                for _ in 0..breaks {
                    let br = self.scope.create(NodeKind::LineBreak);
                    self.scope.append(target, br)?;
                }
            }
            self.literal(target, marker)?;
            match block {
                Block::Paragraph(content) | Block::Heading { content, .. } => {
                    self.inlines(target, content, TextFormat::NONE)?
                }
                other => append_lines(self.scope, target, &block_text(other), TextFormat::NONE)?,
            }
        }
        Ok(())
    }

    fn list(&mut self, parent: NodeKey, kind: ListKind, start: usize, items: &[MdListItem]) -> Result<()> {
        let is_task_list = items.iter().any(|item| item.task.is_some());
        let list_type = match kind {
            ListKind::Bullet if is_task_list && self.has(Transformer::CheckList) => Some(ListType::Check),
            ListKind::Bullet if self.has(Transformer::UnorderedList) => Some(ListType::Bullet),
            ListKind::Ordered if self.has(Transformer::OrderedList) => Some(ListType::Number),
            _ => None,
        };

        let Some(list_type) = list_type else {
            // No list rule: every item becomes a paragraph with its marker as text
            for (index, item) in items.iter().enumerate() {
                let marker = match kind {
                    ListKind::Bullet => "- ".to_string(),
                    ListKind::Ordered => format!("{}. ", start + index),
                };
                let p = self.new_block(parent, NodeKind::Paragraph)?;
                self.literal(p, &marker)?;
                self.literal(p, &task_marker(item.task))?;
                self.item_content(p, parent, item)?;
            }
            return Ok(());
        };

        let list = self.new_block(parent, NodeKind::List { list_type, start })?;
        for item in items {
            // Plain items of a check list stay plain
            let checked = match list_type {
                ListType::Check => item.task,
                _ => None,
            };
            let li = self.new_block(list, NodeKind::ListItem { checked })?;
            if list_type != ListType::Check {
                self.literal(li, &task_marker(item.task))?;
            }
            self.item_content(li, list, item)?;
        }
        Ok(())
    }

    /// Inline blocks of an item go into `target`; nested lists follow it in
    /// a wrapper item of `list`.
    fn item_content(&mut self, target: NodeKey, list: NodeKey, item: &MdListItem) -> Result<()> {
        let mut first = true;
        for block in &item.blocks {
            match block {
                Block::List { kind, start, items } => {
                    let in_list = matches!(self.scope.tree.kind(list), Some(NodeKind::List { .. }));
                    if in_list {
                        let wrapper = self.new_block(list, NodeKind::ListItem { checked: None })?;
                        self.list(wrapper, *kind, *start, items)?;
                    } else {
                        self.list(list, *kind, *start, items)?;
                    }
                }
                Block::Paragraph(content) | Block::Heading { content, .. } => {
                    if !first {
                        let br = self.scope.create(NodeKind::LineBreak);
                        self.scope.append(target, br)?;
                    }
                    self.inlines(target, content, TextFormat::NONE)?;
                    first = false;
                }
                other => {
                    if !first {
                        let br = self.scope.create(NodeKind::LineBreak);
                        self.scope.append(target, br)?;
                    }
                    append_lines(self.scope, target, &block_text(other), TextFormat::NONE)?;
                    first = false;
                }
            }
        }
        Ok(())
    }

    fn literal(&mut self, parent: NodeKey, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let node = self.scope.create(NodeKind::text_node(text, TextFormat::NONE));
        self.scope.append(parent, node)
    }

    fn inlines(&mut self, parent: NodeKey, content: &[Inline], format: TextFormat) -> Result<()> {
        for inline in content {
            self.inline(parent, inline, format)?;
        }
        Ok(())
    }

    fn formatted(
        &mut self,
        parent: NodeKey,
        children: &[Inline],
        format: TextFormat,
        format_type: TextFormatType,
        rule: Transformer,
        marker: &str,
    ) -> Result<()> {
        if self.has(rule) {
            return self.inlines(parent, children, format.with(format_type));
        }
        self.text(parent, marker, format)?;
        self.inlines(parent, children, format)?;
        self.text(parent, marker, format)
    }

    fn text(&mut self, parent: NodeKey, text: &str, format: TextFormat) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let node = self.scope.create(NodeKind::text_node(text, format));
        self.scope.append(parent, node)
    }

    fn inline(&mut self, parent: NodeKey, inline: &Inline, format: TextFormat) -> Result<()> {
        match inline {
            Inline::Text(text) => self.text(parent, text, format),
            Inline::Code(code) => {
                if self.has(Transformer::InlineCode) {
                    self.text(parent, code, format.with(TextFormatType::Code))
                } else {
                    self.text(parent, &format!("`{}`", code), format)
                }
            }
            Inline::Strong(children) => {
                self.formatted(parent, children, format, TextFormatType::Bold, Transformer::Bold, "**")
            }
            Inline::Emph(children) => {
                self.formatted(parent, children, format, TextFormatType::Italic, Transformer::Italic, "*")
            }
            Inline::Strikethrough(children) => self.formatted(
                parent,
                children,
                format,
                TextFormatType::Strikethrough,
                Transformer::Strikethrough,
                "~~",
            ),
            Inline::Highlight(children) => self.formatted(
                parent,
                children,
                format,
                TextFormatType::Highlight,
                Transformer::Highlight,
                "==",
            ),
            Inline::Link {
                url,
                title,
                content,
            } => {
                if self.has(Transformer::Link) {
                    let link = self.scope.create(NodeKind::Link {
                        url: url.clone(),
                        title: title.clone(),
                    });
                    self.scope.append(parent, link)?;
                    self.inlines(link, content, format)
                } else {
                    self.text(parent, "[", format)?;
                    self.inlines(parent, content, format)?;
                    self.text(parent, &format!("]({})", url), format)
                }
            }
            Inline::SoftBreak => self.text(parent, " ", format),
            Inline::LineBreak => {
                let br = self.scope.create(NodeKind::LineBreak);
                self.scope.append(parent, br)
            }
        }
    }
}

fn task_marker(task: Option<bool>) -> String {
    match task {
        Some(true) => "[x] ".to_string(),
        Some(false) => "[ ] ".to_string(),
        None => String::new(),
    }
}

/// Plain text of a block that has to live inside inline content.
fn block_text(block: &Block) -> String {
    fn inline_text(content: &[Inline], out: &mut String) {
        for inline in content {
            match inline {
                Inline::Text(text) | Inline::Code(text) => out.push_str(text),
                Inline::Strong(children)
                | Inline::Emph(children)
                | Inline::Strikethrough(children)
                | Inline::Highlight(children)
                | Inline::Link {
                    content: children, ..
                } => inline_text(children, out),
                Inline::SoftBreak => out.push(' '),
                Inline::LineBreak => out.push('\n'),
            }
        }
    }

    match block {
        Block::Paragraph(content) | Block::Heading { content, .. } => {
            let mut out = String::new();
            inline_text(content, &mut out);
            out
        }
        Block::Quote(children) => children.iter().map(block_text).collect::<Vec<_>>().join("\n"),
        Block::List { items, .. } => items
            .iter()
            .flat_map(|item| item.blocks.iter().map(block_text))
            .collect::<Vec<_>>()
            .join("\n"),
        Block::CodeFence { literal, .. } => literal.trim_end_matches('\n').to_string(),
        Block::ThematicBreak => "---".to_string(),
        Block::Literal(text) => text.clone(),
    }
}
