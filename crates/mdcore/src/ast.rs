//! Owned block/inline model of a Markdown document.
//!
//! comrak hands out an arena-allocated AST that cannot outlive the arena, so
//! the editor never sees it directly. [`parse`] walks the arena once and
//! produces plain owned values instead.

use comrak::nodes::{AstNode, ListType, NodeValue, Sourcepos};
use comrak::{parse_document, Arena};
use lazy_static::lazy_static;
use regex::Regex;

use crate::markdown::create_comrak_options;

lazy_static! {
    static ref HIGHLIGHT_SPAN: Regex =
        Regex::new(r"==([^=\s](?:[^=]*[^=\s])?)==").expect("Invalid HIGHLIGHT_SPAN regex pattern");
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    Heading { level: u8, content: Vec<Inline> },
    Quote(Vec<Block>),
    List {
        kind: ListKind,
        start: usize,
        items: Vec<ListItem>,
    },
    CodeFence { info: String, literal: String },
    ThematicBreak,
    /// Source text of a construct outside the dialect (tables, raw HTML, ...).
    Literal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Ordered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    /// `Some(checked)` for task list items.
    pub task: Option<bool>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Code(String),
    Strong(Vec<Inline>),
    Emph(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Highlight(Vec<Inline>),
    Link {
        url: String,
        title: String,
        content: Vec<Inline>,
    },
    SoftBreak,
    LineBreak,
}

impl Block {
    pub fn name(&self) -> &'static str {
        match self {
            Block::Paragraph(_) => "paragraph",
            Block::Heading { .. } => "heading",
            Block::Quote(_) => "quote",
            Block::List { .. } => "list",
            Block::CodeFence { .. } => "code",
            Block::ThematicBreak => "thematic-break",
            Block::Literal(_) => "literal",
        }
    }
}

/// Parse Markdown into top-level blocks.
///
/// Parsing never fails: anything comrak does not recognize ends up as plain
/// text, and constructs outside the dialect are kept as [`Block::Literal`].
pub fn parse(src: &str) -> Vec<Block> {
    let arena = Arena::new();
    let options = create_comrak_options();
    let root = parse_document(&arena, src, &options);
    let lines: Vec<&str> = src.lines().collect();

    root.children().map(|node| convert_block(node, &lines)).collect()
}

fn convert_block<'a>(node: &'a AstNode<'a>, lines: &[&str]) -> Block {
    let ast = node.data.borrow();
    match &ast.value {
        NodeValue::Paragraph => Block::Paragraph(collect_inlines(node)),
        NodeValue::Heading(heading) => Block::Heading {
            level: heading.level,
            content: collect_inlines(node),
        },
        NodeValue::BlockQuote => {
            Block::Quote(node.children().map(|child| convert_block(child, lines)).collect())
        }
        NodeValue::List(list) => {
            let kind = match list.list_type {
                ListType::Bullet => ListKind::Bullet,
                ListType::Ordered => ListKind::Ordered,
            };
            Block::List {
                kind,
                start: list.start,
                items: node.children().map(|item| convert_item(item, lines)).collect(),
            }
        }
        NodeValue::CodeBlock(code) => Block::CodeFence {
            info: code.info.to_string(),
            literal: code.literal.to_string(),
        },
        NodeValue::ThematicBreak => Block::ThematicBreak,
        NodeValue::HtmlBlock(html) => Block::Literal(html.literal.trim_end().to_string()),
        other => {
            log::debug!("Keeping unsupported block as literal text: {:?}", other);
            Block::Literal(source_text(&ast.sourcepos, lines))
        }
    }
}

fn convert_item<'a>(node: &'a AstNode<'a>, lines: &[&str]) -> ListItem {
    let ast = node.data.borrow();
    let task = match &ast.value {
        NodeValue::TaskItem(..) => Some(task_checked(&ast.sourcepos, lines)),
        _ => None,
    };

    ListItem {
        task,
        blocks: node.children().map(|child| convert_block(child, lines)).collect(),
    }
}

/// The check mark is read back from the source line so the result does not
/// depend on how comrak represents the task symbol.
fn task_checked(pos: &Sourcepos, lines: &[&str]) -> bool {
    let Some(line) = lines.get(pos.start.line.saturating_sub(1)) else {
        return false;
    };
    let rest = line.trim_start_matches(|c: char| {
        c.is_ascii_digit() || matches!(c, '-' | '*' | '+' | '.' | ')' | '>' | ' ' | '\t')
    });
    rest.starts_with("[x]") || rest.starts_with("[X]")
}

fn source_text(pos: &Sourcepos, lines: &[&str]) -> String {
    if pos.start.line == 0 || pos.end.line < pos.start.line {
        return String::new();
    }
    let start = pos.start.line - 1;
    let end = pos.end.line.min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

fn collect_inlines<'a>(node: &'a AstNode<'a>) -> Vec<Inline> {
    let mut out = Vec::new();
    for child in node.children() {
        convert_inline(child, &mut out);
    }
    out
}

fn convert_inline<'a>(node: &'a AstNode<'a>, out: &mut Vec<Inline>) {
    match &node.data.borrow().value {
        NodeValue::Text(text) => push_text(out, &text.to_string()),
        NodeValue::Code(code) => out.push(Inline::Code(code.literal.to_string())),
        NodeValue::Strong => out.push(Inline::Strong(collect_inlines(node))),
        NodeValue::Emph => out.push(Inline::Emph(collect_inlines(node))),
        NodeValue::Strikethrough => out.push(Inline::Strikethrough(collect_inlines(node))),
        NodeValue::Link(link) => out.push(Inline::Link {
            url: link.url.to_string(),
            title: link.title.to_string(),
            content: collect_inlines(node),
        }),
        NodeValue::Image(link) => {
            let alt = plain_text(node);
            push_plain(out, &format!("![{}]({})", alt, link.url));
        }
        NodeValue::SoftBreak => out.push(Inline::SoftBreak),
        NodeValue::LineBreak => out.push(Inline::LineBreak),
        NodeValue::HtmlInline(html) => push_plain(out, &html.to_string()),
        // Kept out of `push_text` so an escaped `=` never opens a highlight
        NodeValue::Escaped => push_plain(out, &plain_text(node)),
        _ => {
            for inline in collect_inlines(node) {
                match inline {
                    Inline::Text(text) => push_plain(out, &text),
                    other => out.push(other),
                }
            }
        }
    }
}

/// Split `==marked==` spans out of a text run.
fn push_text(out: &mut Vec<Inline>, text: &str) {
    let mut last = 0;
    for caps in HIGHLIGHT_SPAN.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            push_plain(out, &text[last..whole.start()]);
        }
        out.push(Inline::Highlight(vec![Inline::Text(inner.as_str().to_string())]));
        last = whole.end();
    }
    if last < text.len() {
        push_plain(out, &text[last..]);
    }
}

fn push_plain(out: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text(prev)) = out.last_mut() {
        prev.push_str(text);
    } else {
        out.push(Inline::Text(text.to_string()));
    }
}

fn plain_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for descendant in node.descendants().skip(1) {
        match &descendant.data.borrow().value {
            NodeValue::Text(t) => text.push_str(&t.to_string()),
            NodeValue::Code(code) => text.push_str(&code.literal.to_string()),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
            _ => {}
        }
    }
    text
}
