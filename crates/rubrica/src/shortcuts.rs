//! Markdown shortcuts applied while typing: block triggers at the start of a
//! paragraph (`# `, `> `, `- `, ...) and inline spans closed at the caret
//! (`**bold**`, `` `code` ``, `[label](url)`, ...).

use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;

use crate::node::{ListType, NodeKey, NodeKind, TextFormatType};
use crate::selection::{Point, RangeSelection};
use crate::state::UpdateScope;
use crate::transformers::{Transformer, Transformers};

lazy_static! {
    static ref HEADING: Regex = Regex::new(r"^(#{1,6}) $").expect("Invalid HEADING regex pattern");
    static ref QUOTE: Regex = Regex::new(r"^> $").expect("Invalid QUOTE regex pattern");
    static ref BULLET: Regex = Regex::new(r"^[-*+] $").expect("Invalid BULLET regex pattern");
    static ref NUMBERED: Regex =
        Regex::new(r"^(\d{1,9})\. $").expect("Invalid NUMBERED regex pattern");
    static ref CHECK: Regex =
        Regex::new(r"^[-*+] \[( |x|X)?\] $").expect("Invalid CHECK regex pattern");
    static ref CHECK_IN_ITEM: Regex =
        Regex::new(r"^\[( |x|X)?\] $").expect("Invalid CHECK_IN_ITEM regex pattern");
    static ref CODE_FENCE: Regex =
        Regex::new(r"^```([\w+#-]*) $").expect("Invalid CODE_FENCE regex pattern");
    static ref RULE: Regex = Regex::new(r"^(---|\*\*\*|___) $").expect("Invalid RULE regex pattern");
    static ref LINK: Regex = Regex::new(r#"\[([^\[\]]+)\]\(([^()\s]+)(?:\s+"([^"]*)")?\)$"#)
        .expect("Invalid LINK regex pattern");
}

/// An inline span: delimiter, formats it applies and whether it may start
/// inside a word. Longer delimiters come first.
struct TextShortcut {
    tag: &'static str,
    formats: &'static [TextFormatType],
    intraword: bool,
}

const TEXT_SHORTCUTS: [TextShortcut; 9] = [
    TextShortcut { tag: "***", formats: &[TextFormatType::Bold, TextFormatType::Italic], intraword: true },
    TextShortcut { tag: "___", formats: &[TextFormatType::Bold, TextFormatType::Italic], intraword: false },
    TextShortcut { tag: "**", formats: &[TextFormatType::Bold], intraword: true },
    TextShortcut { tag: "__", formats: &[TextFormatType::Bold], intraword: false },
    TextShortcut { tag: "~~", formats: &[TextFormatType::Strikethrough], intraword: true },
    TextShortcut { tag: "==", formats: &[TextFormatType::Highlight], intraword: true },
    TextShortcut { tag: "*", formats: &[TextFormatType::Italic], intraword: true },
    TextShortcut { tag: "_", formats: &[TextFormatType::Italic], intraword: false },
    TextShortcut { tag: "`", formats: &[TextFormatType::Code], intraword: true },
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shortcut {
    Heading(u8),
    Quote,
    List(ListType, usize, Option<bool>),
    Code(Option<String>),
    Rule,
}

fn checked_mark(mark: Option<regex::Match<'_>>) -> bool {
    mark.is_some_and(|m| m.as_str().eq_ignore_ascii_case("x"))
}

fn match_paragraph_shortcut(prefix: &str, rules: &Transformers) -> Option<Shortcut> {
    if rules.contains(Transformer::Heading) {
        if let Some(caps) = HEADING.captures(prefix) {
            let level = caps.get(1).map(|m| m.as_str().len()).unwrap_or(1);
            return Some(Shortcut::Heading(level as u8));
        }
    }
    if rules.contains(Transformer::Quote) && QUOTE.is_match(prefix) {
        return Some(Shortcut::Quote);
    }
    if rules.contains(Transformer::CheckList) {
        if let Some(caps) = CHECK.captures(prefix) {
            return Some(Shortcut::List(ListType::Check, 1, Some(checked_mark(caps.get(1)))));
        }
    }
    if rules.contains(Transformer::UnorderedList) && BULLET.is_match(prefix) {
        return Some(Shortcut::List(ListType::Bullet, 1, None));
    }
    if rules.contains(Transformer::OrderedList) {
        if let Some(caps) = NUMBERED.captures(prefix) {
            let start = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1);
            return Some(Shortcut::List(ListType::Number, start, None));
        }
    }
    if rules.contains(Transformer::CodeFence) {
        if let Some(caps) = CODE_FENCE.captures(prefix) {
            let language = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .filter(|lang| !lang.is_empty());
            return Some(Shortcut::Code(language));
        }
    }
    if rules.contains(Transformer::HorizontalRule) && RULE.is_match(prefix) {
        return Some(Shortcut::Rule);
    }
    None
}

/// Convert the block under a collapsed caret when the text before the caret
/// is a block trigger. Returns whether a conversion happened.
pub fn apply_block_shortcut(scope: &mut UpdateScope, rules: &Transformers) -> Result<bool> {
    let Some(range) = scope.range_selection().cloned() else {
        return Ok(false);
    };
    let Point::Text { key, offset } = range.anchor else {
        return Ok(false);
    };
    if !range.is_collapsed() {
        return Ok(false);
    }
    let Some(block) = scope.tree.leaf_block_of(key) else {
        return Ok(false);
    };
    if scope.tree.children(block).first() != Some(&key) {
        return Ok(false);
    }
    let Some(text) = scope.tree.kind(key).and_then(NodeKind::text) else {
        return Ok(false);
    };
    let prefix: String = text.chars().take(offset).collect();

    let shortcut = match scope.tree.kind(block) {
        Some(NodeKind::Paragraph) => match_paragraph_shortcut(&prefix, rules),
        Some(NodeKind::ListItem { checked: None }) if rules.contains(Transformer::CheckList) => {
            CHECK_IN_ITEM
                .captures(&prefix)
                .map(|caps| Shortcut::List(ListType::Check, 1, Some(checked_mark(caps.get(1)))))
        }
        _ => None,
    };
    let Some(shortcut) = shortcut else {
        return Ok(false);
    };
    log::debug!("Applying block shortcut {:?}", shortcut);

    strip_prefix(scope, key, offset)?;
    match shortcut {
        Shortcut::Heading(level) => scope.set_blocks_type(|| NodeKind::Heading { level })?,
        Shortcut::Quote => scope.set_blocks_type(|| NodeKind::Quote)?,
        Shortcut::Code(language) => scope.set_blocks_type(|| NodeKind::Code {
            language: language.clone(),
        })?,
        Shortcut::Rule => {
            let rule = scope.create(NodeKind::HorizontalRule);
            scope.insert_before(block, rule)?;
        }
        Shortcut::List(list_type, start, checked) => {
            if matches!(scope.tree.kind(block), Some(NodeKind::ListItem { .. })) {
                convert_to_check_list(scope, block, checked.unwrap_or(false))?;
            } else {
                wrap_in_list(scope, block, list_type, start, checked)?;
            }
        }
    }
    Ok(true)
}

/// Text node under a collapsed caret where inline shortcuts may apply, with
/// the caret offset.
fn inline_trigger_point(scope: &UpdateScope) -> Option<(NodeKey, usize)> {
    let range = scope.range_selection()?;
    let Point::Text { key, offset } = range.anchor else {
        return None;
    };
    if !range.is_collapsed() || scope.enclosing_code_block(key).is_some() {
        return None;
    }
    match scope.tree.kind(key) {
        Some(NodeKind::Text { format, .. }) if !format.has(TextFormatType::Code) => Some((key, offset)),
        _ => None,
    }
}

/// Format a span closed at the caret, e.g. `**bold**` or `[label](url)`.
/// Delimiters are removed and the caret ends up after the span. Returns
/// whether a span was converted.
pub fn apply_text_shortcut(scope: &mut UpdateScope, rules: &Transformers) -> Result<bool> {
    let Some((key, offset)) = inline_trigger_point(scope) else {
        return Ok(false);
    };
    let Some(text) = scope.tree.kind(key).and_then(NodeKind::text).map(str::to_string) else {
        return Ok(false);
    };
    let prefix: String = text.chars().take(offset).collect();

    if rules.contains(Transformer::Link) && !inside_link(scope, key) {
        if let Some(caps) = LINK.captures(&prefix) {
            let (Some(whole), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                return Ok(false);
            };
            let title = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();
            let start = prefix[..whole.start()].chars().count();
            log::debug!("Applying link shortcut to {:?}", url.as_str());
            replace_with_link(scope, key, &text, (start, offset), label.as_str(), url.as_str(), title)?;
            return Ok(true);
        }
    }

    for shortcut in &TEXT_SHORTCUTS {
        if !shortcut.formats.iter().all(|format| rules.supports_format(*format)) {
            continue;
        }
        let Some((start, content_len)) = match_text_shortcut(&prefix, shortcut) else {
            continue;
        };
        log::debug!("Applying text shortcut {:?}", shortcut.tag);
        format_span(scope, key, &text, start, content_len, offset, shortcut)?;
        return Ok(true);
    }
    Ok(false)
}

fn inside_link(scope: &UpdateScope, key: NodeKey) -> bool {
    let mut current = scope.tree.parent(key);
    while let Some(node) = current {
        if matches!(scope.tree.kind(node), Some(NodeKind::Link { .. })) {
            return true;
        }
        current = scope.tree.parent(node);
    }
    false
}

/// Char offset of the opening delimiter and char length of the content when
/// `prefix` ends with a complete span.
fn match_text_shortcut(prefix: &str, shortcut: &TextShortcut) -> Option<(usize, usize)> {
    let tag = shortcut.tag;
    let tag_char = tag.chars().next()?;
    let before = prefix.strip_suffix(tag)?;
    let last = before.chars().last()?;
    if last.is_whitespace() || last == tag_char {
        return None;
    }
    for (index, _) in before.rmatch_indices(tag) {
        let content = &before[index + tag.len()..];
        let Some(first) = content.chars().next() else {
            continue;
        };
        if first.is_whitespace() || first == tag_char {
            continue;
        }
        let preceding = before[..index].chars().last();
        if preceding == Some(tag_char) {
            continue;
        }
        if !shortcut.intraword && preceding.is_some_and(char::is_alphanumeric) {
            continue;
        }
        return Some((before[..index].chars().count(), content.chars().count()));
    }
    None
}

fn format_span(
    scope: &mut UpdateScope,
    key: NodeKey,
    text: &str,
    start: usize,
    content_len: usize,
    end: usize,
    shortcut: &TextShortcut,
) -> Result<()> {
    let tag_len = shortcut.tag.chars().count();
    let chars: Vec<char> = text.chars().collect();
    let original = scope.tree.kind(key).map(NodeKind::format).unwrap_or_default();
    let mut stripped: String = chars[..start].iter().collect();
    stripped.extend(&chars[start + tag_len..start + tag_len + content_len]);
    stripped.extend(&chars[end..]);
    scope.set_kind(key, NodeKind::text_node(&stripped, original))?;
    scope.select_caret(Point::text(key, 0));

    scope.split_text(key, start + content_len)?;
    let middle = scope.split_text(key, start)?.unwrap_or(key);
    let format = shortcut
        .formats
        .iter()
        .fold(original, |format, t| format.toggled(*t));
    if let NodeKind::Text { format: node_format, .. } = scope.kind_mut(middle)? {
        *node_format = format;
    }
    scope.set_range_with_format(RangeSelection {
        format: original,
        ..RangeSelection::collapsed(Point::text(middle, content_len))
    });
    Ok(())
}

/// Replace the chars `span` of `key` by a link, keeping the node format.
fn replace_with_link(
    scope: &mut UpdateScope,
    key: NodeKey,
    text: &str,
    (start, end): (usize, usize),
    label: &str,
    url: &str,
    title: String,
) -> Result<()> {
    let format = scope.tree.kind(key).map(NodeKind::format).unwrap_or_default();
    let head: String = text.chars().take(start).collect();
    let tail: String = text.chars().skip(end).collect();
    scope.set_kind(key, NodeKind::text_node(&head, format))?;

    let link = scope.create(NodeKind::Link {
        url: url.to_string(),
        title,
    });
    let label = scope.create(NodeKind::text_node(label, format));
    scope.append(link, label)?;
    scope.insert_after(key, link)?;
    let rest = scope.create(NodeKind::text_node(&tail, format));
    scope.insert_after(link, rest)?;
    scope.set_range_with_format(RangeSelection {
        format,
        ..RangeSelection::collapsed(Point::text(rest, 0))
    });
    Ok(())
}

fn strip_prefix(scope: &mut UpdateScope, key: NodeKey, offset: usize) -> Result<()> {
    if let NodeKind::Text { text, .. } = scope.kind_mut(key)? {
        *text = text.chars().skip(offset).collect();
    }
    let format = scope.range_selection().map(|range| range.format).unwrap_or_default();
    scope.set_range_with_format(RangeSelection {
        format,
        ..RangeSelection::collapsed(Point::text(key, 0))
    });
    Ok(())
}

/// Replace a paragraph by a list item, joining a directly preceding list of
/// the same type.
pub fn wrap_in_list(
    scope: &mut UpdateScope,
    block: NodeKey,
    list_type: ListType,
    start: usize,
    checked: Option<bool>,
) -> Result<NodeKey> {
    let item = scope.create(NodeKind::ListItem { checked });
    let previous_list = scope.tree.previous_sibling(block).filter(|previous| {
        matches!(
            scope.tree.kind(*previous),
            Some(NodeKind::List { list_type: t, .. }) if *t == list_type
        )
    });
    match previous_list {
        Some(list) => scope.append(list, item)?,
        None => {
            let list = scope.create(NodeKind::List { list_type, start });
            scope.insert_before(block, list)?;
            scope.append(list, item)?;
        }
    }

    let children = scope.tree.children(block).to_vec();
    for child in children {
        scope.append(item, child)?;
    }
    scope.remove(block)?;
    let caret = scope.point_at_block_offset(item, 0);
    scope.select_caret(caret);
    Ok(item)
}

fn convert_to_check_list(scope: &mut UpdateScope, item: NodeKey, checked: bool) -> Result<()> {
    let list = scope
        .tree
        .parent(item)
        .ok_or_else(|| anyhow!("List item {} is detached", item))?;
    let start = match scope.tree.kind(list) {
        Some(NodeKind::List { start, .. }) => *start,
        _ => 1,
    };
    scope.set_kind(
        list,
        NodeKind::List {
            list_type: ListType::Check,
            start,
        },
    )?;
    for sibling in scope.tree.children(list).to_vec() {
        if !scope.tree.is_content_block(sibling) {
            continue;
        }
        let state = if sibling == item { checked } else { false };
        scope.set_kind(sibling, NodeKind::ListItem { checked: Some(state) })?;
    }
    Ok(())
}
