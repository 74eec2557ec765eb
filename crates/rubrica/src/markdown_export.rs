//! Document tree → Markdown.

use crate::document::DocumentTree;
use crate::node::{ListType, NodeKey, NodeKind, TextFormat, TextFormatType};
use crate::state::EditorState;
use crate::transformers::{Transformer, Transformers};

const NESTED_LIST_INDENT: &str = "    ";

/// Marker order, outermost first. Inline code is written as its own span.
const MARKERS: [(TextFormatType, &str); 4] = [
    (TextFormatType::Bold, "**"),
    (TextFormatType::Italic, "*"),
    (TextFormatType::Strikethrough, "~~"),
    (TextFormatType::Highlight, "=="),
];

/// Serialize the document. Top-level blocks are separated by a blank line,
/// empty blocks are skipped and only registered constructs get Markdown
/// syntax. Text that would read as syntax is backslash-escaped.
pub fn convert_to_markdown(state: &EditorState, rules: &Transformers) -> String {
    let exporter = Exporter {
        tree: state.tree(),
        rules,
    };
    let tree = state.tree();
    tree.children(tree.root())
        .iter()
        .map(|block| exporter.block(*block))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Text of the first block, as shown by a readonly editor.
pub fn plain_text(state: &EditorState) -> String {
    let tree = state.tree();
    tree.children(tree.root())
        .first()
        .map(|block| tree.text_content(*block))
        .unwrap_or_default()
}

struct Exporter<'a> {
    tree: &'a DocumentTree,
    rules: &'a Transformers,
}

impl Exporter<'_> {
    fn has(&self, rule: Transformer) -> bool {
        self.rules.contains(rule)
    }

    fn block(&self, key: NodeKey) -> String {
        match self.tree.kind(key) {
            Some(NodeKind::Paragraph) => self.inlines(key, BreakStyle::Hard),
            Some(NodeKind::Heading { level }) => {
                if !self.has(Transformer::Heading) {
                    return self.inlines(key, BreakStyle::Hard);
                }
                let mut content = self.inlines(key, BreakStyle::Space);
                if content.is_empty() {
                    return content;
                }
                // A trailing `#` would be read as a closing sequence
                if content.ends_with('#') && !content.ends_with("\\#") {
                    content.insert(content.len() - 1, '\\');
                }
                format!("{} {}", "#".repeat(*level as usize), content)
            }
            Some(NodeKind::Quote) => {
                if !self.has(Transformer::Quote) {
                    return self.inlines(key, BreakStyle::Hard);
                }
                let content = self.inlines(key, BreakStyle::Paragraph);
                if content.is_empty() {
                    content
                } else {
                    prefix_lines(&content, "> ", "> ")
                }
            }
            Some(NodeKind::List { .. }) => self.list(key, 0).join("\n"),
            Some(NodeKind::Code { language }) => {
                let body = self.tree.text_content(key);
                if !self.has(Transformer::CodeFence) {
                    let mut writer = InlineWriter::new(BreakStyle::Hard);
                    for (index, line) in body.split('\n').enumerate() {
                        if index > 0 {
                            writer.line_break();
                        }
                        writer.text(line, TextFormat::NONE);
                    }
                    return writer.finish();
                }
                let fence = "`".repeat(longest_backtick_run(&body).max(2) + 1);
                let language = language.as_deref().unwrap_or("");
                if body.is_empty() {
                    format!("{}{}\n{}", fence, language, fence)
                } else {
                    format!("{}{}\n{}\n{}", fence, language, body, fence)
                }
            }
            Some(NodeKind::HorizontalRule) if self.has(Transformer::HorizontalRule) => "---".to_string(),
            _ => String::new(),
        }
    }

    fn list(&self, list: NodeKey, depth: usize) -> Vec<String> {
        let Some(NodeKind::List { list_type, start }) = self.tree.kind(list) else {
            return Vec::new();
        };
        let indent = NESTED_LIST_INDENT.repeat(depth);
        let mut number = *start;
        let mut lines = Vec::new();
        for item in self.tree.children(list) {
            if !self.tree.is_content_block(*item) {
                for nested in self.tree.children(*item) {
                    lines.extend(self.list(*nested, depth + 1));
                }
                continue;
            }
            let checked = match self.tree.kind(*item) {
                Some(NodeKind::ListItem { checked }) => *checked,
                _ => None,
            };
            let marker = match list_type {
                ListType::Bullet if self.has(Transformer::UnorderedList) => "- ".to_string(),
                ListType::Number if self.has(Transformer::OrderedList) => format!("{}. ", number),
                ListType::Check if self.has(Transformer::CheckList) => match checked {
                    Some(true) => "- [x] ".to_string(),
                    Some(false) => "- [ ] ".to_string(),
                    None => "- ".to_string(),
                },
                ListType::Check if self.has(Transformer::UnorderedList) => "- ".to_string(),
                _ => String::new(),
            };
            number += 1;
            let continuation = format!("{}{}", indent, " ".repeat(marker.len().min(4)));
            let content = self.inlines(*item, BreakStyle::Hard);
            lines.push(prefix_lines(&content, &format!("{}{}", indent, marker), &continuation));
        }
        lines
    }

    fn inlines(&self, parent: NodeKey, style: BreakStyle) -> String {
        let mut writer = InlineWriter::new(style);
        self.write_inlines(parent, &mut writer);
        writer.finish()
    }

    fn write_inlines(&self, parent: NodeKey, writer: &mut InlineWriter) {
        for child in self.tree.children(parent) {
            match self.tree.kind(*child) {
                Some(NodeKind::Text { text, format }) => writer.text(text, self.exported_format(*format)),
                Some(NodeKind::LineBreak) => writer.line_break(),
                Some(NodeKind::Link { url, title }) => {
                    if self.has(Transformer::Link) {
                        writer.close_markers();
                        let mut inner = InlineWriter::new(BreakStyle::Hard);
                        inner.line_start = false;
                        self.write_inlines(*child, &mut inner);
                        let label = inner.finish();
                        let target = if title.is_empty() {
                            link_destination(url)
                        } else {
                            format!("{} \"{}\"", link_destination(url), link_title(title))
                        };
                        writer.raw(&format!("[{}]({})", label, target));
                    } else {
                        self.write_inlines(*child, writer);
                    }
                }
                _ => {}
            }
        }
    }

    fn exported_format(&self, format: TextFormat) -> TextFormat {
        format
            .iter()
            .filter(|t| self.rules.supports_format(*t))
            .fold(TextFormat::NONE, TextFormat::with)
    }
}

/// How line break nodes are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakStyle {
    /// Backslash hard breaks.
    Hard,
    /// A single break is a hard break, a run of them separates paragraphs.
    Paragraph,
    /// Breaks become spaces, for single-line blocks.
    Space,
}

/// Emits inline text with properly nested format markers. Whitespace at the
/// edge of a formatted run is moved outside its markers and dropped at the
/// start of a line.
struct InlineWriter {
    out: String,
    open: Vec<TextFormatType>,
    pending_space: String,
    pending_breaks: usize,
    line_start: bool,
    style: BreakStyle,
}

impl Default for InlineWriter {
    fn default() -> Self {
        Self::new(BreakStyle::Hard)
    }
}

impl InlineWriter {
    fn new(style: BreakStyle) -> Self {
        Self {
            out: String::new(),
            open: Vec::new(),
            pending_space: String::new(),
            pending_breaks: 0,
            line_start: true,
            style,
        }
    }

    fn text(&mut self, text: &str, format: TextFormat) {
        let core = text.trim();
        if core.is_empty() {
            self.pending_space.push_str(text);
            return;
        }
        let leading = &text[..text.len() - text.trim_start().len()];
        let trailing = &text[text.trim_end().len()..];

        let desired: Vec<TextFormatType> = MARKERS
            .iter()
            .map(|(t, _)| *t)
            .filter(|t| format.has(*t))
            .collect();
        // Close everything above the first open marker that is no longer wanted
        let keep = self
            .open
            .iter()
            .position(|t| !desired.contains(t))
            .unwrap_or(self.open.len());
        while self.open.len() > keep {
            if let Some(t) = self.open.pop() {
                self.out.push_str(marker(t));
            }
        }
        self.flush_breaks();
        let at_line_start = self.line_start;
        if at_line_start {
            self.pending_space.clear();
        } else {
            self.out.push_str(&std::mem::take(&mut self.pending_space));
            self.out.push_str(leading);
        }

        let mut opened = false;
        for t in desired {
            if !self.open.contains(&t) {
                self.out.push_str(marker(t));
                self.open.push(t);
                opened = true;
            }
        }
        if format.has(TextFormatType::Code) {
            self.out.push_str(&code_span(core));
        } else {
            self.out.push_str(&escape_text(core, at_line_start && !opened));
        }
        self.line_start = false;
        self.pending_space = trailing.to_string();
    }

    fn line_break(&mut self) {
        self.close_markers();
        self.pending_space.clear();
        self.pending_breaks += 1;
    }

    /// Breaks are written once more content follows, so trailing ones are
    /// dropped.
    fn flush_breaks(&mut self) {
        let breaks = std::mem::take(&mut self.pending_breaks);
        if breaks == 0 {
            return;
        }
        match self.style {
            BreakStyle::Hard => {
                for _ in 0..breaks {
                    self.out.push_str("\\\n");
                }
                self.line_start = true;
            }
            BreakStyle::Paragraph => {
                self.out.push_str(if breaks == 1 { "\\\n" } else { "\n\n" });
                self.line_start = true;
            }
            BreakStyle::Space => {
                if !self.line_start {
                    self.pending_space.push(' ');
                }
            }
        }
    }

    fn raw(&mut self, text: &str) {
        self.flush_breaks();
        if self.line_start {
            self.pending_space.clear();
        } else {
            self.out.push_str(&std::mem::take(&mut self.pending_space));
        }
        // `!` right before a link would turn it into an image
        if self.out.ends_with('!') && text.starts_with('[') {
            self.out.insert(self.out.len() - 1, '\\');
        }
        self.out.push_str(text);
        self.line_start = false;
    }

    fn close_markers(&mut self) {
        while let Some(t) = self.open.pop() {
            self.out.push_str(marker(t));
        }
    }

    fn close_all(&mut self) {
        self.close_markers();
        self.out.push_str(&std::mem::take(&mut self.pending_space));
    }

    fn finish(mut self) -> String {
        self.close_all();
        self.out
    }
}

fn marker(format: TextFormatType) -> &'static str {
    MARKERS
        .iter()
        .find(|(t, _)| *t == format)
        .map(|(_, m)| *m)
        .unwrap_or("")
}

/// Backslash-escape characters of `text` that would otherwise be read as
/// Markdown. Block markers only count at the start of a line.
fn escape_text(text: &str, at_line_start: bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 4);
    let mut skip = 0;
    if at_line_start {
        let digits = chars.iter().take_while(|c| c.is_ascii_digit()).count();
        match chars.first() {
            Some('#' | '>' | '-' | '+') => out.push('\\'),
            _ if digits > 0 && matches!(chars.get(digits), Some('.' | ')')) => {
                out.extend(&chars[..digits]);
                out.push('\\');
                skip = digits;
            }
            _ => {}
        }
    }
    for (index, c) in chars.iter().enumerate().skip(skip) {
        let escape = match c {
            '\\' | '*' | '_' | '`' | '~' | '=' | '[' | ']' => true,
            '<' => chars
                .get(index + 1)
                .is_some_and(|next| next.is_ascii_alphabetic() || matches!(*next, '/' | '!' | '?')),
            '&' => looks_like_entity(&chars[index + 1..]),
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(*c);
    }
    out
}

fn looks_like_entity(rest: &[char]) -> bool {
    let body = rest.strip_prefix(&['#'][..]).unwrap_or(rest);
    let len = body.iter().take_while(|c| c.is_ascii_alphanumeric()).count();
    len > 0 && body.get(len) == Some(&';')
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c: char| c != '`').map(str::len).max().unwrap_or(0)
}

/// Inline code delimited by one more backtick than the longest run inside.
fn code_span(code: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(code) + 1);
    let pad = if code.starts_with('`') || code.ends_with('`') {
        " "
    } else {
        ""
    };
    format!("{}{}{}{}{}", fence, pad, code, pad, fence)
}

fn link_destination(url: &str) -> String {
    let needs_brackets =
        url.is_empty() || url.chars().any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '<' | '>'));
    if needs_brackets {
        format!("<{}>", url.replace('<', "\\<").replace('>', "\\>"))
    } else {
        url.to_string()
    }
}

fn link_title(title: &str) -> String {
    title.replace('\\', "\\\\").replace('"', "\\\"")
}

fn prefix_lines(content: &str, first: &str, rest: &str) -> String {
    content
        .split('\n')
        .enumerate()
        .map(|(index, line)| {
            let prefix = if index == 0 { first } else { rest };
            if line.is_empty() {
                prefix.trim_end().to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown_import::convert_from_markdown;
    use crate::state::{UpdateScope, UpdateTags};

    fn round_trip(markdown: &str) -> String {
        round_trip_with(markdown, &Transformers::standard())
    }

    fn round_trip_with(markdown: &str, rules: &Transformers) -> String {
        let mut state = EditorState::new();
        let mut scope = UpdateScope::new(&mut state, UpdateTags::new());
        convert_from_markdown(&mut scope, markdown, rules).unwrap();
        scope.normalize().unwrap();
        convert_to_markdown(&state, rules)
    }

    #[test]
    fn test_round_trip_common_documents() {
        let documents = [
            "# Title\n\n**bold** text",
            "## Sub\n\nplain *italic* and ~~gone~~ and ==marked==",
            "> quoted line",
            "- one\n- two",
            "3. three\n4. four",
            "- [x] done\n- [ ] todo",
            "```rust\nfn main() {}\n```",
            "before\n\n---\n\nafter",
            "a `code` span",
            "[site](https://example.com \"Example\")",
        ];
        for markdown in documents {
            assert_eq!(round_trip(markdown), markdown, "round trip of {:?}", markdown);
        }
    }

    #[test]
    fn test_round_trip_nested_list() {
        assert_eq!(round_trip("- a\n    - b\n- c"), "- a\n    - b\n- c");
    }

    #[test]
    fn test_whitespace_moves_outside_markers() {
        let mut writer = InlineWriter::default();
        writer.text("bold ", TextFormat::of(&[TextFormatType::Bold]));
        writer.text("plain", TextFormat::NONE);
        assert_eq!(writer.finish(), "**bold** plain");
    }

    #[test]
    fn test_nested_markers_close_in_order() {
        let mut writer = InlineWriter::default();
        writer.text("a", TextFormat::of(&[TextFormatType::Bold]));
        writer.text("b", TextFormat::of(&[TextFormatType::Bold, TextFormatType::Italic]));
        writer.text("c", TextFormat::NONE);
        assert_eq!(writer.finish(), "**a*b***c");
    }

    #[test]
    fn test_unregistered_rules_export_plain() {
        let mut state = EditorState::new();
        let mut scope = UpdateScope::new(&mut state, UpdateTags::new());
        convert_from_markdown(&mut scope, "# Title\n\n**bold**", &Transformers::standard()).unwrap();
        scope.normalize().unwrap();
        let rules = Transformers::standard()
            .without(Transformer::Heading)
            .without(Transformer::Bold);
        assert_eq!(convert_to_markdown(&state, &rules), "Title\n\nbold");
    }

    #[test]
    fn test_underline_is_not_exported() {
        let mut writer = InlineWriter::default();
        let exporter_rules = Transformers::standard();
        let format = TextFormat::of(&[TextFormatType::Underline, TextFormatType::Bold]);
        let tree = DocumentTree::new();
        let exporter = Exporter {
            tree: &tree,
            rules: &exporter_rules,
        };
        writer.text("u", exporter.exported_format(format));
        assert_eq!(writer.finish(), "**u**");
    }

    #[test]
    fn test_empty_blocks_are_skipped() {
        let state = EditorState::new();
        assert_eq!(convert_to_markdown(&state, &Transformers::standard()), "");
        assert_eq!(plain_text(&state), "");
    }

    #[test]
    fn test_line_breaks_in_paragraph() {
        assert_eq!(round_trip("first\nsecond"), "first second");
        assert_eq!(round_trip("first\\\nsecond"), "first\\\nsecond");
        assert_eq!(round_trip("first  \nsecond"), "first\\\nsecond");
    }

    #[test]
    fn test_mixed_task_list_keeps_plain_items() {
        assert_eq!(round_trip("- [ ] a\n- b"), "- [ ] a\n- b");
        assert_eq!(round_trip("- a\n- [x] b"), "- a\n- [x] b");
    }

    #[test]
    fn test_quote_paragraphs_keep_separator() {
        assert_eq!(round_trip("> a\n>\n> b"), "> a\n>\n> b");
        assert_eq!(round_trip("> a\\\n> b"), "> a\\\n> b");
    }

    #[test]
    fn test_literal_syntax_is_escaped() {
        let documents = [
            "\\*lit\\*",
            "\\# not heading",
            "\\> not a quote",
            "\\- not a list",
            "1\\. not a list",
            "a \\_b\\_ c",
            "x \\=\\=y\\=\\= z",
            "\\~\\~kept\\~\\~",
            "\\[not\\](a link)",
            "back\\\\slash",
            "\\<div> and &amp\\; text",
            "## ends with \\#",
            "- \\[ \\] plain item",
        ];
        for markdown in documents {
            let once = round_trip(markdown);
            assert_eq!(round_trip(&once), once, "stable export of {:?}", markdown);
            assert_eq!(mdcore::to_html(&once), mdcore::to_html(markdown), "rendering of {:?}", markdown);
        }
        assert_eq!(round_trip("\\*lit\\*"), "\\*lit\\*");
        assert_eq!(round_trip("\\# not heading"), "\\# not heading");
    }

    #[test]
    fn test_plain_text_that_looks_like_syntax() {
        let mut writer = InlineWriter::default();
        writer.text("**not bold** and `tick`", TextFormat::NONE);
        assert_eq!(writer.finish(), "\\*\\*not bold\\*\\* and \\`tick\\`");

        let mut writer = InlineWriter::default();
        writer.text("   # hash", TextFormat::NONE);
        writer.line_break();
        writer.text("2) two", TextFormat::NONE);
        assert_eq!(writer.finish(), "\\# hash\\\n2\\) two");

        let mut writer = InlineWriter::default();
        writer.text("wow!", TextFormat::NONE);
        writer.raw("[x](y)");
        assert_eq!(writer.finish(), "wow\\![x](y)");
    }

    #[test]
    fn test_code_delimiters_outgrow_content() {
        assert_eq!(round_trip("~~~\n```\n~~~"), "````\n```\n````");
        assert_eq!(round_trip("`` a`b ``"), "``a`b``");
        assert_eq!(round_trip("``` `` ```"), "``` `` ```");
        for markdown in ["~~~\n```\n~~~", "`` a`b ``", "``` `` ```"] {
            assert_eq!(mdcore::to_html(&round_trip(markdown)), mdcore::to_html(markdown));
        }
    }

    #[test]
    fn test_link_destination_with_spaces() {
        assert_eq!(round_trip("[a](<my file.md>)"), "[a](<my file.md>)");
        assert_eq!(
            round_trip("[a](x \"say \\\"hi\\\"\")"),
            "[a](x \"say \\\"hi\\\"\")"
        );
    }
}
