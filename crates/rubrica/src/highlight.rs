use syntect::easy::HighlightLines;
use syntect::highlighting::{Style as SynStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};

use crate::languages::LanguageRegistry;
use crate::node::{NodeKey, NodeKind};
use crate::state::EditorState;

const FALLBACK_THEME: &str = "base16-ocean.dark";

/// Registry codes whose syntect token differs from the code itself.
const SYNTAX_ALIASES: &[(&str, &str)] = &[("clike", "c"), ("objc", "m")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub text: String,
    pub foreground: Rgb,
    pub background: Option<Rgb>,
}

pub type HighlightedLine = Vec<HighlightSpan>;

/// A code block of the document with its highlighted body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightedBlock {
    pub key: NodeKey,
    pub language: Option<String>,
    pub syntax_name: String,
    pub lines: Vec<HighlightedLine>,
}

pub struct CodeHighlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme: Theme,
}

impl CodeHighlighter {
    pub fn new(theme_name: &str) -> Self {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme_set = ThemeSet::load_defaults();

        let theme = theme_set
            .themes
            .get(theme_name)
            .or_else(|| {
                log::warn!("Unknown syntax theme {:?}, using {}", theme_name, FALLBACK_THEME);
                theme_set.themes.get(FALLBACK_THEME)
            })
            .or_else(|| theme_set.themes.values().next())
            .cloned()
            .unwrap_or_default();

        Self {
            syntax_set,
            theme_set,
            theme,
        }
    }

    pub fn set_theme(&mut self, theme_name: &str) -> bool {
        match self.theme_set.themes.get(theme_name) {
            Some(t) => {
                self.theme = t.clone();
                true
            }
            None => false,
        }
    }

    pub fn theme_names(&self) -> Vec<&str> {
        self.theme_set.themes.keys().map(String::as_str).collect()
    }

    /// Syntax for a code block language. Unknown or missing codes get plain
    /// text.
    pub fn find_syntax_for_language(&self, language: Option<&str>) -> &SyntaxReference {
        let Some(code) = language.map(str::trim).filter(|code| !code.is_empty()) else {
            return self.syntax_set.find_syntax_plain_text();
        };
        let lower = code.to_lowercase();
        let token = SYNTAX_ALIASES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, token)| *token)
            .unwrap_or(lower.as_str());
        self.syntax_set
            .find_syntax_by_token(token)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
    }

    pub fn highlight(&self, code: &str, language: Option<&str>) -> Vec<HighlightedLine> {
        let syntax = self.find_syntax_for_language(language);
        let mut highlighter = HighlightLines::new(syntax, &self.theme);
        LinesWithEndings::from(code)
            .map(|line| {
                let regions = highlighter
                    .highlight_line(line, &self.syntax_set)
                    .unwrap_or_else(|_| vec![(SynStyle::default(), line)]);
                regions
                    .into_iter()
                    .map(|(style, text)| syn_style_to_span(style, text.trim_end_matches('\n')))
                    .filter(|span| !span.text.is_empty())
                    .collect()
            })
            .collect()
    }

    /// Body with 24-bit terminal colors, for printing.
    pub fn to_ansi(&self, code: &str, language: Option<&str>) -> String {
        let syntax = self.find_syntax_for_language(language);
        let mut highlighter = HighlightLines::new(syntax, &self.theme);
        let mut out = String::new();
        for line in LinesWithEndings::from(code) {
            match highlighter.highlight_line(line, &self.syntax_set) {
                Ok(regions) => out.push_str(&as_24_bit_terminal_escaped(&regions, false)),
                Err(e) => {
                    log::debug!("Highlighting failed, printing plain line: {}", e);
                    out.push_str(line);
                }
            }
        }
        out.push_str("\x1b[0m");
        out
    }

    /// Every code block of the document, in document order. Block languages
    /// are resolved through `languages` first, so an unset language is
    /// highlighted as the default one.
    pub fn highlight_code_blocks(&self, state: &EditorState, languages: &LanguageRegistry) -> Vec<HighlightedBlock> {
        let tree = state.tree();
        tree.descendants(tree.root())
            .into_iter()
            .filter_map(|key| match tree.kind(key) {
                Some(NodeKind::Code { language }) => {
                    let language = languages.normalize(language.as_deref());
                    let body = tree.text_content(key);
                    let syntax_name = self.find_syntax_for_language(Some(&language)).name.clone();
                    Some(HighlightedBlock {
                        key,
                        lines: self.highlight(&body, Some(&language)),
                        language: Some(language),
                        syntax_name,
                    })
                }
                _ => None,
            })
            .collect()
    }
}

impl Default for CodeHighlighter {
    fn default() -> Self {
        Self::new(FALLBACK_THEME)
    }
}

fn syn_style_to_span(style: SynStyle, text: &str) -> HighlightSpan {
    let fg = style.foreground;
    let bg = style.background;
    let background = if bg.r == 0 && bg.g == 0 && bg.b == 0 {
        None
    } else {
        Some(Rgb {
            r: bg.r,
            g: bg.g,
            b: bg.b,
        })
    };
    HighlightSpan {
        text: text.to_string(),
        foreground: Rgb {
            r: fg.r,
            g: fg.g,
            b: fg.b,
        },
        background,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TextFormat;
    use crate::state::{UpdateScope, UpdateTags};

    #[test]
    fn test_registry_codes_map_to_syntaxes() {
        let highlighter = CodeHighlighter::default();
        assert_eq!(highlighter.find_syntax_for_language(Some("rust")).name, "Rust");
        assert_eq!(highlighter.find_syntax_for_language(Some("js")).name, "JavaScript");
        assert_eq!(highlighter.find_syntax_for_language(Some("javascript")).name, "JavaScript");
        assert_eq!(highlighter.find_syntax_for_language(Some("py")).name, "Python");
        assert_eq!(highlighter.find_syntax_for_language(Some("clike")).name, "C");
    }

    #[test]
    fn test_unknown_language_is_plain_text() {
        let highlighter = CodeHighlighter::default();
        assert_eq!(highlighter.find_syntax_for_language(None).name, "Plain Text");
        assert_eq!(highlighter.find_syntax_for_language(Some("")).name, "Plain Text");
        assert_eq!(highlighter.find_syntax_for_language(Some("nosuchlang")).name, "Plain Text");
    }

    #[test]
    fn test_highlight_keeps_text() {
        let highlighter = CodeHighlighter::new("no-such-theme");
        let lines = highlighter.highlight("let x = 1;\nlet y = 2;", Some("rust"));
        assert_eq!(lines.len(), 2);
        let first: String = lines[0].iter().map(|span| span.text.as_str()).collect();
        assert_eq!(first, "let x = 1;");
        assert!(lines[0].len() > 1);
    }

    #[test]
    fn test_ansi_output_has_escapes() {
        let highlighter = CodeHighlighter::default();
        let out = highlighter.to_ansi("fn main() {}\n", Some("rust"));
        assert!(out.contains("\x1b[38;2;"));
        assert!(out.ends_with("\x1b[0m"));
    }

    #[test]
    fn test_highlight_code_blocks_of_document() {
        let mut state = EditorState::new();
        let mut scope = UpdateScope::new(&mut state, UpdateTags::new());
        scope.clear_root().unwrap();
        let root = scope.tree().root();
        let code = scope.create(NodeKind::Code {
            language: Some("rust".to_string()),
        });
        scope.append(root, code).unwrap();
        let text = scope.create(NodeKind::text_node("fn main() {}", TextFormat::NONE));
        scope.append(code, text).unwrap();
        let paragraph = scope.create(NodeKind::Paragraph);
        scope.append(root, paragraph).unwrap();

        let blocks = CodeHighlighter::default().highlight_code_blocks(&state, &LanguageRegistry::standard());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].key, code);
        assert_eq!(blocks[0].syntax_name, "Rust");
        assert_eq!(blocks[0].lines.len(), 1);
    }

    #[test]
    fn test_unset_block_language_uses_registry_default() {
        let mut state = EditorState::new();
        let mut scope = UpdateScope::new(&mut state, UpdateTags::new());
        scope.clear_root().unwrap();
        let root = scope.tree().root();
        let code = scope.create(NodeKind::Code { language: None });
        scope.append(root, code).unwrap();
        let text = scope.create(NodeKind::text_node("let x = 1;", TextFormat::NONE));
        scope.append(code, text).unwrap();

        let highlighter = CodeHighlighter::default();
        let blocks = highlighter.highlight_code_blocks(&state, &LanguageRegistry::standard());
        assert_eq!(blocks[0].language.as_deref(), Some("javascript"));
        assert_eq!(blocks[0].syntax_name, "JavaScript");

        let rust_default = LanguageRegistry::standard().with_default("rust").unwrap();
        let blocks = highlighter.highlight_code_blocks(&state, &rust_default);
        assert_eq!(blocks[0].syntax_name, "Rust");
    }
}
