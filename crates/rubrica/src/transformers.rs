//! Markdown transformer rules shared by import and export.

use crate::node::TextFormatType;

/// One Markdown construct the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transformer {
    Heading,
    Quote,
    UnorderedList,
    OrderedList,
    CheckList,
    CodeFence,
    HorizontalRule,
    InlineCode,
    Bold,
    Italic,
    Strikethrough,
    Highlight,
    Link,
}

impl Transformer {
    /// Rule covering a text format, if the format has a Markdown form.
    pub fn for_format(format: TextFormatType) -> Option<Transformer> {
        match format {
            TextFormatType::Bold => Some(Transformer::Bold),
            TextFormatType::Italic => Some(Transformer::Italic),
            TextFormatType::Strikethrough => Some(Transformer::Strikethrough),
            TextFormatType::Highlight => Some(Transformer::Highlight),
            TextFormatType::Code => Some(Transformer::InlineCode),
            TextFormatType::Underline => None,
        }
    }
}

/// Ordered rule list. The same value drives import, export and the typing
/// shortcuts, so a rule is either symmetric or absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformers {
    rules: Vec<Transformer>,
}

impl Transformers {
    pub fn standard() -> Self {
        Self::new(&[
            Transformer::Heading,
            Transformer::Quote,
            Transformer::UnorderedList,
            Transformer::OrderedList,
            Transformer::CheckList,
            Transformer::CodeFence,
            Transformer::HorizontalRule,
            Transformer::InlineCode,
            Transformer::Bold,
            Transformer::Italic,
            Transformer::Strikethrough,
            Transformer::Highlight,
            Transformer::Link,
        ])
    }

    pub fn new(rules: &[Transformer]) -> Self {
        let mut out = Vec::with_capacity(rules.len());
        for rule in rules {
            if !out.contains(rule) {
                out.push(*rule);
            }
        }
        Self { rules: out }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn contains(&self, rule: Transformer) -> bool {
        self.rules.contains(&rule)
    }

    pub fn without(mut self, rule: Transformer) -> Self {
        self.rules.retain(|r| *r != rule);
        self
    }

    pub fn rules(&self) -> &[Transformer] {
        &self.rules
    }

    /// Whether a text format survives a Markdown round trip.
    pub fn supports_format(&self, format: TextFormatType) -> bool {
        Transformer::for_format(format).is_some_and(|rule| self.contains(rule))
    }
}

impl Default for Transformers {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rules() {
        let rules = Transformers::standard();
        assert_eq!(rules.rules().len(), 13);
        assert_eq!(rules.rules()[0], Transformer::Heading);
        assert!(rules.supports_format(TextFormatType::Highlight));
        assert!(!rules.supports_format(TextFormatType::Underline));
    }

    #[test]
    fn test_without_and_dedup() {
        let rules = Transformers::new(&[Transformer::Bold, Transformer::Bold, Transformer::Link]);
        assert_eq!(rules.rules(), &[Transformer::Bold, Transformer::Link]);
        let rules = rules.without(Transformer::Bold);
        assert!(!rules.supports_format(TextFormatType::Bold));
        assert!(rules.contains(Transformer::Link));
    }
}
