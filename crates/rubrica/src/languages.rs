//! Code block language registry used by the language picker.

use anyhow::{bail, Result};

/// Language given to new code blocks.
pub const DEFAULT_CODE_LANGUAGE: &str = "javascript";

/// Built-in `(code, label)` pairs, in picker order.
///
/// `js` and `javascript` both exist: new code blocks are created with
/// `javascript`, while fences written by hand mostly use `js`.
pub const CODE_LANGUAGES: &[(&str, &str)] = &[
    ("c", "C"),
    ("clike", "C-like"),
    ("cpp", "C++"),
    ("css", "CSS"),
    ("html", "HTML"),
    ("java", "Java"),
    ("js", "JavaScript"),
    ("javascript", "JavaScript"),
    ("markdown", "Markdown"),
    ("objc", "Objective-C"),
    ("plain", "Plain Text"),
    ("powershell", "PowerShell"),
    ("py", "Python"),
    ("rust", "Rust"),
    ("sql", "SQL"),
    ("swift", "Swift"),
    ("typescript", "TypeScript"),
    ("xml", "XML"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageEntry {
    pub code: String,
    pub label: String,
}

/// Immutable mapping from language codes to display labels plus the default
/// code for new or unset blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRegistry {
    entries: Vec<LanguageEntry>,
    default_language: String,
}

impl LanguageRegistry {
    pub fn standard() -> Self {
        Self {
            entries: CODE_LANGUAGES
                .iter()
                .map(|(code, label)| LanguageEntry {
                    code: code.to_string(),
                    label: label.to_string(),
                })
                .collect(),
            default_language: DEFAULT_CODE_LANGUAGE.to_string(),
        }
    }

    /// Build a registry from custom pairs. The default must be one of them.
    pub fn new<I, C, L>(entries: I, default_language: &str) -> Result<Self>
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: Into<String>,
    {
        let mut registry = Self {
            entries: Vec::new(),
            default_language: default_language.to_string(),
        };
        for (code, label) in entries {
            let code = code.into();
            if code.is_empty() {
                bail!("Language codes must not be empty");
            }
            if registry.contains(&code) {
                bail!("Duplicate language code: {}", code);
            }
            registry.entries.push(LanguageEntry {
                code,
                label: label.into(),
            });
        }
        if !registry.contains(default_language) {
            bail!("Default language {:?} is not registered", default_language);
        }
        Ok(registry)
    }

    /// Same entries with another default.
    pub fn with_default(mut self, default_language: &str) -> Result<Self> {
        if !self.contains(default_language) {
            bail!("Default language {:?} is not registered", default_language);
        }
        self.default_language = default_language.to_string();
        Ok(self)
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.iter().any(|entry| entry.code == code)
    }

    /// Resolve the language of a code block for display: unset or empty
    /// resolves to the default, anything else is kept as is.
    pub fn normalize(&self, code: Option<&str>) -> String {
        match code {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => self.default_language.clone(),
        }
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.code == code)
            .map(|entry| entry.label.as_str())
    }

    /// Label for a normalized code; unknown codes are shown raw.
    pub fn display_label(&self, code: Option<&str>) -> String {
        let code = self.normalize(code);
        match self.label(&code) {
            Some(label) => label.to_string(),
            None => code,
        }
    }

    pub fn options(&self) -> &[LanguageEntry] {
        &self.entries
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unset_uses_default() {
        let registry = LanguageRegistry::standard();
        assert_eq!(registry.normalize(None), "javascript");
        assert_eq!(registry.normalize(Some("")), "javascript");
        assert_eq!(registry.display_label(None), "JavaScript");
    }

    #[test]
    fn test_normalize_known_code() {
        let registry = LanguageRegistry::standard();
        assert_eq!(registry.normalize(Some("rust")), "rust");
        assert_eq!(registry.display_label(Some("py")), "Python");
    }

    #[test]
    fn test_normalize_keeps_unknown_code() {
        let registry = LanguageRegistry::standard();
        assert_eq!(registry.normalize(Some("haskell")), "haskell");
        assert_eq!(registry.display_label(Some("haskell")), "haskell");
        assert!(!registry.contains("haskell"));
    }

    #[test]
    fn test_js_and_javascript_share_a_label() {
        let registry = LanguageRegistry::standard();
        assert_eq!(registry.default_language(), "javascript");
        assert_ne!(registry.default_language(), "js");
        assert_eq!(registry.label("js"), Some("JavaScript"));
        assert_eq!(registry.label("javascript"), Some("JavaScript"));
        assert_eq!(registry.normalize(Some("js")), "js");
    }

    #[test]
    fn test_options_keep_order() {
        let registry = LanguageRegistry::standard();
        let codes: Vec<&str> = registry.options().iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes.first(), Some(&"c"));
        assert_eq!(codes.last(), Some(&"xml"));
        assert_eq!(codes.len(), 18);
    }

    #[test]
    fn test_custom_registry_validation() {
        assert!(LanguageRegistry::new([("rust", "Rust")], "go").is_err());
        assert!(LanguageRegistry::new([("rust", "Rust"), ("rust", "Rust 2")], "rust").is_err());

        let registry = LanguageRegistry::new([("rust", "Rust"), ("go", "Go")], "go").unwrap();
        assert_eq!(registry.normalize(None), "go");
        assert!(LanguageRegistry::standard().with_default("plain").is_ok());
        assert!(LanguageRegistry::standard().with_default("cobol").is_err());
    }
}
