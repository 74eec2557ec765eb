//! Markdown editing surface: the editor, its toolbar and the Markdown
//! conversion behind one handle.

use anyhow::{bail, Result};

use crate::command::Command;
use crate::config::EditorConfig;
use crate::editor::{Editor, ListenerId};
use crate::highlight::{CodeHighlighter, HighlightedBlock};
use crate::markdown_export::{convert_to_markdown, plain_text};
use crate::markdown_import::{convert_from_markdown, import_plain_text};
use crate::state::{UpdateTag, UpdateTags};
use crate::toolbar::{ToolbarAction, ToolbarController, ToolbarLayout, ToolbarState};

pub struct MarkdownEditor {
    editor: Editor,
    toolbar: Option<ToolbarController>,
    initialized: bool,
}

impl MarkdownEditor {
    /// Create an editor holding `markdown`. Read-only editors keep the text
    /// verbatim in a single block and get no toolbar.
    pub fn new(markdown: &str, config: EditorConfig) -> Result<Self> {
        let mut editor = Editor::new(config);
        let toolbar = editor.is_editable().then(|| ToolbarController::attach(&mut editor));
        let mut this = Self {
            editor,
            toolbar,
            initialized: false,
        };
        this.initialize_from_markdown(markdown)?;
        Ok(this)
    }

    pub fn with_change_callback<F>(markdown: &str, config: EditorConfig, callback: F) -> Result<Self>
    where
        F: Fn(&str) + 'static,
    {
        let mut this = Self::new(markdown, config)?;
        this.on_change_markdown(callback);
        Ok(this)
    }

    /// Load the initial content. Allowed once per editor, before any edit.
    pub fn initialize_from_markdown(&mut self, markdown: &str) -> Result<()> {
        if self.initialized {
            bail!("Editor {:?} is already initialized", self.editor.config().namespace);
        }
        self.replace_content(markdown)?;
        self.initialized = true;
        Ok(())
    }

    /// Host-driven replacement of the whole document. No change
    /// notification fires and the undo history starts over.
    pub fn set_markdown(&mut self, markdown: &str) -> Result<()> {
        self.replace_content(markdown)
    }

    fn replace_content(&mut self, markdown: &str) -> Result<()> {
        let tags = UpdateTags::of(&[UpdateTag::Programmatic, UpdateTag::SkipHistory]);
        if self.editor.is_editable() {
            let transformers = self.editor.config().transformers.clone();
            self.editor
                .update_with_tags(tags, |scope| convert_from_markdown(scope, markdown, &transformers))?;
        } else {
            self.editor
                .update_with_tags(tags, |scope| import_plain_text(scope, markdown))?;
        }
        self.editor.reset_history();
        log::debug!("Replaced content with {} bytes of Markdown", markdown.len());
        Ok(())
    }

    /// Call `callback` with the serialized document after every committed
    /// edit. Host replacements do not notify. Read-only editors never change,
    /// so nothing is registered for them.
    pub fn on_change_markdown<F>(&mut self, callback: F) -> Option<ListenerId>
    where
        F: Fn(&str) + 'static,
    {
        if !self.editor.is_editable() {
            return None;
        }
        let transformers = self.editor.config().transformers.clone();
        let id = self.editor.register_update_listener(move |payload| {
            if !payload.dirty || payload.tags.contains(UpdateTag::Programmatic) {
                return;
            }
            let markdown = convert_to_markdown(payload.state, &transformers);
            callback(&markdown);
        });
        Some(id)
    }

    pub fn markdown(&self) -> String {
        if self.editor.is_editable() {
            convert_to_markdown(self.editor.state(), &self.editor.config().transformers)
        } else {
            plain_text(self.editor.state())
        }
    }

    /// Sanitized HTML rendering of the current content.
    pub fn preview_html(&self) -> String {
        mdcore::preview_html(&self.markdown())
    }

    pub fn highlight_code_blocks(&self, highlighter: &CodeHighlighter) -> Vec<HighlightedBlock> {
        highlighter.highlight_code_blocks(self.editor.state(), &self.editor.config().languages)
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub fn is_readonly(&self) -> bool {
        !self.editor.is_editable()
    }

    pub fn dispatch(&mut self, command: Command) -> bool {
        self.editor.dispatch_command(command)
    }

    pub fn toolbar_state(&self) -> Option<ToolbarState> {
        self.toolbar.as_ref().map(ToolbarController::state)
    }

    pub fn toolbar_layout(&self) -> Option<ToolbarLayout> {
        self.toolbar.as_ref().map(ToolbarController::layout)
    }

    /// Run a toolbar click. Read-only editors have no toolbar.
    pub fn apply(&mut self, action: ToolbarAction) -> Result<bool> {
        match self.toolbar.as_ref() {
            Some(toolbar) => toolbar.apply(&mut self.editor, action),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageRegistry;
    use crate::node::{NodeKind, TextFormatType};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn editor(markdown: &str) -> MarkdownEditor {
        MarkdownEditor::new(markdown, EditorConfig::default()).unwrap()
    }

    fn caret_at_end(md: &mut MarkdownEditor) {
        md.editor_mut()
            .update(|scope| {
                scope.select_end();
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_scenario_title_and_bold() {
        let mut md = editor("# Title\n\n**bold** text");
        md.editor_mut().update(|scope| scope.select_text("bold")).unwrap();
        let state = md.toolbar_state().unwrap();
        assert!(state.bold);
        assert!(!state.is_in_code_block);
        assert_eq!(md.markdown(), "# Title\n\n**bold** text");
    }

    #[test]
    fn test_round_trip_through_editor() {
        let documents = [
            "# Heading\n\nSome *emphasis* and **strength**.",
            "> a quote\n\n- [ ] open\n- [x] closed",
            "1. first\n2. second\n\n---\n\n```python\nprint(1)\n```",
        ];
        for markdown in documents {
            assert_eq!(editor(markdown).markdown(), markdown);
        }
    }

    #[test]
    fn test_initialize_only_once() {
        let mut md = editor("text");
        assert!(md.initialize_from_markdown("other").is_err());
        assert_eq!(md.markdown(), "text");
    }

    #[test]
    fn test_initial_content_is_not_undoable() {
        let md = editor("# Title");
        assert!(!md.editor().can_undo());
        assert!(!md.toolbar_state().unwrap().can_undo);
    }

    #[test]
    fn test_change_callback_fires_on_edits_only() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut md = MarkdownEditor::with_change_callback("# Title", EditorConfig::default(), move |markdown| {
            sink.borrow_mut().push(markdown.to_string())
        })
        .unwrap();
        assert!(seen.borrow().is_empty());

        // Selection-only updates are not content changes
        caret_at_end(&mut md);
        assert!(seen.borrow().is_empty());

        assert!(md.dispatch(Command::InsertText("!".into())));
        assert_eq!(seen.borrow().as_slice(), ["# Title!".to_string()]);

        md.set_markdown("replaced").unwrap();
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(md.markdown(), "replaced");
        assert!(!md.editor().can_undo());
    }

    #[test]
    fn test_stale_notification_precedes_replacement() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut md = MarkdownEditor::with_change_callback("old", EditorConfig::default(), move |markdown| {
            sink.borrow_mut().push(markdown.to_string())
        })
        .unwrap();
        caret_at_end(&mut md);
        md.dispatch(Command::InsertText(" edit".into()));
        md.set_markdown("new").unwrap();
        caret_at_end(&mut md);
        md.dispatch(Command::InsertText("er".into()));
        assert_eq!(seen.borrow().as_slice(), ["old edit".to_string(), "newer".to_string()]);
    }

    #[test]
    fn test_toggle_code_block_twice_restores_structure() {
        let mut md = editor("para");
        caret_at_end(&mut md);
        md.apply(ToolbarAction::ToggleCodeBlock).unwrap();
        assert_eq!(md.markdown(), "```javascript\npara\n```");
        assert!(md.toolbar_state().unwrap().is_in_code_block);
        md.apply(ToolbarAction::ToggleCodeBlock).unwrap();
        assert_eq!(md.markdown(), "para");
    }

    #[test]
    fn test_wrap_selection_moves_text_into_code() {
        let mut md = editor("before middle after");
        md.editor_mut().update(|scope| scope.select_text("middle")).unwrap();
        md.apply(ToolbarAction::ToggleCodeBlock).unwrap();
        assert_eq!(md.markdown(), "before \n\n```javascript\nmiddle\n```\n\nafter");
        assert_eq!(md.editor().state().text_content().matches("middle").count(), 1);
    }

    #[test]
    fn test_language_display_follows_registry() {
        let mut md = editor("```\nx\n```\n\n```rust\ny\n```\n\n```zig\nz\n```");
        md.editor_mut().update(|scope| scope.select_text("x")).unwrap();
        assert_eq!(md.toolbar_state().unwrap().selected_language, "javascript");

        md.editor_mut().update(|scope| scope.select_text("y")).unwrap();
        let picker = md.toolbar_layout().unwrap().language_picker.unwrap();
        assert_eq!(picker.selected_label, "Rust");

        md.editor_mut().update(|scope| scope.select_text("z")).unwrap();
        let picker = md.toolbar_layout().unwrap().language_picker.unwrap();
        assert_eq!(picker.selected, "zig");
        assert_eq!(picker.selected_label, "zig");
    }

    #[test]
    fn test_custom_default_language() {
        let languages = LanguageRegistry::standard().with_default("rust").unwrap();
        let mut md = MarkdownEditor::new("x", EditorConfig::default().with_languages(languages)).unwrap();
        caret_at_end(&mut md);
        md.apply(ToolbarAction::ToggleCodeBlock).unwrap();
        assert_eq!(md.markdown(), "```rust\nx\n```");
    }

    #[test]
    fn test_undo_redo_through_toolbar() {
        let mut md = editor("a");
        caret_at_end(&mut md);
        assert!(!md.apply(ToolbarAction::Undo).unwrap());

        md.apply(ToolbarAction::FormatText(TextFormatType::Bold)).unwrap();
        md.dispatch(Command::InsertText("b".into()));
        assert_eq!(md.markdown(), "a**b**");
        assert!(md.toolbar_state().unwrap().can_undo);

        assert!(md.apply(ToolbarAction::Undo).unwrap());
        assert_eq!(md.markdown(), "a");
        assert!(md.toolbar_state().unwrap().can_redo);
        assert!(md.apply(ToolbarAction::Redo).unwrap());
        assert_eq!(md.markdown(), "a**b**");
        assert!(!md.toolbar_state().unwrap().can_redo);
    }

    #[test]
    fn test_shortcut_typed_into_editor() {
        let mut md = editor("");
        caret_at_end(&mut md);
        md.dispatch(Command::InsertText("## ".into()));
        md.dispatch(Command::InsertText("Section".into()));
        assert_eq!(md.markdown(), "## Section");
    }

    #[test]
    fn test_inline_shortcuts_typed_into_editor() {
        let mut md = editor("");
        caret_at_end(&mut md);
        for c in "**bold** and [docs](https://example.com) ".chars() {
            md.dispatch(Command::InsertText(c.to_string()));
        }
        assert_eq!(md.markdown(), "**bold** and [docs](https://example.com) ");
        md.editor_mut().update(|scope| scope.select_text("bold")).unwrap();
        assert!(md.toolbar_state().unwrap().bold);
    }

    #[test]
    fn test_literal_markers_survive_export() {
        let mut md = editor("");
        caret_at_end(&mut md);
        let config = EditorConfig {
            markdown_shortcuts: false,
            ..EditorConfig::default()
        };
        let mut plain = MarkdownEditor::new("", config).unwrap();
        caret_at_end(&mut plain);
        plain.dispatch(Command::InsertText("**not bold** # x".into()));
        let exported = plain.markdown();
        assert_eq!(exported, "\\*\\*not bold\\*\\* # x");
        md.set_markdown(&exported).unwrap();
        assert_eq!(md.markdown(), exported);
        assert_eq!(md.editor().state().text_content(), "**not bold** # x");
    }

    #[test]
    fn test_readonly_keeps_plain_text() {
        let source = "# Title\n\n**bold** text";
        let mut md = MarkdownEditor::new(source, EditorConfig::readonly()).unwrap();
        assert!(md.is_readonly());
        assert_eq!(md.markdown(), source);
        assert!(md.toolbar_state().is_none());
        assert!(md.on_change_markdown(|_| {}).is_none());

        md.editor_mut()
            .update(|scope| {
                scope.select_end();
                Ok(())
            })
            .unwrap();
        assert!(!md.dispatch(Command::InsertText("x".into())));
        assert!(!md.apply(ToolbarAction::ToggleCodeBlock).unwrap());
        assert_eq!(md.markdown(), source);
        assert_eq!(md.editor().state().block_names(), vec!["paragraph"]);
    }

    #[test]
    fn test_preview_html_is_sanitized() {
        let md = editor("**bold**");
        let html = md.preview_html();
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn test_highlight_code_blocks() {
        let md = editor("text\n\n```rust\nfn main() {}\n```");
        let blocks = md.highlight_code_blocks(&CodeHighlighter::default());
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            md.editor().state().tree().kind(blocks[0].key),
            Some(&NodeKind::Code {
                language: Some("rust".to_string())
            })
        );
    }
}
