//! Formatting toolbar: a live projection of the editor state into button
//! flags, and the commands behind each button.

use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;

use crate::command::{Command, CommandPriority};
use crate::editor::{Editor, ListenerId};
use crate::languages::{LanguageEntry, LanguageRegistry};
use crate::node::{ElementFormat, NodeKind, TextFormatType};
use crate::state::{EditorState, UpdateScope};

/// Flags the host renders the toolbar from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub is_in_code_block: bool,
    pub selected_language: String,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl ToolbarState {
    pub fn new(languages: &LanguageRegistry) -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            is_in_code_block: false,
            selected_language: languages.default_language().to_string(),
            can_undo: false,
            can_redo: false,
        }
    }

    /// Recompute the selection-derived flags. Anything but a range selection
    /// leaves them untouched.
    pub fn update_from(&mut self, state: &EditorState, languages: &LanguageRegistry) {
        let Some(range) = state.range_selection() else {
            return;
        };
        match state.enclosing_code_block(range.anchor.key()) {
            Some(code) => {
                let language = match state.tree().kind(code) {
                    Some(NodeKind::Code { language }) => language.as_deref(),
                    _ => None,
                };
                self.selected_language = languages.normalize(language);
                self.is_in_code_block = true;
                self.bold = false;
                self.italic = false;
                self.underline = false;
                self.strikethrough = false;
            }
            None => {
                self.is_in_code_block = false;
                self.bold = range.has_format(TextFormatType::Bold);
                self.italic = range.has_format(TextFormatType::Italic);
                self.underline = range.has_format(TextFormatType::Underline);
                self.strikethrough = range.has_format(TextFormatType::Strikethrough);
            }
        }
    }
}

/// A toolbar interaction coming from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolbarAction {
    Undo,
    Redo,
    ToggleCodeBlock,
    FormatText(TextFormatType),
    Align(ElementFormat),
    SetLanguage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarButton {
    /// i18n key; string lookup is the host's job.
    pub label_key: &'static str,
    pub active: bool,
    pub enabled: bool,
    pub action: ToolbarAction,
}

impl ToolbarButton {
    fn new(label_key: &'static str, action: ToolbarAction) -> Self {
        Self {
            label_key,
            active: false,
            enabled: true,
            action,
        }
    }

    fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePicker {
    pub selected: String,
    pub selected_label: String,
    pub options: Vec<LanguageEntry>,
}

/// Controls shown for a toolbar state, in display order. Exactly one of
/// `formats` and `language_picker` is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarLayout {
    pub undo: ToolbarButton,
    pub redo: ToolbarButton,
    pub code_block: ToolbarButton,
    pub language_picker: Option<LanguagePicker>,
    pub formats: Vec<ToolbarButton>,
    pub alignment: Vec<ToolbarButton>,
}

impl ToolbarLayout {
    pub fn build(state: &ToolbarState, languages: &LanguageRegistry) -> Self {
        let undo = ToolbarButton::new("editor.text_toolbar.undo", ToolbarAction::Undo).enabled(state.can_undo);
        let redo = ToolbarButton::new("editor.text_toolbar.redo", ToolbarAction::Redo).enabled(state.can_redo);
        let code_block = ToolbarButton::new("editor.text_toolbar.code_block", ToolbarAction::ToggleCodeBlock)
            .active(state.is_in_code_block);

        let (language_picker, formats) = if state.is_in_code_block {
            let picker = LanguagePicker {
                selected: state.selected_language.clone(),
                selected_label: languages.display_label(Some(state.selected_language.as_str())),
                options: languages.options().to_vec(),
            };
            (Some(picker), Vec::new())
        } else {
            let format = |key, format_type, active| {
                ToolbarButton::new(key, ToolbarAction::FormatText(format_type)).active(active)
            };
            let formats = vec![
                format("editor.text_toolbar.bold", TextFormatType::Bold, state.bold),
                format("editor.text_toolbar.italic", TextFormatType::Italic, state.italic),
                format("editor.text_toolbar.underline", TextFormatType::Underline, state.underline),
                format(
                    "editor.text_toolbar.strikethrough",
                    TextFormatType::Strikethrough,
                    state.strikethrough,
                ),
                format("editor.text_toolbar.code", TextFormatType::Code, false),
                format("editor.text_toolbar.highlight", TextFormatType::Highlight, false),
            ];
            (None, formats)
        };

        let alignment = vec![
            ToolbarButton::new("editor.text_toolbar.align_left", ToolbarAction::Align(ElementFormat::Left)),
            ToolbarButton::new("editor.text_toolbar.align_center", ToolbarAction::Align(ElementFormat::Center)),
            ToolbarButton::new("editor.text_toolbar.align_right", ToolbarAction::Align(ElementFormat::Right)),
        ];

        Self {
            undo,
            redo,
            code_block,
            language_picker,
            formats,
            alignment,
        }
    }
}

/// Rows of the Markdown shortcut help: (label key, example key).
pub const SHORTCUT_HINTS: [(&str, &str); 9] = [
    (
        "editor.text_toolbar.markdown_shortcuts.heading.label",
        "editor.text_toolbar.markdown_shortcuts.heading.example",
    ),
    (
        "editor.text_toolbar.markdown_shortcuts.bold.label",
        "editor.text_toolbar.markdown_shortcuts.bold.example",
    ),
    (
        "editor.text_toolbar.markdown_shortcuts.italic.label",
        "editor.text_toolbar.markdown_shortcuts.italic.example",
    ),
    (
        "editor.text_toolbar.markdown_shortcuts.blockquote.label",
        "editor.text_toolbar.markdown_shortcuts.blockquote.example",
    ),
    (
        "editor.text_toolbar.markdown_shortcuts.ordered_list.label",
        "editor.text_toolbar.markdown_shortcuts.ordered_list.example",
    ),
    (
        "editor.text_toolbar.markdown_shortcuts.unordered_list.label",
        "editor.text_toolbar.markdown_shortcuts.unordered_list.example",
    ),
    (
        "editor.text_toolbar.markdown_shortcuts.divider.label",
        "editor.text_toolbar.markdown_shortcuts.divider.example",
    ),
    (
        "editor.text_toolbar.markdown_shortcuts.inline_code.label",
        "editor.text_toolbar.markdown_shortcuts.inline_code.example",
    ),
    (
        "editor.text_toolbar.markdown_shortcuts.block_code.label",
        "editor.text_toolbar.markdown_shortcuts.block_code.example",
    ),
];

/// Convert the block under the selection to or from a code block.
///
/// Inside a code block the block goes back to a paragraph. A caret turns its
/// block into a code block with the default language. A non-empty selection
/// is cut and re-inserted as the body of a new code block. List items are
/// taken out of their list first. Returns whether a block changed.
pub fn toggle_code_block(scope: &mut UpdateScope, languages: &LanguageRegistry) -> Result<bool> {
    let Some(range) = scope.range_selection().cloned() else {
        return Ok(false);
    };
    let anchor = range.anchor.key();
    if scope.enclosing_code_block(anchor).is_some() {
        scope.set_blocks_type(|| NodeKind::Paragraph)?;
        return Ok(scope.enclosing_code_block(anchor).is_none());
    }

    let language = Some(languages.default_language().to_string());
    if range.is_collapsed() {
        scope.set_blocks_type(|| NodeKind::Code {
            language: language.clone(),
        })?;
        return Ok(scope.enclosing_code_block(anchor).is_some());
    }

    let text = range.text_content(scope.tree());
    let code = scope.create(NodeKind::Code { language });
    scope.insert_nodes(&[code])?;
    // The insert moved the selection into the new block
    if scope.range_selection().is_some() {
        scope.insert_raw_text(&text)?;
    }
    Ok(true)
}

/// Set the language of the code block under the selection anchor. Returns
/// whether there was one.
pub fn set_code_language(scope: &mut UpdateScope, language: &str) -> Result<bool> {
    let Some(anchor) = scope.range_selection().map(|range| range.anchor.key()) else {
        return Ok(false);
    };
    let Some(code) = scope.enclosing_code_block(anchor) else {
        return Ok(false);
    };
    scope.set_kind(
        code,
        NodeKind::Code {
            language: Some(language.to_string()),
        },
    )?;
    Ok(true)
}

/// Keeps a [`ToolbarState`] in sync with one editor.
pub struct ToolbarController {
    state: Rc<RefCell<ToolbarState>>,
    languages: Rc<LanguageRegistry>,
    listeners: Vec<ListenerId>,
}

impl ToolbarController {
    /// Register the listeners on `editor` and compute the initial state.
    pub fn attach(editor: &mut Editor) -> Self {
        let languages = editor.config().languages.clone();
        let mut initial = ToolbarState::new(&languages);
        initial.update_from(editor.state(), &languages);
        initial.can_undo = editor.can_undo();
        initial.can_redo = editor.can_redo();
        let state = Rc::new(RefCell::new(initial));

        let mut listeners = Vec::with_capacity(4);
        {
            let state = state.clone();
            let languages = languages.clone();
            listeners.push(editor.register_update_listener(move |payload| {
                state.borrow_mut().update_from(payload.state, &languages);
            }));
        }
        {
            let state = state.clone();
            let languages = languages.clone();
            listeners.push(editor.register_command(CommandPriority::Low, move |command, editor_state| {
                if *command == Command::SelectionChange {
                    state.borrow_mut().update_from(editor_state, &languages);
                }
                false
            }));
        }
        {
            let state = state.clone();
            listeners.push(editor.register_command(CommandPriority::Low, move |command, _| {
                if let Command::CanUndo(can_undo) = command {
                    state.borrow_mut().can_undo = *can_undo;
                }
                false
            }));
        }
        {
            let state = state.clone();
            listeners.push(editor.register_command(CommandPriority::Low, move |command, _| {
                if let Command::CanRedo(can_redo) = command {
                    state.borrow_mut().can_redo = *can_redo;
                }
                false
            }));
        }
        log::debug!("Toolbar attached with {} listeners", listeners.len());

        Self {
            state,
            languages,
            listeners,
        }
    }

    pub fn detach(self, editor: &mut Editor) {
        for id in self.listeners {
            editor.unregister(id);
        }
    }

    pub fn state(&self) -> ToolbarState {
        self.state.borrow().clone()
    }

    pub fn layout(&self) -> ToolbarLayout {
        ToolbarLayout::build(&self.state.borrow(), &self.languages)
    }

    /// Run a host button click. Returns whether it did anything.
    pub fn apply(&self, editor: &mut Editor, action: ToolbarAction) -> Result<bool> {
        match action {
            ToolbarAction::Undo => Ok(self.undo(editor)),
            ToolbarAction::Redo => Ok(self.redo(editor)),
            ToolbarAction::ToggleCodeBlock => self.toggle_code_block(editor),
            ToolbarAction::FormatText(format) => Ok(self.format_text(editor, format)),
            ToolbarAction::Align(align) => Ok(self.align(editor, align)),
            ToolbarAction::SetLanguage(language) => self.set_code_language(editor, &language),
        }
    }

    pub fn format_text(&self, editor: &mut Editor, format: TextFormatType) -> bool {
        editor.dispatch_command(Command::FormatText(format))
    }

    pub fn align(&self, editor: &mut Editor, align: ElementFormat) -> bool {
        editor.dispatch_command(Command::FormatElement(align))
    }

    /// Disabled buttons do not dispatch.
    pub fn undo(&self, editor: &mut Editor) -> bool {
        if !self.state.borrow().can_undo {
            return false;
        }
        editor.dispatch_command(Command::Undo)
    }

    pub fn redo(&self, editor: &mut Editor) -> bool {
        if !self.state.borrow().can_redo {
            return false;
        }
        editor.dispatch_command(Command::Redo)
    }

    pub fn toggle_code_block(&self, editor: &mut Editor) -> Result<bool> {
        let languages = self.languages.clone();
        editor.update(|scope| toggle_code_block(scope, &languages))
    }

    pub fn set_code_language(&self, editor: &mut Editor, language: &str) -> Result<bool> {
        editor.update(|scope| set_code_language(scope, language))
    }
}
