//! The editing engine: owns the current state, runs read and update scopes,
//! dispatches commands and keeps the undo history.

use anyhow::Result;
use std::rc::Rc;

use crate::command::{Command, CommandPriority};
use crate::config::EditorConfig;
use crate::history::History;
use crate::shortcuts;
use crate::state::{EditorState, UpdateScope, UpdateTag, UpdateTags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What an update listener sees after each commit.
pub struct UpdatePayload<'a> {
    pub state: &'a EditorState,
    pub prev_state: &'a EditorState,
    pub tags: &'a UpdateTags,
    /// The document tree was touched.
    pub dirty: bool,
    pub selection_changed: bool,
}

pub type UpdateListener = Rc<dyn Fn(&UpdatePayload)>;

/// Returns `true` to stop propagation.
pub type CommandListener = Rc<dyn Fn(&Command, &EditorState) -> bool>;

struct RegisteredCommand {
    id: ListenerId,
    priority: CommandPriority,
    listener: CommandListener,
}

pub struct Editor {
    config: EditorConfig,
    state: EditorState,
    history: Option<History>,
    update_listeners: Vec<(ListenerId, UpdateListener)>,
    command_listeners: Vec<RegisteredCommand>,
    next_listener: u64,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let state = EditorState::new();
        let history = config
            .editable
            .then(|| History::new(state.clone(), config.history_limit));
        log::debug!(
            "Creating editor {:?} (editable: {})",
            config.namespace,
            config.editable
        );
        Self {
            config,
            state,
            history,
            update_listeners: Vec::new(),
            command_listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn is_editable(&self) -> bool {
        self.config.editable
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Run `f` against the committed state.
    pub fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&EditorState) -> T,
    {
        f(&self.state)
    }

    pub fn update<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut UpdateScope) -> Result<T>,
    {
        self.update_with_tags(UpdateTags::new(), f)
    }

    /// Run `f` on a pending copy of the state and commit it. On error the
    /// copy is discarded, the configured error handler is called and the
    /// error is returned.
    pub fn update_with_tags<T, F>(&mut self, tags: UpdateTags, f: F) -> Result<T>
    where
        F: FnOnce(&mut UpdateScope) -> Result<T>,
    {
        let mut pending = self.state.clone();
        let mut scope = UpdateScope::new(&mut pending, tags);
        let outcome = f(&mut scope).and_then(|value| {
            if scope.is_dirty() {
                scope.normalize()?;
            }
            Ok(value)
        });
        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                log::debug!("Rolling back failed update: {}", err);
                (self.config.on_error)(&err);
                return Err(err);
            }
        };
        let (dirty, tags) = scope.finish();
        self.commit(pending, dirty, tags);
        Ok(value)
    }

    fn commit(&mut self, pending: EditorState, dirty: bool, tags: UpdateTags) {
        let selection_changed = pending.selection != self.state.selection;
        if !dirty && !selection_changed {
            return;
        }
        let prev_state = std::mem::replace(&mut self.state, pending);

        let mut history_changed = tags.contains(UpdateTag::Historic);
        if let Some(history) = self.history.as_mut() {
            if dirty && !tags.skips_history() && history.push(self.state.clone()) {
                history_changed = true;
            }
        }

        let listeners: Vec<UpdateListener> = self
            .update_listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        let payload = UpdatePayload {
            state: &self.state,
            prev_state: &prev_state,
            tags: &tags,
            dirty,
            selection_changed,
        };
        for listener in listeners {
            listener(&payload);
        }

        if selection_changed {
            self.dispatch_command(Command::SelectionChange);
        }
        if history_changed {
            self.notify_history();
        }
    }

    fn notify_history(&mut self) {
        let can_undo = self.can_undo();
        let can_redo = self.can_redo();
        self.dispatch_command(Command::CanUndo(can_undo));
        self.dispatch_command(Command::CanRedo(can_redo));
    }

    fn next_id(&mut self) -> ListenerId {
        self.next_listener += 1;
        ListenerId(self.next_listener)
    }

    pub fn register_update_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&UpdatePayload) + 'static,
    {
        let id = self.next_id();
        self.update_listeners.push((id, Rc::new(listener)));
        id
    }

    pub fn register_command<F>(&mut self, priority: CommandPriority, listener: F) -> ListenerId
    where
        F: Fn(&Command, &EditorState) -> bool + 'static,
    {
        let id = self.next_id();
        // Stable: equal priorities run in registration order
        let index = self
            .command_listeners
            .iter()
            .position(|registered| registered.priority < priority)
            .unwrap_or(self.command_listeners.len());
        self.command_listeners.insert(
            index,
            RegisteredCommand {
                id,
                priority,
                listener: Rc::new(listener),
            },
        );
        id
    }

    /// Remove an update or command listener. Returns whether it existed.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.update_listeners.len() + self.command_listeners.len();
        self.update_listeners.retain(|(listener_id, _)| *listener_id != id);
        self.command_listeners.retain(|registered| registered.id != id);
        before != self.update_listeners.len() + self.command_listeners.len()
    }

    /// Offer `command` to listeners from the highest priority down, then to
    /// the built-in handlers. Returns whether anything handled it.
    pub fn dispatch_command(&mut self, command: Command) -> bool {
        let listeners: Vec<CommandListener> = self
            .command_listeners
            .iter()
            .map(|registered| registered.listener.clone())
            .collect();
        for listener in listeners {
            if listener(&command, &self.state) {
                return true;
            }
        }
        self.handle_builtin(command)
    }

    fn handle_builtin(&mut self, command: Command) -> bool {
        if !command.is_editing() {
            return false;
        }
        if !self.config.editable {
            log::debug!("Ignoring {:?} on a read-only editor", command);
            return false;
        }

        let result = match command {
            Command::Undo => return self.undo(),
            Command::Redo => return self.redo(),
            Command::FormatText(format) => self.update(|scope| scope.format_text(format)),
            Command::FormatElement(align) => self.update(|scope| scope.format_element(align)),
            Command::InsertText(text) => {
                let shortcuts_enabled = self.config.markdown_shortcuts;
                let transformers = self.config.transformers.clone();
                self.update(|scope| {
                    scope.insert_text(&text)?;
                    if shortcuts_enabled && !shortcuts::apply_block_shortcut(scope, &transformers)? {
                        shortcuts::apply_text_shortcut(scope, &transformers)?;
                    }
                    Ok(())
                })
            }
            Command::InsertParagraph => self.update(|scope| scope.insert_paragraph()),
            Command::InsertLineBreak => self.update(|scope| scope.insert_line_break()),
            Command::DeleteBackward => self.update(|scope| scope.delete_backward()),
            Command::InsertTab => {
                if !self.config.tab_indentation {
                    return false;
                }
                self.update(|scope| scope.insert_tab())
            }
            Command::ToggleChecked(key) => {
                return self.update(|scope| scope.toggle_checked(key)).unwrap_or(false);
            }
            Command::SelectionChange | Command::CanUndo(_) | Command::CanRedo(_) => return false,
        };
        result.is_ok()
    }

    pub fn can_undo(&self) -> bool {
        self.history.as_ref().is_some_and(History::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.history.as_ref().is_some_and(History::can_redo)
    }

    /// Drop all history steps, keeping the current state as the base.
    pub fn reset_history(&mut self) {
        let state = self.state.clone();
        let Some(history) = self.history.as_mut() else {
            return;
        };
        history.reset(state);
        self.notify_history();
    }

    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.as_mut().and_then(History::undo) else {
            return false;
        };
        self.apply_snapshot(snapshot)
    }

    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.as_mut().and_then(History::redo) else {
            return false;
        };
        self.apply_snapshot(snapshot)
    }

    fn apply_snapshot(&mut self, snapshot: EditorState) -> bool {
        self.update_with_tags(UpdateTags::of(&[UpdateTag::Historic]), |scope| {
            scope.replace_state(snapshot);
            Ok(())
        })
        .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, TextFormat, TextFormatType};
    use crate::selection::Point;
    use std::cell::RefCell;

    fn editor_with_text(text: &str) -> Editor {
        let mut editor = Editor::new(EditorConfig::default());
        editor
            .update_with_tags(UpdateTags::of(&[UpdateTag::SkipHistory]), |scope| {
                let p = scope.tree.children(scope.tree.root())[0];
                let t = scope.create(NodeKind::text_node(text, TextFormat::NONE));
                scope.append(p, t)?;
                scope.select_caret(Point::text(t, text.chars().count()));
                Ok(())
            })
            .unwrap();
        editor.reset_history();
        editor
    }

    #[test]
    fn test_editor_creation() {
        let editor = Editor::new(EditorConfig::default());
        assert!(editor.is_editable());
        assert!(!editor.can_undo());
        assert!(!editor.can_redo());
        assert_eq!(editor.read(|state| state.block_names()), vec!["paragraph"]);
    }

    #[test]
    fn test_failed_update_rolls_back_and_reports() {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        let config = EditorConfig::default()
            .with_error_handler(move |err| sink.borrow_mut().push(err.to_string()));
        let mut editor = Editor::new(config);

        let result: Result<()> = editor.update(|scope| {
            scope.clear_root()?;
            anyhow::bail!("nope")
        });

        assert!(result.is_err());
        assert_eq!(*errors.borrow(), vec!["nope".to_string()]);
        assert_eq!(editor.read(|state| state.block_names()), vec!["paragraph"]);
    }

    #[test]
    fn test_command_priority_and_propagation() {
        let mut editor = Editor::new(EditorConfig::default());
        let calls = Rc::new(RefCell::new(Vec::new()));

        let low = calls.clone();
        editor.register_command(CommandPriority::Low, move |_, _| {
            low.borrow_mut().push("low");
            false
        });
        let high = calls.clone();
        editor.register_command(CommandPriority::High, move |_, _| {
            high.borrow_mut().push("high");
            false
        });
        let critical = calls.clone();
        let stop = editor.register_command(CommandPriority::Critical, move |command, _| {
            critical.borrow_mut().push("critical");
            *command == Command::SelectionChange
        });

        assert!(editor.dispatch_command(Command::SelectionChange));
        assert_eq!(*calls.borrow(), vec!["critical"]);

        calls.borrow_mut().clear();
        assert!(editor.unregister(stop));
        assert!(!editor.dispatch_command(Command::SelectionChange));
        assert_eq!(*calls.borrow(), vec!["high", "low"]);
        assert!(!editor.unregister(stop));
    }

    #[test]
    fn test_history_notifications() {
        let mut editor = editor_with_text("a");
        let flags = Rc::new(RefCell::new(Vec::new()));
        let sink = flags.clone();
        editor.register_command(CommandPriority::Low, move |command, _| {
            match command {
                Command::CanUndo(value) => sink.borrow_mut().push(("undo", *value)),
                Command::CanRedo(value) => sink.borrow_mut().push(("redo", *value)),
                _ => {}
            }
            false
        });

        assert!(editor.dispatch_command(Command::InsertText("b".into())));
        assert_eq!(editor.read(|state| state.text_content()), "ab");
        assert_eq!(*flags.borrow(), vec![("undo", true), ("redo", false)]);

        flags.borrow_mut().clear();
        assert!(editor.dispatch_command(Command::Undo));
        assert_eq!(editor.read(|state| state.text_content()), "a");
        assert_eq!(*flags.borrow(), vec![("undo", false), ("redo", true)]);

        flags.borrow_mut().clear();
        assert!(editor.redo());
        assert_eq!(editor.read(|state| state.text_content()), "ab");
        assert_eq!(*flags.borrow(), vec![("undo", true), ("redo", false)]);
    }

    #[test]
    fn test_selection_change_is_dispatched() {
        let mut editor = editor_with_text("hello");
        let seen = Rc::new(RefCell::new(0));
        let sink = seen.clone();
        editor.register_command(CommandPriority::Low, move |command, _| {
            if *command == Command::SelectionChange {
                *sink.borrow_mut() += 1;
            }
            false
        });

        editor.update(|scope| scope.select_text("ell")).unwrap();
        assert_eq!(*seen.borrow(), 1);

        // Same selection again: no event
        editor.update(|scope| scope.select_text("ell")).unwrap();
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_update_listener_payload() {
        let mut editor = editor_with_text("x");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        editor.register_update_listener(move |payload| {
            sink.borrow_mut().push((
                payload.dirty,
                payload.tags.contains(UpdateTag::Programmatic),
                payload.prev_state.text_content(),
                payload.state.text_content(),
            ));
        });

        editor
            .update_with_tags(UpdateTags::of(&[UpdateTag::Programmatic]), |scope| {
                scope.select_end();
                scope.insert_text("y")
            })
            .unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![(true, true, "x".to_string(), "xy".to_string())]
        );
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_readonly_ignores_editing_commands() {
        let mut editor = Editor::new(EditorConfig::readonly());
        assert!(!editor.dispatch_command(Command::InsertText("x".into())));
        assert!(!editor.dispatch_command(Command::FormatText(TextFormatType::Bold)));
        assert_eq!(editor.read(|state| state.text_content()), "");

        // Host updates still apply
        editor
            .update(|scope| {
                let p = scope.tree.children(scope.tree.root())[0];
                let t = scope.create(NodeKind::text_node("host", TextFormat::NONE));
                scope.append(p, t)
            })
            .unwrap();
        assert_eq!(editor.read(|state| state.text_content()), "host");
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_history_limit_from_config() {
        let mut editor = Editor::new(EditorConfig::default().with_history_limit(2));
        editor.update(|scope| {
            scope.select_end();
            Ok(())
        })
        .unwrap();
        for _ in 0..5 {
            editor.dispatch_command(Command::InsertText("z".into()));
        }
        let mut steps = 0;
        while editor.undo() {
            steps += 1;
        }
        assert_eq!(steps, 2);
        assert_eq!(editor.read(|state| state.text_content()), "zzz");
    }
}
