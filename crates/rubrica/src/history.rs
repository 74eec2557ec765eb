use crate::state::EditorState;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Snapshot undo/redo stack.
///
/// `entries[index]` is the state currently shown; entries after it are redo
/// steps.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<EditorState>,
    index: usize,
    max_steps: usize,
}

impl History {
    pub fn new(initial: EditorState, max_steps: usize) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
            max_steps: max_steps.max(1),
        }
    }

    /// Forget all steps and start over from `state`.
    pub fn reset(&mut self, state: EditorState) {
        self.entries = vec![state];
        self.index = 0;
    }

    /// Record a committed state. Returns `false` if the document did not
    /// change since the current entry.
    pub fn push(&mut self, state: EditorState) -> bool {
        // Selection-only changes are not undo steps
        if let Some(current) = self.entries.get(self.index) {
            if current.tree == state.tree {
                self.entries[self.index] = state;
                return false;
            }
        }

        self.entries.truncate(self.index + 1);
        self.entries.push(state);
        self.index += 1;

        // Limit history size to prevent memory issues
        if self.entries.len() > self.max_steps + 1 {
            self.entries.remove(0);
            self.index -= 1;
        }
        true
    }

    pub fn undo(&mut self) -> Option<EditorState> {
        if self.index > 0 {
            self.index -= 1;
            self.entries.get(self.index).cloned()
        } else {
            None
        }
    }

    pub fn redo(&mut self) -> Option<EditorState> {
        if self.index + 1 < self.entries.len() {
            self.index += 1;
            self.entries.get(self.index).cloned()
        } else {
            None
        }
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, TextFormat};
    use crate::state::{UpdateScope, UpdateTags};

    fn with_text(text: &str) -> EditorState {
        let mut state = EditorState::new();
        let mut scope = UpdateScope::new(&mut state, UpdateTags::new());
        let p = scope.tree.children(scope.tree.root())[0];
        let t = scope.create(NodeKind::text_node(text, TextFormat::NONE));
        scope.append(p, t).unwrap();
        state
    }

    #[test]
    fn test_undo_redo_functionality() {
        let mut history = History::new(with_text("a"), DEFAULT_HISTORY_LIMIT);
        assert!(!history.can_undo());
        assert!(history.push(with_text("ab")));
        assert!(history.can_undo());

        let undone = history.undo().unwrap();
        assert_eq!(undone.text_content(), "a");
        assert!(history.can_redo());
        assert!(history.undo().is_none());

        let redone = history.redo().unwrap();
        assert_eq!(redone.text_content(), "ab");
        assert!(!history.can_redo());
    }

    #[test]
    fn test_push_after_undo_drops_redo_steps() {
        let mut history = History::new(with_text("a"), DEFAULT_HISTORY_LIMIT);
        history.push(with_text("ab"));
        history.undo();
        history.push(with_text("ac"));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_unchanged_tree_is_not_a_step() {
        let mut history = History::new(with_text("a"), DEFAULT_HISTORY_LIMIT);
        assert!(!history.push(with_text("a")));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_history_limit() {
        let mut history = History::new(with_text(""), 3);
        for i in 0..10 {
            history.push(with_text(&"x".repeat(i + 1)));
        }
        assert_eq!(history.len(), 4);
        let mut steps = 0;
        while history.undo().is_some() {
            steps += 1;
        }
        assert_eq!(steps, 3);
    }
}
