use crate::node::{ElementFormat, NodeKey, TextFormatType};

/// Commands routed through `Editor::dispatch_command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectionChange,
    CanUndo(bool),
    CanRedo(bool),
    FormatText(TextFormatType),
    FormatElement(ElementFormat),
    Undo,
    Redo,
    InsertText(String),
    InsertParagraph,
    InsertLineBreak,
    DeleteBackward,
    InsertTab,
    ToggleChecked(NodeKey),
}

impl Command {
    /// Commands that change the document when handled by the editor.
    pub fn is_editing(&self) -> bool {
        !matches!(
            self,
            Command::SelectionChange | Command::CanUndo(_) | Command::CanRedo(_)
        )
    }
}

/// Listener priority; higher priorities see a command first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandPriority {
    Editor,
    Low,
    Normal,
    High,
    Critical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(CommandPriority::Critical > CommandPriority::High);
        assert!(CommandPriority::High > CommandPriority::Normal);
        assert!(CommandPriority::Normal > CommandPriority::Low);
        assert!(CommandPriority::Low > CommandPriority::Editor);
    }

    #[test]
    fn test_notifications_are_not_editing() {
        assert!(!Command::SelectionChange.is_editing());
        assert!(!Command::CanUndo(true).is_editing());
        assert!(Command::Undo.is_editing());
        assert!(Command::InsertText("x".into()).is_editing());
    }
}
