// Rubrica library exports

pub mod bridge;
pub mod command;
pub mod config;
pub mod document;
pub mod editing;
pub mod editor;
pub mod file_manager;
pub mod highlight;
pub mod history;
pub mod languages;
pub mod markdown_export;
pub mod markdown_import;
pub mod node;
pub mod selection;
pub mod shortcuts;
pub mod state;
pub mod toolbar;
pub mod transformers;

pub use bridge::MarkdownEditor;
pub use command::{Command, CommandPriority};
pub use config::{Config, EditorConfig};
pub use editor::{Editor, ListenerId, UpdatePayload};
pub use file_manager::FileManager;
pub use highlight::CodeHighlighter;
pub use languages::LanguageRegistry;
pub use node::{ElementFormat, ListType, NodeKey, NodeKind, TextFormat, TextFormatType};
pub use selection::{Point, RangeSelection, Selection};
pub use state::{EditorState, UpdateScope, UpdateTag, UpdateTags};
pub use toolbar::{ToolbarAction, ToolbarController, ToolbarLayout, ToolbarState};
pub use transformers::{Transformer, Transformers};
