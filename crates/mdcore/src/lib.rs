pub mod ast;
pub mod markdown;
pub mod sanitize;

pub use ast::{parse, Block, Inline, ListItem, ListKind};
pub use markdown::{preview_html, to_html};
