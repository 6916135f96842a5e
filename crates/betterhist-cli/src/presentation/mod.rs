pub mod markdown;
pub mod search;
pub mod text;

pub use markdown::{ParsedBlock, fence_language, parse_markdown_block, render_markdown};
pub use search::format_search_line;
