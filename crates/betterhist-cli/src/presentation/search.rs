use betterhist_engine::strip_ansi;
use betterhist_types::Record;
use owo_colors::OwoColorize;

use super::text::{single_line, truncate};

/// One summary line: `{id:>4} | {command} | {preview}`.
///
/// The preview is the output without escape sequences, on one line, cut to
/// `preview_width` characters.
pub fn format_search_line(record: &Record, preview_width: usize, color: bool) -> String {
    let id = format!("{:>4}", record.id.get());
    let id = if color {
        id.cyan().to_string()
    } else {
        id
    };

    let preview = truncate(&single_line(&strip_ansi(&record.output)), preview_width);
    format!("{} | {} | {}", id, record.command, preview)
}
