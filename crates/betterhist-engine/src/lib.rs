//! Segmentation engine
//!
//! Turns the byte stream a shell writes to its terminal (plus the keystrokes
//! sent to it) into command/output turns. The engine is pure: it performs no
//! I/O and can be driven from fixtures.

mod ansi;
mod decode;
mod event;
mod line;
mod matcher;
mod segmenter;

pub use ansi::{AnsiScanner, Csi, Token};
pub use event::TapEvent;
pub use line::LineView;
pub use matcher::{
    AnyMatcher, DEFAULT_PROMPT_PATTERN, ForegroundProbe, MarkerMatcher, PatternMatcher,
    PromptMatcher,
};
pub use segmenter::{SegmentState, Segmenter, SegmenterConfig, SegmenterStats, Turn};

/// Remove SGR and other escape sequences, keeping printable text and line breaks.
pub fn strip_ansi(text: &str) -> String {
    let mut scanner = AnsiScanner::new();
    let mut tokens = Vec::new();
    scanner.scan(text, &mut tokens);

    tokens
        .into_iter()
        .filter_map(|token| match token {
            Token::Text(c) => Some(c),
            Token::Control(c @ ('\n' | '\t')) => Some(c),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_keeps_text_and_newlines() {
        assert_eq!(strip_ansi("\x1b[1;32mok\x1b[0m\nnext"), "ok\nnext");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
