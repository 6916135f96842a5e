use regex::Regex;
use std::sync::LazyLock;

use crate::line::LineView;

/// Default prompt shape: a line ending in a common prompt sigil and one space.
///
/// `>` is deliberately absent; it is the continuation prompt (PS2) of most shells.
pub const DEFAULT_PROMPT_PATTERN: &str = r"[$#%❯➜λ] $";

static DEFAULT_PROMPT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_PROMPT_PATTERN).unwrap());

/// Decides whether the pending partial line starts a new turn.
pub trait PromptMatcher: Send {
    /// Column at which the command text begins, if the line is a prompt.
    fn match_prompt(&self, line: &LineView<'_>) -> Option<usize>;
}

/// Tells whether the shell itself (and not a job it started) owns the terminal.
pub trait ForegroundProbe: Send {
    /// `None` when the answer cannot be determined.
    fn shell_in_foreground(&self) -> Option<bool>;
}

/// Prompt boundaries announced by the shell through OSC 133 markers.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerMatcher;

impl PromptMatcher for MarkerMatcher {
    fn match_prompt(&self, line: &LineView<'_>) -> Option<usize> {
        line.command_start
    }
}

/// Prompt boundaries recognized by a regular expression on the plain line text.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self {
            regex: DEFAULT_PROMPT_REGEX.clone(),
        }
    }
}

impl PromptMatcher for PatternMatcher {
    fn match_prompt(&self, line: &LineView<'_>) -> Option<usize> {
        if line.text.is_empty() {
            return None;
        }
        let m = self.regex.find(line.text)?;
        if m.end() == 0 {
            return None;
        }
        Some(line.text[..m.end()].chars().count())
    }
}

/// First matcher to succeed wins.
pub struct AnyMatcher {
    matchers: Vec<Box<dyn PromptMatcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn PromptMatcher>>) -> Self {
        Self { matchers }
    }
}

impl PromptMatcher for AnyMatcher {
    fn match_prompt(&self, line: &LineView<'_>) -> Option<usize> {
        self.matchers.iter().find_map(|m| m.match_prompt(line))
    }
}
