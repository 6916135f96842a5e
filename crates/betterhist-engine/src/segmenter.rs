use betterhist_types::NewRecord;
use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::ansi::{AnsiScanner, Token};
use crate::decode::Utf8Stream;
use crate::event::TapEvent;
use crate::line::{CommittedLine, LineBuffer};
use crate::matcher::{
    AnyMatcher, ForegroundProbe, MarkerMatcher, PatternMatcher, PromptMatcher,
};

/// A finalized turn. Terminal size is attached by the caller.
pub type Turn = NewRecord;

const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmenterConfig {
    /// Drop SGR sequences from stored output.
    pub strip_colors: bool,
    /// Cap on stored output per turn; `raw_length` still counts everything.
    pub max_output_bytes: usize,
    /// Honor OSC 133 prompt markers emitted by the shell.
    pub use_shell_markers: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            strip_colors: false,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            use_shell_markers: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Nothing recognized yet (startup banner, or after a gap).
    AwaitingPrompt,
    /// A prompt was seen; the echoed command line is being typed.
    ReadingCommand,
    /// The command was submitted; everything until the next prompt is output.
    ReadingOutput,
    SessionEnded,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SegmenterStats {
    pub turns_emitted: u64,
    pub turns_discarded: u64,
    pub malformed_sequences: u64,
    pub gaps: u64,
    pub dropped_bytes: u64,
}

#[derive(Debug, Default)]
struct OutputBuffer {
    text: String,
    lines: usize,
    raw_length: u64,
    truncated: bool,
    /// The last piece was a wrapped part of a longer line.
    continued: bool,
}

impl OutputBuffer {
    fn push_line(&mut self, line: &str, cap: usize) {
        self.push(line, cap);
        self.continued = false;
    }

    /// Part of a line too long for the line model; the next piece joins it
    /// without a separator.
    fn push_part(&mut self, part: &str, cap: usize) {
        self.push(part, cap);
        self.continued = true;
    }

    fn push(&mut self, line: &str, cap: usize) {
        let sep = usize::from(self.lines > 0 && !self.continued);
        if !self.continued {
            self.lines += 1;
        }
        self.raw_length += (sep + line.len()) as u64;

        if self.truncated {
            return;
        }
        if self.text.len() + sep + line.len() <= cap {
            if sep == 1 {
                self.text.push('\n');
            }
            self.text.push_str(line);
            return;
        }

        self.truncated = true;
        let room = cap.saturating_sub(self.text.len() + sep);
        if room > 0 {
            if sep == 1 {
                self.text.push('\n');
            }
            self.text.push_str(truncate_styled(line, room));
        }
    }
}

/// Heuristic prompt/command/output state machine.
///
/// A partial line becomes a prompt boundary only when the matcher accepts it.
/// Text that merely sits where a prompt could be (a partial line followed by
/// keystrokes) is treated as output. A built-in such as `read -p "name? "`
/// therefore stays inside the current turn, while one whose text looks like a
/// prompt (`read -p "$ "`) starts a new turn.
///
/// Enter presses are counted until a command line consumes them, so a command
/// typed ahead while another one runs still opens its own turn. While such a
/// press is outstanding, or when no keystrokes are tapped at all, the pending
/// line is also tested whenever printing resumes after a space. That splits
/// chunks holding several prompt/command/output cycles at once.
pub struct Segmenter {
    config: SegmenterConfig,
    matcher: Box<dyn PromptMatcher>,
    probe: Option<Box<dyn ForegroundProbe>>,
    decoder: Utf8Stream,
    scanner: AnsiScanner,
    tokens: Vec<Token>,
    line: LineBuffer,
    state: SegmentState,
    prompt_column: Option<usize>,
    command: String,
    output: OutputBuffer,
    pending_enters: usize,
    input_seen: bool,
    markers_seen: bool,
    pending_discontinuity: bool,
    stats: SegmenterStats,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            matcher: Box::new(AnyMatcher::new(vec![
                Box::new(MarkerMatcher),
                Box::new(PatternMatcher::default()),
            ])),
            probe: None,
            decoder: Utf8Stream::new(),
            scanner: AnsiScanner::new(),
            tokens: Vec::new(),
            line: LineBuffer::new(),
            state: SegmentState::AwaitingPrompt,
            prompt_column: None,
            command: String::new(),
            output: OutputBuffer::default(),
            pending_enters: 0,
            input_seen: false,
            markers_seen: false,
            pending_discontinuity: false,
            stats: SegmenterStats::default(),
        }
    }

    pub fn with_matcher(mut self, matcher: Box<dyn PromptMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn ForegroundProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn stats(&self) -> SegmenterStats {
        self.stats
    }

    pub fn feed(&mut self, event: TapEvent) -> Vec<Turn> {
        let mut turns = Vec::new();
        if self.state == SegmentState::SessionEnded {
            return turns;
        }

        match event {
            TapEvent::Output(bytes) => self.on_output(&bytes, &mut turns),
            TapEvent::Input(bytes) => self.on_input(&bytes, &mut turns),
            TapEvent::Idle => self.checkpoint(&mut turns),
            TapEvent::Gap { dropped_bytes } => self.on_gap(dropped_bytes, &mut turns),
            TapEvent::End => turns.extend(self.finish()),
        }
        turns
    }

    /// Flush whatever is in progress as a best-effort turn and stop.
    pub fn finish(&mut self) -> Option<Turn> {
        if self.state == SegmentState::SessionEnded {
            return None;
        }

        let mut tail = String::new();
        self.decoder.flush(&mut tail);
        self.sync_malformed();
        for ch in tail.chars() {
            self.line.print(ch);
        }

        let turn = match self.state {
            SegmentState::ReadingOutput => {
                let partial = self.line.commit();
                if !partial.plain.trim().is_empty() {
                    self.output
                        .push_line(&partial.styled, self.config.max_output_bytes);
                }
                self.finalize(false)
            }
            SegmentState::ReadingCommand => {
                let typed = self
                    .prompt_column
                    .map(|col| self.line.plain_from(col))
                    .unwrap_or_default();
                let typed = typed.trim();
                if typed.is_empty() {
                    None
                } else {
                    self.command = typed.to_string();
                    self.finalize(false)
                }
            }
            SegmentState::AwaitingPrompt | SegmentState::SessionEnded => None,
        };

        self.enter_state(SegmentState::SessionEnded);
        turn
    }

    fn on_output(&mut self, bytes: &[u8], turns: &mut Vec<Turn>) {
        let mut text = String::with_capacity(bytes.len());
        self.decoder.decode(bytes, &mut text);
        self.sync_malformed();

        let mut tokens = std::mem::take(&mut self.tokens);
        self.scanner.scan(&text, &mut tokens);
        for token in tokens.drain(..) {
            self.apply(token, turns);
        }
        self.tokens = tokens;

        self.checkpoint(turns);
    }

    fn on_input(&mut self, bytes: &[u8], turns: &mut Vec<Turn>) {
        self.input_seen = true;
        self.pending_enters += count_enters(bytes);
        self.checkpoint(turns);
    }

    fn on_gap(&mut self, dropped_bytes: u64, turns: &mut Vec<Turn>) {
        self.stats.gaps += 1;
        self.stats.dropped_bytes += dropped_bytes;
        warn!(dropped_bytes, state = ?self.state, "recording gap, resynchronizing");

        if self.state == SegmentState::ReadingOutput {
            turns.extend(self.finalize(true));
        } else {
            self.pending_discontinuity = true;
        }

        self.command.clear();
        self.output = OutputBuffer::default();
        self.line.clear();
        self.decoder.reset();
        self.scanner.reset();
        self.prompt_column = None;
        self.pending_enters = 0;
        self.enter_state(SegmentState::AwaitingPrompt);
    }

    fn apply(&mut self, token: Token, turns: &mut Vec<Turn>) {
        match token {
            Token::Text(ch) => {
                if self.line.is_full() {
                    self.wrap_line();
                }
                if self.prompt_may_end_here(ch) {
                    self.checkpoint(turns);
                }
                self.line.print(ch);
            }
            Token::Control('\n' | '\x0b' | '\x0c') => {
                let committed = self.line.commit();
                self.on_commit(committed);
            }
            Token::Control('\r') => self.line.carriage_return(),
            Token::Control('\x08') => self.line.backspace(),
            Token::Control('\t') => self.line.print('\t'),
            Token::Control(_) | Token::Escape => {}
            Token::Csi(csi) if csi.is_sgr() => {
                if !self.config.strip_colors {
                    self.line.push_style(&csi.raw);
                }
            }
            Token::Csi(csi) => {
                if !self.line.apply_csi(&csi) {
                    trace!(seq = ?csi.raw, "ignored control sequence");
                }
            }
            Token::Osc(payload) => self.on_osc(&payload, turns),
        }
    }

    fn on_osc(&mut self, payload: &str, turns: &mut Vec<Turn>) {
        if !self.config.use_shell_markers {
            return;
        }
        let Some(kind) = payload.strip_prefix("133;") else {
            return;
        };

        if !self.markers_seen {
            self.markers_seen = true;
            debug!("shell prompt markers detected, pattern matching disabled");
        }

        match kind.chars().next() {
            Some('A') => {
                if self.state == SegmentState::ReadingOutput {
                    let prefix = self.line.styled_until(self.line.cursor());
                    if !self.line.plain().trim().is_empty() {
                        self.output.push_line(&prefix, self.config.max_output_bytes);
                    }
                    turns.extend(self.finalize(false));
                }
                if self.state != SegmentState::ReadingCommand {
                    self.enter_state(SegmentState::ReadingCommand);
                }
                self.prompt_column = None;
                self.line.clear();
            }
            Some('B') => self.line.mark_command_start(),
            other => trace!(marker = ?other, "shell marker"),
        }
    }

    fn on_commit(&mut self, committed: CommittedLine) {
        match self.state {
            SegmentState::AwaitingPrompt | SegmentState::SessionEnded => {}
            SegmentState::ReadingCommand => {
                let Some(column) = self.prompt_column else {
                    return;
                };
                if self.pending_enters > 0 || !self.input_seen {
                    self.pending_enters = self.pending_enters.saturating_sub(1);
                    self.command = committed
                        .plain
                        .chars()
                        .skip(column)
                        .collect::<String>()
                        .trim()
                        .to_string();
                    self.enter_state(SegmentState::ReadingOutput);
                } else {
                    debug!(line = %committed.plain, "line committed without enter, keeping prompt");
                }
            }
            SegmentState::ReadingOutput => {
                self.output
                    .push_line(&committed.styled, self.config.max_output_bytes);
            }
        }
    }

    /// Printing `ch` would end a prompt that is already on the line: output
    /// is being read, the line so far ends in a space and a submitted command
    /// is still due.
    fn prompt_may_end_here(&self, ch: char) -> bool {
        self.state == SegmentState::ReadingOutput
            && !ch.is_whitespace()
            && (self.pending_enters > 0 || !self.input_seen)
            && self.line.after_space()
    }

    /// The line model is full: keep what it holds and continue on a fresh line.
    fn wrap_line(&mut self) {
        match self.state {
            SegmentState::ReadingOutput => {
                let part = self.line.commit();
                self.output.push_part(&part.styled, self.config.max_output_bytes);
            }
            SegmentState::AwaitingPrompt => self.line.clear(),
            // An overlong command line keeps its first columns.
            SegmentState::ReadingCommand | SegmentState::SessionEnded => {}
        }
    }

    /// Test the pending partial line against the prompt matcher.
    fn checkpoint(&mut self, turns: &mut Vec<Turn>) {
        if self.state == SegmentState::SessionEnded {
            return;
        }
        if let Some(probe) = &self.probe
            && probe.shell_in_foreground() == Some(false)
        {
            return;
        }

        let text = self.line.plain();
        let view = self.line.view(&text);
        let found = if self.markers_seen {
            MarkerMatcher.match_prompt(&view)
        } else {
            self.matcher.match_prompt(&view)
        };
        let Some(column) = found else {
            return;
        };

        match self.state {
            SegmentState::AwaitingPrompt => {
                self.prompt_column = Some(column);
                self.enter_state(SegmentState::ReadingCommand);
            }
            SegmentState::ReadingCommand => {
                if self.prompt_column.is_none() {
                    self.prompt_column = Some(column);
                }
            }
            SegmentState::ReadingOutput => {
                turns.extend(self.finalize(false));
                self.prompt_column = Some(column);
                self.enter_state(SegmentState::ReadingCommand);
            }
            SegmentState::SessionEnded => {}
        }
    }

    fn finalize(&mut self, discontinuity: bool) -> Option<Turn> {
        let command = std::mem::take(&mut self.command);
        let output = std::mem::take(&mut self.output);
        let discontinuity = discontinuity || std::mem::take(&mut self.pending_discontinuity);

        if output.raw_length == 0 && (command.is_empty() || command.ends_with("^C")) {
            self.stats.turns_discarded += 1;
            self.pending_discontinuity = discontinuity;
            debug!(command = %command, "discarding empty turn");
            return None;
        }

        if output.truncated {
            debug!(
                raw_length = output.raw_length,
                stored = output.text.len(),
                "turn output capped"
            );
        }

        self.stats.turns_emitted += 1;
        Some(NewRecord {
            command,
            output: output.text,
            timestamp: Utc::now(),
            raw_length: output.raw_length,
            columns: None,
            lines: None,
            discontinuity,
        })
    }

    fn enter_state(&mut self, next: SegmentState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "segmenter state");
            self.state = next;
        }
    }

    fn sync_malformed(&mut self) {
        let total = self.decoder.malformed();
        if total > self.stats.malformed_sequences {
            debug!(
                replaced = total - self.stats.malformed_sequences,
                "malformed bytes in output"
            );
            self.stats.malformed_sequences = total;
        }
    }
}

/// Enter presses in a keystroke chunk; `\r\n` counts once.
fn count_enters(bytes: &[u8]) -> usize {
    let mut count = 0;
    let mut prev = 0u8;
    for &b in bytes {
        if b == b'\r' || (b == b'\n' && prev != b'\r') {
            count += 1;
        }
        prev = b;
    }
    count
}

/// Longest prefix of `text` within `max` bytes that does not split a
/// character or an escape sequence.
fn truncate_styled(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    if let Some(esc) = text[..cut].rfind('\x1b') {
        let complete = text[esc..cut]
            .get(2..)
            .is_some_and(|rest| rest.contains(|c: char| ('@'..='~').contains(&c)));
        if !complete {
            cut = esc;
        }
    }
    &text[..cut]
}
