//! Transcript builder for segmentation fixtures.
//!
//! Produces the ordered tap events a live session would produce: prompts and
//! output written by the shell, keystrokes typed by the user, and the echo of
//! each keystroke coming back from the pty.

use betterhist_engine::{Segmenter, SegmenterConfig, TapEvent, Turn};

const PROMPT_START: &str = "\x1b]133;A\x07";
const COMMAND_START: &str = "\x1b]133;B\x07";

#[derive(Debug, Default, Clone)]
pub struct Transcript {
    events: Vec<TapEvent>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw text written by the child.
    pub fn output(mut self, text: &str) -> Self {
        self.events.push(TapEvent::Output(text.as_bytes().to_vec()));
        self
    }

    pub fn output_bytes(mut self, bytes: &[u8]) -> Self {
        self.events.push(TapEvent::Output(bytes.to_vec()));
        self
    }

    /// Keystrokes without any echo.
    pub fn keys(mut self, text: &str) -> Self {
        self.events.push(TapEvent::Input(text.as_bytes().to_vec()));
        self
    }

    pub fn prompt(self, prompt: &str) -> Self {
        self.output(prompt)
    }

    /// Prompt wrapped in OSC 133 A/B markers.
    pub fn marked_prompt(self, prompt: &str) -> Self {
        self.output(&format!("{}{}{}", PROMPT_START, prompt, COMMAND_START))
    }

    /// Type `line` one key at a time with echo, then press Enter.
    pub fn type_line(mut self, line: &str) -> Self {
        for ch in line.chars() {
            let key = ch.to_string();
            self = self.keys(&key).output(&key);
        }
        self.keys("\r").output("\r\n")
    }

    /// Lines printed by a command, each terminated by CRLF.
    pub fn lines(self, lines: &[&str]) -> Self {
        if lines.is_empty() {
            return self;
        }
        let mut text = lines.join("\r\n");
        text.push_str("\r\n");
        self.output(&text)
    }

    /// One complete prompt/command/output cycle.
    pub fn cycle(self, prompt: &str, command: &str, output: &[&str]) -> Self {
        self.prompt(prompt).type_line(command).lines(output)
    }

    pub fn idle(mut self) -> Self {
        self.events.push(TapEvent::Idle);
        self
    }

    pub fn gap(mut self, dropped_bytes: u64) -> Self {
        self.events.push(TapEvent::Gap { dropped_bytes });
        self
    }

    pub fn end(mut self) -> Self {
        self.events.push(TapEvent::End);
        self
    }

    pub fn events(&self) -> &[TapEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TapEvent> {
        self.events
    }

    /// Feed every event through a segmenter built with `config`.
    pub fn segment_with(self, config: SegmenterConfig) -> Vec<Turn> {
        segment(Segmenter::new(config), self.events)
    }

    pub fn segment(self) -> Vec<Turn> {
        self.segment_with(SegmenterConfig::default())
    }
}

/// Drive `segmenter` over `events`, collecting every finalized turn.
pub fn segment(mut segmenter: Segmenter, events: Vec<TapEvent>) -> Vec<Turn> {
    events
        .into_iter()
        .flat_map(|event| segmenter.feed(event))
        .collect()
}
