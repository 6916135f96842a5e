use crate::ansi::Csi;

/// Width of the modelled line. Cursor motion stops here and printing past it
/// is dropped; callers wrap the line before it fills up.
pub const MAX_COLUMNS: usize = 4096;

#[derive(Debug, Clone)]
struct Cell {
    /// SGR sequences that were in effect just before this character was printed.
    style: String,
    ch: char,
}

impl Cell {
    fn blank() -> Self {
        Self {
            style: String::new(),
            ch: ' ',
        }
    }
}

/// The line currently being written by the child, as a row of cells with a cursor.
///
/// Only horizontal motion and in-line erasure are interpreted; everything
/// that would need a screen grid is ignored.
#[derive(Debug, Default)]
pub struct LineBuffer {
    cells: Vec<Cell>,
    cursor: usize,
    pending_style: String,
    command_start: Option<usize>,
}

/// A line that was terminated by a line feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedLine {
    pub styled: String,
    pub plain: String,
}

/// Read-only view of the pending partial line, handed to prompt matchers.
#[derive(Debug, Clone, Copy)]
pub struct LineView<'a> {
    pub text: &'a str,
    /// Column where a command-start marker was seen.
    pub command_start: Option<usize>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// No room left for another character.
    pub fn is_full(&self) -> bool {
        self.cursor >= MAX_COLUMNS
    }

    /// The cursor sits at the end of the line right after a space, where a
    /// prompt would end.
    pub fn after_space(&self) -> bool {
        self.cursor == self.cells.len() && self.cells.last().is_some_and(|c| c.ch == ' ')
    }

    pub fn print(&mut self, ch: char) {
        if self.is_full() {
            return;
        }
        let cell = Cell {
            style: std::mem::take(&mut self.pending_style),
            ch,
        };
        if self.cursor < self.cells.len() {
            self.cells[self.cursor] = cell;
        } else {
            self.pad_to(self.cursor);
            self.cells.push(cell);
        }
        self.cursor += 1;
    }

    pub fn push_style(&mut self, sgr: &str) {
        self.pending_style.push_str(sgr);
    }

    pub fn carriage_return(&mut self) {
        self.cursor = 0;
    }

    pub fn backspace(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn mark_command_start(&mut self) {
        self.command_start = Some(self.cursor);
    }

    /// Apply a non-SGR control sequence. Returns false when the sequence has
    /// no meaning for a single line.
    pub fn apply_csi(&mut self, csi: &Csi) -> bool {
        if csi.is_private() || !csi.intermediates.is_empty() {
            return false;
        }

        match csi.final_char {
            'K' => match csi.param(0, 0) {
                0 => self.cells.truncate(self.cursor),
                1 => {
                    let end = (self.cursor + 1).min(self.cells.len());
                    self.cells[..end].fill(Cell::blank());
                }
                2 => self.cells.clear(),
                _ => return false,
            },
            'C' => self.cursor = (self.cursor + csi.param(0, 1)).min(MAX_COLUMNS),
            'D' => self.cursor = self.cursor.saturating_sub(csi.param(0, 1)),
            'G' => self.cursor = csi.param(0, 1).min(MAX_COLUMNS) - 1,
            'P' => {
                let start = self.cursor.min(self.cells.len());
                let end = (start + csi.param(0, 1)).min(self.cells.len());
                self.cells.drain(start..end);
            }
            '@' => {
                if self.cursor <= self.cells.len() {
                    let count = csi.param(0, 1).min(MAX_COLUMNS);
                    self.cells
                        .splice(self.cursor..self.cursor, std::iter::repeat_n(Cell::blank(), count));
                }
            }
            'X' => {
                let start = self.cursor.min(self.cells.len());
                let end = (start + csi.param(0, 1)).min(self.cells.len());
                self.cells[start..end].fill(Cell::blank());
            }
            _ => return false,
        }
        true
    }

    pub fn plain(&self) -> String {
        self.cells.iter().map(|c| c.ch).collect()
    }

    pub fn view<'a>(&self, text: &'a str) -> LineView<'a> {
        LineView {
            text,
            command_start: self.command_start,
        }
    }

    /// Text from column `from` onward without styling.
    pub fn plain_from(&self, from: usize) -> String {
        self.cells.iter().skip(from).map(|c| c.ch).collect()
    }

    /// Styled text of the first `to` columns.
    pub fn styled_until(&self, to: usize) -> String {
        self.render(&self.cells[..to.min(self.cells.len())], false)
    }

    /// Finish the line and start a fresh one. Trailing styling is emitted
    /// at the end of this line.
    pub fn commit(&mut self) -> CommittedLine {
        let styled = self.render(&self.cells, true);
        let plain = self.plain();

        self.pending_style.clear();
        self.cells.clear();
        self.cursor = 0;
        self.command_start = None;

        CommittedLine { styled, plain }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.cursor = 0;
        self.pending_style.clear();
        self.command_start = None;
    }

    fn render(&self, cells: &[Cell], with_trailing_style: bool) -> String {
        let mut out = String::new();
        for cell in cells {
            out.push_str(&cell.style);
            out.push(cell.ch);
        }
        if with_trailing_style {
            out.push_str(&self.pending_style);
        }
        out
    }

    fn pad_to(&mut self, column: usize) {
        while self.cells.len() < column {
            self.cells.push(Cell::blank());
        }
    }
}
