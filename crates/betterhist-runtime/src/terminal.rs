//! Real-terminal mode management.
//!
//! The proxy owns the user's terminal for the lifetime of a session. Raw mode
//! is entered through a [`RawModeGuard`] so the original mode is put back on
//! every exit path, including unwinding.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub columns: u16,
    pub lines: u16,
}

impl TerminalSize {
    pub const FALLBACK: TerminalSize = TerminalSize {
        columns: 80,
        lines: 24,
    };
}

/// The user's terminal as seen by the proxy.
pub trait Terminal: Send {
    fn enter_raw_mode(&mut self) -> Result<()>;
    fn restore(&mut self) -> Result<()>;
    fn size(&self) -> Option<TerminalSize>;
}

#[derive(Debug, Default)]
pub struct CrosstermTerminal;

impl CrosstermTerminal {
    pub fn new() -> Self {
        Self
    }
}

impl Terminal for CrosstermTerminal {
    fn enter_raw_mode(&mut self) -> Result<()> {
        crossterm::terminal::enable_raw_mode()
            .map_err(|e| Error::TerminalMode(format!("failed to enable raw mode: {}", e)))
    }

    fn restore(&mut self) -> Result<()> {
        crossterm::terminal::disable_raw_mode()
            .map_err(|e| Error::TerminalMode(format!("failed to restore terminal mode: {}", e)))
    }

    fn size(&self) -> Option<TerminalSize> {
        crossterm::terminal::size()
            .ok()
            .filter(|&(columns, lines)| columns > 0 && lines > 0)
            .map(|(columns, lines)| TerminalSize { columns, lines })
    }
}

/// Holds the terminal in raw mode; restores it when dropped.
pub struct RawModeGuard {
    terminal: Box<dyn Terminal>,
    active: bool,
}

impl RawModeGuard {
    pub fn engage(mut terminal: Box<dyn Terminal>) -> Result<Self> {
        terminal.enter_raw_mode()?;
        tracing::debug!("entered raw mode");
        Ok(Self {
            terminal,
            active: true,
        })
    }

    pub fn size(&self) -> Option<TerminalSize> {
        self.terminal.size()
    }

    /// Restore the original mode now. Later calls (and drop) do nothing.
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.terminal.restore()?;
        tracing::debug!("restored terminal mode");
        Ok(())
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::error!("{}", e);
        }
    }
}

/// Chain a panic hook that takes the terminal out of raw mode before the
/// default hook prints the panic message.
pub fn install_panic_restore() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = crossterm::terminal::disable_raw_mode();
        previous(info);
    }));
}
