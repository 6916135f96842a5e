//! Fakes for driving a `Session` without a real pty or terminal.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use betterhist_runtime::{
    Error as RuntimeError, PtyResizer, Result as RuntimeResult, ShellProcess, Terminal,
    TerminalSize,
};

/// Exit code reported by a fake shell that was killed.
pub const KILLED_EXIT_CODE: u32 = 137;

#[derive(Debug)]
struct ShellState {
    exit_at: Option<Instant>,
    code: u32,
    killed: bool,
}

/// A child process that exits on a timer, or only when killed.
pub struct FakeShell {
    state: Arc<Mutex<ShellState>>,
}

/// Observer side of a [`FakeShell`].
#[derive(Clone)]
pub struct ShellHandle {
    state: Arc<Mutex<ShellState>>,
}

impl FakeShell {
    /// Exits with `code` once `delay` has passed.
    pub fn exiting_after(delay: Duration, code: u32) -> Self {
        Self::with_state(ShellState {
            exit_at: Some(Instant::now() + delay),
            code,
            killed: false,
        })
    }

    /// Runs until killed.
    pub fn running() -> Self {
        Self::with_state(ShellState {
            exit_at: None,
            code: 0,
            killed: false,
        })
    }

    fn with_state(state: ShellState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn handle(&self) -> ShellHandle {
        ShellHandle {
            state: self.state.clone(),
        }
    }
}

impl ShellHandle {
    pub fn was_killed(&self) -> bool {
        self.state.lock().unwrap().killed
    }
}

impl ShellProcess for FakeShell {
    fn try_wait(&mut self) -> io::Result<Option<u32>> {
        let state = self.state.lock().unwrap();
        if state.killed {
            return Ok(Some(KILLED_EXIT_CODE));
        }
        Ok(state
            .exit_at
            .filter(|at| Instant::now() >= *at)
            .map(|_| state.code))
    }

    fn wait(&mut self) -> io::Result<u32> {
        loop {
            if let Some(code) = self.try_wait()? {
                return Ok(code);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().killed = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct TerminalState {
    raw_entered: u32,
    restored: u32,
    size: Option<TerminalSize>,
    fail_raw_mode: bool,
}

/// A terminal that records mode changes.
pub struct FakeTerminal {
    state: Arc<Mutex<TerminalState>>,
}

#[derive(Clone)]
pub struct TerminalHandle {
    state: Arc<Mutex<TerminalState>>,
}

impl FakeTerminal {
    pub fn new(size: TerminalSize) -> Self {
        Self {
            state: Arc::new(Mutex::new(TerminalState {
                size: Some(size),
                ..TerminalState::default()
            })),
        }
    }

    /// A terminal that refuses raw mode, like a pipe.
    pub fn not_a_tty() -> Self {
        Self {
            state: Arc::new(Mutex::new(TerminalState {
                fail_raw_mode: true,
                ..TerminalState::default()
            })),
        }
    }

    pub fn handle(&self) -> TerminalHandle {
        TerminalHandle {
            state: self.state.clone(),
        }
    }
}

impl TerminalHandle {
    /// True while raw mode is entered and not yet restored.
    pub fn is_raw(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.raw_entered > state.restored
    }

    pub fn raw_entered(&self) -> u32 {
        self.state.lock().unwrap().raw_entered
    }

    pub fn restored(&self) -> u32 {
        self.state.lock().unwrap().restored
    }

    pub fn set_size(&self, size: TerminalSize) {
        self.state.lock().unwrap().size = Some(size);
    }
}

impl Terminal for FakeTerminal {
    fn enter_raw_mode(&mut self) -> RuntimeResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_raw_mode {
            return Err(RuntimeError::TerminalMode("not a terminal".to_string()));
        }
        state.raw_entered += 1;
        Ok(())
    }

    fn restore(&mut self) -> RuntimeResult<()> {
        self.state.lock().unwrap().restored += 1;
        Ok(())
    }

    fn size(&self) -> Option<TerminalSize> {
        self.state.lock().unwrap().size
    }
}

/// Records every size the pty was set to.
#[derive(Clone, Default)]
pub struct FakeResizer {
    sizes: Arc<Mutex<Vec<TerminalSize>>>,
}

impl FakeResizer {
    pub fn sizes(&self) -> Vec<TerminalSize> {
        self.sizes.lock().unwrap().clone()
    }
}

impl PtyResizer for FakeResizer {
    fn resize(&self, size: TerminalSize) -> io::Result<()> {
        self.sizes.lock().unwrap().push(size);
        Ok(())
    }
}

/// Yields one scripted chunk per read, then end-of-stream.
///
/// An optional delay before each chunk spaces the reads out in time.
pub struct ScriptedInput {
    chunks: VecDeque<Vec<u8>>,
    delay: Duration,
}

impl ScriptedInput {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            delay: Duration::ZERO,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::<Vec<u8>>::new())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Read for ScriptedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if chunk.len() > buf.len() {
            let rest = chunk.split_off(buf.len());
            self.chunks.push_front(rest);
        }
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

/// A writer whose contents stay inspectable after it has been boxed away.
#[derive(Clone, Default)]
pub struct SharedOutput {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).to_string()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal went away"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("pty read failed"))
    }
}
