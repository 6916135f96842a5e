//! Session supervisor.
//!
//! A [`Session`] owns the user's terminal, the child shell and the pty between
//! them for as long as the shell runs. It starts the pumps and the recorder,
//! reacts to [`SessionEvent`]s, and always hands the terminal back in its
//! original mode before returning.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, SyncSender, channel, sync_channel};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use betterhist_engine::{ForegroundProbe, TapEvent};

use crate::config::ProxyConfig;
use crate::pty::{PtyResizer, ShellCommand, ShellProcess, spawn_shell};
use crate::pump::{PolledStdin, input_pump, output_pump};
use crate::recorder::{Recorder, RecorderSummary, SharedSize};
use crate::tap::Tap;
use crate::terminal::{CrosstermTerminal, RawModeGuard, Terminal, TerminalSize};
use crate::{Error, Result};

const STDIN_POLL: Duration = Duration::from_millis(100);

/// The four byte streams a session moves data between.
pub struct SessionIo {
    /// The user's terminal input.
    pub input: Box<dyn Read + Send>,
    /// The user's terminal output.
    pub output: Box<dyn Write + Send>,
    pub pty_reader: Box<dyn Read + Send>,
    pub pty_writer: Box<dyn Write + Send>,
}

#[derive(Debug)]
pub enum SessionEvent {
    /// The user's terminal changed size.
    Resize,
    /// A termination signal reached the proxy.
    Interrupt,
    InputClosed,
    InputFailed(io::Error),
    OutputClosed,
    OutputFailed(io::Error),
}

#[derive(Debug)]
pub enum SessionOutcome {
    /// The shell exited on its own with this code.
    Exited(u32),
    /// The session was ended by a forwarded termination signal.
    Interrupted,
    /// Proxying failed; the shell has been killed.
    Failed(io::Error),
}

/// Handle for delivering events to a running session from other threads.
#[derive(Clone)]
pub struct SessionControl {
    tx: Sender<SessionEvent>,
}

impl SessionControl {
    pub fn interrupt(&self) {
        let _ = self.tx.send(SessionEvent::Interrupt);
    }

    pub fn resize(&self) {
        let _ = self.tx.send(SessionEvent::Resize);
    }
}

pub struct Session {
    io: SessionIo,
    process: Box<dyn ShellProcess>,
    resizer: Box<dyn PtyResizer>,
    terminal: Box<dyn Terminal>,
    recorder: Option<Recorder>,
    probe: Option<Box<dyn ForegroundProbe>>,
    config: ProxyConfig,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
}

/// Spawn `command` behind a pty sized to the real terminal, wired to stdin
/// and stdout.
pub fn start(command: &ShellCommand, config: &ProxyConfig) -> Result<Session> {
    let terminal = CrosstermTerminal::new();
    let size = terminal.size().unwrap_or(TerminalSize::FALLBACK);
    let input = PolledStdin::new(STDIN_POLL)?;

    let shell = spawn_shell(command, size)?;
    let io = SessionIo {
        input: Box::new(input),
        output: Box::new(io::stdout()),
        pty_reader: shell.reader,
        pty_writer: shell.writer,
    };

    Ok(Session::new(
        io,
        shell.process,
        shell.resizer,
        Box::new(terminal),
        config.clone(),
    )
    .with_probe(shell.probe))
}

impl Session {
    pub fn new(
        io: SessionIo,
        process: Box<dyn ShellProcess>,
        resizer: Box<dyn PtyResizer>,
        terminal: Box<dyn Terminal>,
        config: ProxyConfig,
    ) -> Self {
        let (events_tx, events_rx) = channel();
        Self {
            io,
            process,
            resizer,
            terminal,
            recorder: None,
            probe: None,
            config,
            events_tx,
            events_rx,
        }
    }

    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn ForegroundProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// The foreground-job probe of the spawned shell, for the segmenter.
    pub fn take_probe(&mut self) -> Option<Box<dyn ForegroundProbe>> {
        self.probe.take()
    }

    pub fn control(&self) -> SessionControl {
        SessionControl {
            tx: self.events_tx.clone(),
        }
    }

    /// Proxy until the shell exits or the session is interrupted.
    ///
    /// The terminal is back in its original mode when this returns, whatever
    /// the outcome.
    pub fn run(self) -> Result<SessionOutcome> {
        let Session {
            io,
            mut process,
            resizer,
            terminal,
            recorder,
            config,
            events_tx,
            events_rx,
            ..
        } = self;

        let mut guard = match RawModeGuard::engage(terminal) {
            Ok(guard) => guard,
            Err(e) => {
                terminate(process.as_mut());
                return Err(e);
            }
        };

        let size = guard.size().unwrap_or(TerminalSize::FALLBACK);
        if let Err(e) = resizer.resize(size) {
            tracing::warn!("failed to size pty: {}", e);
        }
        let shared_size: SharedSize = Arc::new(Mutex::new(size));

        let (tap_tx, recorder_handle) = match recorder {
            Some(recorder) => start_recorder(recorder, &config, &shared_size),
            None => (None, None),
        };

        let stop = Arc::new(AtomicBool::new(false));
        let pumps = spawn_pumps(io, &tap_tx, &stop, &events_tx);
        let (input_handle, output_handle) = match pumps {
            Ok(handles) => handles,
            Err(e) => {
                stop.store(true, Ordering::Relaxed);
                terminate(process.as_mut());
                finish_recorder(tap_tx, recorder_handle);
                guard.restore()?;
                return Err(Error::Io(e));
            }
        };

        let mut supervisor = Supervisor {
            process: process.as_mut(),
            resizer: resizer.as_ref(),
            guard: &guard,
            size: &shared_size,
            events: &events_rx,
            output_closed: false,
        };
        let outcome = supervisor.supervise(config.poll_interval());
        if matches!(outcome, SessionOutcome::Exited(_)) {
            supervisor.drain(config.drain_grace());
        }
        let output_closed = supervisor.output_closed;

        stop.store(true, Ordering::Relaxed);
        if input_handle.join().is_err() {
            tracing::error!("input pump panicked");
        }
        finish_recorder(tap_tx, recorder_handle);
        if output_closed && output_handle.join().is_err() {
            tracing::error!("output pump panicked");
        }

        guard.restore()?;
        tracing::info!(outcome = ?outcome, "session ended");
        Ok(outcome)
    }
}

fn start_recorder(
    recorder: Recorder,
    config: &ProxyConfig,
    size: &SharedSize,
) -> (
    Option<SyncSender<TapEvent>>,
    Option<JoinHandle<RecorderSummary>>,
) {
    let (tx, rx) = sync_channel(config.tap_capacity.max(1));
    match recorder.spawn(rx, size.clone()) {
        Ok(handle) => (Some(tx), Some(handle)),
        Err(e) => {
            tracing::error!("failed to start recorder; session will not be recorded: {}", e);
            (None, None)
        }
    }
}

fn finish_recorder(
    tap_tx: Option<SyncSender<TapEvent>>,
    handle: Option<JoinHandle<RecorderSummary>>,
) {
    if let Some(tx) = tap_tx {
        // Blocking: the recorder keeps consuming until it sees End.
        let _ = tx.send(TapEvent::End);
    }
    if let Some(handle) = handle {
        match handle.join() {
            Ok(RecorderSummary {
                turns_recorded,
                error: Some(e),
                ..
            }) => tracing::error!(turns = turns_recorded, "recording abandoned: {}", e),
            Ok(summary) => tracing::info!(turns = summary.turns_recorded, "recording finished"),
            Err(_) => tracing::error!("recorder panicked"),
        }
    }
}

fn tap_for(tap_tx: &Option<SyncSender<TapEvent>>) -> Tap {
    match tap_tx {
        Some(tx) => Tap::new(tx.clone()),
        None => Tap::disabled(),
    }
}

fn spawn_pumps(
    io: SessionIo,
    tap_tx: &Option<SyncSender<TapEvent>>,
    stop: &Arc<AtomicBool>,
    events: &Sender<SessionEvent>,
) -> io::Result<(JoinHandle<()>, JoinHandle<()>)> {
    let SessionIo {
        input,
        output,
        pty_reader,
        pty_writer,
    } = io;

    let input_handle = {
        let tap = tap_for(tap_tx);
        let stop = stop.clone();
        let events = events.clone();
        std::thread::Builder::new()
            .name("betterhist-input".to_string())
            .spawn(move || input_pump(input, pty_writer, tap, stop, events))?
    };

    let output_handle = {
        let tap = tap_for(tap_tx);
        let events = events.clone();
        std::thread::Builder::new()
            .name("betterhist-output".to_string())
            .spawn(move || output_pump(pty_reader, output, tap, events))?
    };

    Ok((input_handle, output_handle))
}

/// Kill the child and reap it.
fn terminate(process: &mut dyn ShellProcess) {
    if let Err(e) = process.kill() {
        tracing::debug!("kill failed: {}", e);
    }
    match process.wait() {
        Ok(code) => tracing::debug!(code, "shell reaped"),
        Err(e) => tracing::warn!("failed to reap shell: {}", e),
    }
}

struct Supervisor<'a> {
    process: &'a mut dyn ShellProcess,
    resizer: &'a dyn PtyResizer,
    guard: &'a RawModeGuard,
    size: &'a SharedSize,
    events: &'a Receiver<SessionEvent>,
    output_closed: bool,
}

impl Supervisor<'_> {
    fn supervise(&mut self, poll_interval: Duration) -> SessionOutcome {
        loop {
            match self.process.try_wait() {
                Ok(Some(code)) => {
                    tracing::info!(code, "shell exited");
                    return SessionOutcome::Exited(code);
                }
                Ok(None) => {}
                Err(e) => {
                    terminate(self.process);
                    return SessionOutcome::Failed(e);
                }
            }

            match self.events.recv_timeout(poll_interval) {
                Ok(SessionEvent::Resize) => self.resize(),
                Ok(SessionEvent::Interrupt) => {
                    tracing::info!("interrupted; terminating shell");
                    terminate(self.process);
                    return SessionOutcome::Interrupted;
                }
                Ok(SessionEvent::InputClosed) => {
                    tracing::debug!("terminal input closed");
                }
                Ok(SessionEvent::OutputClosed) => {
                    self.output_closed = true;
                }
                Ok(SessionEvent::InputFailed(e)) | Ok(SessionEvent::OutputFailed(e)) => {
                    // A pump failing because the shell just went away is a normal exit.
                    if let Ok(Some(code)) = self.process.try_wait() {
                        return SessionOutcome::Exited(code);
                    }
                    tracing::error!("proxy I/O failed: {}", e);
                    terminate(self.process);
                    return SessionOutcome::Failed(e);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
            }
        }
    }

    /// Give the output pump up to `grace` to forward what the shell printed last.
    fn drain(&mut self, grace: Duration) {
        let deadline = Instant::now() + grace;
        while !self.output_closed {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                tracing::debug!("drain grace elapsed with pty output still open");
                return;
            };
            match self.events.recv_timeout(remaining) {
                Ok(SessionEvent::OutputClosed) => self.output_closed = true,
                Ok(SessionEvent::OutputFailed(e)) => {
                    tracing::debug!("output failed while draining: {}", e);
                    return;
                }
                Ok(_) => {}
                Err(_) => return,
            }
        }
    }

    fn resize(&mut self) {
        let Some(size) = self.guard.size() else {
            return;
        };
        if let Ok(mut shared) = self.size.lock() {
            *shared = size;
        }
        match self.resizer.resize(size) {
            Ok(()) => tracing::debug!(columns = size.columns, lines = size.lines, "resized pty"),
            Err(e) => tracing::warn!("failed to resize pty: {}", e),
        }
    }
}
