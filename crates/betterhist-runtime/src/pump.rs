//! Byte pumps between the user's terminal and the pty master.
//!
//! Each pump runs on its own thread and offers a copy of every chunk to the
//! [`Tap`]. Shell output is tapped after it reached the terminal. Keystrokes
//! are tapped before they reach the pty, so the recorder always sees Enter
//! ahead of the echo it causes.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::AsFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;

use betterhist_engine::TapEvent;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::session::SessionEvent;
use crate::tap::Tap;

const BUFFER_SIZE: usize = 8192;

/// Standard input read with a timeout.
///
/// A read that sees no data within the timeout fails with `WouldBlock`, which
/// lets the input pump notice its stop flag. Reads go to a duplicated
/// descriptor so nothing is buffered on the way.
pub struct PolledStdin {
    file: File,
    timeout: PollTimeout,
}

impl PolledStdin {
    pub fn new(timeout: Duration) -> io::Result<Self> {
        let fd = io::stdin().as_fd().try_clone_to_owned()?;
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        Ok(Self {
            file: File::from(fd),
            timeout: PollTimeout::from(millis),
        })
    }
}

impl Read for PolledStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let ready = {
            let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, self.timeout) {
                Ok(ready) => ready,
                Err(Errno::EINTR) => return Err(ErrorKind::Interrupted.into()),
                Err(errno) => return Err(io::Error::from(errno)),
            }
        };

        if ready == 0 {
            return Err(ErrorKind::WouldBlock.into());
        }
        self.file.read(buf)
    }
}

/// Terminal → pty. Keystrokes are tapped as `Input`, then forwarded.
pub fn input_pump(
    mut input: Box<dyn Read + Send>,
    mut pty: Box<dyn Write + Send>,
    mut tap: Tap,
    stop: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
) {
    let mut buf = [0u8; BUFFER_SIZE];

    while !stop.load(Ordering::Relaxed) {
        let n = match input.read(&mut buf) {
            Ok(0) => {
                let _ = events.send(SessionEvent::InputClosed);
                return;
            }
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                continue;
            }
            Err(e) => {
                let _ = events.send(SessionEvent::InputFailed(e));
                return;
            }
        };

        tap.offer(TapEvent::Input(buf[..n].to_vec()));
        if let Err(e) = pty.write_all(&buf[..n]).and_then(|_| pty.flush()) {
            let _ = events.send(SessionEvent::InputFailed(e));
            return;
        }
    }

    tracing::debug!("input pump stopped");
}

/// Pty → terminal. Every chunk is written and flushed before it is tapped.
pub fn output_pump(
    mut pty: Box<dyn Read + Send>,
    mut output: Box<dyn Write + Send>,
    mut tap: Tap,
    events: Sender<SessionEvent>,
) {
    let mut buf = [0u8; BUFFER_SIZE];

    loop {
        let n = match pty.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            // Linux reports EIO once the slave side has been closed.
            Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
            Err(e) => {
                let _ = events.send(SessionEvent::OutputFailed(e));
                return;
            }
        };

        if let Err(e) = output.write_all(&buf[..n]).and_then(|_| output.flush()) {
            let _ = events.send(SessionEvent::OutputFailed(e));
            return;
        }
        tap.offer(TapEvent::Output(buf[..n].to_vec()));
    }

    tracing::debug!(dropped_bytes = tap.dropped_bytes(), "pty output closed");
    let _ = events.send(SessionEvent::OutputClosed);
}
