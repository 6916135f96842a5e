//! Pty session proxy
//!
//! Runs the user's shell behind a pseudo-terminal, passes bytes through in
//! both directions, and feeds a copy of the stream to the segmentation engine
//! so finished turns land in the session's record store.

pub mod config;
pub mod error;
pub mod pty;
pub mod pump;
pub mod recorder;
pub mod session;
pub mod signals;
pub mod tap;
pub mod terminal;

pub use config::{Config, ProxyConfig, RenderConfig, SegmentationConfig};
pub use error::{Error, Result};
pub use pty::{PtyResizer, ShellCommand, ShellProcess, SpawnedShell, spawn_shell};
pub use recorder::{Recorder, RecorderSummary, SharedSize};
pub use session::{Session, SessionControl, SessionEvent, SessionIo, SessionOutcome, start};
pub use tap::Tap;
pub use terminal::{
    CrosstermTerminal, RawModeGuard, Terminal, TerminalSize, install_panic_restore,
};
