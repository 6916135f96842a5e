use signal_hook::consts::SIGWINCH;
use signal_hook::iterator::Signals;

use crate::session::SessionControl;
use crate::{Error, Result};

/// Route process signals into the session.
///
/// SIGINT, SIGTERM and SIGHUP become [`SessionControl::interrupt`]; SIGWINCH
/// becomes [`SessionControl::resize`]. Keyboard interrupts never get here
/// while the terminal is in raw mode: they reach the shell as bytes.
pub fn install(control: SessionControl) -> Result<()> {
    let interrupt = control.clone();
    ctrlc::set_handler(move || interrupt.interrupt())
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    let mut signals = Signals::new([SIGWINCH])?;
    std::thread::Builder::new()
        .name("betterhist-signals".to_string())
        .spawn(move || {
            for _ in signals.forever() {
                control.resize();
            }
        })?;

    Ok(())
}
