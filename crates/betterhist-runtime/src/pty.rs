use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use betterhist_engine::ForegroundProbe;
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};

use crate::terminal::TerminalSize;
use crate::{Error, Result};

/// The child shell as seen by the supervisor.
pub trait ShellProcess: Send {
    /// Exit code if the process has exited.
    fn try_wait(&mut self) -> io::Result<Option<u32>>;
    fn wait(&mut self) -> io::Result<u32>;
    fn kill(&mut self) -> io::Result<()>;
}

/// Propagates window-size changes to the child's terminal.
pub trait PtyResizer: Send {
    fn resize(&self, size: TerminalSize) -> io::Result<()>;
}

/// What to run on the slave side of the pty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Complete environment of the child; nothing is inherited implicitly.
    pub env: Vec<(String, String)>,
}

impl ShellCommand {
    /// `<program> -i` with the given environment.
    pub fn interactive(program: impl Into<String>, env: Vec<(String, String)>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-i".to_string()],
            cwd: None,
            env,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Short name used as the Markdown fence language (`zsh`, `bash`, ...).
    pub fn name(&self) -> &str {
        self.program
            .rsplit('/')
            .next()
            .unwrap_or(&self.program)
            .trim_start_matches('-')
    }
}

/// Everything the session needs from a freshly spawned shell.
pub struct SpawnedShell {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    pub process: Box<dyn ShellProcess>,
    pub resizer: Box<dyn PtyResizer>,
    pub probe: Box<dyn ForegroundProbe>,
}

type SharedMaster = Arc<Mutex<Box<dyn MasterPty + Send>>>;

/// Allocate a pty of `size` and start `command` on its slave side.
pub fn spawn_shell(command: &ShellCommand, size: TerminalSize) -> Result<SpawnedShell> {
    let pair = native_pty_system()
        .openpty(pty_size(size))
        .map_err(|e| Error::PtyAllocation(e.to_string()))?;

    let mut builder = CommandBuilder::new(&command.program);
    builder.args(&command.args);
    builder.env_clear();
    for (key, value) in &command.env {
        builder.env(key, value);
    }
    if let Some(cwd) = &command.cwd {
        builder.cwd(cwd);
    }

    let child = pair
        .slave
        .spawn_command(builder)
        .map_err(|e| Error::Fork(format!("{}: {}", command.program, e)))?;
    // The master must see EOF once the shell is gone.
    drop(pair.slave);

    let shell_pid = child.process_id();
    tracing::info!(program = %command.program, pid = ?shell_pid, "spawned shell");

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| Error::PtyAllocation(format!("failed to clone pty reader: {}", e)))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| Error::PtyAllocation(format!("failed to take pty writer: {}", e)))?;

    let master: SharedMaster = Arc::new(Mutex::new(pair.master));

    Ok(SpawnedShell {
        reader,
        writer,
        process: Box::new(PortableChild(child)),
        resizer: Box::new(MasterResizer(master.clone())),
        probe: Box::new(MasterForegroundProbe { master, shell_pid }),
    })
}

fn pty_size(size: TerminalSize) -> PtySize {
    PtySize {
        rows: size.lines,
        cols: size.columns,
        pixel_width: 0,
        pixel_height: 0,
    }
}

struct PortableChild(Box<dyn Child + Send + Sync>);

impl ShellProcess for PortableChild {
    fn try_wait(&mut self) -> io::Result<Option<u32>> {
        Ok(self.0.try_wait()?.map(|status| status.exit_code()))
    }

    fn wait(&mut self) -> io::Result<u32> {
        Ok(self.0.wait()?.exit_code())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.0.kill()
    }
}

struct MasterResizer(SharedMaster);

impl PtyResizer for MasterResizer {
    fn resize(&self, size: TerminalSize) -> io::Result<()> {
        let master = self
            .0
            .lock()
            .map_err(|_| io::Error::other("pty master lock poisoned"))?;
        master
            .resize(pty_size(size))
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

/// Compares the pty's foreground process group with the shell's pid.
struct MasterForegroundProbe {
    master: SharedMaster,
    shell_pid: Option<u32>,
}

impl ForegroundProbe for MasterForegroundProbe {
    fn shell_in_foreground(&self) -> Option<bool> {
        let shell_pid = self.shell_pid?;
        let master = self.master.lock().ok()?;
        let leader = master.process_group_leader()?;
        Some(u32::try_from(leader).ok()? == shell_pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_name() {
        let cmd = ShellCommand::interactive("/usr/local/bin/zsh", vec![]);
        assert_eq!(cmd.name(), "zsh");
        assert_eq!(cmd.args, vec!["-i"]);

        assert_eq!(ShellCommand::interactive("-bash", vec![]).name(), "bash");
        assert_eq!(ShellCommand::interactive("fish", vec![]).name(), "fish");
    }
}
