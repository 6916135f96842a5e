use crate::types::exit;
use anyhow::Result;
use betterhist_index::Database;
use betterhist_runtime::config::store_path;
use betterhist_runtime::{
    Config, Recorder, SessionOutcome, ShellCommand, install_panic_restore, signals,
};
use betterhist_types::{ActiveSession, SESSION_ENV, STORE_ENV, SessionId};
use std::path::Path;

/// Start a recorded shell and proxy it until it exits.
///
/// `env` is the environment of this process; the shell inherits it along
/// with the session markers.
pub fn handle(data_dir: &Path, config: &Config, env: Vec<(String, String)>) -> Result<i32> {
    let id = SessionId::generate();
    let session = ActiveSession {
        store_path: store_path(data_dir, &id),
        id,
    };

    let env_shell = env
        .iter()
        .find(|(key, _)| key == "SHELL")
        .map(|(_, value)| value.clone());
    let shell_program = config.shell_program(env_shell.as_deref());

    let mut shell_env: Vec<(String, String)> = env
        .into_iter()
        .filter(|(key, _)| key != SESSION_ENV && key != STORE_ENV)
        .collect();
    shell_env.extend(
        session
            .env_vars()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value)),
    );

    let mut command = ShellCommand::interactive(shell_program, shell_env);
    if let Ok(cwd) = std::env::current_dir() {
        command = command.with_cwd(cwd);
    }

    let mut segmenter = config.segmentation.build_segmenter()?;

    let mut proxy = betterhist_runtime::start(&command, &config.proxy)?;
    if let Some(probe) = proxy.take_probe() {
        segmenter = segmenter.with_probe(probe);
    }

    // A store that cannot be opened costs the recording, not the shell.
    let proxy = match Database::open(&session.store_path) {
        Ok(db) => {
            let recorder = Recorder::new(segmenter, db, config.segmentation.idle_check())
                .with_session(session.id.clone(), command.program.clone());
            proxy.with_recorder(recorder)
        }
        Err(e) => {
            tracing::error!("recording disabled: {}", e);
            eprintln!("betterhist: recording disabled: {}", e);
            proxy
        }
    };

    signals::install(proxy.control())?;
    install_panic_restore();
    tracing::info!(
        session = %session.id,
        store = %session.store_path.display(),
        shell = %command.program,
        "session started"
    );

    let code = match proxy.run()? {
        SessionOutcome::Exited(code) => i32::try_from(code).unwrap_or(exit::FAILURE),
        SessionOutcome::Interrupted => exit::INTERRUPTED,
        SessionOutcome::Failed(e) => {
            eprintln!("Error: session I/O failed: {}", e);
            exit::PROXY_IO
        }
    };
    Ok(code)
}
