use super::args::{Cli, Commands};
use super::handlers::{self, HandlerContext};
use crate::context::{Mode, SessionContext, detect_mode};
use crate::logging;
use crate::types::exit;
use anyhow::{Result, anyhow};
use betterhist_runtime::Config;
use betterhist_runtime::config::resolve_data_dir;
use betterhist_types::ActiveSession;

/// Dispatch the invocation; returns the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
    logging::init(&data_dir, cli.log_level);

    let env: Vec<(String, String)> = std::env::vars().collect();
    let context = SessionContext::from_env(
        env.iter().map(|(key, value)| (key.as_str(), value.as_str())),
        &data_dir,
    );
    let config = Config::load_from(&Config::path_in(&data_dir))?;

    match detect_mode(&context, cli.command) {
        Mode::StartSession => handlers::session::handle(&data_dir, &config, env),

        Mode::RenderLatest => {
            let ctx = HandlerContext::open(require_session(context)?, cli.format, config.render)?;
            handlers::get::latest(&ctx)
        }

        Mode::Query(Commands::ShellInit { shell }) => handlers::shell_init::handle(shell),

        Mode::Query(command) => {
            let ctx = HandlerContext::open(require_session(context)?, cli.format, config.render)?;
            match command {
                Commands::Get { id, markdown } => handlers::get::handle(&ctx, id, markdown),
                Commands::Search { text, limit, scope } => {
                    handlers::search::handle(&ctx, &text, limit, scope)
                }
                Commands::Last { count } => handlers::last::handle(&ctx, count),
                Commands::Info => handlers::info::handle(&ctx),
                Commands::ShellInit { shell } => handlers::shell_init::handle(shell),
            }
        }
    }
}

fn require_session(context: SessionContext) -> Result<ActiveSession> {
    context.session.ok_or_else(|| {
        anyhow!(
            "not inside a betterhist session; run `betterhist` with no arguments to start one"
        )
    })
}

/// Exit code for an error that ended the invocation.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(err) = err.downcast_ref::<betterhist_runtime::Error>() {
        return match err {
            betterhist_runtime::Error::PtyAllocation(_) => exit::PTY_ALLOCATION,
            betterhist_runtime::Error::Fork(_) => exit::FORK,
            betterhist_runtime::Error::TerminalMode(_) => exit::TERMINAL_MODE,
            betterhist_runtime::Error::Io(_) => exit::PROXY_IO,
            betterhist_runtime::Error::Index(betterhist_index::Error::NotFound(_)) => {
                exit::NOT_FOUND
            }
            betterhist_runtime::Error::Recording(_)
            | betterhist_runtime::Error::Index(_)
            | betterhist_runtime::Error::Config(_) => exit::FAILURE,
        };
    }

    if let Some(betterhist_index::Error::NotFound(_)) = err.downcast_ref::<betterhist_index::Error>()
    {
        return exit::NOT_FOUND;
    }

    exit::FAILURE
}
