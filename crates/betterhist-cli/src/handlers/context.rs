use crate::presentation::fence_language;
use crate::types::OutputFormat;
use anyhow::{Context, Result};
use betterhist_index::Database;
use betterhist_runtime::RenderConfig;
use betterhist_types::ActiveSession;
use is_terminal::IsTerminal;

/// What a query handler needs: the session's store opened read-only, plus
/// output settings.
pub struct HandlerContext {
    pub db: Database,
    pub session: ActiveSession,
    pub format: OutputFormat,
    pub render: RenderConfig,
}

impl HandlerContext {
    pub fn open(session: ActiveSession, format: OutputFormat, render: RenderConfig) -> Result<Self> {
        let db = Database::open_read_only(&session.store_path).with_context(|| {
            format!(
                "cannot read the session store at {}",
                session.store_path.display()
            )
        })?;

        Ok(Self {
            db,
            session,
            format,
            render,
        })
    }

    /// Fence tag: the configured override, else derived from the session's shell.
    pub fn language(&self) -> String {
        if let Some(language) = &self.render.language {
            return language.clone();
        }

        let shell = self
            .db
            .session_meta()
            .ok()
            .and_then(|meta| meta.shell)
            .unwrap_or_default();
        fence_language(&shell).to_string()
    }

    pub fn use_color(&self) -> bool {
        self.format == OutputFormat::Plain && std::io::stdout().is_terminal()
    }
}
