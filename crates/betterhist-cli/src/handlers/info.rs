use super::HandlerContext;
use crate::types::{OutputFormat, exit};
use anyhow::Result;

pub fn handle(ctx: &HandlerContext) -> Result<i32> {
    let meta = ctx.db.session_meta()?;
    let count = ctx.db.count()?;

    match ctx.format {
        OutputFormat::Json => {
            let info = serde_json::json!({
                "session_id": ctx.session.id.to_string(),
                "store": ctx.session.store_path,
                "shell": meta.shell,
                "started_at": meta.started_at,
                "ended_at": meta.ended_at,
                "records": count,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Plain => {
            println!("Session:  {}", ctx.session.id);
            println!("Store:    {}", ctx.session.store_path.display());
            println!("Shell:    {}", meta.shell.as_deref().unwrap_or("unknown"));
            println!("Started:  {}", meta.started_at.as_deref().unwrap_or("unknown"));
            if let Some(ended_at) = &meta.ended_at {
                println!("Ended:    {}", ended_at);
            }
            println!("Records:  {}", count);
        }
    }

    Ok(exit::SUCCESS)
}
