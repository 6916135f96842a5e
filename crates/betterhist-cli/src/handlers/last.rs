use super::HandlerContext;
use crate::presentation::render_markdown;
use crate::types::{OutputFormat, exit};
use anyhow::Result;

pub fn handle(ctx: &HandlerContext, count: usize) -> Result<i32> {
    let records = ctx.db.last_n(count)?;

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Plain if records.is_empty() => {}
        OutputFormat::Plain => println!("{}", render_markdown(&records, &ctx.language())),
    }

    Ok(exit::SUCCESS)
}
