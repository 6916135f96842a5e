use super::HandlerContext;
use crate::presentation::markdown::render_block;
use crate::types::{OutputFormat, exit};
use anyhow::{Result, bail};
use betterhist_types::Record;

pub fn handle(ctx: &HandlerContext, id: i64, markdown: bool) -> Result<i32> {
    let record = ctx.db.get_relative(id)?;
    print_record(ctx, &record, markdown)?;
    Ok(exit::SUCCESS)
}

/// Default action inside a session: the most recent turn as Markdown.
pub fn latest(ctx: &HandlerContext) -> Result<i32> {
    let Some(record) = ctx.db.latest()? else {
        bail!("no commands recorded in this session yet");
    };
    print_record(ctx, &record, true)?;
    Ok(exit::SUCCESS)
}

fn print_record(ctx: &HandlerContext, record: &Record, markdown: bool) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(record)?),
        OutputFormat::Plain if markdown => println!("{}", render_block(record, &ctx.language())),
        OutputFormat::Plain => {
            println!("{}", record.command);
            if !record.output.is_empty() {
                println!("{}", record.output);
            }
        }
    }
    Ok(())
}
