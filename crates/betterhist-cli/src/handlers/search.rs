use super::HandlerContext;
use crate::presentation::format_search_line;
use crate::types::{OutputFormat, SearchIn, exit};
use anyhow::Result;
use betterhist_types::Record;

pub fn handle(ctx: &HandlerContext, text: &str, limit: usize, scope: SearchIn) -> Result<i32> {
    let matches = ctx
        .db
        .search(text, scope.into())?
        .take(limit)
        .collect::<Result<Vec<Record>, _>>()?;

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matches)?),
        OutputFormat::Plain => {
            let color = ctx.use_color();
            for record in &matches {
                println!(
                    "{}",
                    format_search_line(record, ctx.render.preview_width, color)
                );
            }
        }
    }

    Ok(exit::SUCCESS)
}
