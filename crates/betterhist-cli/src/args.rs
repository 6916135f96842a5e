use crate::types::{LogLevel, OutputFormat, SearchIn};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "betterhist")]
#[command(
    about = "Record your shell session and render any command with its output as Markdown",
    long_about = "Run without arguments to start a recorded shell. Inside that shell, run \
                  without arguments to print the most recent command and its output as a \
                  Markdown block, or use a subcommand to look further back."
)]
#[command(version)]
pub struct Cli {
    /// Data directory (default: $BETTERHIST_PATH, then the XDG data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[arg(long, default_value = "plain", global = true)]
    pub format: OutputFormat,

    #[arg(long, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    #[command(about = "Show one recorded command and its output")]
    Get {
        /// Record id; negative values count back from the latest (-1 = latest)
        #[arg(allow_negative_numbers = true)]
        id: i64,

        /// Render as a fenced Markdown block
        #[arg(long)]
        markdown: bool,
    },

    #[command(about = "Search commands and output, most recent first")]
    Search {
        text: String,

        #[arg(long, default_value = "10")]
        limit: usize,

        /// Where to look for the text
        #[arg(long = "in", value_name = "WHERE", default_value = "both")]
        scope: SearchIn,
    },

    #[command(about = "Show the last N commands as Markdown")]
    Last {
        #[arg(short = 'n', long = "count", default_value = "1")]
        count: usize,
    },

    #[command(about = "Describe the current session")]
    Info,

    #[command(about = "Print shell code that emits prompt markers for precise segmentation")]
    ShellInit {
        #[arg(value_enum)]
        shell: ShellKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum ShellKind {
    Bash,
    Zsh,
}
