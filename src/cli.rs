use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON report
    Json,
    /// One JSON object per line
    Compact,
}

#[derive(Parser, Debug)]
#[command(name = "encap")]
#[command(about = "Closure-pattern detector and rewriter for shared module state", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan files for shared-state closure patterns
    Analyze {
        /// File or directory to analyze
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file (defaults to .encap.toml next to the target)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Build transformation plans for the matches in one file
    Plan {
        /// File to plan rewrites for
        path: PathBuf,

        /// Only plan these pattern kinds (comma separated)
        #[arg(long, value_delimiter = ',')]
        kinds: Option<Vec<String>>,

        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Plan, verify and apply rewrites to one file
    Apply {
        /// File to rewrite
        path: PathBuf,

        /// Write the rewritten source back to the file
        #[arg(long)]
        write: bool,

        /// Only apply these pattern kinds (comma separated)
        #[arg(long, value_delimiter = ',')]
        kinds: Option<Vec<String>>,

        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a default .encap.toml
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}
