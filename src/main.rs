use anyhow::Result;
use clap::Parser;
use encap::cli::{Cli, Commands};
use encap::commands;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            path,
            format,
            output,
            config,
        } => commands::analyze::run(commands::analyze::AnalyzeArgs {
            path,
            format,
            output,
            config,
        }),
        Commands::Plan {
            path,
            kinds,
            format,
            output,
            config,
        } => commands::plan::run(commands::plan::PlanArgs {
            path,
            kinds,
            format,
            output,
            config,
        }),
        Commands::Apply {
            path,
            write,
            kinds,
            format,
            output,
            config,
        } => commands::apply::run(commands::apply::ApplyArgs {
            path,
            write,
            kinds,
            format,
            output,
            config,
        }),
        Commands::Init { force } => commands::init::run(force),
    }
}
