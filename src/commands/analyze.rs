use crate::batch;
use crate::cli::OutputFormat;
use crate::io::walker;
use anyhow::Result;
use std::path::PathBuf;

pub struct AnalyzeArgs {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref(), &args.path)?;
    let units = walker::load_units(&args.path)?;
    if units.is_empty() {
        anyhow::bail!("no analyzable files under {}", args.path.display());
    }

    log::info!("analyzing {} unit(s)", units.len());
    let report = batch::analyze_units(units, &config);
    log::info!(
        "{} match(es) across {} unit(s), {} unit(s) failed",
        report.total_matches(),
        report.analyzed.len(),
        report.failed.len()
    );

    super::write_report(&report, args.format, args.output.as_deref())
}
