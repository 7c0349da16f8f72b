use crate::analyzers::SourceUnit;
use crate::cli::OutputFormat;
use crate::engine;
use anyhow::Result;
use std::path::PathBuf;

pub struct PlanArgs {
    pub path: PathBuf,
    pub kinds: Option<Vec<String>>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub fn run(args: PlanArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref(), &args.path)?;
    let unit = SourceUnit::from_path(&args.path)?;

    let analysis = engine::analyze(&unit, &config)?;
    let selected = super::select_matches(analysis.matches, args.kinds.as_deref())?;
    let outcomes = engine::plan(&unit, &selected, &config)?;

    super::write_report(&outcomes, args.format, args.output.as_deref())
}
