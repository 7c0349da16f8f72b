use crate::analyzers::SourceUnit;
use crate::cli::OutputFormat;
use crate::core::types::{PlanOutcome, TransformationPlan};
use crate::engine;
use crate::io;
use anyhow::Result;
use std::path::PathBuf;

pub struct ApplyArgs {
    pub path: PathBuf,
    pub write: bool,
    pub kinds: Option<Vec<String>>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub fn run(args: ApplyArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref(), &args.path)?;
    let unit = SourceUnit::from_path(&args.path)?;

    let analysis = engine::analyze(&unit, &config)?;
    let selected = super::select_matches(analysis.matches, args.kinds.as_deref())?;
    let outcomes = engine::plan(&unit, &selected, &config)?;

    let plans: Vec<TransformationPlan> = outcomes
        .iter()
        .filter_map(|o| match o {
            PlanOutcome::Planned(plan) => Some(plan.clone()),
            PlanOutcome::Blocked(blocked) => {
                log::warn!(
                    "group {} ({}) blocked: {:?}",
                    blocked.group_id,
                    blocked.kind,
                    blocked.reason
                );
                None
            }
        })
        .collect();

    let report = engine::apply(&unit, &selected, &plans, &config)?;

    if args.write {
        if let Some(result) = &report.result {
            io::write_file(&args.path, &result.source)?;
            log::info!(
                "rewrote {} ({} group(s), {} call site(s))",
                args.path.display(),
                result.summary.groups_rewritten,
                result.summary.call_sites_patched
            );
        }
    }

    super::write_report(&report, args.format, args.output.as_deref())
}
