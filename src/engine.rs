//! Engine surface consumed by the CLI and downstream note generators.
//!
//! `analyze` is read-only; `plan` turns accepted matches into factory plans;
//! `apply` verifies and applies them, demoting failures to flag-only. Each
//! call is a pure function of the source unit and the configuration: no
//! state survives between runs, and each sharing group succeeds or fails
//! independently.

use crate::analyzers::{self, SourceUnit};
use crate::classify;
use crate::config::EncapConfig;
use crate::core::types::{
    AmbiguousGroup, Language, PatternKind, PatternMatch, PlanOutcome, RewriteResult,
    SkippedBinding, SuppressedMatch, TransformationPlan,
};
use crate::core::Result;
use crate::exemption::{self, suppression};
use crate::grouping;
use crate::planner;
use crate::rewrite;
use crate::verify;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything `analyze` derives from one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub path: PathBuf,
    pub language: Language,
    pub matches: Vec<PatternMatch>,
    pub suppressed: Vec<SuppressedMatch>,
    pub ambiguous: Vec<AmbiguousGroup>,
    pub skipped_bindings: Vec<SkippedBinding>,
}

/// A plan the verifier rejected; the match stays reported as flag-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedPlan {
    pub group_id: usize,
    pub kind: PatternKind,
    pub violation: String,
}

/// `apply` output: the rewrite covers the accepted plans; rejected plans
/// fall back to flag-only matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    pub result: Option<RewriteResult>,
    pub rejected: Vec<RejectedPlan>,
    pub flag_only: Vec<PatternMatch>,
}

/// Scan one unit for closure-pattern matches. Read-only, no side effects.
pub fn analyze(unit: &SourceUnit, config: &EncapConfig) -> Result<AnalysisReport> {
    let map = analyzers::analyze_unit(unit, &config.analyzer)?;
    log::debug!(
        "{}: {} bindings, {} accessors, {} skipped",
        unit.path.display(),
        map.bindings.len(),
        map.accessors.len(),
        map.skipped.len()
    );

    let groups = grouping::build_groups(&map);
    let classification = classify::classify_groups(groups, &config.catalog);

    let suppression_context = if config.exemptions.comment_suppression {
        suppression::parse_suppression_comments(&unit.source)
    } else {
        suppression::SuppressionContext::default()
    };
    for line in &suppression_context.unclosed_blocks {
        log::warn!(
            "{}: unclosed encap:allow-start block at line {}",
            unit.path.display(),
            line
        );
    }

    let function_bodies: Vec<_> = map.function_exits.iter().map(|f| f.body_span).collect();
    let filtered = exemption::filter_matches(
        classification.matches,
        &function_bodies,
        &suppression_context,
        &config.exemptions,
    );

    Ok(AnalysisReport {
        path: unit.path.clone(),
        language: unit.language,
        matches: filtered.kept,
        suppressed: filtered.suppressed,
        ambiguous: classification.ambiguous,
        skipped_bindings: map.skipped,
    })
}

/// Build transformation plans for the selected matches
pub fn plan(
    unit: &SourceUnit,
    selected: &[PatternMatch],
    config: &EncapConfig,
) -> Result<Vec<PlanOutcome>> {
    let map = analyzers::analyze_unit(unit, &config.analyzer)?;
    Ok(planner::plan_matches(selected, &map, config))
}

/// Verify and apply plans. Every plan is verified in isolation first; the
/// survivors are applied together (their groups are disjoint, so their
/// patches are too).
pub fn apply(
    unit: &SourceUnit,
    matches: &[PatternMatch],
    plans: &[TransformationPlan],
    config: &EncapConfig,
) -> Result<ApplyReport> {
    let map = analyzers::analyze_unit(unit, &config.analyzer)?;

    let mut accepted: Vec<TransformationPlan> = Vec::new();
    let mut rejected = Vec::new();
    let mut flag_only = Vec::new();

    for plan in plans {
        let Some(pattern_match) = matches.iter().find(|m| m.group.id == plan.group_id) else {
            rejected.push(RejectedPlan {
                group_id: plan.group_id,
                kind: plan.kind,
                violation: "no matching group in this analysis pass".to_string(),
            });
            continue;
        };

        if let Err(violation) = verify::verify_plan(unit, &map, pattern_match, plan, config) {
            log::warn!("demoted to flag-only: {}", violation);
            rejected.push(RejectedPlan {
                group_id: plan.group_id,
                kind: plan.kind,
                violation: violation.to_string(),
            });
            flag_only.push(pattern_match.clone());
            continue;
        }

        // groups are disjoint, but their patch sets may still collide (a call
        // site inside another group's moved accessor); a colliding plan is
        // demoted, never half-applied
        let mut trial = accepted.clone();
        trial.push(plan.clone());
        match rewrite::apply_plans(&unit.source, &map, matches, &trial, config) {
            Ok(_) => accepted = trial,
            Err(conflict) => {
                log::warn!(
                    "group {} ({}) conflicts with an already accepted plan: {}",
                    plan.group_id,
                    plan.kind,
                    conflict
                );
                rejected.push(RejectedPlan {
                    group_id: plan.group_id,
                    kind: plan.kind,
                    violation: conflict.to_string(),
                });
                flag_only.push(pattern_match.clone());
            }
        }
    }

    let result = if accepted.is_empty() {
        None
    } else {
        Some(rewrite::apply_plans(
            &unit.source,
            &map,
            matches,
            &accepted,
            config,
        )?)
    };

    Ok(ApplyReport {
        result,
        rejected,
        flag_only,
    })
}
