//! Preservation verification.
//!
//! A plan is accepted only if (1) the structural sharing of the original
//! group survives intact, (2) the scope-of-creation policy matches the
//! pattern kind in both directions, (3) the replay traces agree, and (4)
//! re-analyzing the rewritten unit finds no remaining match for the
//! transformed group (fixpoint). Any failure demotes the rewrite to
//! flag-only output; nothing is partially applied.

pub mod replay;

use crate::analyzers::{self, ModuleMap, SourceUnit};
use crate::classify;
use crate::config::EncapConfig;
use crate::core::types::{CreationScope, PatternKind, PatternMatch, TransformationPlan};
use crate::core::Error;
use crate::grouping;
use crate::rewrite;
use std::collections::HashSet;

/// Full verification of one plan against the unit it was derived from
pub fn verify_plan(
    unit: &SourceUnit,
    map: &ModuleMap,
    pattern_match: &PatternMatch,
    plan: &TransformationPlan,
    config: &EncapConfig,
) -> Result<(), Error> {
    checks(unit, map, pattern_match, plan, config).map_err(|detail| Error::PreservationViolation {
        group_id: plan.group_id,
        detail,
    })
}

fn checks(
    unit: &SourceUnit,
    map: &ModuleMap,
    pattern_match: &PatternMatch,
    plan: &TransformationPlan,
    config: &EncapConfig,
) -> Result<(), String> {
    sharing_preserved(pattern_match, plan)?;
    scope_policy_consistent(plan)?;
    replay::replay_equivalence(&pattern_match.group, plan)?;
    release_paths_covered(pattern_match, plan)?;
    fixpoint_holds(unit, map, pattern_match, plan, config)?;
    Ok(())
}

/// Every binding of the group must live in the factory and every accessor
/// must come back as a capability; anything less would split the sharing
/// the original code relied on
fn sharing_preserved(pattern_match: &PatternMatch, plan: &TransformationPlan) -> Result<(), String> {
    let group = &pattern_match.group;

    let planned: HashSet<&str> = plan.storage.iter().map(|(n, _)| n.as_str()).collect();
    for binding in &group.bindings {
        if !planned.contains(binding.name.as_str()) {
            return Err(format!(
                "binding '{}' missing from factory storage",
                binding.name
            ));
        }
    }

    let surface: HashSet<&str> = plan
        .capabilities
        .iter()
        .filter_map(|c| c.source_accessor.as_deref())
        .collect();
    for accessor in &group.accessors {
        if !surface.contains(accessor.name.as_str()) {
            return Err(format!(
                "accessor '{}' missing from capability surface",
                accessor.name
            ));
        }
    }

    Ok(())
}

/// Per-scope state must never be aliased across concurrently live scope
/// instances, and a shared singleton must never silently become per-caller
fn scope_policy_consistent(plan: &TransformationPlan) -> Result<(), String> {
    let required = match plan.kind {
        PatternKind::RequestContext | PatternKind::RetryBackoff | PatternKind::SerializedQueue => {
            Some(CreationScope::PerLogicalScope)
        }
        PatternKind::MemoizedCache
        | PatternKind::MutableStateBag
        | PatternKind::LazyInit
        | PatternKind::TimerDebounceThrottle
        | PatternKind::UnstableCallbackIdentity => Some(CreationScope::ModuleInit),
        // guard-once and resource-lifecycle follow the caller lifecycle
        PatternKind::GuardOnce | PatternKind::ResourceLifecycle => None,
    };
    match required {
        Some(required) if plan.scope != required => Err(format!(
            "{} planned with {:?}, requires {:?}",
            plan.kind, plan.scope, required
        )),
        _ => Ok(()),
    }
}

/// Resource-lifecycle plans must expose a release callable, and every
/// recorded exit path must release exactly once
fn release_paths_covered(
    pattern_match: &PatternMatch,
    plan: &TransformationPlan,
) -> Result<(), String> {
    if pattern_match.kind != PatternKind::ResourceLifecycle {
        return Ok(());
    }
    if !plan.capabilities.iter().any(|c| c.source_accessor.is_none()) {
        return Err("resource-lifecycle plan has no release capability".to_string());
    }
    let mut seen = HashSet::new();
    for point in &plan.release_points {
        if !seen.insert(point.start) {
            return Err(format!(
                "exit path at offset {} would release twice",
                point.start
            ));
        }
    }
    Ok(())
}

/// Apply the plan in isolation and re-run analysis, grouping and
/// classification: the transformed group must not match again
fn fixpoint_holds(
    unit: &SourceUnit,
    map: &ModuleMap,
    pattern_match: &PatternMatch,
    plan: &TransformationPlan,
    config: &EncapConfig,
) -> Result<(), String> {
    let rewritten = rewrite::apply_plans(
        &unit.source,
        map,
        std::slice::from_ref(pattern_match),
        std::slice::from_ref(plan),
        config,
    )
    .map_err(|e| format!("rewrite failed: {e}"))?;

    let rewritten_unit = SourceUnit::new(unit.path.clone(), unit.language, rewritten.source);
    let new_map = analyzers::analyze_unit(&rewritten_unit, &config.analyzer)
        .map_err(|e| format!("rewritten unit does not analyze cleanly: {e}"))?;

    let groups = grouping::build_groups(&new_map);
    let classification = classify::classify_groups(groups, &config.catalog);

    let transformed: HashSet<&str> = pattern_match
        .group
        .bindings
        .iter()
        .map(|b| b.name.as_str())
        .collect();

    for remaining in &classification.matches {
        if remaining
            .group
            .bindings
            .iter()
            .any(|b| transformed.contains(b.name.as_str()))
        {
            return Err(format!(
                "rewritten unit still matches {} on group of '{}'",
                remaining.kind,
                remaining.group.bindings[0].name
            ));
        }
    }

    Ok(())
}
