//! Exemption filtering.
//!
//! Matches that meet a do-not-refactor criterion are suppressed, each with
//! its reason recorded for audit. Rules run in a fixed order; the first one
//! that applies wins.

pub mod suppression;

use crate::config::ExemptionConfig;
use crate::core::types::{
    ExemptionReason, PatternMatch, SharingGroup, Span, SuppressedMatch,
};
use suppression::SuppressionContext;

/// Filter output: accepted matches plus the audit trail
#[derive(Debug, Clone, Default)]
pub struct ExemptionOutcome {
    pub kept: Vec<PatternMatch>,
    pub suppressed: Vec<SuppressedMatch>,
}

pub fn filter_matches(
    matches: Vec<PatternMatch>,
    function_bodies: &[Span],
    suppression: &SuppressionContext,
    config: &ExemptionConfig,
) -> ExemptionOutcome {
    let mut out = ExemptionOutcome::default();

    for pattern_match in matches {
        match exemption_for(&pattern_match, function_bodies, suppression, config) {
            Some(reason) => {
                log::debug!(
                    "group {} ({}) suppressed: {:?}",
                    pattern_match.group.id,
                    pattern_match.kind,
                    reason
                );
                out.suppressed.push(SuppressedMatch {
                    pattern_match,
                    reason,
                });
            }
            None => out.kept.push(pattern_match),
        }
    }

    out
}

fn exemption_for(
    pattern_match: &PatternMatch,
    function_bodies: &[Span],
    suppression: &SuppressionContext,
    config: &ExemptionConfig,
) -> Option<ExemptionReason> {
    let group = &pattern_match.group;

    if config.single_call_site && single_call_site(group) {
        return Some(ExemptionReason::SingleCallSite);
    }
    if config.frozen_constant && frozen_constant(group) {
        return Some(ExemptionReason::FrozenConstant);
    }
    if config.correctly_scoped && correctly_scoped(group, function_bodies) {
        return Some(ExemptionReason::CorrectlyScoped);
    }
    if config.trivial_logic && trivial_logic(group) {
        return Some(ExemptionReason::TrivialLogic);
    }
    if config.comment_suppression {
        for binding in &group.bindings {
            if let Some(reason) = suppression.suppression_reason(binding.loc.line, pattern_match.kind)
            {
                return Some(ExemptionReason::Suppressed {
                    reason: reason.to_string(),
                });
            }
        }
    }
    None
}

/// Exactly one call site, at module level, outside any loop, and not from
/// inside a group accessor: the state cannot be entered twice
fn single_call_site(group: &SharingGroup) -> bool {
    let sites: Vec<_> = group.call_sites().collect();
    match sites.as_slice() {
        [only] => !only.in_loop && only.within_accessor.is_none() && only.enclosing.is_empty(),
        _ => false,
    }
}

/// Never reassigned, never interior-mutated: a constant wearing `let`
fn frozen_constant(group: &SharingGroup) -> bool {
    !group.bindings.is_empty() && group.bindings.iter().all(|b| b.is_frozen())
}

/// The binding already lives inside a per-invocation scope. The analyzer
/// only models module-scope declarations, so this should never fire; it is
/// re-checked here because a match that slipped through would produce a
/// rewrite that changes nothing.
fn correctly_scoped(group: &SharingGroup, function_bodies: &[Span]) -> bool {
    group
        .bindings
        .iter()
        .all(|b| function_bodies.iter().any(|body| body.contains(&b.decl_span)))
}

/// All accessors are effect-free apart from the flagged storage and nothing
/// outside the group ever observes it: indirection would add no safety
fn trivial_logic(group: &SharingGroup) -> bool {
    !group.accessors.is_empty()
        && group.accessors.iter().all(|a| !a.has_external_calls)
        && group.bindings.iter().all(|b| !b.observed_outside)
        && group.bindings.iter().all(|b| !b.exported)
}
