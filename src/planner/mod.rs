//! Transformation planning.
//!
//! An accepted PatternMatch becomes a factory plan: fresh storage for every
//! binding in the group, one returned callable per accessor closing over
//! that storage, and a call-site patch list. One factory invocation per
//! scope-of-creation policy keeps the original sharing topology: one
//! invocation, one storage instance, multiple callables referencing it.

pub mod naming;

use crate::analyzers::ModuleMap;
use crate::config::EncapConfig;
use crate::core::types::{
    BlockedReason, CallSitePatch, Capability, CreationScope, InsertionPoint, PatternKind,
    PatternMatch, PlanBlocked, PlanOutcome, SharingGroup, Span, TransformationPlan,
};
use std::collections::HashSet;

pub fn plan_matches(
    matches: &[PatternMatch],
    map: &ModuleMap,
    config: &EncapConfig,
) -> Vec<PlanOutcome> {
    let mut taken: HashSet<String> = HashSet::new();
    matches
        .iter()
        .map(|m| plan_match(m, map, config, &mut taken))
        .collect()
}

fn plan_match(
    pattern_match: &PatternMatch,
    map: &ModuleMap,
    config: &EncapConfig,
    taken: &mut HashSet<String>,
) -> PlanOutcome {
    let group = &pattern_match.group;
    let kind = pattern_match.kind;

    if let Some(reason) = blocked_reason(group) {
        let err = crate::core::Error::PlanBlocked {
            group_id: group.id,
            detail: format!("{reason:?}"),
        };
        log::debug!("{err}");
        return PlanOutcome::Blocked(PlanBlocked {
            group_id: group.id,
            kind,
            reason,
        });
    }

    let scope = creation_scope(kind, group);
    let common_scope = common_enclosing_body(group);
    let anchor = group_anchor(group);

    let insertion = match (scope, common_scope) {
        (CreationScope::PerLogicalScope, Some(body)) => InsertionPoint {
            offset: body.start + 1,
            module_level: false,
        },
        (CreationScope::PerLogicalScope, None) => InsertionPoint {
            // every call site sits at module top level: the module itself is
            // the logical scope instance
            offset: anchor,
            module_level: true,
        },
        (CreationScope::ModuleInit, _) => InsertionPoint {
            offset: anchor,
            module_level: true,
        },
    };

    let stem = &group.bindings[0].name;
    let factory_name = naming::reserve(
        format!("{}{}", config.rewrite.factory_prefix, naming::pascal_case(stem)),
        &map.identifiers,
        taken,
    );
    let instance_name = naming::reserve(format!("{stem}State"), &map.identifiers, taken);

    let mut capabilities: Vec<Capability> = group
        .accessors
        .iter()
        .map(|a| Capability {
            name: a.name.clone(),
            source_accessor: Some(a.name.clone()),
        })
        .collect();

    let mut release_points = Vec::new();
    if kind == PatternKind::ResourceLifecycle {
        let accessor_names: HashSet<String> =
            group.accessors.iter().map(|a| a.name.clone()).collect();
        let mut release = config.rewrite.release_name.clone();
        let mut counter = 2;
        while accessor_names.contains(&release) {
            release = format!("{}{}", config.rewrite.release_name, counter);
            counter += 1;
        }
        capabilities.push(Capability {
            name: release,
            source_accessor: None,
        });
        // every exit path of the owning scope that previously leaked must
        // now release exactly once
        if let Some(body) = common_scope {
            if let Some(exits) = map.exits_for(&body) {
                release_points = exits.exits.clone();
            }
        }
    }

    let group_accessors: HashSet<&str> = group.accessors.iter().map(|a| a.name.as_str()).collect();
    let mut call_site_patches = Vec::new();
    for accessor in &group.accessors {
        for site in &accessor.call_sites {
            // calls between accessors of the same group stay direct inside
            // the factory body
            if site
                .within_accessor
                .as_deref()
                .map(|owner| group_accessors.contains(owner))
                .unwrap_or(false)
            {
                continue;
            }
            call_site_patches.push(CallSitePatch {
                span: site.span,
                old: accessor.name.clone(),
                new: format!("{instance_name}.{}", accessor.name),
            });
        }
    }

    let aliases: Vec<(String, String)> = map
        .alias_decls
        .iter()
        .filter(|d| group.binding(map.resolve_alias(&d.target)).is_some())
        .map(|d| (d.name.clone(), d.target.clone()))
        .collect();

    PlanOutcome::Planned(TransformationPlan {
        group_id: group.id,
        kind,
        factory_name,
        instance_name,
        scope,
        insertion,
        storage: group
            .bindings
            .iter()
            .map(|b| (b.name.clone(), b.init.clone()))
            .collect(),
        aliases,
        capabilities,
        call_site_patches,
        release_points,
    })
}

/// A plan is blocked, never silently applied, when the rewrite would change
/// a name or signature visible outside the module, or when the storage is
/// observed outside the group's accessors
fn blocked_reason(group: &SharingGroup) -> Option<BlockedReason> {
    if let Some(accessor) = group.accessors.iter().find(|a| a.exported) {
        return Some(BlockedReason::ExportedAccessor {
            name: accessor.name.clone(),
        });
    }
    if let Some(binding) = group
        .bindings
        .iter()
        .find(|b| b.exported || b.observed_outside)
    {
        return Some(BlockedReason::ExportedBinding {
            name: binding.name.clone(),
        });
    }
    None
}

/// Scope-of-creation policy per pattern kind
fn creation_scope(kind: PatternKind, group: &SharingGroup) -> CreationScope {
    match kind {
        PatternKind::RequestContext
        | PatternKind::RetryBackoff
        | PatternKind::SerializedQueue => CreationScope::PerLogicalScope,
        // guard-once follows the caller lifecycle when one exists
        PatternKind::GuardOnce | PatternKind::ResourceLifecycle => {
            if common_enclosing_body(group).is_some() {
                CreationScope::PerLogicalScope
            } else {
                CreationScope::ModuleInit
            }
        }
        PatternKind::MemoizedCache
        | PatternKind::MutableStateBag
        | PatternKind::LazyInit
        | PatternKind::TimerDebounceThrottle
        | PatternKind::UnstableCallbackIdentity => CreationScope::ModuleInit,
    }
}

/// Deepest function body containing every call site of the group, if any
fn common_enclosing_body(group: &SharingGroup) -> Option<Span> {
    let mut sites = group.call_sites().peekable();
    let first = sites.peek()?;
    let mut common: Vec<Span> = first.enclosing.clone();
    for site in group.call_sites() {
        common.retain(|span| site.enclosing.contains(span));
    }
    common.into_iter().max_by_key(|span| span.start)
}

/// Earliest removed declaration: where the factory text lands
fn group_anchor(group: &SharingGroup) -> usize {
    group
        .bindings
        .iter()
        .map(|b| b.stmt_span.start)
        .chain(group.accessors.iter().map(|a| a.span.start))
        .min()
        .unwrap_or(0)
}
