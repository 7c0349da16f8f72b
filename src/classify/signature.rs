//! Structural signatures over sharing groups.
//!
//! Each catalog kind has one predicate over the group's binding kinds and
//! access shapes. Predicates are pure and independent; the priority order in
//! the classifier arbitrates when several hold at once.

use crate::core::types::{AccessShape, BindingKind, PatternKind, SharingGroup};

/// Does this group structurally match the given kind?
pub fn matches_kind(group: &SharingGroup, kind: PatternKind) -> bool {
    match kind {
        PatternKind::GuardOnce => guard_once(group),
        PatternKind::MemoizedCache => memoized_cache(group),
        PatternKind::TimerDebounceThrottle => timer_debounce_throttle(group),
        PatternKind::MutableStateBag => mutable_state_bag(group),
        PatternKind::ResourceLifecycle => resource_lifecycle(group),
        PatternKind::RequestContext => request_context(group),
        PatternKind::UnstableCallbackIdentity => unstable_callback_identity(group),
        PatternKind::RetryBackoff => retry_backoff(group),
        PatternKind::LazyInit => lazy_init(group),
        PatternKind::SerializedQueue => serialized_queue(group),
    }
}

fn kind_count(group: &SharingGroup, kind: BindingKind) -> usize {
    group.bindings.iter().filter(|b| b.kind == kind).count()
}

fn group_has_shape(group: &SharingGroup, shape: AccessShape) -> bool {
    group.accessors.iter().any(|a| a.has_shape(shape))
}

fn shape_on_binding(group: &SharingGroup, binding: &str, shape: AccessShape) -> bool {
    group.accessors.iter().any(|a| {
        a.access(binding)
            .map(|acc| acc.has_shape(shape))
            .unwrap_or(false)
    })
}

/// One boolean, written once then only read-and-branch
fn guard_once(group: &SharingGroup) -> bool {
    if group.bindings.len() != 1 || group.bindings[0].kind != BindingKind::Guard {
        return false;
    }
    let name = &group.bindings[0].name;
    let setters = group
        .accessors
        .iter()
        .filter(|a| {
            a.access(name)
                .map(|acc| acc.has_shape(AccessShape::GuardSet))
                .unwrap_or(false)
        })
        .count();
    setters == 1 && shape_on_binding(group, name, AccessShape::GuardBranch)
}

/// One keyed container with check-then-insert access in one accessor,
/// no eviction
fn memoized_cache(group: &SharingGroup) -> bool {
    if group_has_shape(group, AccessShape::CacheEvict) {
        return false;
    }
    group.bindings.iter().any(|b| {
        b.kind == BindingKind::Container
            && group.accessors.iter().any(|a| {
                a.access(&b.name)
                    .map(|acc| {
                        acc.has_shape(AccessShape::CacheProbe)
                            && acc.has_shape(AccessShape::CacheInsert)
                    })
                    .unwrap_or(false)
            })
    })
}

/// One handle created and cleared by the same accessor pair with
/// time-based rescheduling
fn timer_debounce_throttle(group: &SharingGroup) -> bool {
    group.bindings.iter().any(|b| {
        shape_on_binding(group, &b.name, AccessShape::TimerSchedule)
            && shape_on_binding(group, &b.name, AccessShape::TimerClear)
    })
}

/// One handle created without a matching clear/unsubscribe reachable from
/// any exit path
fn resource_lifecycle(group: &SharingGroup) -> bool {
    group.bindings.iter().any(|b| {
        let acquired = shape_on_binding(group, &b.name, AccessShape::ResourceAcquire);
        let released = shape_on_binding(group, &b.name, AccessShape::ResourceRelease);
        let scheduled = shape_on_binding(group, &b.name, AccessShape::TimerSchedule);
        let cleared = shape_on_binding(group, &b.name, AccessShape::TimerClear);
        (acquired && !released) || (scheduled && !cleared && !acquired)
    })
}

/// Storage keyed by an externally supplied identifier, read by unrelated
/// accessors
fn request_context(group: &SharingGroup) -> bool {
    group.bindings.iter().any(|b| {
        if b.kind != BindingKind::Container {
            return false;
        }
        let writer = group.accessors.iter().find(|a| {
            a.access(&b.name)
                .map(|acc| acc.has_shape(AccessShape::KeyedWrite))
                .unwrap_or(false)
        });
        let reader = group.accessors.iter().find(|a| {
            a.access(&b.name)
                .map(|acc| acc.has_shape(AccessShape::KeyedRead))
                .unwrap_or(false)
        });
        match (writer, reader) {
            (Some(w), Some(r)) => w.name != r.name,
            _ => false,
        }
    })
}

/// Callable identity changes on every re-creation and is passed to a
/// subscription API
fn unstable_callback_identity(group: &SharingGroup) -> bool {
    group_has_shape(group, AccessShape::SubscribeFreshCallable)
}

/// Counter mutated only inside a bounded loop with backoff delay
fn retry_backoff(group: &SharingGroup) -> bool {
    group_has_shape(group, AccessShape::RetryLoop)
}

/// Value computed once on first access behind a done-flag
fn lazy_init(group: &SharingGroup) -> bool {
    group_has_shape(group, AccessShape::LazyCompute)
}

/// Container used as FIFO with an in-flight flag
fn serialized_queue(group: &SharingGroup) -> bool {
    let fifo = group.bindings.iter().any(|b| {
        b.kind == BindingKind::Container
            && shape_on_binding(group, &b.name, AccessShape::QueuePush)
            && shape_on_binding(group, &b.name, AccessShape::QueueShift)
    });
    fifo && kind_count(group, BindingKind::Guard) >= 1
}

/// Anything else mutated by two or more reachable accessors
fn mutable_state_bag(group: &SharingGroup) -> bool {
    let writers = group.accessors.iter().filter(|a| a.writes_any()).count();
    writers >= 2
}
