//! Access-effect replay.
//!
//! Replays a synthesized call sequence against the access model of the
//! original grouping and of the planned factory, and compares the
//! externally observable effect traces. The model executes each accessor's
//! recorded access shapes over typed stores; original and rewritten forms
//! differ only in how stores are allocated, which is exactly where a bad
//! plan would diverge.

use crate::core::types::{
    AccessShape, Accessor, BindingKind, CreationScope, SharingGroup, TransformationPlan,
};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Skipped { accessor: String },
    Read { binding: String, value: String },
    Wrote { binding: String, value: String },
    Hit { binding: String, key: String },
    Insert { binding: String, key: String },
    Pushed { binding: String, item: i64 },
    Shifted { binding: String, item: Option<i64> },
    Acquired { binding: String, id: i64 },
    Released { binding: String },
    Scheduled { binding: String },
    Cleared { binding: String },
    Delayed,
}

#[derive(Debug, Clone, PartialEq)]
enum Val {
    Bool(bool),
    Num(i64),
    Seq(VecDeque<i64>),
    Map(BTreeMap<String, i64>),
    Handle(Option<i64>),
}

impl Val {
    fn render(&self) -> String {
        match self {
            Val::Bool(b) => b.to_string(),
            Val::Num(n) => n.to_string(),
            Val::Seq(q) => format!("seq:{}", q.len()),
            Val::Map(m) => format!("map:{}", m.len()),
            Val::Handle(h) => format!("handle:{:?}", h),
        }
    }
}

#[derive(Debug, Clone)]
struct Store {
    vals: BTreeMap<String, Val>,
    next_handle: i64,
}

fn uses_fifo(group: &SharingGroup, binding: &str) -> bool {
    group.accessors.iter().any(|a| {
        a.access(binding)
            .map(|acc| acc.has_shape(AccessShape::QueuePush) || acc.has_shape(AccessShape::QueueShift))
            .unwrap_or(false)
    })
}

fn initial_val(kind: BindingKind, init: &str, fifo: bool) -> Val {
    match kind {
        BindingKind::Guard => Val::Bool(init.trim() == "true"),
        BindingKind::Counter => Val::Num(init.trim().parse().unwrap_or(0)),
        BindingKind::Container => {
            if fifo {
                Val::Seq(VecDeque::new())
            } else {
                Val::Map(BTreeMap::new())
            }
        }
        BindingKind::Handle => Val::Handle(None),
        BindingKind::Record => Val::Num(0),
    }
}

/// Store as the original module scope allocates it
fn store_from_group(group: &SharingGroup) -> Store {
    Store {
        vals: group
            .bindings
            .iter()
            .map(|b| {
                (
                    b.name.clone(),
                    initial_val(b.kind, &b.init, uses_fifo(group, &b.name)),
                )
            })
            .collect(),
        next_handle: 1,
    }
}

/// Store as one factory invocation allocates it, using the plan's recorded
/// initializers
fn store_from_plan(group: &SharingGroup, plan: &TransformationPlan) -> Store {
    Store {
        vals: plan
            .storage
            .iter()
            .map(|(name, init)| {
                let kind = group
                    .binding(name)
                    .map(|b| b.kind)
                    .unwrap_or(BindingKind::Record);
                (name.clone(), initial_val(kind, init, uses_fifo(group, name)))
            })
            .collect(),
        next_handle: 1,
    }
}

/// One call of one accessor against one store. `key`/`item` stand in for
/// externally supplied arguments.
fn simulate_call(accessor: &Accessor, store: &mut Store, key: &str, item: i64) -> Vec<Effect> {
    let mut effects = Vec::new();

    // a branched-and-set guard gates the whole body
    for access in &accessor.accesses {
        if access.has_shape(AccessShape::GuardBranch) && access.has_shape(AccessShape::GuardSet) {
            if let Some(Val::Bool(true)) = store.vals.get(&access.binding) {
                effects.push(Effect::Skipped {
                    accessor: accessor.name.clone(),
                });
                return effects;
            }
        }
    }

    for access in &accessor.accesses {
        let binding = access.binding.clone();
        let Some(val) = store.vals.get_mut(&binding) else {
            continue;
        };

        let mut handled = false;

        if access.has_shape(AccessShape::GuardSet) {
            *val = Val::Bool(true);
            effects.push(Effect::Wrote {
                binding: binding.clone(),
                value: "true".to_string(),
            });
            handled = true;
        }

        if access.has_shape(AccessShape::CacheProbe) && access.has_shape(AccessShape::CacheInsert) {
            if let Val::Map(map) = val {
                if map.contains_key(key) {
                    effects.push(Effect::Hit {
                        binding: binding.clone(),
                        key: key.to_string(),
                    });
                } else {
                    map.insert(key.to_string(), item);
                    effects.push(Effect::Insert {
                        binding: binding.clone(),
                        key: key.to_string(),
                    });
                }
                handled = true;
            }
        } else if access.has_shape(AccessShape::KeyedWrite) {
            if let Val::Map(map) = val {
                map.insert(key.to_string(), item);
                effects.push(Effect::Insert {
                    binding: binding.clone(),
                    key: key.to_string(),
                });
                handled = true;
            }
        } else if access.has_shape(AccessShape::KeyedRead) {
            if let Val::Map(map) = val {
                if map.contains_key(key) {
                    effects.push(Effect::Hit {
                        binding: binding.clone(),
                        key: key.to_string(),
                    });
                } else {
                    effects.push(Effect::Read {
                        binding: binding.clone(),
                        value: "missing".to_string(),
                    });
                }
                handled = true;
            }
        }

        if access.has_shape(AccessShape::QueuePush) {
            if let Val::Seq(q) = val {
                q.push_back(item);
                effects.push(Effect::Pushed {
                    binding: binding.clone(),
                    item,
                });
                handled = true;
            }
        }
        if access.has_shape(AccessShape::QueueShift) {
            if let Val::Seq(q) = val {
                let popped = q.pop_front();
                effects.push(Effect::Shifted {
                    binding: binding.clone(),
                    item: popped,
                });
                handled = true;
            }
        }

        if access.has_shape(AccessShape::RetryLoop) {
            if let Val::Num(n) = val {
                for _ in 0..3 {
                    *n += 1;
                    effects.push(Effect::Delayed);
                }
                effects.push(Effect::Wrote {
                    binding: binding.clone(),
                    value: n.to_string(),
                });
                handled = true;
            }
        }

        if access.has_shape(AccessShape::TimerClear) {
            if let Val::Handle(h) = val {
                if h.is_some() {
                    *h = None;
                    effects.push(Effect::Cleared {
                        binding: binding.clone(),
                    });
                }
                handled = true;
            }
        }
        if access.has_shape(AccessShape::TimerSchedule) {
            if let Val::Handle(h) = val {
                *h = Some(store.next_handle);
                effects.push(Effect::Scheduled {
                    binding: binding.clone(),
                });
                store.next_handle += 1;
                handled = true;
            }
        }

        if access.has_shape(AccessShape::ResourceAcquire) {
            if let Val::Handle(h) = val {
                *h = Some(store.next_handle);
                effects.push(Effect::Acquired {
                    binding: binding.clone(),
                    id: store.next_handle,
                });
                store.next_handle += 1;
                handled = true;
            }
        }
        if access.has_shape(AccessShape::ResourceRelease) {
            if let Val::Handle(h) = val {
                if h.is_some() {
                    *h = None;
                    effects.push(Effect::Released {
                        binding: binding.clone(),
                    });
                }
                handled = true;
            }
        }

        if !handled {
            if access.direction.writes() {
                if let Val::Num(n) = val {
                    *n += 1;
                }
                effects.push(Effect::Wrote {
                    binding: binding.clone(),
                    value: val.render(),
                });
            } else {
                effects.push(Effect::Read {
                    binding: binding.clone(),
                    value: val.render(),
                });
            }
        }
    }

    effects
}

/// Each accessor twice, interleaved: A B A B. The second round is what
/// exposes guard, cache and identity behavior.
fn synthesized_sequence(group: &SharingGroup) -> Vec<&Accessor> {
    let mut seq = Vec::with_capacity(group.accessors.len() * 2);
    for _ in 0..2 {
        seq.extend(group.accessors.iter());
    }
    seq
}

fn run_sequence(sequence: &[&Accessor], store: &mut Store) -> Vec<Effect> {
    let mut trace = Vec::new();
    for (i, accessor) in sequence.iter().enumerate() {
        let key = format!("k{}", i % 2);
        trace.extend(simulate_call(accessor, store, &key, i as i64));
    }
    trace
}

/// Compare observable behavior of the original grouping and the planned
/// factory under the synthesized sequence
pub fn replay_equivalence(group: &SharingGroup, plan: &TransformationPlan) -> Result<(), String> {
    let sequence = synthesized_sequence(group);

    match plan.scope {
        CreationScope::ModuleInit => {
            let mut original = store_from_group(group);
            let mut rewritten = store_from_plan(group, plan);
            let trace_original = run_sequence(&sequence, &mut original);
            let trace_rewritten = run_sequence(&sequence, &mut rewritten);
            if trace_original != trace_rewritten {
                return Err(format!(
                    "module-init replay diverged: original {:?} vs rewritten {:?}",
                    trace_original, trace_rewritten
                ));
            }
        }
        CreationScope::PerLogicalScope => {
            // one instance alone
            let mut solo = store_from_plan(group, plan);
            let trace_solo = run_sequence(&sequence, &mut solo);

            // two instances with interleaved calls must each behave exactly
            // like the solo run: no cross-contamination
            let mut store_a = store_from_plan(group, plan);
            let mut store_b = store_from_plan(group, plan);
            let mut trace_a = Vec::new();
            let mut trace_b = Vec::new();
            for (i, accessor) in sequence.iter().enumerate() {
                let key = format!("k{}", i % 2);
                trace_a.extend(simulate_call(accessor, &mut store_a, &key, i as i64));
                trace_b.extend(simulate_call(accessor, &mut store_b, &key, i as i64));
            }
            if trace_a != trace_solo {
                return Err("scope instance A diverged from isolated run".to_string());
            }
            if trace_b != trace_solo {
                return Err("scope instance B diverged from isolated run".to_string());
            }
        }
    }

    // FIFO ordering relative to each caller must survive the rewrite
    if let Err(detail) = fifo_order_preserved(group, plan) {
        return Err(detail);
    }

    Ok(())
}

/// Push twice, drain twice: items must come back in push order
fn fifo_order_preserved(group: &SharingGroup, plan: &TransformationPlan) -> Result<(), String> {
    let pusher = group
        .accessors
        .iter()
        .find(|a| a.has_shape(AccessShape::QueuePush));
    let shifter = group
        .accessors
        .iter()
        .find(|a| a.has_shape(AccessShape::QueueShift));
    let (Some(pusher), Some(shifter)) = (pusher, shifter) else {
        return Ok(());
    };

    let mut store = store_from_plan(group, plan);
    simulate_call(pusher, &mut store, "k0", 10);
    simulate_call(pusher, &mut store, "k1", 20);
    let first = simulate_call(shifter, &mut store, "k0", 0);
    let second = simulate_call(shifter, &mut store, "k1", 0);

    let shifted = |trace: &[Effect]| -> Option<i64> {
        trace.iter().find_map(|e| match e {
            Effect::Shifted { item, .. } => *item,
            _ => None,
        })
    };

    match (shifted(&first), shifted(&second)) {
        (Some(10), Some(20)) => Ok(()),
        other => Err(format!("queue order not preserved: {:?}", other)),
    }
}
