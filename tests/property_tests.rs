//! Property tests for the structural invariants the pipeline relies on.

use encap::analyzers::ModuleMap;
use encap::core::types::{
    Accessor, Binding, BindingAccess, BindingKind, Direction, SourceLocation, Span,
};
use encap::grouping::build_groups;
use encap::planner::naming;
use proptest::prelude::*;
use std::collections::HashSet;

fn binding(name: String, offset: usize) -> Binding {
    Binding {
        name,
        kind: BindingKind::Record,
        init: "0".to_string(),
        decl_span: Span::new(offset, offset + 1),
        stmt_span: Span::new(offset, offset + 1),
        declarator_count: 1,
        loc: SourceLocation::new(1, 0),
        reassigned: true,
        interior_mutated: false,
        exported: false,
        observed_outside: false,
    }
}

fn accessor(name: String, touches: Vec<String>) -> Accessor {
    Accessor {
        name,
        span: Span::new(0, 1),
        body_span: Span::new(0, 1),
        loc: SourceLocation::new(1, 0),
        exported: false,
        accesses: touches
            .into_iter()
            .map(|b| BindingAccess {
                binding: b,
                direction: Direction::ReadWrite,
                shapes: vec![],
            })
            .collect(),
        call_sites: vec![],
        has_external_calls: false,
        exit_spans: vec![],
    }
}

/// Arbitrary bipartite access graphs: up to 8 bindings, up to 8 accessors,
/// each accessor touching a nonempty subset of bindings
fn access_graph() -> impl Strategy<Value = (usize, Vec<Vec<usize>>)> {
    (1usize..8, 0usize..8).prop_flat_map(|(binding_count, accessor_count)| {
        let edges = proptest::collection::vec(
            proptest::collection::vec(0..binding_count, 1..=binding_count.min(4)),
            accessor_count,
        );
        (Just(binding_count), edges)
    })
}

proptest! {
    /// Every binding lands in exactly one group, no matter the graph shape
    #[test]
    fn groups_partition_bindings((binding_count, edges) in access_graph()) {
        let bindings: Vec<Binding> = (0..binding_count)
            .map(|i| binding(format!("b{i}"), i * 10))
            .collect();
        let accessors: Vec<Accessor> = edges
            .iter()
            .enumerate()
            .map(|(i, touched)| {
                let names: Vec<String> = touched
                    .iter()
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .map(|t| format!("b{t}"))
                    .collect();
                accessor(format!("f{i}"), names)
            })
            .collect();

        let map = ModuleMap {
            bindings,
            accessors,
            ..Default::default()
        };
        let groups = build_groups(&map);

        let mut seen: HashSet<String> = HashSet::new();
        for group in &groups {
            for b in &group.bindings {
                prop_assert!(seen.insert(b.name.clone()), "binding {} in two groups", b.name);
            }
        }
        prop_assert_eq!(seen.len(), binding_count);
    }

    /// Two accessors touching a common binding always share a group
    #[test]
    fn common_binding_implies_common_group((binding_count, edges) in access_graph()) {
        let bindings: Vec<Binding> = (0..binding_count)
            .map(|i| binding(format!("b{i}"), i * 10))
            .collect();
        let accessors: Vec<Accessor> = edges
            .iter()
            .enumerate()
            .map(|(i, touched)| {
                let names: Vec<String> = touched
                    .iter()
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .map(|t| format!("b{t}"))
                    .collect();
                accessor(format!("f{i}"), names)
            })
            .collect();

        let map = ModuleMap {
            bindings,
            accessors: accessors.clone(),
            ..Default::default()
        };
        let groups = build_groups(&map);

        let group_of = |accessor_name: &str| {
            groups
                .iter()
                .position(|g| g.accessors.iter().any(|a| a.name == accessor_name))
        };

        for a1 in &accessors {
            for a2 in &accessors {
                let shared = a1
                    .accesses
                    .iter()
                    .any(|x| a2.accesses.iter().any(|y| x.binding == y.binding));
                if shared {
                    prop_assert_eq!(group_of(&a1.name), group_of(&a2.name));
                }
            }
        }
    }

    /// Reserved names never collide with the unit inventory or each other
    #[test]
    fn reserved_names_are_unique(
        stems in proptest::collection::vec("[a-z]{1,6}", 1..20),
        unit_names in proptest::collection::hash_set("[a-z]{1,6}[0-9]{0,2}", 0..20),
    ) {
        let unit: HashSet<String> = unit_names.into_iter().collect();
        let mut taken = HashSet::new();
        let mut produced = HashSet::new();
        for stem in stems {
            let name = naming::reserve(stem, &unit, &mut taken);
            prop_assert!(!unit.contains(&name));
            prop_assert!(produced.insert(name));
        }
    }
}
