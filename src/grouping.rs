//! Sharing-group construction.
//!
//! Union-find over the accessor/binding bipartite graph: two bindings
//! touched by one accessor merge, two accessors touching one binding merge.
//! A rewrite must preserve every original sharing relationship; wrapping two
//! co-dependent accessors in two independent factories would silently break
//! the sharing the original code relied on.

use crate::analyzers::ModuleMap;
use crate::core::types::SharingGroup;
use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, HashMap};

/// Partition the module's bindings and accessors into maximal sharing
/// groups. Every binding lands in exactly one group; groups are ordered by
/// the earliest binding declaration so ids are stable across runs.
pub fn build_groups(map: &ModuleMap) -> Vec<SharingGroup> {
    let binding_count = map.bindings.len();
    if binding_count == 0 {
        return Vec::new();
    }

    let binding_index: HashMap<&str, usize> = map
        .bindings
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.as_str(), i))
        .collect();

    let mut union = UnionFind::<usize>::new(binding_count + map.accessors.len());
    for (ai, accessor) in map.accessors.iter().enumerate() {
        for access in &accessor.accesses {
            if let Some(&bi) = binding_index.get(access.binding.as_str()) {
                union.union(bi, binding_count + ai);
            }
        }
    }

    let mut members: BTreeMap<usize, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for bi in 0..binding_count {
        members.entry(union.find(bi)).or_default().0.push(bi);
    }
    for ai in 0..map.accessors.len() {
        let root = union.find(binding_count + ai);
        // accessor sets without a binding cannot exist: membership comes
        // from accesses, and accessors with no surviving access are pruned
        if let Some(entry) = members.get_mut(&root) {
            entry.1.push(ai);
        }
    }

    let mut groups: Vec<SharingGroup> = members
        .into_values()
        .map(|(bindings, accessors)| SharingGroup {
            id: 0,
            bindings: bindings.iter().map(|&i| map.bindings[i].clone()).collect(),
            accessors: accessors
                .iter()
                .map(|&i| map.accessors[i].clone())
                .collect(),
        })
        .collect();

    groups.sort_by_key(|g| {
        g.bindings
            .iter()
            .map(|b| b.decl_span.start)
            .min()
            .unwrap_or(usize::MAX)
    });
    for (id, group) in groups.iter_mut().enumerate() {
        group.id = id;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        Accessor, Binding, BindingAccess, BindingKind, Direction, SourceLocation, Span,
    };

    fn binding(name: &str, offset: usize) -> Binding {
        Binding {
            name: name.to_string(),
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

    fn accessor(name: &str, touches: &[&str]) -> Accessor {
        Accessor {
            name: name.to_string(),
            span: Span::new(0, 1),
            body_span: Span::new(0, 1),
            loc: SourceLocation::new(1, 0),
            exported: false,
            accesses: touches
                .iter()
                .map(|b| BindingAccess {
                    binding: b.to_string(),
                    direction: Direction::ReadWrite,
                    shapes: vec![],
                })
                .collect(),
            call_sites: vec![],
            has_external_calls: false,
            exit_spans: vec![],
        }
    }

    fn map_of(bindings: Vec<Binding>, accessors: Vec<Accessor>) -> ModuleMap {
        ModuleMap {
            bindings,
            accessors,
            ..Default::default()
        }
    }

    #[test]
    fn common_accessor_merges_bindings() {
        let map = map_of(
            vec![binding("a", 0), binding("b", 10)],
            vec![accessor("touch_both", &["a", "b"])],
        );
        let groups = build_groups(&map);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].bindings.len(), 2);
    }

    #[test]
    fn common_binding_merges_accessors() {
        let map = map_of(
            vec![binding("a", 0)],
            vec![accessor("reader", &["a"]), accessor("writer", &["a"])],
        );
        let groups = build_groups(&map);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].accessors.len(), 2);
    }

    #[test]
    fn independent_bindings_stay_apart() {
        let map = map_of(
            vec![binding("a", 0), binding("b", 10)],
            vec![accessor("fa", &["a"]), accessor("fb", &["b"])],
        );
        let groups = build_groups(&map);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn transitive_sharing_chains_into_one_group() {
        // fa touches a+b, fb touches b+c: all five nodes share one group
        let map = map_of(
            vec![binding("a", 0), binding("b", 10), binding("c", 20)],
            vec![accessor("fa", &["a", "b"]), accessor("fb", &["b", "c"])],
        );
        let groups = build_groups(&map);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].bindings.len(), 3);
        assert_eq!(groups[0].accessors.len(), 2);
    }

    #[test]
    fn groups_partition_all_bindings() {
        let map = map_of(
            vec![binding("a", 0), binding("lonely", 10)],
            vec![accessor("fa", &["a"])],
        );
        let groups = build_groups(&map);
        let total: usize = groups.iter().map(|g| g.bindings.len()).sum();
        assert_eq!(total, 2);
        assert!(groups.iter().any(|g| g.accessors.is_empty()));
    }

    #[test]
    fn group_ids_follow_declaration_order() {
        let map = map_of(
            vec![binding("late", 100), binding("early", 5)],
            vec![accessor("fl", &["late"]), accessor("fe", &["early"])],
        );
        let groups = build_groups(&map);
        assert_eq!(groups[0].bindings[0].name, "early");
        assert_eq!(groups[0].id, 0);
        assert_eq!(groups[1].bindings[0].name, "late");
    }
}
