//! Rewrite application.
//!
//! Pure text surgery over the original unit: remove the group's module-level
//! declarations, insert the factory and its invocation per the plan's
//! scope-of-creation policy, and rebind every call site to the returned
//! capability. Patches apply in descending offset order so earlier spans
//! stay valid while later ones are edited.

pub mod emit;

use crate::analyzers::ModuleMap;
use crate::config::EncapConfig;
use crate::core::types::{
    DiffSummary, Patch, PatternMatch, RewriteResult, Span, TransformationPlan,
};
use crate::core::{Error, Result};

pub fn apply_plans(
    source: &str,
    map: &ModuleMap,
    matches: &[PatternMatch],
    plans: &[TransformationPlan],
    config: &EncapConfig,
) -> Result<RewriteResult> {
    let mut patches: Vec<Patch> = Vec::new();
    let mut summary = DiffSummary::default();

    for plan in plans {
        let group = matches
            .iter()
            .find(|m| m.group.id == plan.group_id)
            .map(|m| &m.group)
            .ok_or_else(|| Error::Config(format!("plan references unknown group {}", plan.group_id)))?;

        let mut anchor = usize::MAX;

        // bindings sharing one declaration statement are removed together:
        // when the group owns every declarator the statement goes whole
        let mut by_stmt: Vec<(Span, Vec<&crate::core::types::Binding>)> = Vec::new();
        for binding in &group.bindings {
            match by_stmt.iter_mut().find(|(span, _)| *span == binding.stmt_span) {
                Some((_, members)) => members.push(binding),
                None => by_stmt.push((binding.stmt_span, vec![binding])),
            }
        }
        for (stmt_span, members) in by_stmt {
            if members.len() == members[0].declarator_count {
                let span = whole_line_span(source, stmt_span);
                anchor = anchor.min(span.start);
                patches.push(Patch {
                    span,
                    replacement: String::new(),
                    note: format!(
                        "move declaration of {} into {}",
                        members
                            .iter()
                            .map(|b| b.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                        plan.factory_name
                    ),
                });
            } else {
                for binding in &members {
                    let span = removal_span(
                        source,
                        binding.stmt_span,
                        binding.decl_span,
                        binding.declarator_count,
                    );
                    anchor = anchor.min(span.start);
                    patches.push(Patch {
                        span,
                        replacement: String::new(),
                        note: format!(
                            "move binding '{}' into {}",
                            binding.name, plan.factory_name
                        ),
                    });
                }
            }
            summary.declarations_moved += members.len();
        }

        for (alias, _) in &plan.aliases {
            if let Some(decl) = map.alias_decls.iter().find(|d| d.name == *alias) {
                let span = removal_span(source, decl.stmt_span, decl.decl_span, decl.declarator_count);
                anchor = anchor.min(span.start);
                patches.push(Patch {
                    span,
                    replacement: String::new(),
                    note: format!("move alias '{}' into {}", alias, plan.factory_name),
                });
                summary.declarations_moved += 1;
            }
        }

        for accessor in &group.accessors {
            let span = whole_line_span(source, accessor.span);
            anchor = anchor.min(span.start);
            patches.push(Patch {
                span,
                replacement: String::new(),
                note: format!("move accessor '{}' into {}", accessor.name, plan.factory_name),
            });
        }

        if anchor == usize::MAX {
            anchor = 0;
        }

        let mut factory_text = emit::emit_factory(plan, group, source, &config.rewrite);
        if plan.insertion.module_level {
            factory_text.push_str(&emit::emit_instance(plan));
            factory_text.push('\n');
        }
        patches.push(Patch {
            span: Span::new(anchor, anchor),
            replacement: factory_text,
            note: format!("insert factory {}", plan.factory_name),
        });

        if !plan.insertion.module_level {
            patches.push(Patch {
                span: Span::new(plan.insertion.offset, plan.insertion.offset),
                replacement: format!("\n{}{}", config.rewrite.indent, emit::emit_instance(plan)),
                note: format!("instantiate {} per logical scope", plan.factory_name),
            });
        }

        for patch in &plan.call_site_patches {
            patches.push(Patch {
                span: patch.span,
                replacement: patch.new.clone(),
                note: format!("rebind call site of '{}'", patch.old),
            });
            summary.call_sites_patched += 1;
        }

        if let Some(release) = plan
            .capabilities
            .iter()
            .find(|c| c.source_accessor.is_none())
        {
            for point in &plan.release_points {
                patches.push(Patch {
                    span: Span::new(point.start, point.start),
                    replacement: format!("{}.{}();\n{}", plan.instance_name, release.name, config.rewrite.indent),
                    note: "release on exit path".to_string(),
                });
            }
        }

        summary.groups_rewritten += 1;
    }

    check_disjoint(&patches)?;

    let rewritten = apply_patches(source, &patches);
    summary.bytes_delta = rewritten.len() as i64 - source.len() as i64;

    Ok(RewriteResult {
        source: rewritten,
        patches,
        summary,
    })
}

/// Statement span to delete for one declarator. A single-declarator
/// statement goes whole (with its line); a shared statement loses just the
/// declarator and the separating comma.
fn removal_span(source: &str, stmt_span: Span, decl_span: Span, declarator_count: usize) -> Span {
    if declarator_count <= 1 {
        return whole_line_span(source, stmt_span);
    }

    let bytes = source.as_bytes();
    // trailing comma first: `let a = 1, b = 2;` dropping `a = 1`
    let mut end = decl_span.end;
    let mut cursor = end;
    while cursor < bytes.len() && (bytes[cursor] as char).is_whitespace() {
        cursor += 1;
    }
    if cursor < bytes.len() && bytes[cursor] == b',' {
        cursor += 1;
        while cursor < bytes.len() && bytes[cursor] == b' ' {
            cursor += 1;
        }
        end = cursor;
        return Span::new(decl_span.start, end);
    }
    // otherwise consume the comma before: dropping the last declarator
    let mut start = decl_span.start;
    let mut back = start;
    while back > 0 && (bytes[back - 1] as char).is_whitespace() {
        back -= 1;
    }
    if back > 0 && bytes[back - 1] == b',' {
        start = back - 1;
    }
    Span::new(start, decl_span.end)
}

/// Extend a statement span over its own line when nothing else shares it
fn whole_line_span(source: &str, span: Span) -> Span {
    let bytes = source.as_bytes();
    let mut start = span.start;
    while start > 0 && (bytes[start - 1] == b' ' || bytes[start - 1] == b'\t') {
        start -= 1;
    }
    if start > 0 && bytes[start - 1] != b'\n' {
        return span; // something precedes the statement on this line
    }
    let mut end = span.end;
    while end < bytes.len() && (bytes[end] == b' ' || bytes[end] == b'\t') {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'\n' {
        end += 1;
    }
    Span::new(start, end)
}

fn check_disjoint(patches: &[Patch]) -> Result<()> {
    let mut spans: Vec<Span> = patches
        .iter()
        .map(|p| p.span)
        .filter(|s| !s.is_empty())
        .collect();
    spans.sort();
    for pair in spans.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(Error::Config(format!(
                "overlapping patches at {}..{} and {}..{}",
                pair[0].start, pair[0].end, pair[1].start, pair[1].end
            )));
        }
    }
    Ok(())
}

fn apply_patches(source: &str, patches: &[Patch]) -> String {
    let mut ordered: Vec<&Patch> = patches.iter().collect();
    // descending start; at equal starts, deletions before insertions so an
    // insertion anchored at a removed statement lands in its place
    ordered.sort_by(|a, b| {
        b.span
            .start
            .cmp(&a.span.start)
            .then(b.span.end.cmp(&a.span.end))
    });

    let mut out = source.to_string();
    for patch in ordered {
        out.replace_range(patch.span.start..patch.span.end, &patch.replacement);
    }
    out
}
