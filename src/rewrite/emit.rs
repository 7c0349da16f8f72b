//! Factory source emission.
//!
//! The factory owns fresh storage for every binding in the group and returns
//! one callable per original accessor. Accessor bodies are carried over
//! verbatim; moving the declarations inside the factory is what changes the
//! binding's scope, not the accessor logic.

use crate::config::RewriteConfig;
use crate::core::types::{AccessShape, PatternKind, SharingGroup, TransformationPlan};

pub fn emit_factory(
    plan: &TransformationPlan,
    group: &SharingGroup,
    source: &str,
    config: &RewriteConfig,
) -> String {
    let ind = &config.indent;
    let mut out = String::new();
    out.push_str(&format!("function {}() {{\n", plan.factory_name));

    for (name, init) in &plan.storage {
        let keyword = group
            .binding(name)
            .map(|b| if b.reassigned { "let" } else { "const" })
            .unwrap_or("let");
        out.push_str(&format!("{ind}{keyword} {name} = {init};\n"));
    }
    for (alias, target) in &plan.aliases {
        out.push_str(&format!("{ind}const {alias} = {target};\n"));
    }
    out.push('\n');

    for accessor in &group.accessors {
        let text = &source[accessor.span.start..accessor.span.end];
        out.push_str(&indent_block(text, ind));
        out.push_str("\n\n");
    }

    if let Some(release) = plan
        .capabilities
        .iter()
        .find(|c| c.source_accessor.is_none())
    {
        out.push_str(&emit_release(&release.name, plan, group, ind));
        out.push('\n');
    }

    let surface: Vec<&str> = plan.capabilities.iter().map(|c| c.name.as_str()).collect();
    out.push_str(&format!("{ind}return {{ {} }};\n", surface.join(", ")));
    out.push_str("}\n");
    out
}

/// The generated release callable: clears every handle the factory owns,
/// idempotently, using the clear idiom the handle's shapes call for
fn emit_release(name: &str, plan: &TransformationPlan, group: &SharingGroup, ind: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{ind}function {name}() {{\n"));

    for binding in &group.bindings {
        let timer = group.accessors.iter().any(|a| {
            a.access(&binding.name)
                .map(|acc| acc.has_shape(AccessShape::TimerSchedule))
                .unwrap_or(false)
        });
        if timer {
            out.push_str(&format!("{ind}{ind}if ({0} !== null) {{\n", binding.name));
            out.push_str(&format!("{ind}{ind}{ind}clearTimeout({});\n", binding.name));
            out.push_str(&format!("{ind}{ind}{ind}{} = null;\n", binding.name));
            out.push_str(&format!("{ind}{ind}}}\n"));
        } else {
            out.push_str(&format!("{ind}{ind}if ({0} !== null) {{\n", binding.name));
            out.push_str(&format!(
                "{ind}{ind}{ind}if (typeof {0}.close === \"function\") {0}.close();\n",
                binding.name
            ));
            out.push_str(&format!("{ind}{ind}{ind}{} = null;\n", binding.name));
            out.push_str(&format!("{ind}{ind}}}\n"));
        }
    }

    out.push_str(&format!("{ind}}}\n"));
    debug_assert_eq!(plan.kind, PatternKind::ResourceLifecycle);
    out
}

pub fn emit_instance(plan: &TransformationPlan) -> String {
    format!(
        "const {} = {}();",
        plan.instance_name, plan.factory_name
    )
}

fn indent_block(text: &str, ind: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{ind}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
