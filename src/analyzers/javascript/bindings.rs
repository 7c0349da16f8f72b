//! Module-scope binding extraction.
//!
//! A binding is a named mutable storage location declared outside any single
//! call's activation: top-level `let`/`var`, or `const` holding interior-
//! mutable storage. `const alias = original` re-exports of the same storage
//! go into the alias table so accesses through either name land on one
//! binding.

use super::{node_span, node_text};
use crate::analyzers::ModuleMap;
use crate::core::types::{Binding, BindingKind, SourceLocation};
use crate::core::AnalysisError;
use std::collections::HashSet;
use tree_sitter::Node;

pub(super) fn collect(root: Node, source: &str, map: &mut ModuleMap) {
    let exported = collect_exported_names(root, source);

    for child in root.named_children(&mut root.walk()) {
        match child.kind() {
            "lexical_declaration" | "variable_declaration" => {
                collect_declaration(child, source, &exported, false, map);
            }
            "export_statement" => {
                if let Some(decl) = child.child_by_field_name("declaration") {
                    if matches!(
                        decl.kind(),
                        "lexical_declaration" | "variable_declaration"
                    ) {
                        collect_declaration(decl, source, &exported, true, map);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Names visible outside the module: ES export clauses, export declarations,
/// default exports, and CommonJS `exports.x = ...` / `module.exports = ...`
pub(super) fn collect_exported_names(root: Node, source: &str) -> HashSet<String> {
    let mut names = HashSet::new();

    for child in root.named_children(&mut root.walk()) {
        match child.kind() {
            "export_statement" => {
                if let Some(decl) = child.child_by_field_name("declaration") {
                    collect_declared_names(decl, source, &mut names);
                }
                collect_export_clause_names(child, source, &mut names);
                if let Some(value) = child.child_by_field_name("value") {
                    if value.kind() == "identifier" {
                        names.insert(node_text(value, source).to_string());
                    }
                }
            }
            "expression_statement" => {
                if let Some(expr) = child.named_child(0) {
                    if expr.kind() == "assignment_expression" {
                        collect_commonjs_names(expr, source, &mut names);
                    }
                }
            }
            _ => {}
        }
    }

    names
}

fn collect_declared_names(decl: Node, source: &str, names: &mut HashSet<String>) {
    match decl.kind() {
        "function_declaration" | "generator_function_declaration" | "class_declaration" => {
            if let Some(name) = decl.child_by_field_name("name") {
                names.insert(node_text(name, source).to_string());
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            for declarator in decl.named_children(&mut decl.walk()) {
                if declarator.kind() == "variable_declarator" {
                    if let Some(name) = declarator.child_by_field_name("name") {
                        if name.kind() == "identifier" {
                            names.insert(node_text(name, source).to_string());
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn collect_export_clause_names(export: Node, source: &str, names: &mut HashSet<String>) {
    for child in export.named_children(&mut export.walk()) {
        if child.kind() == "export_clause" {
            for spec in child.named_children(&mut child.walk()) {
                if spec.kind() == "export_specifier" {
                    if let Some(name) = spec.child_by_field_name("name") {
                        names.insert(node_text(name, source).to_string());
                    }
                }
            }
        }
    }
}

fn collect_commonjs_names(assign: Node, source: &str, names: &mut HashSet<String>) {
    let Some(left) = assign.child_by_field_name("left") else {
        return;
    };
    let left_text = node_text(left, source);
    let is_exports_target = left_text == "module.exports"
        || left_text.starts_with("module.exports.")
        || left_text.starts_with("exports.");
    if !is_exports_target {
        return;
    }
    // every identifier on the right-hand side becomes externally reachable
    if let Some(right) = assign.child_by_field_name("right") {
        collect_rhs_identifiers(right, source, names);
    }
}

fn collect_rhs_identifiers(node: Node, source: &str, names: &mut HashSet<String>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier" => {
            names.insert(node_text(node, source).to_string());
        }
        _ => {}
    }
    for child in node.children(&mut node.walk()) {
        collect_rhs_identifiers(child, source, names);
    }
}

fn collect_declaration(
    decl: Node,
    source: &str,
    exported: &HashSet<String>,
    in_export: bool,
    map: &mut ModuleMap,
) {
    let stmt_span = node_span(decl);
    let declarators: Vec<Node> = decl
        .named_children(&mut decl.walk())
        .filter(|n| n.kind() == "variable_declarator")
        .collect();
    let declarator_count = declarators.len();
    let is_const = node_text(decl, source).trim_start().starts_with("const");

    for declarator in declarators {
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };

        if name_node.kind() != "identifier" {
            // destructuring declarators alias parts of another value; their
            // mutation pattern cannot be attributed to one storage location
            let loc = SourceLocation::new(
                name_node.start_position().row + 1,
                name_node.start_position().column,
            );
            map.skipped.push(crate::core::types::SkippedBinding {
                name: node_text(name_node, source).to_string(),
                loc,
                error: "destructuring declaration cannot be analyzed as one binding".to_string(),
            });
            continue;
        }

        let name = node_text(name_node, source).to_string();
        let value = declarator.child_by_field_name("value");

        // `const alias = original` where original is already a binding:
        // same storage, different name
        if is_const {
            if let Some(v) = value {
                if v.kind() == "identifier" {
                    let target = node_text(v, source).to_string();
                    if map.binding(&target).is_some() || map.aliases.contains_key(&target) {
                        map.alias_decls.push(crate::analyzers::AliasDecl {
                            name: name.clone(),
                            target: target.clone(),
                            stmt_span,
                            decl_span: node_span(declarator),
                            declarator_count,
                        });
                        map.aliases.insert(name, target);
                        continue;
                    }
                }
            }
        }

        let (kind, init) = match value {
            Some(v) => (infer_kind(v, source), node_text(v, source).to_string()),
            None => (BindingKind::Handle, "undefined".to_string()),
        };

        // a const scalar can never be written; it still enters the model so
        // the frozen-constant exemption can record it
        map.bindings.push(Binding {
            name: name.clone(),
            kind,
            init,
            decl_span: node_span(declarator),
            stmt_span,
            declarator_count,
            loc: SourceLocation::new(
                name_node.start_position().row + 1,
                name_node.start_position().column,
            ),
            reassigned: false,
            interior_mutated: false,
            exported: in_export || exported.contains(&name),
            observed_outside: false,
        });
    }
}

/// Declared kind, inferred from the initializer expression
fn infer_kind(value: Node, source: &str) -> BindingKind {
    match value.kind() {
        "true" | "false" => BindingKind::Guard,
        "number" => BindingKind::Counter,
        "null" | "undefined" => BindingKind::Handle,
        "array" => BindingKind::Container,
        "object" => {
            if value.named_child_count() == 0 {
                // `{}` at module scope is a keyed container in practice
                BindingKind::Container
            } else {
                BindingKind::Record
            }
        }
        "new_expression" => {
            let ctor = value
                .child_by_field_name("constructor")
                .map(|c| node_text(c, source))
                .unwrap_or_default();
            match ctor {
                "Map" | "Set" | "WeakMap" | "WeakSet" => BindingKind::Container,
                _ => BindingKind::Handle,
            }
        }
        "call_expression" => BindingKind::Handle,
        "unary_expression" => {
            let text = node_text(value, source);
            if text.starts_with('-') || text.starts_with('+') {
                BindingKind::Counter
            } else {
                BindingKind::Record
            }
        }
        _ => BindingKind::Record,
    }
}

/// Exclude bindings whose mutation pattern cannot be decided statically.
/// Two sources of ambiguity: direct `eval` (sees the enclosing scope), and
/// computed writes to the global namespace (can hit any `var` binding).
pub(super) fn apply_ambiguity_rules(root: Node, source: &str, map: &mut ModuleMap) {
    let var_names = collect_var_names(root, source);
    let mut ambiguous: Vec<(String, String)> = Vec::new();

    scan_for_ambiguity(root, source, &var_names, map, &mut ambiguous);

    for (name, detail) in ambiguous {
        let Some(pos) = map.bindings.iter().position(|b| b.name == name) else {
            continue;
        };
        let binding = map.bindings.remove(pos);
        let err = AnalysisError::AmbiguousMutation {
            binding: binding.name.clone(),
            loc: binding.loc,
            detail,
        };
        log::debug!("excluding binding from matching: {}", err);
        map.skipped.push(crate::core::types::SkippedBinding {
            name: binding.name.clone(),
            loc: binding.loc,
            error: err.to_string(),
        });

        // accesses to an excluded binding must not feed grouping
        map.aliases.retain(|_, target| *target != binding.name);
        map.alias_decls.retain(|d| d.target != binding.name);
        for accessor in &mut map.accessors {
            accessor.accesses.retain(|a| a.binding != binding.name);
        }
    }
    map.accessors.retain(|a| !a.accesses.is_empty());
}

fn collect_var_names(root: Node, source: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    for child in root.named_children(&mut root.walk()) {
        let decl = if child.kind() == "export_statement" {
            match child.child_by_field_name("declaration") {
                Some(d) => d,
                None => continue,
            }
        } else {
            child
        };
        if decl.kind() == "variable_declaration" {
            for declarator in decl.named_children(&mut decl.walk()) {
                if declarator.kind() == "variable_declarator" {
                    if let Some(name) = declarator.child_by_field_name("name") {
                        if name.kind() == "identifier" {
                            names.insert(node_text(name, source).to_string());
                        }
                    }
                }
            }
        }
    }
    names
}

fn scan_for_ambiguity(
    node: Node,
    source: &str,
    var_names: &HashSet<String>,
    map: &ModuleMap,
    out: &mut Vec<(String, String)>,
) {
    match node.kind() {
        "call_expression" => {
            let callee = node.child_by_field_name("function");
            if let Some(callee) = callee {
                if callee.kind() == "identifier" && node_text(callee, source) == "eval" {
                    mark_eval_scope(node, source, map, out);
                }
            }
        }
        "assignment_expression" => {
            if let Some(left) = node.child_by_field_name("left") {
                if left.kind() == "subscript_expression" {
                    if let Some(object) = left.child_by_field_name("object") {
                        let obj = node_text(object, source);
                        if matches!(obj, "globalThis" | "window" | "self") {
                            for name in var_names {
                                if map.binding(name).is_some() {
                                    out.push((
                                        name.clone(),
                                        format!("computed write through {obj} can reach any var"),
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }
        _ => {}
    }

    for child in node.children(&mut node.walk()) {
        scan_for_ambiguity(child, source, var_names, map, out);
    }
}

/// Direct eval sees every binding visible from its call site: at module
/// level that is all of them, inside a function it is the bindings the
/// function's text mentions.
fn mark_eval_scope(
    eval_call: Node,
    source: &str,
    map: &ModuleMap,
    out: &mut Vec<(String, String)>,
) {
    let enclosing = enclosing_function(eval_call);
    match enclosing {
        None => {
            for binding in &map.bindings {
                out.push((
                    binding.name.clone(),
                    "direct eval at module scope".to_string(),
                ));
            }
        }
        Some(func) => {
            let text = node_text(func, source);
            for binding in &map.bindings {
                if mentions_identifier(text, &binding.name) {
                    out.push((
                        binding.name.clone(),
                        "direct eval in an enclosing function".to_string(),
                    ));
                }
            }
        }
    }
}

fn enclosing_function(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        if super::is_function_node(n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Word-boundary containment check, cheaper than tokenizing the function
fn mentions_identifier(text: &str, name: &str) -> bool {
    text.match_indices(name).any(|(idx, _)| {
        let before = text[..idx].chars().next_back();
        let after = text[idx + name.len()..].chars().next();
        let boundary = |c: Option<char>| !matches!(c, Some(c) if c.is_alphanumeric() || c == '_' || c == '$');
        boundary(before) && boundary(after)
    })
}
