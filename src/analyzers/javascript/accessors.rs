//! Accessor extraction.
//!
//! An accessor is a named top-level callable that reads or writes at least
//! one module binding, directly or through any function nested inside it
//! (closure reachability). References from module-level expressions or from
//! unnamed callables mark the binding as observed outside the accessor set.

use super::shapes::{self, RefFacts};
use super::{is_function_node, node_span, node_text};
use crate::analyzers::ModuleMap;
use crate::core::types::{
    AccessShape, Accessor, BindingAccess, BindingKind, CallSite, Direction, SourceLocation, Span,
};
use std::collections::{HashMap, HashSet};
use tree_sitter::Node;

pub(super) fn collect(root: Node, source: &str, map: &mut ModuleMap) {
    let exported = super::bindings::collect_exported_names(root, source);
    let callables = collect_callables(root, source, &exported);
    let callable_names: HashSet<String> = callables.iter().map(|c| c.name.clone()).collect();
    let kinds: HashMap<String, BindingKind> = map
        .bindings
        .iter()
        .map(|b| (b.name.clone(), b.kind))
        .collect();
    let aliases = map.aliases.clone();

    let mut updates: Vec<FactUpdate> = Vec::new();

    for callable in &callables {
        let params = param_names(callable.func, source);
        let mut scanner = Scanner {
            source,
            kinds: &kinds,
            aliases: &aliases,
            callables: &callable_names,
            scopes: Vec::new(),
            params: params.clone(),
            accesses: HashMap::new(),
            has_external_calls: false,
        };
        scanner.scan(callable.func);

        if scanner.accesses.is_empty() {
            continue;
        }

        for (binding, acc) in &scanner.accesses {
            updates.push(FactUpdate {
                binding: binding.clone(),
                reassigned: acc.reassigned,
                interior_mutated: acc.interior_mutated,
                observed_outside: false,
            });
        }

        let accesses = finalize_accesses(scanner.accesses, &kinds);
        let body_span = node_span(callable.body);
        let exit_spans = match map.exits_for(&body_span) {
            Some(exits) => exits.exits.clone(),
            // arrow with an expression body: the expression is the only exit
            None => vec![Span::new(body_span.end, body_span.end)],
        };

        map.accessors.push(Accessor {
            name: callable.name.clone(),
            span: callable.def_span,
            body_span,
            loc: callable.loc,
            exported: callable.exported,
            accesses,
            call_sites: Vec::new(),
            has_external_calls: scanner.has_external_calls,
            exit_spans,
        });
    }

    collect_call_sites(root, source, map);
    scan_module_level(root, source, map, &kinds, &aliases, &mut updates);

    for update in updates {
        if let Some(binding) = map.bindings.iter_mut().find(|b| b.name == update.binding) {
            binding.reassigned |= update.reassigned;
            binding.interior_mutated |= update.interior_mutated;
            binding.observed_outside |= update.observed_outside;
        }
    }
}

struct FactUpdate {
    binding: String,
    reassigned: bool,
    interior_mutated: bool,
    observed_outside: bool,
}

struct Callable<'t> {
    name: String,
    def_span: Span,
    func: Node<'t>,
    body: Node<'t>,
    loc: SourceLocation,
    exported: bool,
}

fn collect_callables<'t>(
    root: Node<'t>,
    source: &str,
    exported: &HashSet<String>,
) -> Vec<Callable<'t>> {
    let mut out = Vec::new();

    for child in root.named_children(&mut root.walk()) {
        let (stmt, decl, in_export) = if child.kind() == "export_statement" {
            match child.child_by_field_name("declaration") {
                Some(decl) => (child, decl, true),
                None => continue,
            }
        } else {
            (child, child, false)
        };

        match decl.kind() {
            "function_declaration" | "generator_function_declaration" => {
                let Some(name_node) = decl.child_by_field_name("name") else {
                    continue;
                };
                let Some(body) = decl.child_by_field_name("body") else {
                    continue;
                };
                let name = node_text(name_node, source).to_string();
                out.push(Callable {
                    exported: in_export || exported.contains(&name),
                    name,
                    def_span: node_span(stmt),
                    func: decl,
                    body,
                    loc: SourceLocation::new(
                        decl.start_position().row + 1,
                        decl.start_position().column,
                    ),
                });
            }
            "lexical_declaration" | "variable_declaration" => {
                for declarator in decl.named_children(&mut decl.walk()) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(name_node) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    let Some(value) = declarator.child_by_field_name("value") else {
                        continue;
                    };
                    if name_node.kind() != "identifier"
                        || !matches!(value.kind(), "arrow_function" | "function_expression")
                    {
                        continue;
                    }
                    let Some(body) = value.child_by_field_name("body") else {
                        continue;
                    };
                    let name = node_text(name_node, source).to_string();
                    out.push(Callable {
                        exported: in_export || exported.contains(&name),
                        name,
                        def_span: node_span(stmt),
                        func: value,
                        body,
                        loc: SourceLocation::new(
                            declarator.start_position().row + 1,
                            declarator.start_position().column,
                        ),
                    });
                }
            }
            _ => {}
        }
    }

    out
}

fn param_names(func: Node, source: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    if let Some(params) = func
        .child_by_field_name("parameters")
        .or_else(|| func.child_by_field_name("parameter"))
    {
        collect_pattern_identifiers(params, source, &mut names);
    }
    names
}

fn collect_pattern_identifiers(node: Node, source: &str, out: &mut HashSet<String>) {
    if node.kind() == "identifier" || node.kind() == "shorthand_property_identifier_pattern" {
        out.insert(node_text(node, source).to_string());
    }
    for child in node.children(&mut node.walk()) {
        collect_pattern_identifiers(child, source, out);
    }
}

#[derive(Default)]
struct AccessAcc {
    direction: Option<Direction>,
    shapes: Vec<AccessShape>,
    reassigned: bool,
    interior_mutated: bool,
    wrote_callable: bool,
    passed_to_subscription: bool,
    returned: bool,
}

impl AccessAcc {
    fn merge(&mut self, facts: RefFacts) {
        if let Some(dir) = facts.direction {
            self.direction = Some(match self.direction {
                Some(existing) => existing.merge(dir),
                None => dir,
            });
        }
        for shape in facts.shapes {
            if !self.shapes.contains(&shape) {
                self.shapes.push(shape);
            }
        }
        self.reassigned |= facts.reassigned;
        self.interior_mutated |= facts.interior_mutated;
        self.wrote_callable |= facts.wrote_callable;
        self.passed_to_subscription |= facts.passed_to_subscription;
        self.returned |= facts.returned;
    }
}

struct Scanner<'a> {
    source: &'a str,
    kinds: &'a HashMap<String, BindingKind>,
    aliases: &'a HashMap<String, String>,
    callables: &'a HashSet<String>,
    scopes: Vec<HashSet<String>>,
    /// Parameters of the accessor itself, for keyed-access detection
    params: HashSet<String>,
    accesses: HashMap<String, AccessAcc>,
    has_external_calls: bool,
}

impl<'a> Scanner<'a> {
    fn scan(&mut self, node: Node) {
        match node.kind() {
            kind if is_function_node(kind) => {
                let mut scope = HashSet::new();
                if let Some(params) = node
                    .child_by_field_name("parameters")
                    .or_else(|| node.child_by_field_name("parameter"))
                {
                    collect_pattern_identifiers(params, self.source, &mut scope);
                }
                self.scopes.push(scope);
                if let Some(body) = node.child_by_field_name("body") {
                    self.scan(body);
                }
                self.scopes.pop();
            }
            "statement_block" => {
                self.scopes.push(HashSet::new());
                for child in node.children(&mut node.walk()) {
                    self.scan(child);
                }
                self.scopes.pop();
            }
            "variable_declarator" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let mut declared = HashSet::new();
                    collect_pattern_identifiers(name, self.source, &mut declared);
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.extend(declared);
                    }
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.scan(value);
                }
            }
            "catch_clause" => {
                let mut scope = HashSet::new();
                if let Some(param) = node.child_by_field_name("parameter") {
                    collect_pattern_identifiers(param, self.source, &mut scope);
                }
                self.scopes.push(scope);
                for child in node.children(&mut node.walk()) {
                    if child.kind() != "identifier" {
                        self.scan(child);
                    }
                }
                self.scopes.pop();
            }
            "identifier" => {
                self.handle_reference(node);
            }
            "call_expression" => {
                if self.call_is_external(node) {
                    self.has_external_calls = true;
                }
                for child in node.children(&mut node.walk()) {
                    self.scan(child);
                }
            }
            _ => {
                for child in node.children(&mut node.walk()) {
                    self.scan(child);
                }
            }
        }
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn resolve(&self, name: &str) -> Option<String> {
        if self.is_shadowed(name) {
            return None;
        }
        let mut current = name;
        let mut hops = 0;
        while let Some(target) = self.aliases.get(current) {
            current = target;
            hops += 1;
            if hops > self.aliases.len() {
                break;
            }
        }
        self.kinds.contains_key(current).then(|| current.to_string())
    }

    fn handle_reference(&mut self, id: Node) {
        let name = node_text(id, self.source);
        let Some(target) = self.resolve(name) else {
            return;
        };
        let kind = self.kinds[&target];
        let facts = shapes::classify_reference(id, self.source, kind, &self.params);
        self.accesses.entry(target).or_default().merge(facts);
    }

    fn call_is_external(&self, call: Node) -> bool {
        let Some(callee) = call.child_by_field_name("function") else {
            return true;
        };
        match callee.kind() {
            "identifier" => {
                let name = node_text(callee, self.source);
                if self.is_shadowed(name) {
                    return true;
                }
                const PURE: &[&str] = &[
                    "parseInt",
                    "parseFloat",
                    "isNaN",
                    "isFinite",
                    "String",
                    "Number",
                    "Boolean",
                    "structuredClone",
                ];
                if PURE.contains(&name) {
                    return false;
                }
                if self.callables.contains(name) {
                    return false;
                }
                if self.resolve(name).is_some() {
                    return false;
                }
                true
            }
            "member_expression" => {
                let object = callee
                    .child_by_field_name("object")
                    .map(|o| node_text(o, self.source))
                    .unwrap_or_default();
                const PURE_NAMESPACES: &[&str] =
                    &["Math", "JSON", "Object", "Array", "Number", "String"];
                if PURE_NAMESPACES.contains(&object) {
                    return false;
                }
                if callee
                    .child_by_field_name("object")
                    .map(|o| o.kind() == "identifier" && self.resolve(node_text(o, self.source)).is_some())
                    .unwrap_or(false)
                {
                    return false;
                }
                true
            }
            _ => true,
        }
    }
}

fn finalize_accesses(
    raw: HashMap<String, AccessAcc>,
    kinds: &HashMap<String, BindingKind>,
) -> Vec<BindingAccess> {
    let guard_cycle = raw.iter().any(|(name, acc)| {
        kinds.get(name) == Some(&BindingKind::Guard)
            && acc.shapes.contains(&AccessShape::GuardBranch)
            && acc.shapes.contains(&AccessShape::GuardSet)
    });

    let mut out: Vec<BindingAccess> = raw
        .into_iter()
        .map(|(binding, mut acc)| {
            if acc.wrote_callable && acc.passed_to_subscription {
                acc.shapes.push(AccessShape::SubscribeFreshCallable);
            }
            // compute-once: sibling guard is branched and set, this binding
            // is written and handed back to the caller
            if guard_cycle
                && kinds.get(&binding) != Some(&BindingKind::Guard)
                && acc.direction.map(|d| d.writes()).unwrap_or(false)
                && acc.returned
            {
                acc.shapes.push(AccessShape::LazyCompute);
            }
            BindingAccess {
                binding,
                direction: acc.direction.unwrap_or(Direction::Read),
                shapes: acc.shapes,
            }
        })
        .collect();

    out.sort_by(|a, b| a.binding.cmp(&b.binding));
    out
}

/// Second pass: every invocation of an accessor by name, with the context
/// the exemption filter and planner need
fn collect_call_sites(root: Node, source: &str, map: &mut ModuleMap) {
    let accessor_names: HashSet<String> =
        map.accessors.iter().map(|a| a.name.clone()).collect();
    let mut walker = CallSiteWalker {
        source,
        targets: &accessor_names,
        scopes: Vec::new(),
        sites: Vec::new(),
    };
    walker.walk(root);

    let body_spans: Vec<(String, Span)> = map
        .accessors
        .iter()
        .map(|a| (a.name.clone(), a.body_span))
        .collect();

    for (name, mut site) in walker.sites {
        site.within_accessor = body_spans
            .iter()
            .find(|(_, body)| body.contains(&site.span))
            .map(|(owner, _)| owner.clone());
        if let Some(accessor) = map.accessors.iter_mut().find(|a| a.name == name) {
            accessor.call_sites.push(site);
        }
    }
}

struct CallSiteWalker<'a> {
    source: &'a str,
    targets: &'a HashSet<String>,
    scopes: Vec<HashSet<String>>,
    sites: Vec<(String, CallSite)>,
}

impl<'a> CallSiteWalker<'a> {
    fn walk(&mut self, node: Node) {
        match node.kind() {
            kind if is_function_node(kind) => {
                let mut scope = HashSet::new();
                if let Some(params) = node
                    .child_by_field_name("parameters")
                    .or_else(|| node.child_by_field_name("parameter"))
                {
                    collect_pattern_identifiers(params, self.source, &mut scope);
                }
                self.scopes.push(scope);
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk(body);
                }
                self.scopes.pop();
            }
            "statement_block" => {
                self.scopes.push(HashSet::new());
                for child in node.children(&mut node.walk()) {
                    self.walk(child);
                }
                self.scopes.pop();
            }
            "variable_declarator" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let mut declared = HashSet::new();
                    collect_pattern_identifiers(name, self.source, &mut declared);
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.extend(declared);
                    }
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.walk(value);
                }
            }
            "call_expression" => {
                if let Some(callee) = node.child_by_field_name("function") {
                    if callee.kind() == "identifier" {
                        let name = node_text(callee, self.source);
                        let shadowed = self.scopes.iter().any(|s| s.contains(name));
                        if !shadowed && self.targets.contains(name) {
                            self.sites.push((
                                name.to_string(),
                                CallSite {
                                    span: node_span(callee),
                                    loc: SourceLocation::new(
                                        callee.start_position().row + 1,
                                        callee.start_position().column,
                                    ),
                                    enclosing: enclosing_bodies(node),
                                    in_loop: in_loop(node),
                                    within_accessor: None,
                                },
                            ));
                        }
                    }
                }
                for child in node.children(&mut node.walk()) {
                    self.walk(child);
                }
            }
            _ => {
                for child in node.children(&mut node.walk()) {
                    self.walk(child);
                }
            }
        }
    }
}

/// Body spans of enclosing functions, outermost first
fn enclosing_bodies(node: Node) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut current = node.parent();
    while let Some(n) = current {
        if is_function_node(n.kind()) {
            if let Some(body) = n.child_by_field_name("body") {
                spans.push(node_span(body));
            }
        }
        current = n.parent();
    }
    spans.reverse();
    spans
}

fn in_loop(node: Node) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        if is_function_node(n.kind()) {
            return false;
        }
        if matches!(
            n.kind(),
            "while_statement" | "do_statement" | "for_statement" | "for_in_statement"
                | "for_of_statement"
        ) {
            return true;
        }
        current = n.parent();
    }
    false
}

/// References from module-level expressions and unnamed callables: these do
/// not form accessors, but they pin the binding in place
fn scan_module_level(
    root: Node,
    source: &str,
    map: &ModuleMap,
    kinds: &HashMap<String, BindingKind>,
    aliases: &HashMap<String, String>,
    updates: &mut Vec<FactUpdate>,
) {
    let accessor_spans: HashSet<Span> = map.accessors.iter().map(|a| a.span).collect();
    let callable_names: HashSet<String> = map.accessors.iter().map(|a| a.name.clone()).collect();

    for child in root.named_children(&mut root.walk()) {
        let span = node_span(child);
        if accessor_spans.contains(&span) {
            continue;
        }

        let decl = if child.kind() == "export_statement" {
            child.child_by_field_name("declaration")
        } else {
            None
        };
        let stmt = decl.unwrap_or(child);

        let mut scanner = Scanner {
            source,
            kinds,
            aliases,
            callables: &callable_names,
            scopes: Vec::new(),
            params: HashSet::new(),
            accesses: HashMap::new(),
            has_external_calls: false,
        };

        match stmt.kind() {
            "lexical_declaration" | "variable_declaration" => {
                // only the initializers; the declared names are the bindings
                // themselves or unrelated locals
                for declarator in stmt.named_children(&mut stmt.walk()) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let is_alias_decl = declarator
                        .child_by_field_name("name")
                        .map(|n| aliases.contains_key(node_text(n, source)))
                        .unwrap_or(false);
                    if is_alias_decl {
                        continue;
                    }
                    if let Some(value) = declarator.child_by_field_name("value") {
                        scanner.scan(value);
                    }
                }
            }
            "export_statement" | "import_statement" => continue,
            _ => scanner.scan(stmt),
        }

        for (binding, acc) in scanner.accesses {
            updates.push(FactUpdate {
                binding,
                reassigned: acc.reassigned,
                interior_mutated: acc.interior_mutated,
                observed_outside: true,
            });
        }
    }
}
