//! Structural classification of one binding reference.
//!
//! Given an identifier node that resolves to a module binding, inspect its
//! syntactic context and produce the access direction plus the shape facts
//! the pattern classifier consumes.

use super::{is_function_node, node_text};
use crate::core::types::{AccessShape, BindingKind, Direction};
use std::collections::HashSet;
use tree_sitter::Node;

/// Everything observable about a single reference
#[derive(Debug, Default)]
pub(super) struct RefFacts {
    pub direction: Option<Direction>,
    pub shapes: Vec<AccessShape>,
    pub reassigned: bool,
    pub interior_mutated: bool,
    /// Assigned a freshly created function expression
    pub wrote_callable: bool,
    /// Passed as an argument to a subscription API
    pub passed_to_subscription: bool,
    /// Appears in a `return` statement
    pub returned: bool,
}

impl RefFacts {
    fn read() -> Self {
        Self {
            direction: Some(Direction::Read),
            ..Default::default()
        }
    }

    fn with(direction: Direction) -> Self {
        Self {
            direction: Some(direction),
            ..Default::default()
        }
    }

    fn push(&mut self, shape: AccessShape) {
        if !self.shapes.contains(&shape) {
            self.shapes.push(shape);
        }
    }
}

const SUBSCRIPTION_METHODS: &[&str] = &[
    "addEventListener",
    "addListener",
    "on",
    "once",
    "subscribe",
    "observe",
];

const RELEASE_METHODS: &[&str] = &[
    "close",
    "disconnect",
    "destroy",
    "end",
    "terminate",
    "unsubscribe",
    "abort",
    "release",
    "removeAllListeners",
];

const RESOURCE_CALLEES: &[&str] = &[
    "connect",
    "createConnection",
    "open",
    "acquire",
    "createPool",
    "createServer",
    "createReadStream",
    "createWriteStream",
    "requestAnimationFrame",
];

const PLAIN_CONSTRUCTORS: &[&str] = &[
    "Map", "Set", "WeakMap", "WeakSet", "Date", "RegExp", "Array", "Object", "Error",
];

pub(super) fn classify_reference(
    id: Node,
    source: &str,
    kind: BindingKind,
    params: &HashSet<String>,
) -> RefFacts {
    let Some(parent) = id.parent() else {
        return RefFacts::read();
    };

    let mut facts = match parent.kind() {
        "assignment_expression" if is_field(parent, "left", id) => {
            classify_reassignment(parent, source)
        }
        "augmented_assignment_expression" if is_field(parent, "left", id) => {
            let mut f = RefFacts::with(Direction::ReadWrite);
            f.reassigned = true;
            f
        }
        "update_expression" => {
            let mut f = RefFacts::with(Direction::ReadWrite);
            f.reassigned = true;
            f
        }
        "member_expression" if is_field(parent, "object", id) => {
            classify_member_use(parent, source, params)
        }
        "subscript_expression" if is_field(parent, "object", id) => {
            classify_subscript_use(parent, source, params)
        }
        "binary_expression" => classify_binary_use(parent, source, id),
        _ => RefFacts::read(),
    };

    // argument positions: clearTimeout(h), bus.subscribe(handler)
    if let Some(facts_from_args) = classify_argument_position(id, source) {
        merge(&mut facts, facts_from_args);
    }

    if in_branch_condition(id) {
        facts.push(AccessShape::GuardBranch);
        if facts.direction.is_none() {
            facts.direction = Some(Direction::Read);
        }
    }

    if in_return_statement(id) {
        facts.returned = true;
    }

    // counter mutated inside a loop that also delays is the retry signature
    if kind == BindingKind::Counter
        && (facts.reassigned || facts.interior_mutated)
        && in_backoff_loop(id, source)
    {
        facts.push(AccessShape::RetryLoop);
    }

    if facts.direction.is_none() {
        facts.direction = Some(Direction::Read);
    }
    facts
}

fn classify_reassignment(assign: Node, source: &str) -> RefFacts {
    let mut facts = RefFacts::with(Direction::Write);
    facts.reassigned = true;

    let Some(right) = assign.child_by_field_name("right") else {
        return facts;
    };

    match right.kind() {
        "true" | "false" => facts.push(AccessShape::GuardSet),
        "arrow_function" | "function_expression" => facts.wrote_callable = true,
        "call_expression" => {
            let callee = right
                .child_by_field_name("function")
                .map(|c| node_text(c, source))
                .unwrap_or_default();
            if callee == "setTimeout" || callee == "setInterval" {
                facts.push(AccessShape::TimerSchedule);
            } else if is_resource_callee(callee) {
                facts.push(AccessShape::ResourceAcquire);
            }
        }
        "new_expression" => {
            let ctor = right
                .child_by_field_name("constructor")
                .map(|c| node_text(c, source))
                .unwrap_or_default();
            if !PLAIN_CONSTRUCTORS.contains(&ctor) {
                facts.push(AccessShape::ResourceAcquire);
            }
        }
        "await_expression" => {
            if let Some(inner) = right.named_child(0) {
                if inner.kind() == "call_expression" || inner.kind() == "new_expression" {
                    let callee = inner
                        .child_by_field_name("function")
                        .or_else(|| inner.child_by_field_name("constructor"))
                        .map(|c| node_text(c, source))
                        .unwrap_or_default();
                    if is_resource_callee(callee) {
                        facts.push(AccessShape::ResourceAcquire);
                    }
                }
            }
        }
        _ => {}
    }

    facts
}

fn is_resource_callee(callee: &str) -> bool {
    let last = callee.rsplit('.').next().unwrap_or(callee);
    RESOURCE_CALLEES.contains(&last)
}

/// `binding.method(...)` or a plain member read
fn classify_member_use(member: Node, source: &str, params: &HashSet<String>) -> RefFacts {
    // member write: binding.field = value
    if let Some(grand) = member.parent() {
        if grand.kind() == "assignment_expression" && is_field(grand, "left", member) {
            let mut facts = RefFacts::with(Direction::Write);
            facts.interior_mutated = true;
            facts.push(AccessShape::CacheInsert);
            return facts;
        }
        if grand.kind() == "call_expression" && is_field(grand, "function", member) {
            return classify_method_call(member, grand, source, params);
        }
    }
    RefFacts::read()
}

fn classify_method_call(
    member: Node,
    call: Node,
    source: &str,
    params: &HashSet<String>,
) -> RefFacts {
    let method = member
        .child_by_field_name("property")
        .map(|p| node_text(p, source))
        .unwrap_or_default();
    let keyed = first_argument_is_param(call, source, params);

    let mut facts = match method {
        "get" | "has" | "includes" => {
            let mut f = RefFacts::read();
            f.push(AccessShape::CacheProbe);
            if keyed {
                f.push(AccessShape::KeyedRead);
            }
            f
        }
        "set" => {
            let mut f = RefFacts::with(Direction::Write);
            f.interior_mutated = true;
            f.push(AccessShape::CacheInsert);
            if keyed {
                f.push(AccessShape::KeyedWrite);
            }
            f
        }
        "add" => {
            let mut f = RefFacts::with(Direction::Write);
            f.interior_mutated = true;
            f.push(AccessShape::CacheInsert);
            f
        }
        "delete" | "clear" => {
            let mut f = RefFacts::with(Direction::Write);
            f.interior_mutated = true;
            f.push(AccessShape::CacheEvict);
            f
        }
        "push" | "unshift" => {
            let mut f = RefFacts::with(Direction::Write);
            f.interior_mutated = true;
            f.push(AccessShape::QueuePush);
            f
        }
        "shift" | "pop" => {
            let mut f = RefFacts::with(Direction::ReadWrite);
            f.interior_mutated = true;
            f.push(AccessShape::QueueShift);
            f
        }
        m if RELEASE_METHODS.contains(&m) => {
            let mut f = RefFacts::read();
            f.push(AccessShape::ResourceRelease);
            f
        }
        m if SUBSCRIPTION_METHODS.contains(&m) => RefFacts::read(),
        _ => RefFacts::read(),
    };

    // `bus.subscribe(() => ...)` also registers a fresh callable against the
    // receiver binding when the receiver stores the subscription target
    if SUBSCRIPTION_METHODS.contains(&method) && call_has_function_argument(call) {
        facts.push(AccessShape::SubscribeFreshCallable);
    }

    facts
}

fn classify_subscript_use(subscript: Node, source: &str, params: &HashSet<String>) -> RefFacts {
    let keyed = subscript
        .child_by_field_name("index")
        .map(|idx| params.contains(node_text(idx, source)))
        .unwrap_or(false);

    if let Some(grand) = subscript.parent() {
        if grand.kind() == "assignment_expression" && is_field(grand, "left", subscript) {
            let mut facts = RefFacts::with(Direction::Write);
            facts.interior_mutated = true;
            facts.push(AccessShape::CacheInsert);
            if keyed {
                facts.push(AccessShape::KeyedWrite);
            }
            return facts;
        }
        if grand.kind() == "unary_expression" && node_text(grand, source).starts_with("delete") {
            let mut facts = RefFacts::with(Direction::Write);
            facts.interior_mutated = true;
            facts.push(AccessShape::CacheEvict);
            return facts;
        }
    }

    let mut facts = RefFacts::read();
    if keyed {
        facts.push(AccessShape::KeyedRead);
    }
    if in_branch_condition(subscript) {
        facts.push(AccessShape::CacheProbe);
    }
    facts
}

/// `key in binding` probes the container
fn classify_binary_use(binary: Node, source: &str, id: Node) -> RefFacts {
    let operator = binary
        .child_by_field_name("operator")
        .map(|op| node_text(op, source))
        .unwrap_or_default();
    if operator == "in" && is_field(binary, "right", id) {
        let mut facts = RefFacts::read();
        facts.push(AccessShape::CacheProbe);
        return facts;
    }
    RefFacts::read()
}

/// clearTimeout(h) / clearInterval(h) / subscription APIs taking the binding
fn classify_argument_position(id: Node, source: &str) -> Option<RefFacts> {
    let parent = id.parent()?;
    if parent.kind() != "arguments" {
        return None;
    }
    let call = parent.parent()?;
    if call.kind() != "call_expression" {
        return None;
    }
    let callee = call.child_by_field_name("function")?;

    match callee.kind() {
        "identifier" => {
            let name = node_text(callee, source);
            if name == "clearTimeout" || name == "clearInterval" {
                let mut facts = RefFacts::read();
                facts.push(AccessShape::TimerClear);
                return Some(facts);
            }
        }
        "member_expression" => {
            let method = callee
                .child_by_field_name("property")
                .map(|p| node_text(p, source))
                .unwrap_or_default();
            if SUBSCRIPTION_METHODS.contains(&method) {
                let mut facts = RefFacts::read();
                facts.passed_to_subscription = true;
                return Some(facts);
            }
        }
        _ => {}
    }
    None
}

fn merge(into: &mut RefFacts, other: RefFacts) {
    if let Some(dir) = other.direction {
        into.direction = Some(match into.direction {
            Some(existing) => existing.merge(dir),
            None => dir,
        });
    }
    for shape in other.shapes {
        into.push(shape);
    }
    into.reassigned |= other.reassigned;
    into.interior_mutated |= other.interior_mutated;
    into.wrote_callable |= other.wrote_callable;
    into.passed_to_subscription |= other.passed_to_subscription;
    into.returned |= other.returned;
}

fn is_field(parent: Node, field: &str, child: Node) -> bool {
    parent
        .child_by_field_name(field)
        .map(|n| n.id() == child.id())
        .unwrap_or(false)
}

fn first_argument_is_param(call: Node, source: &str, params: &HashSet<String>) -> bool {
    call.child_by_field_name("arguments")
        .and_then(|args| args.named_child(0))
        .map(|arg| arg.kind() == "identifier" && params.contains(node_text(arg, source)))
        .unwrap_or(false)
}

fn call_has_function_argument(call: Node) -> bool {
    call.child_by_field_name("arguments")
        .map(|args| {
            args.named_children(&mut args.walk())
                .any(|arg| matches!(arg.kind(), "arrow_function" | "function_expression"))
        })
        .unwrap_or(false)
}

/// Climb from the reference to the nearest branch statement and check the
/// reference sits inside its condition
fn in_branch_condition(node: Node) -> bool {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if is_function_node(parent.kind()) {
            return false;
        }
        match parent.kind() {
            "if_statement" | "while_statement" | "do_statement" | "ternary_expression" => {
                return parent
                    .child_by_field_name("condition")
                    .map(|cond| spans_contain(cond, node))
                    .unwrap_or(false);
            }
            "statement_block" | "program" | "expression_statement" => return false,
            _ => {}
        }
        current = parent;
    }
    false
}

fn in_return_statement(node: Node) -> bool {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if is_function_node(parent.kind()) || parent.kind() == "statement_block" {
            return false;
        }
        if parent.kind() == "return_statement" {
            return true;
        }
        current = parent;
    }
    false
}

/// A bounded loop whose body both mutates the counter and awaits a delay
fn in_backoff_loop(node: Node, source: &str) -> bool {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if is_function_node(parent.kind()) {
            return false;
        }
        if matches!(
            parent.kind(),
            "while_statement" | "do_statement" | "for_statement"
        ) {
            return loop_has_delay(parent, source);
        }
        current = parent;
    }
    false
}

fn loop_has_delay(loop_node: Node, source: &str) -> bool {
    let mut found = false;
    search_delay(loop_node, source, &mut found);
    found
}

fn search_delay(node: Node, source: &str, found: &mut bool) {
    if *found {
        return;
    }
    match node.kind() {
        "await_expression" => {
            *found = true;
            return;
        }
        "call_expression" => {
            let callee = node
                .child_by_field_name("function")
                .map(|c| node_text(c, source))
                .unwrap_or_default();
            let last = callee.rsplit('.').next().unwrap_or(callee);
            if matches!(last, "setTimeout" | "sleep" | "delay" | "wait" | "backoff") {
                *found = true;
                return;
            }
        }
        _ => {}
    }
    for child in node.children(&mut node.walk()) {
        search_delay(child, source, found);
    }
}

fn spans_contain(outer: Node, inner: Node) -> bool {
    outer.start_byte() <= inner.start_byte() && inner.end_byte() <= outer.end_byte()
}
