//! Common type definitions used across the engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Language enumeration for all supported languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    JavaScript,
    TypeScript,
}

impl Language {
    /// Get file extensions for this language
    pub fn extensions(&self) -> &[&str] {
        match self {
            Language::JavaScript => &["js", "mjs", "cjs", "jsx"],
            Language::TypeScript => &["ts", "tsx", "mts", "cts"],
        }
    }

    /// Get the display name for this language
    pub fn display_name(&self) -> &str {
        match self {
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Language> {
        [Language::JavaScript, Language::TypeScript]
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext))
    }
}

/// Byte range in the source unit. Tree-sitter byte offsets; the applier
/// patches by byte range, so spans must index into the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Line/column position in source (1-based line, 0-based column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Declared kind of an outer-scope binding, inferred from its initializer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingKind {
    /// Boolean flag (`let sent = false`)
    Guard,
    /// Numeric counter or timestamp (`let attempts = 0`)
    Counter,
    /// Keyed or sequential container (`const cache = new Map()`, `const queue = []`)
    Container,
    /// Opaque handle, usually nullable (`let timer = null`)
    Handle,
    /// Object literal with named fields, or anything else
    Record,
}

/// Direction of an accessor's access to one binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Read,
    Write,
    ReadWrite,
}

impl Direction {
    /// Merge an additional observed access into the running direction
    pub fn merge(self, other: Direction) -> Direction {
        if self == other {
            self
        } else {
            Direction::ReadWrite
        }
    }

    pub fn writes(&self) -> bool {
        matches!(self, Direction::Write | Direction::ReadWrite)
    }

    pub fn reads(&self) -> bool {
        matches!(self, Direction::Read | Direction::ReadWrite)
    }
}

/// Structural facts observed about how an accessor touches a binding.
/// These are the classifier's evidence; each maps to part of a pattern
/// signature rather than to a pattern by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessShape {
    /// Binding read inside a branch condition (possibly negated)
    GuardBranch,
    /// Boolean literal assigned to the binding
    GuardSet,
    /// Keyed membership/read check on a container (`cache.has(k)`, `k in cache`)
    CacheProbe,
    /// Keyed insert into a container (`cache.set(k, v)`, `cache[k] = v`)
    CacheInsert,
    /// Eviction from a container (`cache.delete(k)`, `cache.clear()`)
    CacheEvict,
    /// `setTimeout`/`setInterval` result stored into the binding
    TimerSchedule,
    /// `clearTimeout`/`clearInterval` applied to the binding
    TimerClear,
    /// Handle acquired from a resource constructor (`connect`, `open`, `new WebSocket`)
    ResourceAcquire,
    /// Handle released (`close`/`disconnect`/`destroy` on the binding, or nulled after one)
    ResourceRelease,
    /// FIFO append (`queue.push(x)`)
    QueuePush,
    /// FIFO removal (`queue.shift()`)
    QueueShift,
    /// Counter mutated inside a bounded loop containing a backoff delay
    RetryLoop,
    /// Container written at a key supplied by a caller parameter
    KeyedWrite,
    /// Container read at a key supplied by a caller parameter
    KeyedRead,
    /// Compute-once: branch on a guard, write a value binding, return it
    LazyCompute,
    /// Freshly created callable passed to a subscription API
    SubscribeFreshCallable,
}

/// A named mutable storage location declared at module scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    /// Initial value expression, verbatim source text
    pub init: String,
    /// Span of the declarator (`name = init`)
    pub decl_span: Span,
    /// Span of the whole declaration statement
    pub stmt_span: Span,
    /// Number of declarators sharing the statement
    pub declarator_count: usize,
    pub loc: SourceLocation,
    /// Reassigned (`name = ...`) anywhere after initialization
    pub reassigned: bool,
    /// Mutated through its interior (method call or member/index write)
    pub interior_mutated: bool,
    pub exported: bool,
    /// Referenced outside the accessors that form its sharing group
    /// (module-level expression, or a function that is not an accessor)
    pub observed_outside: bool,
}

impl Binding {
    /// Never written after initialization, in any form
    pub fn is_frozen(&self) -> bool {
        !self.reassigned && !self.interior_mutated
    }
}

/// One invocation of an accessor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    /// Span of the callee identifier (the text the applier rewrites)
    pub span: Span,
    pub loc: SourceLocation,
    /// Body spans of enclosing functions, outermost first; empty at module level
    pub enclosing: Vec<Span>,
    pub in_loop: bool,
    /// Name of the group accessor this call occurs inside, if any (re-entrancy)
    pub within_accessor: Option<String>,
}

/// An accessor's relationship to one binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingAccess {
    pub binding: String,
    pub direction: Direction,
    pub shapes: Vec<AccessShape>,
}

impl BindingAccess {
    pub fn has_shape(&self, shape: AccessShape) -> bool {
        self.shapes.contains(&shape)
    }
}

/// A callable unit that reads and/or writes module-scope bindings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accessor {
    pub name: String,
    /// Span of the whole definition statement
    pub span: Span,
    /// Span of the function body block
    pub body_span: Span,
    pub loc: SourceLocation,
    pub exported: bool,
    pub accesses: Vec<BindingAccess>,
    pub call_sites: Vec<CallSite>,
    /// Calls out to anything that is not a group accessor or a known-pure builtin
    pub has_external_calls: bool,
    /// Start offsets of explicit `return` statements plus the implicit
    /// fall-through exit (the closing brace of the body)
    pub exit_spans: Vec<Span>,
}

impl Accessor {
    pub fn access(&self, binding: &str) -> Option<&BindingAccess> {
        self.accesses.iter().find(|a| a.binding == binding)
    }

    pub fn has_shape(&self, shape: AccessShape) -> bool {
        self.accesses.iter().any(|a| a.has_shape(shape))
    }

    pub fn writes_any(&self) -> bool {
        self.accesses.iter().any(|a| a.direction.writes())
    }
}

/// Maximal set of bindings and accessors connected by mutual access.
/// Every analyzed binding belongs to exactly one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingGroup {
    pub id: usize,
    pub bindings: Vec<Binding>,
    pub accessors: Vec<Accessor>,
}

impl SharingGroup {
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn binding_names(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn accessor_names(&self) -> Vec<&str> {
        self.accessors.iter().map(|a| a.name.as_str()).collect()
    }

    /// All call sites of all accessors in the group
    pub fn call_sites(&self) -> impl Iterator<Item = &CallSite> {
        self.accessors.iter().flat_map(|a| a.call_sites.iter())
    }
}

/// The closed pattern catalog. One rewrite strategy per tag; adding a kind is
/// a localized, exhaustively-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    GuardOnce,
    MemoizedCache,
    TimerDebounceThrottle,
    MutableStateBag,
    ResourceLifecycle,
    RequestContext,
    UnstableCallbackIdentity,
    RetryBackoff,
    LazyInit,
    SerializedQueue,
}

impl PatternKind {
    pub const ALL: [PatternKind; 10] = [
        PatternKind::GuardOnce,
        PatternKind::MemoizedCache,
        PatternKind::TimerDebounceThrottle,
        PatternKind::MutableStateBag,
        PatternKind::ResourceLifecycle,
        PatternKind::RequestContext,
        PatternKind::UnstableCallbackIdentity,
        PatternKind::RetryBackoff,
        PatternKind::LazyInit,
        PatternKind::SerializedQueue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::GuardOnce => "guard-once",
            PatternKind::MemoizedCache => "memoized-cache",
            PatternKind::TimerDebounceThrottle => "timer-debounce-throttle",
            PatternKind::MutableStateBag => "mutable-state-bag",
            PatternKind::ResourceLifecycle => "resource-lifecycle",
            PatternKind::RequestContext => "request-context",
            PatternKind::UnstableCallbackIdentity => "unstable-callback-identity",
            PatternKind::RetryBackoff => "retry-backoff",
            PatternKind::LazyInit => "lazy-init",
            PatternKind::SerializedQueue => "serialized-queue",
        }
    }

    pub fn parse(s: &str) -> Option<PatternKind> {
        PatternKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A SharingGroup tagged with a pattern kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub group: SharingGroup,
    pub kind: PatternKind,
    /// All structurally matching kinds, best first (confidence ranking)
    pub candidates: Vec<PatternKind>,
}

/// Why a match was suppressed. Suppressions are recorded for audit,
/// never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum ExemptionReason {
    SingleCallSite,
    FrozenConstant,
    CorrectlyScoped,
    TrivialLogic,
    Suppressed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressedMatch {
    #[serde(rename = "match")]
    pub pattern_match: PatternMatch,
    pub reason: ExemptionReason,
}

/// A binding excluded from matching because its mutation pattern could not
/// be analyzed (reported, never guessed at)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedBinding {
    pub name: String,
    pub loc: SourceLocation,
    pub error: String,
}

/// A group on which two catalog kinds tied under the priority order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbiguousGroup {
    pub group: SharingGroup,
    pub tied: (PatternKind, PatternKind),
}

/// Lifecycle boundary at which a factory is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreationScope {
    /// Once at module initialization
    ModuleInit,
    /// Once per logical scope instance (request/session/component)
    PerLogicalScope,
}

/// One callable on the factory's capability surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    /// Accessor this capability wraps; `None` for the generated release
    pub source_accessor: Option<String>,
}

/// Where the factory invocation is inserted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertionPoint {
    /// Byte offset at which the instance creation statement is inserted
    pub offset: usize,
    /// True when a per-logical-scope plan degenerated to module placement
    /// because every call site sits at module top level
    pub module_level: bool,
}

/// Rewrite of one call site: old accessor reference to bound capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSitePatch {
    pub span: Span,
    pub old: String,
    pub new: String,
}

/// A planned rewrite for one accepted PatternMatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationPlan {
    pub group_id: usize,
    pub kind: PatternKind,
    pub factory_name: String,
    pub instance_name: String,
    pub scope: CreationScope,
    pub insertion: InsertionPoint,
    /// Bindings the factory owns, with their original initializers
    pub storage: Vec<(String, String)>,
    /// Module-level aliases of that storage, re-declared inside the factory
    pub aliases: Vec<(String, String)>,
    pub capabilities: Vec<Capability>,
    pub call_site_patches: Vec<CallSitePatch>,
    /// Exit paths that must invoke the release capability (resource-lifecycle)
    pub release_points: Vec<Span>,
}

/// Reason a plan could not be produced without manual resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "kebab-case")]
pub enum BlockedReason {
    /// Rewriting would change an exported accessor's external name or signature
    ExportedAccessor { name: String },
    /// The binding's storage is observed outside the group's accessors
    /// (exported, or referenced from module-level code)
    ExportedBinding { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanBlocked {
    pub group_id: usize,
    pub kind: PatternKind,
    pub reason: BlockedReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum PlanOutcome {
    Planned(TransformationPlan),
    Blocked(PlanBlocked),
}

/// A single textual edit, applied by byte range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub span: Span,
    pub replacement: String,
    pub note: String,
}

/// Machine-readable summary for the downstream note generator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffSummary {
    pub groups_rewritten: usize,
    pub declarations_moved: usize,
    pub call_sites_patched: usize,
    pub bytes_delta: i64,
}

/// Final rewrite output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteResult {
    pub source: String,
    pub patches: Vec<Patch>,
    pub summary: DiffSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_merge_widens_to_read_write() {
        assert_eq!(
            Direction::Read.merge(Direction::Write),
            Direction::ReadWrite
        );
        assert_eq!(Direction::Write.merge(Direction::Write), Direction::Write);
        assert_eq!(
            Direction::ReadWrite.merge(Direction::Read),
            Direction::ReadWrite
        );
    }

    #[test]
    fn pattern_kind_round_trips_through_str() {
        for kind in PatternKind::ALL {
            assert_eq!(PatternKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(PatternKind::parse("not-a-kind"), None);
    }

    #[test]
    fn span_containment() {
        let outer = Span::new(10, 100);
        let inner = Span::new(20, 30);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn language_from_extension() {
        assert_eq!(Language::from_extension("js"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("py"), None);
    }
}
