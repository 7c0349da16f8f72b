pub mod errors;
pub mod types;

pub use errors::{AnalysisError, Error, Result};
pub use types::{
    AccessShape, Accessor, AmbiguousGroup, Binding, BindingAccess, BindingKind, BlockedReason,
    CallSite, CallSitePatch, Capability, CreationScope, DiffSummary, Direction, ExemptionReason,
    InsertionPoint, Language, Patch, PatternKind, PatternMatch, PlanBlocked, PlanOutcome,
    RewriteResult, SharingGroup, SkippedBinding, SourceLocation, Span, SuppressedMatch,
    TransformationPlan,
};
