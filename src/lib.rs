// Export modules for library usage
pub mod analyzers;
pub mod batch;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod engine;
pub mod exemption;
pub mod grouping;
pub mod io;
pub mod planner;
pub mod rewrite;
pub mod verify;

// Re-export commonly used types
pub use crate::core::{
    AccessShape, Accessor, Binding, BindingAccess, BindingKind, BlockedReason, CreationScope,
    Direction, Error, ExemptionReason, Language, PatternKind, PatternMatch, PlanBlocked,
    PlanOutcome, Result, RewriteResult, SharingGroup, SourceLocation, Span, SuppressedMatch,
    TransformationPlan,
};

pub use crate::analyzers::{analyze_unit, get_analyzer, Analyzer, ModuleMap, SourceUnit};
pub use crate::batch::{analyze_units, BatchReport};
pub use crate::config::EncapConfig;
pub use crate::engine::{analyze, apply, plan, AnalysisReport, ApplyReport};
pub use crate::exemption::suppression::{parse_suppression_comments, SuppressionContext};
pub use crate::grouping::build_groups;
