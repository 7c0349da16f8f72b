//! Engine configuration loaded from `.encap.toml`.
//!
//! The pattern catalog and exemption rule set are supplied as data so the
//! catalog can be extended without touching the analyzer or group builder.

use crate::core::types::PatternKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Pattern catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Kinds the classifier is allowed to report
    #[serde(default = "default_enabled_kinds")]
    pub enabled: Vec<PatternKind>,

    /// Tie-break priority, highest first. Defaults to the built-in order;
    /// overriding may introduce equal-priority collisions, which surface as
    /// ClassificationAmbiguous rather than an automatic pick.
    #[serde(default = "default_priority")]
    pub priority: Vec<PatternKind>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_kinds(),
            priority: default_priority(),
        }
    }
}

impl CatalogConfig {
    /// Priority rank of a kind; lower is higher priority. Kinds missing from
    /// the override share the rank after the configured ones, which the
    /// classifier reports as a tie when two of them match one group.
    pub fn rank(&self, kind: PatternKind) -> usize {
        self.priority
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.priority.len())
    }

    pub fn is_enabled(&self, kind: PatternKind) -> bool {
        self.enabled.contains(&kind)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.enabled.is_empty() {
            return Err("catalog.enabled must not be empty".to_string());
        }
        for kind in &self.enabled {
            let dup = self.enabled.iter().filter(|k| *k == kind).count();
            if dup > 1 {
                return Err(format!("catalog.enabled lists {} twice", kind));
            }
        }
        Ok(())
    }
}

fn default_enabled_kinds() -> Vec<PatternKind> {
    PatternKind::ALL.to_vec()
}

/// The built-in order: correctness-critical kinds ahead of
/// performance/ergonomics kinds.
fn default_priority() -> Vec<PatternKind> {
    vec![
        PatternKind::ResourceLifecycle,
        PatternKind::RetryBackoff,
        PatternKind::SerializedQueue,
        PatternKind::TimerDebounceThrottle,
        PatternKind::MemoizedCache,
        PatternKind::RequestContext,
        PatternKind::UnstableCallbackIdentity,
        PatternKind::LazyInit,
        PatternKind::GuardOnce,
        PatternKind::MutableStateBag,
    ]
}

/// Exemption rule toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExemptionConfig {
    #[serde(default = "default_true")]
    pub single_call_site: bool,

    #[serde(default = "default_true")]
    pub frozen_constant: bool,

    #[serde(default = "default_true")]
    pub correctly_scoped: bool,

    #[serde(default = "default_true")]
    pub trivial_logic: bool,

    /// Honor `encap:allow` comments in the analyzed source
    #[serde(default = "default_true")]
    pub comment_suppression: bool,
}

impl Default for ExemptionConfig {
    fn default() -> Self {
        Self {
            single_call_site: true,
            frozen_constant: true,
            correctly_scoped: true,
            trivial_logic: true,
            comment_suppression: true,
        }
    }
}

/// Analyzer limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Per-unit parse timeout in milliseconds
    #[serde(default = "default_parse_timeout_ms")]
    pub parse_timeout_ms: u64,

    /// Per-unit size ceiling in bytes
    #[serde(default = "default_max_unit_bytes")]
    pub max_unit_bytes: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            parse_timeout_ms: default_parse_timeout_ms(),
            max_unit_bytes: default_max_unit_bytes(),
        }
    }
}

/// Rewrite naming preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Prefix of generated factory names (`create` -> `createGreeter`)
    #[serde(default = "default_factory_prefix")]
    pub factory_prefix: String,

    /// Name of the generated release capability for resource-lifecycle plans
    #[serde(default = "default_release_name")]
    pub release_name: String,

    /// Indentation unit used for emitted factory bodies
    #[serde(default = "default_indent")]
    pub indent: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            factory_prefix: default_factory_prefix(),
            release_name: default_release_name(),
            indent: default_indent(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_parse_timeout_ms() -> u64 {
    2_000
}

fn default_max_unit_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_factory_prefix() -> String {
    "create".to_string()
}

fn default_release_name() -> String {
    "release".to_string()
}

fn default_indent() -> String {
    "  ".to_string()
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncapConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub exemptions: ExemptionConfig,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub rewrite: RewriteConfig,
}

impl EncapConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.catalog.validate()?;
        if self.analyzer.parse_timeout_ms == 0 {
            return Err("analyzer.parse_timeout_ms must be positive".to_string());
        }
        if self.rewrite.factory_prefix.is_empty() {
            return Err("rewrite.factory_prefix must not be empty".to_string());
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EncapConfig = toml::from_str(&content)?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `.encap.toml` from the given directory if present, else defaults
    pub fn load_or_default(dir: &Path) -> Self {
        let path = dir.join(".encap.toml");
        if path.exists() {
            match Self::from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to load {}: {}, using defaults", path.display(), e);
                }
            }
        }
        Self::default()
    }
}
