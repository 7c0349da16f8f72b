pub mod javascript;

use crate::config::AnalyzerConfig;
use crate::core::types::{Accessor, Binding, Language, SkippedBinding, Span};
use crate::core::AnalysisError;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// One source file handed to the engine. Analysis is a pure function of the
/// unit plus the catalog configuration; nothing persists between passes.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub language: Language,
    pub source: String,
}

impl SourceUnit {
    pub fn new(path: PathBuf, language: Language, source: String) -> Self {
        Self {
            path,
            language,
            source,
        }
    }

    /// Build a unit from a file on disk, inferring the language from the
    /// extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let language = Language::from_extension(ext)
            .ok_or_else(|| anyhow::anyhow!("unsupported extension: {}", path.display()))?;
        let source = std::fs::read_to_string(path)?;
        Ok(Self::new(path.to_path_buf(), language, source))
    }
}

/// A parsed source unit: the tree plus the text it indexes into
pub struct ParsedUnit {
    pub tree: tree_sitter::Tree,
    pub source: String,
    pub path: PathBuf,
    pub language: Language,
}

/// Exit paths of one function in the unit: explicit returns plus the
/// implicit fall-through at the closing brace
#[derive(Debug, Clone)]
pub struct FunctionExits {
    pub body_span: Span,
    pub exits: Vec<Span>,
}

/// A module-level `const alias = original` re-export of a binding's storage
#[derive(Debug, Clone)]
pub struct AliasDecl {
    pub name: String,
    pub target: String,
    pub stmt_span: Span,
    pub decl_span: Span,
    pub declarator_count: usize,
}

/// Everything the scope & alias analyzer derives from one unit
#[derive(Debug, Clone, Default)]
pub struct ModuleMap {
    pub bindings: Vec<Binding>,
    pub accessors: Vec<Accessor>,
    /// Module-local aliases of a binding's storage (`const alias = original`)
    pub aliases: HashMap<String, String>,
    /// Declaration sites of those aliases, for the applier
    pub alias_decls: Vec<AliasDecl>,
    /// Every identifier appearing in the unit, for collision-free naming
    pub identifiers: HashSet<String>,
    /// Bindings excluded from matching, with the reason
    pub skipped: Vec<SkippedBinding>,
    /// Exit paths of every function in the unit, keyed by body span
    pub function_exits: Vec<FunctionExits>,
}

impl ModuleMap {
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn accessor(&self, name: &str) -> Option<&Accessor> {
        self.accessors.iter().find(|a| a.name == name)
    }

    /// Resolve a name through the alias table to the binding it denotes
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        let mut hops = 0;
        while let Some(target) = self.aliases.get(current) {
            current = target;
            hops += 1;
            if hops > self.aliases.len() {
                break;
            }
        }
        current
    }

    pub fn exits_for(&self, body_span: &Span) -> Option<&FunctionExits> {
        self.function_exits.iter().find(|f| f.body_span == *body_span)
    }
}

pub trait Analyzer: Send + Sync {
    fn parse(&self, content: &str, path: PathBuf) -> std::result::Result<ParsedUnit, AnalysisError>;
    fn extract(&self, unit: &ParsedUnit) -> std::result::Result<ModuleMap, AnalysisError>;
    fn language(&self) -> Language;
}

pub fn get_analyzer(language: Language, config: &AnalyzerConfig) -> Box<dyn Analyzer> {
    match language {
        Language::JavaScript => Box::new(javascript::JavaScriptAnalyzer::new_javascript(config)),
        Language::TypeScript => Box::new(javascript::JavaScriptAnalyzer::new_typescript(config)),
    }
}

/// Parse and extract in one step
pub fn analyze_unit(
    unit: &SourceUnit,
    config: &AnalyzerConfig,
) -> std::result::Result<ModuleMap, AnalysisError> {
    let analyzer = get_analyzer(unit.language, config);
    let parsed = analyzer.parse(&unit.source, unit.path.clone())?;
    analyzer.extract(&parsed)
}
