mod accessors;
mod bindings;
mod shapes;

use crate::analyzers::{Analyzer, FunctionExits, ModuleMap, ParsedUnit};
use crate::config::AnalyzerConfig;
use crate::core::types::{Language, Span};
use crate::core::AnalysisError;
use std::path::PathBuf;
use tree_sitter::{Node, Parser};

pub struct JavaScriptAnalyzer {
    language: Language,
    parse_timeout_ms: u64,
    max_unit_bytes: usize,
}

impl JavaScriptAnalyzer {
    pub fn new_javascript(config: &AnalyzerConfig) -> Self {
        Self {
            language: Language::JavaScript,
            parse_timeout_ms: config.parse_timeout_ms,
            max_unit_bytes: config.max_unit_bytes,
        }
    }

    pub fn new_typescript(config: &AnalyzerConfig) -> Self {
        Self {
            language: Language::TypeScript,
            parse_timeout_ms: config.parse_timeout_ms,
            max_unit_bytes: config.max_unit_bytes,
        }
    }

    fn make_parser(&self) -> Parser {
        let mut parser = Parser::new();
        let grammar = match self.language {
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        };
        parser
            .set_language(&grammar)
            .expect("grammar version mismatch");
        #[allow(deprecated)]
        parser.set_timeout_micros(self.parse_timeout_ms * 1_000);
        parser
    }
}

impl Analyzer for JavaScriptAnalyzer {
    fn parse(&self, content: &str, path: PathBuf) -> Result<ParsedUnit, AnalysisError> {
        if content.len() > self.max_unit_bytes {
            return Err(AnalysisError::UnitTooLarge {
                file: path,
                bytes: content.len(),
                max_bytes: self.max_unit_bytes,
            });
        }

        let mut parser = self.make_parser();
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| AnalysisError::Timeout {
                file: path.clone(),
                timeout_ms: self.parse_timeout_ms,
            })?;

        if tree.root_node().has_error() {
            let line = first_error_line(tree.root_node());
            return Err(AnalysisError::Parse {
                file: path,
                line,
                message: "syntax error".to_string(),
            });
        }

        Ok(ParsedUnit {
            tree,
            source: content.to_string(),
            path,
            language: self.language,
        })
    }

    fn extract(&self, unit: &ParsedUnit) -> Result<ModuleMap, AnalysisError> {
        let root = unit.tree.root_node();
        let source = unit.source.as_str();

        let mut map = ModuleMap::default();
        collect_identifiers(root, source, &mut map.identifiers);
        map.function_exits = collect_function_exits(root);

        bindings::collect(root, source, &mut map);
        accessors::collect(root, source, &mut map);
        bindings::apply_ambiguity_rules(root, source, &mut map);

        Ok(map)
    }

    fn language(&self) -> Language {
        self.language
    }
}

pub(crate) fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

pub(crate) fn node_span(node: Node) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn first_error_line(root: Node) -> usize {
    let mut line = root.start_position().row + 1;
    find_error_line(root, &mut line);
    line
}

fn find_error_line(node: Node, line: &mut usize) -> bool {
    if node.is_error() || node.is_missing() {
        *line = node.start_position().row + 1;
        return true;
    }
    for child in node.children(&mut node.walk()) {
        if find_error_line(child, line) {
            return true;
        }
    }
    false
}

fn collect_identifiers(node: Node, source: &str, out: &mut std::collections::HashSet<String>) {
    match node.kind() {
        "identifier" | "property_identifier" | "shorthand_property_identifier" => {
            out.insert(node_text(node, source).to_string());
        }
        _ => {}
    }
    for child in node.children(&mut node.walk()) {
        collect_identifiers(child, source, out);
    }
}

/// Record the exit paths of every function body in the unit: explicit
/// `return` statements belonging to that function, plus the implicit
/// fall-through exit at the closing brace.
fn collect_function_exits(root: Node) -> Vec<FunctionExits> {
    let mut out = Vec::new();
    visit_functions(root, &mut out);
    out
}

fn visit_functions(node: Node, out: &mut Vec<FunctionExits>) {
    if is_function_node(node.kind()) {
        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "statement_block" {
                let body_span = node_span(body);
                let mut exits = Vec::new();
                collect_returns(body, &mut exits);
                // implicit exit just before the closing brace, unless the
                // last statement already returns
                if !last_statement_returns(body) {
                    exits.push(Span::new(body_span.end - 1, body_span.end - 1));
                }
                out.push(FunctionExits { body_span, exits });
            }
        }
    }
    for child in node.children(&mut node.walk()) {
        visit_functions(child, out);
    }
}

fn collect_returns(node: Node, out: &mut Vec<Span>) {
    for child in node.children(&mut node.walk()) {
        if is_function_node(child.kind()) {
            continue; // returns of nested functions exit the nested function
        }
        if child.kind() == "return_statement" {
            out.push(node_span(child));
        }
        collect_returns(child, out);
    }
}

fn last_statement_returns(body: Node) -> bool {
    let mut last = None;
    for child in body.named_children(&mut body.walk()) {
        if child.kind() != "comment" {
            last = Some(child);
        }
    }
    matches!(last, Some(n) if n.kind() == "return_statement" || n.kind() == "throw_statement")
}

pub(crate) fn is_function_node(kind: &str) -> bool {
    matches!(
        kind,
        "function_declaration"
            | "function_expression"
            | "arrow_function"
            | "method_definition"
            | "generator_function_declaration"
            | "generator_function"
    )
}
