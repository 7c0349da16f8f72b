//! Comment-driven suppression.
//!
//! `// encap:allow[guard-once,lazy-init] -- reason` on the line before (or
//! on) a binding declaration suppresses those kinds for the group the
//! binding lands in. `encap:allow-start`/`encap:allow-end` delimit a block
//! form. An empty kind list is a wildcard. The reason is mandatory; a
//! suppression without one is ignored and reported.

use crate::core::types::PatternKind;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SuppressionRule {
    pub kinds: Vec<PatternKind>,
    pub reason: String,
}

impl SuppressionRule {
    fn covers(&self, kind: PatternKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

#[derive(Debug, Clone)]
pub struct SuppressionBlock {
    pub start_line: usize,
    pub end_line: Option<usize>,
    pub rule: SuppressionRule,
}

#[derive(Debug, Clone, Default)]
pub struct SuppressionContext {
    /// Line-scoped rules; apply to their own line and the next
    pub line_rules: HashMap<usize, SuppressionRule>,
    pub blocks: Vec<SuppressionBlock>,
    /// Start lines of blocks that were never closed
    pub unclosed_blocks: Vec<usize>,
    /// Annotations missing the mandatory reason
    pub malformed: Vec<usize>,
}

impl SuppressionContext {
    /// Reason the kind is suppressed at this line, if it is
    pub fn suppression_reason(&self, line: usize, kind: PatternKind) -> Option<&str> {
        if let Some(rule) = self.line_rules.get(&line) {
            if rule.covers(kind) {
                return Some(&rule.reason);
            }
        }
        if line > 0 {
            if let Some(rule) = self.line_rules.get(&(line - 1)) {
                if rule.covers(kind) {
                    return Some(&rule.reason);
                }
            }
        }
        self.blocks
            .iter()
            .filter(|b| {
                b.end_line
                    .map(|end| line >= b.start_line && line <= end)
                    .unwrap_or(false)
            })
            .find(|b| b.rule.covers(kind))
            .map(|b| b.rule.reason.as_str())
    }

    pub fn is_suppressed(&self, line: usize, kind: PatternKind) -> bool {
        self.suppression_reason(line, kind).is_some()
    }
}

static LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"//\s*encap:allow(?:\[([a-z\-,\s]*)\])?(?:\s*--\s*(.+))?").unwrap()
});
static BLOCK_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"//\s*encap:allow-start(?:\[([a-z\-,\s]*)\])?(?:\s*--\s*(.+))?").unwrap()
});
static BLOCK_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//\s*encap:allow-end").unwrap());

pub fn parse_suppression_comments(source: &str) -> SuppressionContext {
    let mut context = SuppressionContext::default();
    let mut open_block: Option<SuppressionBlock> = None;

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;

        if BLOCK_END_RE.is_match(line) {
            if let Some(mut block) = open_block.take() {
                block.end_line = Some(line_no);
                context.blocks.push(block);
            }
            continue;
        }

        if let Some(caps) = BLOCK_START_RE.captures(line) {
            if let Some(prev) = open_block.take() {
                context.unclosed_blocks.push(prev.start_line);
            }
            match parse_rule(&caps) {
                Some(rule) => {
                    open_block = Some(SuppressionBlock {
                        start_line: line_no,
                        end_line: None,
                        rule,
                    });
                }
                None => context.malformed.push(line_no),
            }
            continue;
        }

        if let Some(caps) = LINE_RE.captures(line) {
            match parse_rule(&caps) {
                Some(rule) => {
                    context.line_rules.insert(line_no, rule);
                }
                None => context.malformed.push(line_no),
            }
        }
    }

    if let Some(block) = open_block {
        log::warn!("unclosed encap:allow-start block at line {}", block.start_line);
        context.unclosed_blocks.push(block.start_line);
    }

    context
}

fn parse_rule(caps: &regex::Captures) -> Option<SuppressionRule> {
    let reason = caps.get(2)?.as_str().trim().to_string();
    if reason.is_empty() {
        return None;
    }
    let kinds = caps
        .get(1)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(PatternKind::parse)
                .collect()
        })
        .unwrap_or_default();
    Some(SuppressionRule { kinds, reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_rule_applies_to_next_line() {
        let src = "// encap:allow[guard-once] -- first call is during boot\nlet sent = false;\n";
        let ctx = parse_suppression_comments(src);
        assert!(ctx.is_suppressed(2, PatternKind::GuardOnce));
        assert!(!ctx.is_suppressed(2, PatternKind::MemoizedCache));
        assert!(!ctx.is_suppressed(3, PatternKind::GuardOnce));
    }

    #[test]
    fn wildcard_rule_covers_every_kind() {
        let src = "// encap:allow -- vetted by hand\nlet cache = {};\n";
        let ctx = parse_suppression_comments(src);
        assert!(ctx.is_suppressed(2, PatternKind::MemoizedCache));
        assert!(ctx.is_suppressed(2, PatternKind::MutableStateBag));
    }

    #[test]
    fn block_covers_enclosed_lines_only() {
        let src = "\
// encap:allow-start[mutable-state-bag] -- legacy module
let a = 0;
let b = 0;
// encap:allow-end
let c = 0;
";
        let ctx = parse_suppression_comments(src);
        assert!(ctx.is_suppressed(2, PatternKind::MutableStateBag));
        assert!(ctx.is_suppressed(3, PatternKind::MutableStateBag));
        assert!(!ctx.is_suppressed(5, PatternKind::MutableStateBag));
        assert!(ctx.unclosed_blocks.is_empty());
    }

    #[test]
    fn unclosed_block_is_reported_and_inert() {
        let src = "// encap:allow-start -- oops\nlet a = 0;\n";
        let ctx = parse_suppression_comments(src);
        assert_eq!(ctx.unclosed_blocks, vec![1]);
        assert!(!ctx.is_suppressed(2, PatternKind::MutableStateBag));
    }

    #[test]
    fn missing_reason_is_malformed() {
        let src = "// encap:allow[guard-once]\nlet sent = false;\n";
        let ctx = parse_suppression_comments(src);
        assert_eq!(ctx.malformed, vec![1]);
        assert!(!ctx.is_suppressed(2, PatternKind::GuardOnce));
    }
}
