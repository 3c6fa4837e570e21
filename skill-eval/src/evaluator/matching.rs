//! Exemplar classification and line matching.

use super::imports::{ImportDecl, scan_imports};
use crate::criteria::{CodePattern, Language};
use std::collections::BTreeSet;

/// Lines shorter than this (after normalization) carry too little signal to match on.
pub const MIN_SIGNIFICANT_LEN: usize = 15;

/// How an exemplar's usage lines are compared against generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Every significant line must appear verbatim (after normalization).
    /// Used for incorrect exemplars, where a false positive costs a failed run.
    Exact,
    /// Lines match by containment in either direction and one miss is tolerated
    /// for exemplars longer than two significant lines.
    Flexible,
}

impl MatchStrategy {
    /// Strategy for an exemplar by its correctness flag.
    pub fn for_pattern(pattern: &CodePattern) -> Self {
        if pattern.is_correct { MatchStrategy::Flexible } else { MatchStrategy::Exact }
    }

    /// Whether `pattern_lines` occur in `code_lines`.
    ///
    /// Returns the 1-based code line of the first matched pattern line. An empty
    /// pattern never matches.
    pub fn find(self, pattern_lines: &[String], code_lines: &[CodeLine]) -> Option<usize> {
        if pattern_lines.is_empty() {
            return None;
        }

        let hits: Vec<Option<usize>> = pattern_lines
            .iter()
            .map(|p| code_lines.iter().find(|c| self.line_matches(p, &c.text)).map(|c| c.number))
            .collect();
        let matched = hits.iter().flatten().count();

        let required = match self {
            MatchStrategy::Exact => pattern_lines.len(),
            MatchStrategy::Flexible if pattern_lines.len() <= 2 => pattern_lines.len(),
            MatchStrategy::Flexible => pattern_lines.len() - 1,
        };

        (matched >= required).then(|| hits.into_iter().flatten().min()).flatten()
    }

    fn line_matches(self, pattern: &str, code: &str) -> bool {
        match self {
            MatchStrategy::Exact => pattern == code,
            MatchStrategy::Flexible => {
                code.contains(pattern) || (is_significant(code) && pattern.contains(code))
            }
        }
    }
}

/// A normalized, non-comment line of generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLine {
    /// 1-based line number in the original source
    pub number: usize,
    pub text: String,
}

/// Generated code prepared for matching: declared imports plus normalized lines.
#[derive(Debug, Clone)]
pub struct CodeView {
    pub imports: BTreeSet<ImportDecl>,
    pub lines: Vec<CodeLine>,
}

impl CodeView {
    pub fn new(code: &str, language: &Language) -> Self {
        let imports = scan_imports(code, language).declared();
        let lines = code
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                normalize_line(line, language).map(|text| CodeLine { number: idx + 1, text })
            })
            .collect();
        Self { imports, lines }
    }

    /// Whether every declaration in `decls` is declared by the code.
    pub fn declares_all(&self, decls: &[ImportDecl]) -> bool {
        !decls.is_empty() && decls.iter().all(|d| self.imports.contains(d))
    }
}

/// Structure of an exemplar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternShape {
    /// Imports the exemplar declares
    pub imports: Vec<ImportDecl>,
    /// Significant normalized usage lines
    pub usage: Vec<String>,
    /// Whether the exemplar has any non-import, non-comment line at all
    pub has_usage: bool,
}

impl PatternShape {
    /// Classify an exemplar, reading it in `fallback` when its own language is unknown.
    pub fn classify(pattern: &CodePattern, fallback: &Language) -> Self {
        let language = match &pattern.language {
            Language::Other(_) => fallback,
            known => known,
        };
        let scan = scan_imports(&pattern.code, language);

        let normalized: Vec<String> = scan
            .other_lines
            .iter()
            .filter_map(|(_, line)| normalize_line(line, language))
            .collect();
        let has_usage = !normalized.is_empty();
        let usage = normalized.into_iter().filter(|l| is_significant(l)).collect();

        Self { imports: scan.imports, usage, has_usage }
    }

    /// Exemplar made only of import declarations.
    pub fn is_import_only(&self) -> bool {
        !self.imports.is_empty() && !self.has_usage
    }
}

/// Trim, drop comment-only lines, and collapse internal whitespace.
pub fn normalize_line(line: &str, language: &Language) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || language.comment_prefixes().iter().any(|p| trimmed.starts_with(p)) {
        return None;
    }
    Some(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn is_significant(line: &str) -> bool {
    line.chars().count() >= MIN_SIGNIFICANT_LEN
}
