//! Feedback rendering for the next generation attempt
//!
//! Feedback is plain text read top to bottom by the generator, so the block order
//! is fixed: header, errors, warnings, incorrect patterns, suggested corrections.
//! Errors always precede warnings regardless of discovery order.

use crate::criteria::AcceptanceCriteria;
use crate::evaluator::{EvaluationResult, Finding, Severity, truncate};
use std::fmt::Write;

/// Default maximum characters of code shown per finding.
pub const DEFAULT_EXCERPT_LIMIT: usize = 100;

/// Builds feedback text from an evaluation result
#[derive(Debug, Clone)]
pub struct FeedbackBuilder {
    excerpt_limit: usize,
}

impl Default for FeedbackBuilder {
    fn default() -> Self {
        Self { excerpt_limit: DEFAULT_EXCERPT_LIMIT }
    }
}

impl FeedbackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_excerpt_limit(mut self, limit: usize) -> Self {
        self.excerpt_limit = limit;
        self
    }

    /// Render feedback; empty when there is nothing actionable.
    pub fn build(
        &self,
        result: &EvaluationResult,
        criteria: Option<&AcceptanceCriteria>,
    ) -> String {
        if result.findings.is_empty() && result.matched_incorrect.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        let _ = writeln!(
            out,
            "## Evaluation Feedback (score: {:.1}/100, {} errors, {} warnings)",
            result.score, result.error_count, result.warning_count
        );

        let errors: Vec<&Finding> = result.findings_with(Severity::Error).collect();
        if !errors.is_empty() {
            out.push_str("\n### ERRORS (must fix)\n");
            for finding in &errors {
                self.write_finding(&mut out, finding);
            }
        }

        let warnings: Vec<&Finding> = result.findings_with(Severity::Warning).collect();
        if !warnings.is_empty() {
            out.push_str("\n### WARNINGS (should fix)\n");
            for finding in &warnings {
                self.write_finding(&mut out, finding);
            }
        }

        if !result.matched_incorrect.is_empty() {
            out.push_str("\n### INCORRECT PATTERNS\n");
            for section in &result.matched_incorrect {
                let _ = writeln!(
                    out,
                    "- {}: review the \"{}\" section of the acceptance criteria",
                    section, section
                );
            }
        }

        let suggestions = suggestions(result, criteria);
        if !suggestions.is_empty() {
            out.push_str("\n### SUGGESTED CORRECTIONS\n");
            for suggestion in suggestions {
                let _ = writeln!(out, "- {}", suggestion);
            }
        }

        out
    }

    fn write_finding(&self, out: &mut String, finding: &Finding) {
        match finding.line {
            Some(line) => {
                let _ = writeln!(out, "- [{}] (line {}) {}", finding.rule, line, finding.message);
            }
            None => {
                let _ = writeln!(out, "- [{}] {}", finding.rule, finding.message);
            }
        }
        if let Some(suggestion) = &finding.suggestion {
            let _ = writeln!(out, "  Suggestion: {}", suggestion);
        }
        if let Some(snippet) = &finding.code_snippet {
            let excerpt = truncate(snippet, self.excerpt_limit);
            out.push_str("  Code:\n");
            for line in excerpt.lines() {
                let _ = writeln!(out, "    {}", line);
            }
        }
    }
}

/// Deduplicated suggestions: errors first, then warnings and info, then the
/// single-line descriptions of correct exemplars.
fn suggestions(result: &EvaluationResult, criteria: Option<&AcceptanceCriteria>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        let s = s.trim();
        if !s.is_empty() && !out.iter().any(|existing| existing == s) {
            out.push(s.to_string());
        }
    };

    for severity in [Severity::Error, Severity::Warning, Severity::Info] {
        for finding in result.findings_with(severity) {
            if let Some(suggestion) = &finding.suggestion {
                push(suggestion);
            }
        }
    }

    if let Some(criteria) = criteria {
        for pattern in &criteria.correct_patterns {
            let description = pattern.description.as_deref().filter(|d| !d.contains('\n'));
            if let Some(description) = description {
                push(description);
            }
        }
    }

    out
}

/// Render feedback with the default excerpt limit.
pub fn build_feedback(result: &EvaluationResult, criteria: Option<&AcceptanceCriteria>) -> String {
    FeedbackBuilder::default().build(result, criteria)
}
