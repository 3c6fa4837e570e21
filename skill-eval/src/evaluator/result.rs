//! Evaluation findings and results

use serde::{Deserialize, Serialize};

/// Score returned when no criteria matched in either direction.
pub const NEUTRAL_SCORE: f64 = 50.0;

pub const ERROR_PENALTY: f64 = 20.0;
pub const WARNING_PENALTY: f64 = 5.0;
pub const INCORRECT_SECTION_PENALTY: f64 = 15.0;
pub const CORRECT_SECTION_BONUS: f64 = 5.0;

/// Severity levels for evaluation findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Incorrect pattern found; fails the evaluation
    Error,
    /// Missing recommended pattern
    Warning,
    /// Informational finding
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A single finding from code evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Rule identifier (`syntax`, `imports`, `pattern:<section>`, a rule name, ...)
    pub rule: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    /// 1-based line in the generated code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Finding {
    pub fn new(severity: Severity, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            rule: rule.into(),
            message: message.into(),
            suggestion: None,
            code_snippet: None,
            line: None,
        }
    }

    pub fn error(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, rule, message)
    }

    pub fn warning(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, rule, message)
    }

    pub fn info(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, rule, message)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.code_snippet = Some(snippet.into());
        self
    }

    pub fn with_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    /// Format as a single human-readable line
    pub fn format(&self) -> String {
        match self.line {
            Some(line) => {
                format!("[{}] {} (line {}): {}", self.severity, self.rule, line, self.message)
            }
            None => format!("[{}] {}: {}", self.severity, self.rule, self.message),
        }
    }
}

/// Result of evaluating one piece of generated code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub skill_name: String,
    pub scenario: String,
    pub generated_code: String,
    pub findings: Vec<Finding>,
    /// Sections whose correct exemplars were found
    pub matched_correct: Vec<String>,
    /// Sections whose incorrect exemplars were found
    pub matched_incorrect: Vec<String>,
    /// Score in `[0, 100]`
    pub score: f64,
    /// `true` iff no finding has `Severity::Error`
    pub passed: bool,
    pub error_count: usize,
    pub warning_count: usize,
}

impl EvaluationResult {
    /// Build a result and score it from its findings and matched sections
    pub fn scored(
        skill_name: &str,
        scenario: &str,
        generated_code: &str,
        findings: Vec<Finding>,
        matched_correct: Vec<String>,
        matched_incorrect: Vec<String>,
    ) -> Self {
        let score = calculate_score(&findings, matched_correct.len(), matched_incorrect.len());
        Self::build(
            skill_name,
            scenario,
            generated_code,
            findings,
            matched_correct,
            matched_incorrect,
            score,
        )
    }

    /// Build the zero-score result of a failed syntax gate
    pub fn syntax_failure(
        skill_name: &str,
        scenario: &str,
        generated_code: &str,
        finding: Finding,
    ) -> Self {
        Self::build(skill_name, scenario, generated_code, vec![finding], vec![], vec![], 0.0)
    }

    fn build(
        skill_name: &str,
        scenario: &str,
        generated_code: &str,
        findings: Vec<Finding>,
        matched_correct: Vec<String>,
        matched_incorrect: Vec<String>,
        score: f64,
    ) -> Self {
        let error_count = count_severity(&findings, Severity::Error);
        let warning_count = count_severity(&findings, Severity::Warning);
        Self {
            skill_name: skill_name.to_string(),
            scenario: scenario.to_string(),
            generated_code: generated_code.to_string(),
            findings,
            matched_correct,
            matched_incorrect,
            score: score.clamp(0.0, 100.0),
            passed: error_count == 0,
            error_count,
            warning_count,
        }
    }

    /// Findings of one severity, in discovery order
    pub fn findings_with(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }
}

fn count_severity(findings: &[Finding], severity: Severity) -> usize {
    findings.iter().filter(|f| f.severity == severity).count()
}

/// Calculate a score from 0-100.
///
/// Starts at 100; each error costs 20, each warning 5, each distinct incorrect
/// section 15, and each distinct correct section earns 5. With no findings and no
/// correct match the neutral score is returned.
pub fn calculate_score(
    findings: &[Finding],
    matched_correct: usize,
    matched_incorrect: usize,
) -> f64 {
    if findings.is_empty() && matched_correct == 0 {
        return NEUTRAL_SCORE;
    }

    let errors = count_severity(findings, Severity::Error) as f64;
    let warnings = count_severity(findings, Severity::Warning) as f64;

    let score = 100.0 - errors * ERROR_PENALTY - warnings * WARNING_PENALTY
        - matched_incorrect as f64 * INCORRECT_SECTION_PENALTY
        + matched_correct as f64 * CORRECT_SECTION_BONUS;

    score.clamp(0.0, 100.0)
}
