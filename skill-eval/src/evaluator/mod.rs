//! Code evaluation against acceptance criteria
//!
//! A single evaluation pass runs, in order:
//!
//! 1. the syntax gate (a failure short-circuits with score 0),
//! 2. incorrect exemplars: import-only ones by import conjunction, mixed ones by
//!    import conjunction plus exact usage match, pure usage ones by exact match,
//! 3. correct exemplars by flexible match,
//! 4. per-rule checks (incorrect exemplars, required, forbidden patterns and imports),
//! 5. scenario expectations, when evaluating a [`Scenario`],
//! 6. scoring.
//!
//! Evaluation is deterministic: identical inputs yield identical results.

pub mod imports;
pub mod matching;
mod result;
pub mod syntax;

pub use result::{
    CORRECT_SECTION_BONUS, ERROR_PENALTY, EvaluationResult, Finding, INCORRECT_SECTION_PENALTY,
    NEUTRAL_SCORE, Severity, WARNING_PENALTY, calculate_score,
};

use crate::criteria::{AcceptanceCriteria, CodePattern, Language, ValidationRule};
use crate::scenario::Scenario;
use crate::telemetry::{evaluation_span, log_evaluation};
use imports::{ImportDecl, parse_import_statement};
use matching::{CodeView, MatchStrategy, PatternShape};
use std::sync::Arc;
use syntax::check_syntax;

/// Maximum characters of exemplar code attached to a finding.
pub const SNIPPET_LIMIT: usize = 100;

/// An exemplar prepared for matching
#[derive(Debug, Clone)]
struct CompiledPattern {
    section: String,
    code: String,
    shape: PatternShape,
    strategy: MatchStrategy,
}

impl CompiledPattern {
    fn new(pattern: &CodePattern, fallback: &Language) -> Self {
        Self {
            section: pattern.section.clone(),
            code: pattern.code.clone(),
            shape: PatternShape::classify(pattern, fallback),
            strategy: MatchStrategy::for_pattern(pattern),
        }
    }

    /// Returns `Some(line)` on a match; `line` is the first matched code line, if known.
    fn find(&self, view: &CodeView) -> Option<Option<usize>> {
        let shape = &self.shape;
        if shape.is_import_only() {
            return view.declares_all(&shape.imports).then_some(None);
        }
        if !shape.imports.is_empty() && !view.declares_all(&shape.imports) {
            return None;
        }
        self.strategy.find(&shape.usage, &view.lines).map(Some)
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    incorrect: Vec<CompiledPattern>,
    required_patterns: Vec<String>,
    forbidden_patterns: Vec<String>,
    forbidden_imports: Vec<(String, Vec<ImportDecl>)>,
}

impl CompiledRule {
    fn new(rule: &ValidationRule, language: &Language) -> Self {
        Self {
            name: rule.name.clone(),
            incorrect: rule
                .incorrect_patterns
                .iter()
                .map(|p| CompiledPattern::new(p, language))
                .collect(),
            required_patterns: rule.required_patterns.clone(),
            forbidden_patterns: rule.forbidden_patterns.clone(),
            forbidden_imports: rule
                .forbidden_imports
                .iter()
                .map(|stmt| (stmt.clone(), parse_import_statement(stmt, language)))
                .collect(),
        }
    }
}

/// Findings and matched sections gathered during one pass
#[derive(Debug, Default)]
struct Accumulator {
    findings: Vec<Finding>,
    matched_correct: Vec<String>,
    matched_incorrect: Vec<String>,
}

impl Accumulator {
    fn push_section(sections: &mut Vec<String>, section: &str) {
        if !sections.iter().any(|s| s == section) {
            sections.push(section.to_string());
        }
    }
}

/// Evaluates generated code against one skill's acceptance criteria
#[derive(Debug, Clone)]
pub struct CodeEvaluator {
    criteria: Arc<AcceptanceCriteria>,
    incorrect: Vec<CompiledPattern>,
    correct: Vec<CompiledPattern>,
    rules: Vec<CompiledRule>,
}

impl CodeEvaluator {
    /// Create an evaluator; exemplars are classified once here.
    pub fn new(criteria: Arc<AcceptanceCriteria>) -> Self {
        let language = criteria.language.clone();
        let compile = |patterns: &[CodePattern]| {
            patterns.iter().map(|p| CompiledPattern::new(p, &language)).collect::<Vec<_>>()
        };

        Self {
            incorrect: compile(&criteria.incorrect_patterns),
            correct: compile(&criteria.correct_patterns),
            rules: criteria.rules.iter().map(|r| CompiledRule::new(r, &language)).collect(),
            criteria,
        }
    }

    pub fn criteria(&self) -> &AcceptanceCriteria {
        &self.criteria
    }

    pub fn skill_name(&self) -> &str {
        &self.criteria.skill_name
    }

    /// Evaluate `code` for the scenario named `scenario`.
    pub fn evaluate(&self, code: &str, scenario: &str) -> EvaluationResult {
        self.evaluate_with(code, scenario, None)
    }

    /// Evaluate `code`, also applying the scenario's expected and forbidden substrings.
    pub fn evaluate_scenario(&self, code: &str, scenario: &Scenario) -> EvaluationResult {
        self.evaluate_with(code, &scenario.name, Some(scenario))
    }

    fn evaluate_with(
        &self,
        code: &str,
        scenario_name: &str,
        scenario: Option<&Scenario>,
    ) -> EvaluationResult {
        let _span = evaluation_span(self.skill_name(), scenario_name).entered();

        let result = match check_syntax(code, &self.criteria.language) {
            Some(issue) => {
                let finding = Finding::error("syntax", issue.message)
                    .with_line(issue.line)
                    .with_suggestion("Fix the syntax error before addressing other findings");
                EvaluationResult::syntax_failure(self.skill_name(), scenario_name, code, finding)
            }
            None => {
                let view = CodeView::new(code, &self.criteria.language);
                let mut acc = Accumulator::default();

                self.check_incorrect(&view, &mut acc);
                self.check_correct(&view, &mut acc);
                self.check_rules(code, &view, &mut acc);
                if let Some(scenario) = scenario {
                    check_scenario(code, scenario, &mut acc);
                }

                EvaluationResult::scored(
                    self.skill_name(),
                    scenario_name,
                    code,
                    acc.findings,
                    acc.matched_correct,
                    acc.matched_incorrect,
                )
            }
        };

        log_evaluation(
            self.skill_name(),
            scenario_name,
            result.score,
            result.error_count,
            result.warning_count,
        );
        result
    }

    fn check_incorrect(&self, view: &CodeView, acc: &mut Accumulator) {
        for pattern in &self.incorrect {
            let Some(line) = pattern.find(view) else {
                continue;
            };

            let finding = if pattern.shape.is_import_only() {
                let combination = pattern
                    .shape
                    .imports
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                Finding::error("imports", format!("Incorrect import combination: {}", combination))
                    .with_suggestion(format!(
                        "Check acceptance criteria section: {}",
                        pattern.section
                    ))
            } else {
                Finding::error(
                    format!("pattern:{}", pattern.section),
                    format!("Incorrect pattern found from section: {}", pattern.section),
                )
                .with_suggestion(format!(
                    "Review the correct usage in section: {}",
                    pattern.section
                ))
                .with_line(line)
            };

            acc.findings.push(finding.with_snippet(truncate(&pattern.code, SNIPPET_LIMIT)));
            Accumulator::push_section(&mut acc.matched_incorrect, &pattern.section);
        }
    }

    fn check_correct(&self, view: &CodeView, acc: &mut Accumulator) {
        for pattern in &self.correct {
            if pattern.find(view).is_some() {
                Accumulator::push_section(&mut acc.matched_correct, &pattern.section);
            }
        }
    }

    fn check_rules(&self, code: &str, view: &CodeView, acc: &mut Accumulator) {
        for rule in &self.rules {
            for pattern in &rule.incorrect {
                if let Some(line) = pattern.find(view) {
                    acc.findings.push(
                        Finding::error(&rule.name, format!("Incorrect usage in {}", rule.name))
                            .with_snippet(truncate(&pattern.code, SNIPPET_LIMIT))
                            .with_line(line),
                    );
                }
            }

            for required in &rule.required_patterns {
                if !code.contains(required.as_str()) {
                    acc.findings.push(
                        Finding::warning(
                            &rule.name,
                            format!("Missing recommended pattern: {}", required),
                        )
                        .with_suggestion(format!("Consider using: {}", required)),
                    );
                }
            }

            for forbidden in &rule.forbidden_patterns {
                if let Some(line) = line_of(code, forbidden) {
                    acc.findings.push(
                        Finding::error(
                            &rule.name,
                            format!("Forbidden pattern present: {}", forbidden),
                        )
                        .with_line(Some(line)),
                    );
                }
            }

            for (statement, decls) in &rule.forbidden_imports {
                if view.declares_all(decls) {
                    acc.findings.push(
                        Finding::error(&rule.name, format!("Forbidden import: {}", statement))
                            .with_suggestion(format!("Remove `{}`", statement)),
                    );
                }
            }
        }
    }
}

fn check_scenario(code: &str, scenario: &Scenario, acc: &mut Accumulator) {
    for forbidden in &scenario.forbidden_patterns {
        if let Some(line) = line_of(code, forbidden) {
            acc.findings.push(
                Finding::error(
                    "scenario:forbidden",
                    format!("Forbidden pattern present: {}", forbidden),
                )
                .with_line(Some(line)),
            );
        }
    }

    for expected in &scenario.expected_patterns {
        if !code.contains(expected.as_str()) {
            acc.findings.push(
                Finding::warning(
                    "scenario:expected",
                    format!("Expected pattern missing: {}", expected),
                )
                .with_suggestion(format!("Include: {}", expected)),
            );
        }
    }
}

/// 1-based line on which `needle` first starts, if it occurs at all
fn line_of(code: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    code.find(needle).map(|idx| code[..idx].matches('\n').count() + 1)
}

/// Truncate to at most `limit` characters
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
