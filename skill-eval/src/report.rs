//! Run reporting
//!
//! Structures for summarizing scenario outcomes and rendering them as console
//! text, Markdown or JSON.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::evaluator::{EvaluationResult, Severity};
use crate::runner::ScenarioOutcome;

/// Report for one skill's scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillReport {
    /// Unique identifier for this run
    pub run_id: String,
    pub skill_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// One outcome per scenario, in run order
    pub outcomes: Vec<ScenarioOutcome>,
    pub summary: ReportSummary,
}

impl SkillReport {
    pub fn new(
        skill_name: &str,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        outcomes: Vec<ScenarioOutcome>,
    ) -> Self {
        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
        let summary = ReportSummary::from_outcomes(&outcomes);
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            skill_name: skill_name.to_string(),
            started_at,
            completed_at,
            duration_ms,
            outcomes,
            summary,
        }
    }

    /// No failed and no errored scenario
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0 && self.summary.errored == 0
    }

    /// Outcomes that did not pass
    pub fn failures(&self) -> Vec<&ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.passed()).collect()
    }

    /// Coloured human-readable rendering
    pub fn format_console(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "\n{} {} {}",
            "▶".bright_cyan(),
            self.skill_name.bright_white().bold(),
            format!("(run {})", short_id(&self.run_id)).bright_black()
        );

        for outcome in &self.outcomes {
            match outcome {
                ScenarioOutcome::Completed(result) => {
                    let mark =
                        if result.passed() { "✓".bright_green() } else { "✗".bright_red() };
                    let _ = writeln!(
                        out,
                        "  {} {}  score {:.1}  {} iteration{}  {}",
                        mark,
                        result.scenario.cyan(),
                        result.final_score,
                        result.iteration_count(),
                        if result.iteration_count() == 1 { "" } else { "s" },
                        result.stop_reason.to_string().bright_black()
                    );
                    if let Some(last) = result.last() {
                        let errors = last.findings.iter().filter(|f| f.severity == Severity::Error);
                        for finding in errors {
                            let _ = writeln!(
                                out,
                                "      {} {}",
                                "─".bright_black(),
                                finding.format().red()
                            );
                        }
                    }
                }
                ScenarioOutcome::Failed { scenario, error } => {
                    let _ = writeln!(
                        out,
                        "  {} {}  {}",
                        "!".bright_yellow(),
                        scenario.cyan(),
                        error.yellow()
                    );
                }
            }
        }

        let s = &self.summary;
        let _ = writeln!(
            out,
            "\n  {}/{} passed ({:.1}%), {} failed, {} errored, avg score {:.1}, {} converged  [{} ms]",
            s.passed,
            s.total,
            s.pass_rate * 100.0,
            s.failed,
            s.errored,
            s.avg_final_score,
            s.converged,
            self.duration_ms
        );
        out
    }

    /// Markdown rendering
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let s = &self.summary;

        let _ = writeln!(out, "# Skill Evaluation: {}\n", self.skill_name);
        let _ = writeln!(out, "- Run: `{}`", self.run_id);
        let _ = writeln!(out, "- Started: {}", self.started_at.to_rfc3339());
        let _ = writeln!(out, "- Duration: {} ms", self.duration_ms);
        let _ = writeln!(
            out,
            "- Passed: {}/{} ({:.1}%), failed {}, errored {}",
            s.passed,
            s.total,
            s.pass_rate * 100.0,
            s.failed,
            s.errored
        );
        let _ = writeln!(out, "- Average final score: {:.1}", s.avg_final_score);
        let _ = writeln!(out, "- Converged: {}\n", s.converged);

        out.push_str("| Scenario | Status | Final score | Best | Iterations | Stop reason |\n");
        out.push_str("|---|---|---|---|---|---|\n");
        for outcome in &self.outcomes {
            match outcome {
                ScenarioOutcome::Completed(r) => {
                    let _ = writeln!(
                        out,
                        "| {} | {} | {:.1} | {:.1} (#{}) | {} | {} |",
                        r.scenario,
                        if r.passed() { "✅ passed" } else { "❌ failed" },
                        r.final_score,
                        r.best_score,
                        r.best_iteration,
                        r.iteration_count(),
                        r.stop_reason
                    );
                }
                ScenarioOutcome::Failed { scenario, error } => {
                    let _ = writeln!(
                        out,
                        "| {} | ⚠️ error | - | - | - | {} |",
                        scenario,
                        escape_cell(error)
                    );
                }
            }
        }

        let failures: Vec<_> = self
            .outcomes
            .iter()
            .filter_map(ScenarioOutcome::result)
            .filter(|r| !r.passed())
            .collect();
        if !failures.is_empty() {
            out.push_str("\n## Failures\n");
            for result in failures {
                let _ = writeln!(out, "\n### {}\n", result.scenario);
                if let Some(last) = result.last() {
                    for finding in &last.findings {
                        let _ = writeln!(
                            out,
                            "- **{}** `{}`: {}",
                            finding.severity, finding.rule, finding.message
                        );
                    }
                }
            }
        }

        out
    }

    /// Pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Summary statistics for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    /// Completed with no error finding in the last iteration
    pub passed: usize,
    /// Completed but not passed
    pub failed: usize,
    /// Aborted by a generator failure
    pub errored: usize,
    /// Pass rate (0.0 - 1.0)
    pub pass_rate: f64,
    /// Mean final score over completed scenarios
    pub avg_final_score: f64,
    pub converged: usize,
}

impl ReportSummary {
    pub fn from_outcomes(outcomes: &[ScenarioOutcome]) -> Self {
        let total = outcomes.len();
        let completed: Vec<_> = outcomes.iter().filter_map(ScenarioOutcome::result).collect();
        let passed = completed.iter().filter(|r| r.passed()).count();
        let errored = total - completed.len();
        let failed = completed.len() - passed;
        let pass_rate = if total > 0 { passed as f64 / total as f64 } else { 0.0 };
        let avg_final_score = if completed.is_empty() {
            0.0
        } else {
            completed.iter().map(|r| r.final_score).sum::<f64>() / completed.len() as f64
        };
        let converged = completed.iter().filter(|r| r.converged).count();

        Self { total, passed, failed, errored, pass_rate, avg_final_score, converged }
    }
}

/// Coloured rendering of a single evaluation
pub fn format_evaluation_console(result: &EvaluationResult) -> String {
    let mut out = String::new();
    let status = if result.passed {
        "PASSED".bright_green().bold()
    } else {
        "FAILED".bright_red().bold()
    };
    let _ = writeln!(
        out,
        "{} {} score {:.1}  ({} errors, {} warnings)",
        status,
        result.skill_name.bright_white(),
        result.score,
        result.error_count,
        result.warning_count
    );

    if !result.matched_correct.is_empty() {
        let _ = writeln!(out, "  {} {}", "✓".bright_green(), result.matched_correct.join(", "));
    }
    if !result.matched_incorrect.is_empty() {
        let _ = writeln!(out, "  {} {}", "✗".bright_red(), result.matched_incorrect.join(", "));
    }
    for finding in &result.findings {
        let line = finding.format();
        let line = match finding.severity {
            Severity::Error => line.red(),
            Severity::Warning => line.yellow(),
            Severity::Info => line.normal(),
        };
        let _ = writeln!(out, "  {} {}", "─".bright_black(), line);
    }
    out
}

/// Markdown rendering of a single evaluation
pub fn evaluation_to_markdown(result: &EvaluationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Evaluation: {}\n", result.skill_name);
    let _ = writeln!(
        out,
        "- Result: {}\n- Score: {:.1}\n- Errors: {}\n- Warnings: {}",
        if result.passed { "✅ passed" } else { "❌ failed" },
        result.score,
        result.error_count,
        result.warning_count
    );
    if !result.matched_correct.is_empty() {
        let _ = writeln!(out, "- Correct sections: {}", result.matched_correct.join(", "));
    }
    if !result.matched_incorrect.is_empty() {
        let _ = writeln!(out, "- Incorrect sections: {}", result.matched_incorrect.join(", "));
    }
    if !result.findings.is_empty() {
        out.push_str("\n## Findings\n\n");
        for finding in &result.findings {
            let _ = writeln!(
                out,
                "- **{}** `{}`: {}",
                finding.severity, finding.rule, finding.message
            );
        }
    }
    out
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{IterationResult, RalphLoopResult, StopReason};

    fn completed(name: &str, score: f64, passed: bool, reason: StopReason) -> ScenarioOutcome {
        ScenarioOutcome::Completed(RalphLoopResult {
            skill_name: "azure-cosmos-py".into(),
            scenario: name.into(),
            final_score: score,
            iterations: vec![IterationResult {
                iteration: 1,
                score,
                passed,
                findings: vec![],
                generated_code: String::new(),
                feedback_provided: String::new(),
                duration_ms: 1,
            }],
            improvement: 0.0,
            converged: reason.converged(),
            best_iteration: 1,
            best_score: score,
            stop_reason: reason,
            total_duration_ms: 1,
        })
    }

    fn report() -> SkillReport {
        let now = Utc::now();
        SkillReport::new(
            "azure-cosmos-py",
            now,
            now,
            vec![
                completed("a", 100.0, true, StopReason::PerfectScore),
                completed("b", 40.0, false, StopReason::ScoreRegression),
                ScenarioOutcome::Failed { scenario: "c".into(), error: "boom | bad".into() },
            ],
        )
    }

    #[test]
    fn test_summary_counts() {
        let report = report();
        let s = &report.summary;
        assert_eq!((s.total, s.passed, s.failed, s.errored, s.converged), (3, 1, 1, 1, 1));
        assert!((s.pass_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.avg_final_score, 70.0);
        assert!(!report.all_passed());
        assert_eq!(report.failures().len(), 2);
    }

    #[test]
    fn test_empty_summary() {
        let summary = ReportSummary::from_outcomes(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.pass_rate, 0.0);
    }

    #[test]
    fn test_markdown_and_json() {
        let report = report();
        let md = report.to_markdown();
        assert!(md.contains("| a | ✅ passed | 100.0 |"));
        assert!(md.contains("boom \\| bad"));
        assert!(md.contains("## Failures"));

        let json = report.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["outcomes"][0]["status"], "completed");
        assert_eq!(parsed["outcomes"][0]["stop_reason"], "perfect_score");
        assert_eq!(parsed["outcomes"][2]["status"], "failed");
    }

    #[test]
    fn test_console_lists_every_scenario() {
        colored::control::set_override(false);
        let text = report().format_console();
        assert!(text.contains("a  score 100.0  1 iteration  perfect_score"));
        assert!(text.contains("c  boom | bad"));
    }
}
