//! Generate → evaluate → feedback loop
//!
//! Each run is strictly sequential: the prompt of iteration `i` carries the
//! feedback of iteration `i - 1`. Separate runs share nothing and may execute
//! concurrently.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug};

use crate::config::LoopConfig;
use crate::error::Result;
use crate::evaluator::{CodeEvaluator, EvaluationResult, Finding, Severity};
use crate::feedback::FeedbackBuilder;
use crate::generator::{CodeGenerator, GenerationRequest};
use crate::scenario::Scenario;
use crate::telemetry::{
    generation_span, log_generation_failure, log_iteration_start, log_loop_stop,
    loop_iteration_span, scenario_span,
};

/// Why a loop run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Score reached 100 with early stop enabled
    PerfectScore,
    /// Score reached the quality threshold
    QualityThresholdMet,
    /// Score dropped below the previous iteration's
    ScoreRegression,
    /// Score rose by less than the improvement threshold
    NoImprovement,
    /// Iteration budget used up
    MaxIterationsReached,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::PerfectScore => "perfect_score",
            StopReason::QualityThresholdMet => "quality_threshold_met",
            StopReason::ScoreRegression => "score_regression",
            StopReason::NoImprovement => "no_improvement",
            StopReason::MaxIterationsReached => "max_iterations_reached",
        }
    }

    /// Whether this reason means the quality bar was reached
    pub fn converged(&self) -> bool {
        matches!(self, StopReason::PerfectScore | StopReason::QualityThresholdMet)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether to stop after the latest score in `scores`.
///
/// Conditions are checked in a fixed order and the first match wins: perfect
/// score, quality threshold, regression, plateau. Regression and plateau need at
/// least two scores. `None` means continue.
pub fn decide_stop(config: &LoopConfig, scores: &[f64]) -> Option<StopReason> {
    let &latest = scores.last()?;

    if config.early_stop_on_perfect && latest >= 100.0 {
        return Some(StopReason::PerfectScore);
    }
    if latest >= config.quality_threshold {
        return Some(StopReason::QualityThresholdMet);
    }
    if let [.., previous, _] = scores {
        let delta = latest - previous;
        if delta < 0.0 {
            return Some(StopReason::ScoreRegression);
        }
        if delta < config.improvement_threshold {
            return Some(StopReason::NoImprovement);
        }
    }

    None
}

/// Append feedback from the previous iteration to the original prompt
pub fn compose_prompt(original: &str, feedback: &str) -> String {
    format!("{}\n\n{}\n\n{}", original.trim_end(), FEEDBACK_PREAMBLE, feedback)
}

const FEEDBACK_PREAMBLE: &str = "Your previous attempt was evaluated against the acceptance \
     criteria. Address the following before answering again:";

/// One executed iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    /// 1-based
    pub iteration: usize,
    pub score: f64,
    pub passed: bool,
    pub findings: Vec<Finding>,
    pub generated_code: String,
    /// Feedback built from this iteration's evaluation, handed to the next one
    pub feedback_provided: String,
    pub duration_ms: u64,
}

impl IterationResult {
    fn from_evaluation(
        iteration: usize,
        evaluation: EvaluationResult,
        feedback: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            iteration,
            score: evaluation.score,
            passed: evaluation.passed,
            findings: evaluation.findings,
            generated_code: evaluation.generated_code,
            feedback_provided: feedback,
            duration_ms,
        }
    }

    pub fn error_count(&self) -> usize {
        self.findings.iter().filter(|f| f.severity == Severity::Error).count()
    }
}

/// Outcome of one loop run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RalphLoopResult {
    pub skill_name: String,
    pub scenario: String,
    /// Score of the last executed iteration, not the best one
    pub final_score: f64,
    pub iterations: Vec<IterationResult>,
    /// `final_score - first score`; may be negative
    pub improvement: f64,
    pub converged: bool,
    /// 1-based; the earliest iteration wins ties
    pub best_iteration: usize,
    pub best_score: f64,
    pub stop_reason: StopReason,
    pub total_duration_ms: u64,
}

impl RalphLoopResult {
    /// Whether the last iteration has no error finding
    pub fn passed(&self) -> bool {
        self.iterations.last().is_some_and(|i| i.passed)
    }

    pub fn iteration_count(&self) -> usize {
        self.iterations.len()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.iterations.iter().map(|i| i.score).collect()
    }

    pub fn last(&self) -> Option<&IterationResult> {
        self.iterations.last()
    }
}

/// Drives the generate → evaluate → feedback loop for one skill
#[derive(Clone)]
pub struct RalphLoopController {
    evaluator: Arc<CodeEvaluator>,
    generator: Arc<dyn CodeGenerator>,
    config: LoopConfig,
    feedback: FeedbackBuilder,
    generation_config: Option<serde_json::Value>,
}

impl RalphLoopController {
    pub fn new(
        evaluator: Arc<CodeEvaluator>,
        generator: Arc<dyn CodeGenerator>,
        config: LoopConfig,
    ) -> Self {
        Self {
            evaluator,
            generator,
            config,
            feedback: FeedbackBuilder::default(),
            generation_config: None,
        }
    }

    /// Settings forwarded to the generator on every request
    pub fn with_generation_config(mut self, config: serde_json::Value) -> Self {
        self.generation_config = Some(config);
        self
    }

    pub fn with_feedback_builder(mut self, feedback: FeedbackBuilder) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &CodeEvaluator {
        &self.evaluator
    }

    /// Run the loop for a bare prompt.
    ///
    /// Generator failures abort the run and are returned as errors.
    pub async fn run(&self, prompt: &str, scenario_id: &str) -> Result<RalphLoopResult> {
        let span = scenario_span(self.evaluator.skill_name(), scenario_id);
        self.run_loop(prompt, scenario_id, None).instrument(span).await
    }

    /// Run the loop for a scenario, applying its expected and forbidden patterns.
    pub async fn run_scenario(&self, scenario: &Scenario) -> Result<RalphLoopResult> {
        let span = scenario_span(self.evaluator.skill_name(), &scenario.name);
        self.run_loop(&scenario.prompt, &scenario.name, Some(scenario)).instrument(span).await
    }

    async fn run_loop(
        &self,
        prompt: &str,
        scenario_id: &str,
        scenario: Option<&Scenario>,
    ) -> Result<RalphLoopResult> {
        self.config.validate()?;

        let skill = self.evaluator.skill_name();
        let max_iterations = self.config.max_iterations;
        let started = Instant::now();

        let mut iterations: Vec<IterationResult> = Vec::with_capacity(max_iterations);
        let mut scores: Vec<f64> = Vec::with_capacity(max_iterations);
        let mut best: Option<(f64, usize)> = None;
        let mut stop_reason = StopReason::MaxIterationsReached;

        for iteration in 1..=max_iterations {
            log_iteration_start(skill, iteration);
            let iteration_span = loop_iteration_span(iteration, max_iterations);
            let iteration_started = Instant::now();

            let previous_feedback = iterations.last().map(|i| i.feedback_provided.as_str());
            let current_prompt = match previous_feedback {
                Some(feedback) if self.config.include_feedback && !feedback.is_empty() => {
                    compose_prompt(prompt, feedback)
                }
                _ => prompt.to_string(),
            };

            let mut request =
                GenerationRequest::new(current_prompt, skill).with_scenario(scenario_id);
            if let Some(config) = &self.generation_config {
                request = request.with_config(config.clone());
            }

            let span = iteration_span.in_scope(|| generation_span(self.generator.name(), skill));
            let generated = match self.generator.generate(&request).instrument(span).await
            {
                Ok(generated) => generated,
                Err(e) => {
                    log_generation_failure(self.generator.name(), &e.to_string());
                    return Err(e);
                }
            };

            let evaluation = iteration_span.in_scope(|| match scenario {
                Some(scenario) => self.evaluator.evaluate_scenario(&generated.code, scenario),
                None => self.evaluator.evaluate(&generated.code, scenario_id),
            });
            let feedback = self.feedback.build(&evaluation, Some(self.evaluator.criteria()));
            let score = evaluation.score;

            if best.is_none_or(|(best_score, _)| score > best_score) {
                best = Some((score, iteration));
            }

            debug!(
                skill = %skill,
                scenario = %scenario_id,
                iteration = iteration,
                score = score,
                errors = evaluation.error_count,
                "Iteration evaluated"
            );

            let duration_ms = iteration_started.elapsed().as_millis() as u64;
            iterations.push(IterationResult::from_evaluation(
                iteration,
                evaluation,
                feedback,
                duration_ms,
            ));
            scores.push(score);

            if let Some(reason) = decide_stop(&self.config, &scores) {
                stop_reason = reason;
                break;
            }
        }

        let first_score = scores.first().copied().unwrap_or_default();
        let final_score = scores.last().copied().unwrap_or_default();
        let (best_score, best_iteration) = best.unwrap_or_default();

        log_loop_stop(skill, scenario_id, stop_reason, iterations.len(), final_score);

        Ok(RalphLoopResult {
            skill_name: skill.to_string(),
            scenario: scenario_id.to_string(),
            final_score,
            improvement: final_score - first_score,
            converged: stop_reason.converged(),
            best_iteration,
            best_score,
            stop_reason,
            iterations,
            total_duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

impl std::fmt::Debug for RalphLoopController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RalphLoopController")
            .field("skill", &self.evaluator.skill_name())
            .field("generator", &self.generator.name())
            .field("config", &self.config)
            .finish()
    }
}
