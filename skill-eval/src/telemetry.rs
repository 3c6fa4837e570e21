//! Telemetry instrumentation for evaluation runs.
//!
//! This module provides:
//! - Span helpers for tracing evaluation, generation and loop iterations
//! - Metrics for tracking iterations, evaluations and collaborator failures
//!
//! ## Spans
//!
//! - `skill_eval.scenario` - One scenario run (all iterations)
//! - `skill_eval.loop_iteration` - Each generate → evaluate → feedback iteration
//! - `skill_eval.generation` - A call into the code generator
//! - `skill_eval.evaluation` - A single evaluation pass
//!
//! ## Metrics
//!
//! - `skill_eval_iterations_total` - Loop iterations (counter)
//! - `skill_eval_evaluations_total` - Evaluation passes (counter)
//! - `skill_eval_generation_failures` - Generator errors (counter)
//! - `skill_eval_converged_runs` - Runs that reached the quality bar (counter)
//! - `skill_eval_score` - Score of each evaluation (histogram)

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{Span, info_span};

use crate::controller::StopReason;

/// Global metrics instance
static METRICS: OnceLock<EvalMetrics> = OnceLock::new();

/// Global OpenTelemetry metrics instance
static OTEL_METRICS: OnceLock<EvalOtelMetrics> = OnceLock::new();

/// Get or initialize the global metrics instance.
pub fn metrics() -> &'static EvalMetrics {
    METRICS.get_or_init(EvalMetrics::new)
}

/// Get or initialize the global OpenTelemetry metrics instance.
pub fn otel_metrics() -> &'static EvalOtelMetrics {
    OTEL_METRICS.get_or_init(|| {
        let meter = opentelemetry::global::meter("skill_eval");
        EvalOtelMetrics::new(meter)
    })
}

/// OpenTelemetry instruments for evaluation runs.
pub struct EvalOtelMetrics {
    pub iterations_counter: Counter<u64>,
    pub evaluations_counter: Counter<u64>,
    pub generation_failures_counter: Counter<u64>,
    pub converged_counter: Counter<u64>,
    pub score_histogram: Histogram<f64>,
}

impl EvalOtelMetrics {
    /// Create the instruments on the given meter.
    pub fn new(meter: Meter) -> Self {
        let iterations_counter = meter
            .u64_counter("skill_eval_iterations_total")
            .with_description("Total number of feedback loop iterations")
            .init();

        let evaluations_counter = meter
            .u64_counter("skill_eval_evaluations_total")
            .with_description("Total number of evaluation passes")
            .init();

        let generation_failures_counter = meter
            .u64_counter("skill_eval_generation_failures")
            .with_description("Code generator calls that returned an error")
            .init();

        let converged_counter = meter
            .u64_counter("skill_eval_converged_runs")
            .with_description("Loop runs that reached the quality threshold")
            .init();

        let score_histogram = meter
            .f64_histogram("skill_eval_score")
            .with_description("Evaluation score (0-100)")
            .init();

        Self {
            iterations_counter,
            evaluations_counter,
            generation_failures_counter,
            converged_counter,
            score_histogram,
        }
    }

    pub fn record_iteration(&self, skill: &str) {
        self.iterations_counter.add(1, &[KeyValue::new("skill", skill.to_string())]);
    }

    pub fn record_evaluation(&self, skill: &str, score: f64) {
        let attrs = [KeyValue::new("skill", skill.to_string())];
        self.evaluations_counter.add(1, &attrs);
        self.score_histogram.record(score, &attrs);
    }

    pub fn record_generation_failure(&self, generator: &str) {
        self.generation_failures_counter
            .add(1, &[KeyValue::new("generator", generator.to_string())]);
    }

    pub fn record_converged(&self, skill: &str, reason: StopReason) {
        self.converged_counter.add(
            1,
            &[
                KeyValue::new("skill", skill.to_string()),
                KeyValue::new("stop_reason", reason.as_str()),
            ],
        );
    }
}

/// Process-local counters, readable without an OpenTelemetry exporter.
#[derive(Debug)]
pub struct EvalMetrics {
    pub iterations_total: AtomicU64,
    pub evaluations_total: AtomicU64,
    pub generation_failures: AtomicU64,
    pub converged_runs: AtomicU64,
}

impl EvalMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            iterations_total: AtomicU64::new(0),
            evaluations_total: AtomicU64::new(0),
            generation_failures: AtomicU64::new(0),
            converged_runs: AtomicU64::new(0),
        }
    }

    pub fn inc_iterations(&self) {
        self.iterations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evaluations(&self) {
        self.evaluations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_generation_failures(&self) {
        self.generation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_converged(&self) {
        self.converged_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_iterations(&self) -> u64 {
        self.iterations_total.load(Ordering::Relaxed)
    }

    pub fn get_evaluations(&self) -> u64 {
        self.evaluations_total.load(Ordering::Relaxed)
    }

    pub fn get_generation_failures(&self) -> u64 {
        self.generation_failures.load(Ordering::Relaxed)
    }

    pub fn get_converged(&self) -> u64 {
        self.converged_runs.load(Ordering::Relaxed)
    }

    /// Reset all metrics (useful for testing).
    pub fn reset(&self) {
        self.iterations_total.store(0, Ordering::Relaxed);
        self.evaluations_total.store(0, Ordering::Relaxed);
        self.generation_failures.store(0, Ordering::Relaxed);
        self.converged_runs.store(0, Ordering::Relaxed);
    }
}

impl Default for EvalMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Span Helpers
// ============================================================================

/// Create a span for one scenario run.
pub fn scenario_span(skill: &str, scenario: &str) -> Span {
    info_span!("skill_eval.scenario", otel.name = "Scenario", skill = %skill, scenario = %scenario)
}

/// Create a span for a loop iteration.
pub fn loop_iteration_span(iteration: usize, max_iterations: usize) -> Span {
    info_span!(
        "skill_eval.loop_iteration",
        otel.name = "Loop Iteration",
        iteration = %iteration,
        max_iterations = %max_iterations
    )
}

/// Create a span for a code generator call.
pub fn generation_span(generator: &str, skill: &str) -> Span {
    info_span!(
        "skill_eval.generation",
        otel.name = "Code Generation",
        generator = %generator,
        skill = %skill
    )
}

/// Create a span for an evaluation pass.
pub fn evaluation_span(skill: &str, scenario: &str) -> Span {
    info_span!(
        "skill_eval.evaluation",
        otel.name = "Evaluation",
        skill = %skill,
        scenario = %scenario
    )
}

// ============================================================================
// Timing Helpers
// ============================================================================

/// A guard that records duration when dropped.
pub struct TimingGuard {
    start: Instant,
    name: String,
}

impl TimingGuard {
    /// Create a new timing guard.
    pub fn new(name: impl Into<String>) -> Self {
        Self { start: Instant::now(), name: name.into() }
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        tracing::debug!(
            target: "skill_eval.timing",
            name = %self.name,
            duration_ms = %self.start.elapsed().as_millis(),
            "Operation completed"
        );
    }
}

/// Start timing an operation.
pub fn start_timing(name: impl Into<String>) -> TimingGuard {
    TimingGuard::new(name)
}

// ============================================================================
// Event Logging Helpers
// ============================================================================

/// Log iteration start event.
pub fn log_iteration_start(skill: &str, iteration: usize) {
    metrics().inc_iterations();
    otel_metrics().record_iteration(skill);
    tracing::info!(
        target: "skill_eval.events",
        event = "iteration_start",
        skill = %skill,
        iteration = %iteration,
        "Starting iteration"
    );
}

/// Log the outcome of an evaluation pass.
pub fn log_evaluation(skill: &str, scenario: &str, score: f64, errors: usize, warnings: usize) {
    metrics().inc_evaluations();
    otel_metrics().record_evaluation(skill, score);
    tracing::info!(
        target: "skill_eval.events",
        event = "evaluation_complete",
        skill = %skill,
        scenario = %scenario,
        score = %score,
        errors = %errors,
        warnings = %warnings,
        "Evaluation completed"
    );
}

/// Log loop termination.
pub fn log_loop_stop(
    skill: &str,
    scenario: &str,
    reason: StopReason,
    iterations: usize,
    score: f64,
) {
    if reason.converged() {
        metrics().inc_converged();
        otel_metrics().record_converged(skill, reason);
    }
    tracing::info!(
        target: "skill_eval.events",
        event = "loop_stop",
        skill = %skill,
        scenario = %scenario,
        stop_reason = %reason,
        iterations = %iterations,
        final_score = %score,
        "Feedback loop stopped"
    );
}

/// Log a failed generator call.
pub fn log_generation_failure(generator: &str, error: &str) {
    metrics().inc_generation_failures();
    otel_metrics().record_generation_failure(generator);
    tracing::error!(
        target: "skill_eval.events",
        event = "generation_failed",
        generator = %generator,
        error = %error,
        "Code generation failed"
    );
}

/// Log scenario completion.
pub fn log_scenario_complete(skill: &str, scenario: &str, passed: bool, duration_ms: u64) {
    if passed {
        tracing::info!(
            target: "skill_eval.events",
            event = "scenario_complete",
            skill = %skill,
            scenario = %scenario,
            passed = %passed,
            duration_ms = %duration_ms,
            "Scenario passed"
        );
    } else {
        tracing::warn!(
            target: "skill_eval.events",
            event = "scenario_complete",
            skill = %skill,
            scenario = %scenario,
            passed = %passed,
            duration_ms = %duration_ms,
            "Scenario failed"
        );
    }
}
