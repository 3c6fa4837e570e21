//! # skill-eval
//!
//! Acceptance-criteria evaluation for generated code, with an iterative
//! generate → evaluate → feedback loop.
//!
//! Each skill documents correct and incorrect usage of an SDK in an
//! acceptance-criteria markdown file. This crate parses those exemplars, scores
//! generated code against them, and feeds the findings back to a code generator
//! until the code converges, plateaus, regresses or runs out of attempts.
//!
//! ## Features
//!
//! - **Criteria parsing**: `## ` sections, ✅/❌ markers and fenced exemplars
//! - **Evaluation**: syntax gate, conjunctive import matching, exact matching for
//!   anti-patterns and flexible matching for recommended patterns
//! - **Feedback**: deterministic, priority-ordered text for the next attempt
//! - **Feedback loop**: stop decisions by perfect score, threshold, regression or plateau
//! - **Scenarios**: YAML scenario files run concurrently, reported as text, Markdown or JSON
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use skill_eval::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let criteria = CriteriaLoader::new(".").load("azure-cosmos-py")?;
//!     let evaluator = Arc::new(CodeEvaluator::new(Arc::new(criteria)));
//!     let generator = Arc::new(MockGenerator::new());
//!
//!     let controller = RalphLoopController::new(evaluator, generator, LoopConfig::default());
//!     let result = controller.run("Create a Cosmos DB client", "basic").await?;
//!
//!     println!("{} after {} iterations", result.stop_reason, result.iterations.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod criteria;
pub mod error;
pub mod evaluator;
pub mod feedback;
pub mod generator;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod telemetry;

// Re-exports
pub use config::{HarnessConfig, LoopConfig, ValidationError};
pub use controller::{
    IterationResult, RalphLoopController, RalphLoopResult, StopReason, decide_stop,
};
pub use criteria::{AcceptanceCriteria, CodePattern, CriteriaLoader, Language, ValidationRule};
pub use error::{EvalError, Result};
pub use evaluator::{CodeEvaluator, EvaluationResult, Finding, Severity};
pub use feedback::{FeedbackBuilder, build_feedback};
pub use generator::{
    CodeGenerator, GeneratedCode, GenerationRequest, MockGenerator, ScriptedGenerator,
    TimeoutGenerator, extract_code_block,
};
pub use report::{ReportSummary, SkillReport};
pub use runner::{ScenarioOutcome, SkillRunner, evaluate_file};
pub use scenario::{GenerationConfig, Scenario, ScenarioFilter, ScenarioSet};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{HarnessConfig, LoopConfig};
    pub use crate::controller::{RalphLoopController, RalphLoopResult, StopReason};
    pub use crate::criteria::{AcceptanceCriteria, CodePattern, CriteriaLoader, ValidationRule};
    pub use crate::error::{EvalError, Result};
    pub use crate::evaluator::{CodeEvaluator, EvaluationResult, Finding, Severity};
    pub use crate::feedback::build_feedback;
    pub use crate::generator::{CodeGenerator, GeneratedCode, GenerationRequest, MockGenerator};
    pub use crate::report::SkillReport;
    pub use crate::runner::{ScenarioOutcome, SkillRunner};
    pub use crate::scenario::{Scenario, ScenarioFilter, ScenarioSet};
}
