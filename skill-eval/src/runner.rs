//! Scenario runner
//!
//! Binds one skill's criteria, an evaluator, a generator and a loop config, and
//! runs scenarios through the feedback loop. Generator failures are recorded as
//! [`ScenarioOutcome::Failed`] so they stay distinguishable from low scores.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{HarnessConfig, LoopConfig};
use crate::controller::{RalphLoopController, RalphLoopResult};
use crate::criteria::{AcceptanceCriteria, CriteriaLoader};
use crate::error::Result;
use crate::evaluator::{CodeEvaluator, EvaluationResult};
use crate::generator::{CodeGenerator, TimeoutGenerator};
use crate::report::SkillReport;
use crate::scenario::{GenerationConfig, Scenario, ScenarioFilter, ScenarioSet};
use crate::telemetry::{log_scenario_complete, start_timing};

/// Result of running one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// The loop ran to a stop reason
    Completed(RalphLoopResult),
    /// The run was aborted by a generator failure
    Failed { scenario: String, error: String },
}

impl ScenarioOutcome {
    pub fn scenario(&self) -> &str {
        match self {
            ScenarioOutcome::Completed(result) => &result.scenario,
            ScenarioOutcome::Failed { scenario, .. } => scenario,
        }
    }

    /// Completed, and the last iteration has no error finding
    pub fn passed(&self) -> bool {
        matches!(self, ScenarioOutcome::Completed(result) if result.passed())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ScenarioOutcome::Failed { .. })
    }

    pub fn result(&self) -> Option<&RalphLoopResult> {
        match self {
            ScenarioOutcome::Completed(result) => Some(result),
            ScenarioOutcome::Failed { .. } => None,
        }
    }
}

/// Runs scenarios for one skill
#[derive(Debug, Clone)]
pub struct SkillRunner {
    controller: RalphLoopController,
    concurrency: usize,
}

impl SkillRunner {
    pub fn new(
        criteria: AcceptanceCriteria,
        generator: Arc<dyn CodeGenerator>,
        loop_config: LoopConfig,
    ) -> Self {
        let evaluator = Arc::new(CodeEvaluator::new(Arc::new(criteria)));
        Self {
            controller: RalphLoopController::new(evaluator, generator, loop_config),
            concurrency: 1,
        }
    }

    /// Build a runner from harness config, loading the skill's criteria from
    /// `config.base_path` and applying the generation timeout if one is set.
    pub fn from_config(
        config: &HarnessConfig,
        skill: &str,
        generator: Arc<dyn CodeGenerator>,
    ) -> Result<Self> {
        config.validate()?;
        let criteria = CriteriaLoader::new(&config.base_path).load(skill)?;

        let generator: Arc<dyn CodeGenerator> = match config.generation_timeout_secs {
            Some(secs) => Arc::new(TimeoutGenerator::new(generator, Duration::from_secs(secs))),
            None => generator,
        };

        Ok(Self::new(criteria, generator, config.loop_config.clone())
            .with_concurrency(config.concurrency))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Settings forwarded to the generator with every request
    pub fn with_generation_config(mut self, config: &GenerationConfig) -> Self {
        if *config != GenerationConfig::default() {
            if let Ok(value) = serde_json::to_value(config) {
                self.controller = self.controller.with_generation_config(value);
            }
        }
        self
    }

    pub fn criteria(&self) -> &AcceptanceCriteria {
        self.controller.evaluator().criteria()
    }

    pub fn skill_name(&self) -> &str {
        self.controller.evaluator().skill_name()
    }

    pub fn controller(&self) -> &RalphLoopController {
        &self.controller
    }

    /// Run one scenario through the loop
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioOutcome {
        let timing = start_timing(format!("scenario:{}", scenario.name));
        let outcome = match self.controller.run_scenario(scenario).await {
            Ok(result) => ScenarioOutcome::Completed(result),
            Err(e) => {
                warn!(
                    skill = %self.skill_name(),
                    scenario = %scenario.name,
                    error = %e,
                    "Scenario aborted"
                );
                ScenarioOutcome::Failed { scenario: scenario.name.clone(), error: e.to_string() }
            }
        };
        log_scenario_complete(
            self.skill_name(),
            &scenario.name,
            outcome.passed(),
            timing.elapsed_ms(),
        );
        outcome
    }

    /// Run scenarios `concurrency` at a time; outcomes keep the input order
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> Vec<ScenarioOutcome> {
        stream::iter(scenarios)
            .map(|scenario| self.run_scenario(scenario))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Run every scenario accepted by `filter` and build a report
    pub async fn run(&self, scenarios: &ScenarioSet, filter: &ScenarioFilter) -> SkillReport {
        let selected = scenarios.filter(filter);
        info!(
            skill = %self.skill_name(),
            scenarios = selected.len(),
            concurrency = self.concurrency,
            "Running scenarios"
        );

        let started_at = Utc::now();
        let outcomes = self.run_scenarios(&selected).await;
        SkillReport::new(self.skill_name(), started_at, Utc::now(), outcomes)
    }

    /// Evaluate code once, without generation
    pub fn evaluate_code(&self, code: &str, scenario: &str) -> EvaluationResult {
        self.controller.evaluator().evaluate(code, scenario)
    }
}

/// Evaluate a file on disk against a skill's criteria
pub fn evaluate_file(
    base_path: impl AsRef<Path>,
    skill: &str,
    code_path: impl AsRef<Path>,
) -> Result<EvaluationResult> {
    let criteria = CriteriaLoader::new(base_path.as_ref()).load(skill)?;
    let code = std::fs::read_to_string(code_path.as_ref())?;
    let scenario = code_path
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(CodeEvaluator::new(Arc::new(criteria)).evaluate(&code, &scenario))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::CodePattern;
    use crate::generator::{MockGenerator, ScriptedGenerator};

    fn criteria() -> AcceptanceCriteria {
        AcceptanceCriteria::new("azure-cosmos-py").with_pattern(CodePattern::correct(
            "Client",
            "client = CosmosClient(url, credential=cred)",
        ))
    }

    #[tokio::test]
    async fn test_outcomes_keep_input_order() {
        let scenarios: Vec<_> = (0..6)
            .map(|i| {
                Scenario::new(&format!("s{i}"), "p")
                    .with_mock_response("client = CosmosClient(url, credential=cred)")
            })
            .collect();
        let generator = Arc::new(MockGenerator::from_scenarios(&scenarios));
        let runner = SkillRunner::new(criteria(), generator, LoopConfig::single_pass())
            .with_concurrency(3);

        let outcomes = runner.run_scenarios(&scenarios).await;
        let names: Vec<_> = outcomes.iter().map(ScenarioOutcome::scenario).collect();
        assert_eq!(names, vec!["s0", "s1", "s2", "s3", "s4", "s5"]);
        assert!(outcomes.iter().all(ScenarioOutcome::passed));
    }

    #[tokio::test]
    async fn test_generator_failure_is_recorded_separately() {
        let generator = Arc::new(ScriptedGenerator::new(["x = 1"]).failing_at(1));
        let runner = SkillRunner::new(criteria(), generator, LoopConfig::default());

        let outcome = runner.run_scenario(&Scenario::new("broken", "p")).await;
        assert!(outcome.is_failure());
        assert!(!outcome.passed());
        assert!(outcome.result().is_none());
    }

    #[test]
    fn test_evaluate_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let criteria_path = tmp
            .path()
            .join(".github/skills/azure-cosmos-py")
            .join(crate::criteria::CRITERIA_FILENAME);
        std::fs::create_dir_all(criteria_path.parent().unwrap()).unwrap();
        std::fs::write(
            &criteria_path,
            "## Client\n\n✅ Correct\n```python\nclient = CosmosClient(url, credential=cred)\n```\n",
        )
        .unwrap();
        let code_path = tmp.path().join("sample.py");
        std::fs::write(&code_path, "client = CosmosClient(url, credential=cred)\n").unwrap();

        let result = evaluate_file(tmp.path(), "azure-cosmos-py", &code_path).unwrap();
        assert_eq!(result.scenario, "sample");
        assert_eq!(result.matched_correct, vec!["Client"]);
        assert_eq!(result.score, 100.0);
    }
}
