//! Property-based tests for evaluation and loop stop decisions.

use proptest::prelude::*;
use skill_eval::{
    AcceptanceCriteria, CodeEvaluator, CodePattern, LoopConfig, Severity, StopReason,
    ValidationRule, build_feedback, decide_stop,
};
use std::sync::Arc;

// ============================================================================
// Generators
// ============================================================================

/// Lines drawn from a small vocabulary so exemplars actually get hit
fn arb_code_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("from azure.cosmos import CosmosClient".to_string()),
        Just("from azure.cosmos.aio import CosmosClient".to_string()),
        Just("from azure.identity import DefaultAzureCredential".to_string()),
        Just("client = CosmosClient(url, credential=cred)".to_string()),
        Just("client = CosmosClient(url, key=master_key)".to_string()),
        Just("items = container.read_all_items()".to_string()),
        Just("x = 1".to_string()),
        Just("# retry_total=3".to_string()),
        Just("print('done')".to_string()),
        "[a-z]{1,8} = [0-9]{1,4}",
    ]
}

fn arb_code() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_code_line(), 0..12).prop_map(|lines| lines.join("\n"))
}

fn arb_score() -> impl Strategy<Value = f64> {
    (0u32..=100).prop_map(f64::from)
}

fn arb_loop_config() -> impl Strategy<Value = LoopConfig> {
    (1usize..10, arb_score(), 0u32..20, any::<bool>()).prop_map(
        |(max_iterations, quality, improvement, early_stop)| {
            LoopConfig::default()
                .with_max_iterations(max_iterations)
                .with_quality_threshold(quality)
                .with_improvement_threshold(f64::from(improvement))
                .with_early_stop_on_perfect(early_stop)
        },
    )
}

fn evaluator() -> CodeEvaluator {
    let rule = ValidationRule::new("Conventions", "")
        .with_required_pattern("retry_total=")
        .with_forbidden_pattern("master_key");
    let criteria = AcceptanceCriteria::new("azure-cosmos-py")
        .with_pattern(CodePattern::correct("Client", "client = CosmosClient(url, credential=cred)"))
        .with_pattern(CodePattern::incorrect(
            "Async",
            "from azure.cosmos.aio import CosmosClient\nfrom azure.identity import DefaultAzureCredential",
        ))
        .with_pattern(CodePattern::incorrect("Queries", "items = container.read_all_items()"))
        .with_rule(rule);
    CodeEvaluator::new(Arc::new(criteria))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_score_is_bounded(code in arb_code()) {
        let result = evaluator().evaluate(&code, "prop");
        prop_assert!((0.0..=100.0).contains(&result.score));
    }

    #[test]
    fn prop_passed_iff_no_errors(code in arb_code()) {
        let result = evaluator().evaluate(&code, "prop");
        let errors = result.findings.iter().filter(|f| f.severity == Severity::Error).count();
        prop_assert_eq!(result.passed, errors == 0);
        prop_assert_eq!(result.error_count, errors);
    }

    #[test]
    fn prop_evaluation_is_deterministic(code in arb_code()) {
        let eval = evaluator();
        let first = eval.evaluate(&code, "prop");
        let second = eval.evaluate(&code, "prop");
        prop_assert_eq!(
            build_feedback(&first, Some(eval.criteria())),
            build_feedback(&second, Some(eval.criteria()))
        );
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_matched_sections_are_distinct(code in arb_code()) {
        let result = evaluator().evaluate(&code, "prop");
        let mut sections = result.matched_incorrect.clone();
        sections.sort();
        sections.dedup();
        prop_assert_eq!(sections.len(), result.matched_incorrect.len());
    }

    #[test]
    fn prop_partial_import_combination_never_flags_async(
        code in arb_code().prop_filter("lacks the credential import", |c| {
            !c.contains("from azure.identity import DefaultAzureCredential")
        })
    ) {
        let result = evaluator().evaluate(&code, "prop");
        prop_assert!(!result.matched_incorrect.iter().any(|s| s == "Async"));
    }

    #[test]
    fn prop_single_score_never_regresses(config in arb_loop_config(), score in arb_score()) {
        let reason = decide_stop(&config, &[score]);
        let stalled = matches!(
            reason,
            Some(StopReason::ScoreRegression | StopReason::NoImprovement)
        );
        prop_assert!(!stalled);
    }

    #[test]
    fn prop_threshold_always_stops(
        config in arb_loop_config(),
        history in prop::collection::vec(arb_score(), 0..5),
        latest in arb_score(),
    ) {
        let mut scores = history;
        scores.push(latest);
        let reason = decide_stop(&config, &scores);
        if latest >= config.quality_threshold {
            prop_assert!(reason.is_some_and(|r| r.converged()));
        }
        if latest < config.quality_threshold && scores.len() == 1 {
            prop_assert_eq!(reason, None);
        }
    }

    #[test]
    fn prop_regression_below_threshold(
        config in arb_loop_config(),
        previous in arb_score(),
        drop in 1u32..50,
    ) {
        let latest = (previous - f64::from(drop)).max(0.0);
        prop_assume!(latest < previous && latest < config.quality_threshold);
        let reason = decide_stop(&config, &[previous, latest]);
        prop_assert_eq!(reason, Some(StopReason::ScoreRegression));
    }
}
