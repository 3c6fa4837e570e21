//! Tests for code evaluation against acceptance criteria.

use skill_eval::criteria::parse_criteria;
use skill_eval::{
    AcceptanceCriteria, CodeEvaluator, CodePattern, Language, Scenario, Severity, ValidationRule,
    build_feedback,
};
use std::path::Path;
use std::sync::Arc;

const COSMOS_CRITERIA: &str = r#"# Azure Cosmos DB for Python

## Client Creation

Use `from azure.cosmos import CosmosClient` with a token credential.

### ✅ Correct
Create the client with DefaultAzureCredential
```python
from azure.cosmos import CosmosClient
from azure.identity import DefaultAzureCredential
client = CosmosClient(url=endpoint, credential=DefaultAzureCredential())
```

### ❌ Incorrect
Mixing the async client with the sync credential
```python
from azure.cosmos.aio import CosmosClient
from azure.identity import DefaultAzureCredential
```

## Queries

### ❌ Incorrect
```python
items = container.read_all_items(max_item_count=10)
```
"#;

fn evaluator() -> CodeEvaluator {
    let criteria = parse_criteria(
        "azure-cosmos-py",
        Path::new("references/acceptance-criteria.md"),
        COSMOS_CRITERIA,
    );
    CodeEvaluator::new(Arc::new(criteria))
}

mod import_matching {
    use super::*;

    #[test]
    fn test_full_import_combination_is_flagged() {
        let code = "from azure.cosmos.aio import CosmosClient\nfrom azure.identity import DefaultAzureCredential\n";
        let result = evaluator().evaluate(code, "async");

        assert!(!result.passed);
        assert_eq!(result.matched_incorrect, vec!["Client Creation"]);
        let finding = result.findings.iter().find(|f| f.rule == "imports").unwrap();
        assert_eq!(finding.severity, Severity::Error);
        assert!(finding.message.starts_with("Incorrect import combination:"));
        assert_eq!(
            finding.suggestion.as_deref(),
            Some("Check acceptance criteria section: Client Creation")
        );
    }

    #[test]
    fn test_partial_import_combination_is_not_flagged() {
        // Async client with the async credential is the recommended pairing.
        let code = "from azure.cosmos.aio import CosmosClient\nfrom azure.identity.aio import DefaultAzureCredential\n";
        let result = evaluator().evaluate(code, "async");

        assert!(result.matched_incorrect.is_empty());
        assert!(result.passed);
    }

    #[test]
    fn test_grouped_and_multiline_imports_count() {
        let code = "from azure.identity import (\n    DefaultAzureCredential,\n    ManagedIdentityCredential,\n)\nfrom azure.cosmos.aio import CosmosClient as AsyncClient\n";
        let result = evaluator().evaluate(code, "grouped");

        assert_eq!(result.matched_incorrect, vec!["Client Creation"]);
    }

    #[test]
    fn test_commented_import_is_ignored() {
        let code = "# from azure.cosmos.aio import CosmosClient\nfrom azure.identity import DefaultAzureCredential\n";
        let result = evaluator().evaluate(code, "commented");

        assert!(result.matched_incorrect.is_empty());
    }

    #[test]
    fn test_mixed_exemplar_needs_imports_and_usage() {
        let usage_only = "client = CosmosClient(url=endpoint, credential=DefaultAzureCredential())\n";
        assert!(evaluator().evaluate(usage_only, "s").matched_correct.is_empty());

        let full = "from azure.cosmos import CosmosClient\nfrom azure.identity import DefaultAzureCredential\n\nclient = CosmosClient(url=endpoint, credential=DefaultAzureCredential())\n";
        let result = evaluator().evaluate(full, "s");
        assert_eq!(result.matched_correct, vec!["Client Creation"]);
        assert_eq!(result.score, 100.0);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn test_imports_quoted_in_docstring_are_not_declarations() {
        let code = "from azure.cosmos import CosmosClient\n\n\ndef make_client(url):\n    \"\"\"Build a client.\n\n    Do not write:\n        from azure.cosmos.aio import CosmosClient\n        from azure.identity import DefaultAzureCredential\n    \"\"\"\n    return CosmosClient(url)\n";
        let result = evaluator().evaluate(code, "docstring");

        assert!(result.passed);
        assert!(result.matched_incorrect.is_empty());
        assert!(result.findings.iter().all(|f| f.rule != "imports"));
        assert_eq!(result.score, 50.0);
    }

    #[test]
    fn test_typescript_named_imports() {
        let criteria = AcceptanceCriteria::new("azure-cosmos-ts").with_pattern(
            CodePattern::incorrect(
                "Credentials",
                "import { CosmosClient } from \"@azure/cosmos\";\nimport { AzureKeyCredential } from \"@azure/core-auth\";",
            )
            .with_language(Language::TypeScript),
        );
        let eval = CodeEvaluator::new(Arc::new(criteria));

        let flagged = "import { CosmosClient, PartitionKey } from \"@azure/cosmos\";\nimport {\n  AzureKeyCredential,\n} from \"@azure/core-auth\";\n";
        assert_eq!(eval.evaluate(flagged, "s").matched_incorrect, vec!["Credentials"]);

        let clean = "import { CosmosClient } from \"@azure/cosmos\";\nimport { DefaultAzureCredential } from \"@azure/identity\";\n";
        assert!(eval.evaluate(clean, "s").passed);
    }
}

mod usage_matching {
    use super::*;

    #[test]
    fn test_incorrect_usage_reports_section_and_line() {
        let code = "container = db.get_container_client(\"items\")\nitems = container.read_all_items(max_item_count=10)\n";
        let result = evaluator().evaluate(code, "query");

        let finding = result.findings.iter().find(|f| f.rule == "pattern:Queries").unwrap();
        assert_eq!(finding.message, "Incorrect pattern found from section: Queries");
        assert_eq!(finding.line, Some(2));
        assert!(finding.code_snippet.as_deref().unwrap().contains("read_all_items"));
        assert_eq!(result.matched_incorrect, vec!["Queries"]);
    }

    #[test]
    fn test_incorrect_usage_requires_exact_line() {
        let code = "items = container.read_all_items(max_item_count=50)\n";
        let result = evaluator().evaluate(code, "query");
        assert!(result.matched_incorrect.is_empty());
    }

    #[test]
    fn test_whitespace_differences_are_normalized() {
        let code = "if True:\n    items   =  container.read_all_items(max_item_count=10)\n";
        let result = evaluator().evaluate(code, "query");
        assert_eq!(result.matched_incorrect, vec!["Queries"]);
    }

    #[test]
    fn test_sections_are_counted_once() {
        let keyword = CodePattern::incorrect("Keys", "client = CosmosClient(url, key=master_key)");
        let positional = CodePattern::incorrect("Keys", "client = CosmosClient(url, master_key)");
        let criteria = AcceptanceCriteria::new("azure-cosmos-py")
            .with_pattern(keyword)
            .with_pattern(positional);
        let eval = CodeEvaluator::new(Arc::new(criteria));

        let code = "client = CosmosClient(url, key=master_key)\nclient = CosmosClient(url, master_key)\n";
        let result = eval.evaluate(code, "s");
        assert_eq!(result.error_count, 2);
        assert_eq!(result.matched_incorrect, vec!["Keys"]);
        // 100 - 2 * 20 - 15
        assert_eq!(result.score, 45.0);
    }
}

mod gating_and_scoring {
    use super::*;

    #[test]
    fn test_syntax_error_scores_zero() {
        let code = "from azure.cosmos import CosmosClient\n\ndef create(:\n    return CosmosClient(url)\n";
        let result = evaluator().evaluate(code, "broken");

        assert_eq!(result.score, 0.0);
        assert!(!result.passed);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].rule, "syntax");
        assert!(result.findings[0].message.starts_with("Syntax error"));
        assert!(result.matched_correct.is_empty());
        assert!(result.matched_incorrect.is_empty());
    }

    #[test]
    fn test_unbalanced_csharp_is_rejected() {
        let eval = CodeEvaluator::new(Arc::new(AcceptanceCriteria::new("azure-cosmos-dotnet")));
        let result = eval.evaluate("public class Program {\n    void Main() {\n}\n", "s");
        assert_eq!(result.score, 0.0);
        assert_eq!(result.findings[0].rule, "syntax");
    }

    #[test]
    fn test_python2_print_statement_scores_zero() {
        let code = "from azure.cosmos import CosmosClient\nprint \"connected\"\n";
        let result = evaluator().evaluate(code, "py2");

        assert_eq!(result.score, 0.0);
        assert!(!result.passed);
        assert_eq!(result.findings[0].rule, "syntax");
        assert_eq!(result.findings[0].line, Some(2));
    }

    #[test]
    fn test_valid_csharp_and_typescript_literals_pass_the_gate() {
        let dotnet = CodeEvaluator::new(Arc::new(AcceptanceCriteria::new("azure-cosmos-dotnet")));
        let code = "var path = Path.Combine(@\"C:\\data\\\", \"file.txt\");\nvar json = \"\"\"\n  { \"id\": \"(\" }\n  \"\"\";\n";
        let result = dotnet.evaluate(code, "s");
        assert!(result.findings.iter().all(|f| f.rule != "syntax"));
        assert_eq!(result.score, 50.0);

        let ts = CodeEvaluator::new(Arc::new(AcceptanceCriteria::new("azure-cosmos-ts")));
        let result = ts.evaluate("const re = /\\(/g;\nconst ok = re.test(name);\n", "s");
        assert!(result.findings.iter().all(|f| f.rule != "syntax"));
        assert_eq!(result.score, 50.0);
    }

    #[test]
    fn test_neutral_score_without_signal() {
        let result = evaluator().evaluate("print('hello')\n", "s");
        assert_eq!(result.score, 50.0);
        assert!(result.passed);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let eval = evaluator();
        let code = "from azure.cosmos.aio import CosmosClient\nfrom azure.identity import DefaultAzureCredential\nitems = container.read_all_items(max_item_count=10)\n";
        let first = eval.evaluate(code, "s");
        let second = eval.evaluate(code, "s");
        assert_eq!(first, second);
    }

    #[test]
    fn test_required_pattern_warning() {
        let rule = ValidationRule::new("Retries", "Configure retries")
            .with_required_pattern("retry_total=");
        let criteria = AcceptanceCriteria::new("azure-cosmos-py").with_rule(rule);
        let eval = CodeEvaluator::new(Arc::new(criteria));

        let result = eval.evaluate("client = make_client()\n", "s");
        assert!(result.passed);
        assert_eq!(result.warning_count, 1);
        assert_eq!(result.findings[0].message, "Missing recommended pattern: retry_total=");
        assert_eq!(result.score, 95.0);
    }
}

mod scenarios {
    use super::*;

    #[test]
    fn test_expected_and_forbidden_patterns() {
        let scenario = Scenario::new("basic", "Create a client")
            .with_expected("DefaultAzureCredential")
            .with_forbidden("master_key");

        let code = "client = CosmosClient(url, master_key)\n";
        let result = evaluator().evaluate_scenario(code, &scenario);
        assert_eq!(result.scenario, "basic");

        let forbidden = result.findings.iter().find(|f| f.rule == "scenario:forbidden").unwrap();
        assert_eq!(forbidden.severity, Severity::Error);
        assert_eq!(forbidden.line, Some(1));

        let expected = result.findings.iter().find(|f| f.rule == "scenario:expected").unwrap();
        assert_eq!(expected.severity, Severity::Warning);
        assert_eq!(expected.message, "Expected pattern missing: DefaultAzureCredential");
    }
}

mod feedback {
    use super::*;

    #[test]
    fn test_errors_precede_warnings() {
        let rule = ValidationRule::new("Conventions", "")
            .with_required_pattern("retry_total=")
            .with_forbidden_pattern("master_key");
        let criteria = AcceptanceCriteria::new("azure-cosmos-py").with_rule(rule);
        let eval = CodeEvaluator::new(Arc::new(criteria));

        let result = eval.evaluate("client = CosmosClient(url, master_key)\n", "s");
        // Discovery order puts the warning first.
        assert_eq!(result.findings[0].severity, Severity::Warning);

        let text = build_feedback(&result, Some(eval.criteria()));
        let errors = text.find("### ERRORS (must fix)").unwrap();
        let warnings = text.find("### WARNINGS (should fix)").unwrap();
        assert!(errors < warnings);
        assert!(text.starts_with("## Evaluation Feedback (score: 75.0/100, 1 errors, 1 warnings)"));
    }

    #[test]
    fn test_feedback_is_deterministic_and_names_sections() {
        let eval = evaluator();
        let code = "items = container.read_all_items(max_item_count=10)\n";
        let result = eval.evaluate(code, "s");

        let first = build_feedback(&result, Some(eval.criteria()));
        let second = build_feedback(&result, Some(eval.criteria()));
        assert_eq!(first, second);
        assert!(first.contains("### INCORRECT PATTERNS"));
        assert!(first.contains("Queries"));
    }

    #[test]
    fn test_clean_result_has_no_feedback() {
        let eval = evaluator();
        let code = "from azure.cosmos import CosmosClient\nfrom azure.identity import DefaultAzureCredential\nclient = CosmosClient(url=endpoint, credential=DefaultAzureCredential())\n";
        let result = eval.evaluate(code, "s");
        assert!(build_feedback(&result, Some(eval.criteria())).is_empty());
    }
}
