//! Scenario file definitions
//!
//! Scenarios live at `<base>/tests/scenarios/<skill>/scenarios.yaml`. Each one is a
//! named prompt driving an independent generate/evaluate loop, optionally carrying
//! substrings the generated code must or must not contain.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{EvalError, Result};

/// Directory (relative to the base path) holding one scenario directory per skill.
pub const SCENARIOS_DIR: &str = "tests/scenarios";

/// Scenario file name inside a skill's scenario directory.
pub const SCENARIOS_FILENAME: &str = "scenarios.yaml";

/// Generation settings shared by every scenario in a file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// A named prompt driving one loop run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub prompt: String,
    /// Substrings expected in the generated code
    #[serde(default)]
    pub expected_patterns: Vec<String>,
    /// Substrings that must not appear in the generated code
    #[serde(default)]
    pub forbidden_patterns: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Canned code returned by the mock generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_response: Option<String>,
}

impl Scenario {
    pub fn new(name: &str, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
            expected_patterns: Vec::new(),
            forbidden_patterns: Vec::new(),
            tags: Vec::new(),
            mock_response: None,
        }
    }

    pub fn with_expected(mut self, pattern: &str) -> Self {
        self.expected_patterns.push(pattern.to_string());
        self
    }

    pub fn with_forbidden(mut self, pattern: &str) -> Self {
        self.forbidden_patterns.push(pattern.to_string());
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn with_mock_response(mut self, code: &str) -> Self {
        self.mock_response = Some(code.to_string());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Selects scenarios by name and/or tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    /// Exact name, or a substring of it
    pub name: Option<String>,
    /// Exact tag
    pub tag: Option<String>,
}

impl ScenarioFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_name(name: &str) -> Self {
        Self { name: Some(name.to_string()), tag: None }
    }

    pub fn by_tag(tag: &str) -> Self {
        Self { name: None, tag: Some(tag.to_string()) }
    }

    pub fn matches(&self, scenario: &Scenario) -> bool {
        let name_ok = self.name.as_deref().is_none_or(|n| scenario.name.contains(n));
        let tag_ok = self.tag.as_deref().is_none_or(|t| scenario.has_tag(t));
        name_ok && tag_ok
    }
}

/// Every scenario defined for one skill
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSet {
    #[serde(default)]
    pub config: GenerationConfig,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    /// Load and validate a scenario file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(EvalError::scenario(format!(
                "Scenario file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            EvalError::Scenario(msg) | EvalError::Serialization(msg) => {
                EvalError::scenario(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Load `<base>/tests/scenarios/<skill>/scenarios.yaml`
    pub fn load_for_skill(base_path: impl AsRef<Path>, skill: &str) -> Result<Self> {
        Self::load(scenarios_path(base_path, skill))
    }

    /// Parse and validate scenario YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        let set: ScenarioSet = serde_yaml::from_str(content)?;
        set.validate()?;
        Ok(set)
    }

    /// Names must be non-empty and unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (idx, scenario) in self.scenarios.iter().enumerate() {
            if scenario.name.trim().is_empty() {
                return Err(EvalError::scenario(format!("Scenario #{} has an empty name", idx + 1)));
            }
            if !seen.insert(scenario.name.as_str()) {
                return Err(EvalError::scenario(format!(
                    "Duplicate scenario name '{}'",
                    scenario.name
                )));
            }
        }
        Ok(())
    }

    /// Scenarios accepted by `filter`, in file order
    pub fn filter(&self, filter: &ScenarioFilter) -> Vec<Scenario> {
        self.scenarios.iter().filter(|s| filter.matches(s)).cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Path of a skill's scenario file
pub fn scenarios_path(base_path: impl AsRef<Path>, skill: &str) -> PathBuf {
    base_path.as_ref().join(SCENARIOS_DIR).join(skill).join(SCENARIOS_FILENAME)
}
