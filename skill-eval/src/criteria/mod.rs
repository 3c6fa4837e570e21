//! Acceptance criteria definitions
//!
//! Acceptance criteria are documented exemplars of correct and incorrect usage of
//! an SDK, grouped into named sections. They are parsed once from markdown and
//! never mutated afterwards.

mod loader;
mod parser;

pub use loader::{CRITERIA_FILENAME, CriteriaLoader, PLUGINS_DIR, SKILLS_DIR};
pub use parser::parse_criteria;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Language of a skill or of a single code exemplar
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    Python,
    TypeScript,
    JavaScript,
    CSharp,
    Java,
    Other(String),
}

impl Language {
    /// Derive the language from a skill name suffix (`-py`, `-dotnet`, `-ts`, `-java`).
    ///
    /// Skills without a recognised suffix are treated as Python.
    pub fn from_skill_name(skill_name: &str) -> Self {
        let name = skill_name.to_lowercase();
        if name.ends_with("-py") {
            Language::Python
        } else if name.ends_with("-dotnet") {
            Language::CSharp
        } else if name.ends_with("-ts") {
            Language::TypeScript
        } else if name.ends_with("-java") {
            Language::Java
        } else {
            Language::Python
        }
    }

    /// Map a code fence info string (`python`, `ts`, `csharp`, ...) to a language.
    pub fn from_fence_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "python" | "py" | "python3" => Language::Python,
            "typescript" | "ts" | "tsx" => Language::TypeScript,
            "javascript" | "js" | "jsx" | "mjs" => Language::JavaScript,
            "csharp" | "cs" | "c#" | "dotnet" => Language::CSharp,
            "java" => Language::Java,
            other => Language::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::CSharp => "csharp",
            Language::Java => "java",
            Language::Other(name) => name,
        }
    }

    /// Prefixes that start a comment-only line.
    pub fn comment_prefixes(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["#"],
            Language::TypeScript | Language::JavaScript | Language::CSharp | Language::Java => {
                &["//", "/*", "*"]
            }
            Language::Other(_) => &["#", "//"],
        }
    }

    /// Whether a full parser front end is used for the syntax gate.
    pub fn has_parser(&self) -> bool {
        matches!(self, Language::Python)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        Language::from_fence_tag(&value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.as_str().to_string()
    }
}

/// A documented code exemplar of correct or incorrect usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodePattern {
    /// Exemplar source code
    pub code: String,
    /// Language of the exemplar
    pub language: Language,
    /// Whether the exemplar shows correct usage
    pub is_correct: bool,
    /// Title of the documentation section holding the exemplar
    pub section: String,
    /// One-line explanation written next to the exemplar
    #[serde(default)]
    pub description: Option<String>,
}

impl CodePattern {
    /// Create a correct-usage exemplar
    pub fn correct(section: &str, code: &str) -> Self {
        Self::new(section, code, true)
    }

    /// Create an incorrect-usage exemplar
    pub fn incorrect(section: &str, code: &str) -> Self {
        Self::new(section, code, false)
    }

    fn new(section: &str, code: &str, is_correct: bool) -> Self {
        Self {
            code: code.trim().to_string(),
            language: Language::Python,
            is_correct,
            section: section.to_string(),
            description: None,
        }
    }

    /// Set the exemplar language
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Validation rule derived from one documentation section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Rule name (the section title)
    pub name: String,
    /// First paragraph of the section
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub correct_patterns: Vec<CodePattern>,
    #[serde(default)]
    pub incorrect_patterns: Vec<CodePattern>,
    /// Import statements the section prose names
    #[serde(default)]
    pub required_imports: Vec<String>,
    /// Import statements that must not be declared
    #[serde(default)]
    pub forbidden_imports: Vec<String>,
    /// Raw substrings that should appear in the code
    #[serde(default)]
    pub required_patterns: Vec<String>,
    /// Raw substrings that must not appear in the code
    #[serde(default)]
    pub forbidden_patterns: Vec<String>,
}

impl ValidationRule {
    /// Create an empty rule
    pub fn new(name: &str, description: &str) -> Self {
        Self { name: name.to_string(), description: description.to_string(), ..Default::default() }
    }

    /// Add an exemplar, routed by its correctness flag
    pub fn with_pattern(mut self, pattern: CodePattern) -> Self {
        if pattern.is_correct {
            self.correct_patterns.push(pattern);
        } else {
            self.incorrect_patterns.push(pattern);
        }
        self
    }

    /// Add a required raw pattern
    pub fn with_required_pattern(mut self, pattern: &str) -> Self {
        self.required_patterns.push(pattern.to_string());
        self
    }

    /// Add a forbidden raw pattern
    pub fn with_forbidden_pattern(mut self, pattern: &str) -> Self {
        self.forbidden_patterns.push(pattern.to_string());
        self
    }

    /// Add a forbidden import statement
    pub fn with_forbidden_import(mut self, import: &str) -> Self {
        self.forbidden_imports.push(import.to_string());
        self
    }
}

/// Complete acceptance criteria for one skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceCriteria {
    pub skill_name: String,
    pub language: Language,
    /// File the criteria were parsed from
    #[serde(default)]
    pub source_path: Option<PathBuf>,
    #[serde(default)]
    pub rules: Vec<ValidationRule>,
    #[serde(default)]
    pub correct_patterns: Vec<CodePattern>,
    #[serde(default)]
    pub incorrect_patterns: Vec<CodePattern>,
}

impl AcceptanceCriteria {
    /// Create empty criteria; the language is derived from the skill name
    pub fn new(skill_name: &str) -> Self {
        Self {
            skill_name: skill_name.to_string(),
            language: Language::from_skill_name(skill_name),
            source_path: None,
            rules: Vec::new(),
            correct_patterns: Vec::new(),
            incorrect_patterns: Vec::new(),
        }
    }

    /// Override the language
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Add a top-level exemplar, routed by its correctness flag
    pub fn with_pattern(mut self, pattern: CodePattern) -> Self {
        if pattern.is_correct {
            self.correct_patterns.push(pattern);
        } else {
            self.incorrect_patterns.push(pattern);
        }
        self
    }

    /// Add a validation rule
    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Get a rule by name (case-insensitive)
    pub fn get_rule(&self, name: &str) -> Option<&ValidationRule> {
        self.rules.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Total number of top-level exemplars
    pub fn pattern_count(&self) -> usize {
        self.correct_patterns.len() + self.incorrect_patterns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_skill_name() {
        assert_eq!(Language::from_skill_name("azure-cosmos-py"), Language::Python);
        assert_eq!(Language::from_skill_name("azure-identity-dotnet"), Language::CSharp);
        assert_eq!(Language::from_skill_name("foundry-nextgen-frontend-ts"), Language::TypeScript);
        assert_eq!(Language::from_skill_name("azure-storage-java"), Language::Java);
        assert_eq!(Language::from_skill_name("podcast-generation"), Language::Python);
    }

    #[test]
    fn test_language_from_fence_tag() {
        assert_eq!(Language::from_fence_tag("py"), Language::Python);
        assert_eq!(Language::from_fence_tag("C#"), Language::CSharp);
        assert_eq!(Language::from_fence_tag("tsx"), Language::TypeScript);
        assert_eq!(Language::from_fence_tag("bash"), Language::Other("bash".to_string()));
    }

    #[test]
    fn test_language_serializes_as_string() {
        let json = serde_json::to_string(&Language::CSharp).unwrap();
        assert_eq!(json, "\"csharp\"");
        let back: Language = serde_json::from_str("\"typescript\"").unwrap();
        assert_eq!(back, Language::TypeScript);
    }

    #[test]
    fn test_criteria_builder() {
        let criteria = AcceptanceCriteria::new("azure-cosmos-py")
            .with_pattern(CodePattern::correct("Client", "client = CosmosClient(url, cred)"))
            .with_pattern(CodePattern::incorrect("Client", "client = CosmosClient(url, key)"))
            .with_rule(ValidationRule::new("Client", "Create the client"));

        assert_eq!(criteria.pattern_count(), 2);
        assert!(criteria.get_rule("client").is_some());
        assert!(criteria.get_rule("missing").is_none());
    }
}
