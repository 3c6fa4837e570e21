use super::{AcceptanceCriteria, parse_criteria};
use crate::error::{EvalError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directory (relative to the base path) holding one directory per skill.
pub const SKILLS_DIR: &str = ".github/skills";

/// Directory (relative to the base path) holding plugin bundles with their own skills.
pub const PLUGINS_DIR: &str = ".github/plugins";

/// Criteria file location inside a skill directory.
pub const CRITERIA_FILENAME: &str = "references/acceptance-criteria.md";

/// Loads acceptance criteria from skill directories under a repository root.
#[derive(Debug, Clone)]
pub struct CriteriaLoader {
    base_path: PathBuf,
}

impl CriteriaLoader {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Load and parse the criteria for `skill`.
    ///
    /// `.github/skills/<skill>` is preferred; plugin bundles under
    /// `.github/plugins/*/skills/<skill>` are searched next.
    pub fn load(&self, skill: &str) -> Result<AcceptanceCriteria> {
        let path = self.locate(skill).ok_or_else(|| EvalError::CriteriaNotFound {
            skill: skill.to_string(),
            path: self.primary_path(skill),
        })?;

        debug!(skill = %skill, path = %path.display(), "Loading acceptance criteria");
        let content = std::fs::read_to_string(&path)?;
        Ok(parse_criteria(skill, &path, &content))
    }

    /// Skills that have an acceptance criteria file, sorted and de-duplicated.
    pub fn list_skills(&self) -> Vec<String> {
        let mut skills: Vec<String> = self
            .skill_roots()
            .iter()
            .flat_map(|root| skills_in(root))
            .collect();
        skills.sort();
        skills.dedup();
        skills
    }

    fn primary_path(&self, skill: &str) -> PathBuf {
        self.base_path.join(SKILLS_DIR).join(skill).join(CRITERIA_FILENAME)
    }

    fn locate(&self, skill: &str) -> Option<PathBuf> {
        self.skill_roots()
            .into_iter()
            .map(|root| root.join(skill).join(CRITERIA_FILENAME))
            .find(|candidate| candidate.is_file())
    }

    fn skill_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.base_path.join(SKILLS_DIR)];

        let plugins = self.base_path.join(PLUGINS_DIR);
        if plugins.is_dir() {
            let mut plugin_roots = WalkDir::new(&plugins)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|entry| entry.file_type().is_dir())
                .map(|entry| entry.into_path().join("skills"))
                .filter(|root| root.is_dir())
                .collect::<Vec<_>>();
            plugin_roots.sort();
            roots.extend(plugin_roots);
        }

        roots
    }
}

impl Default for CriteriaLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

fn skills_in(root: &Path) -> Vec<String> {
    if !root.is_dir() {
        return Vec::new();
    }

    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| entry.path().join(CRITERIA_FILENAME).is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_criteria(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative).join(CRITERIA_FILENAME);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn loads_from_skills_dir() {
        let tmp = TempDir::new().unwrap();
        write_criteria(
            tmp.path(),
            ".github/skills/azure-cosmos-py",
            "## Client\n\n```python\nclient = CosmosClient(url, credential)\n```\n",
        );

        let criteria = CriteriaLoader::new(tmp.path()).load("azure-cosmos-py").unwrap();
        assert_eq!(criteria.skill_name, "azure-cosmos-py");
        assert_eq!(criteria.correct_patterns.len(), 1);
        assert!(criteria.source_path.unwrap().ends_with(CRITERIA_FILENAME));
    }

    #[test]
    fn falls_back_to_plugin_skills() {
        let tmp = TempDir::new().unwrap();
        write_criteria(
            tmp.path(),
            ".github/plugins/azure-sdk-python/skills/azure-eventhub-py",
            "## Producer\n\n```python\nproducer = EventHubProducerClient(ns, eh, cred)\n```\n",
        );

        let loader = CriteriaLoader::new(tmp.path());
        assert!(loader.load("azure-eventhub-py").is_ok());
        assert_eq!(loader.list_skills(), vec!["azure-eventhub-py"]);
    }

    #[test]
    fn missing_criteria_is_reported() {
        let tmp = TempDir::new().unwrap();
        let err = CriteriaLoader::new(tmp.path()).load("nope-py").unwrap_err();
        assert!(matches!(err, EvalError::CriteriaNotFound { .. }));
    }

    #[test]
    fn lists_skills_sorted_and_deduplicated() {
        let tmp = TempDir::new().unwrap();
        write_criteria(tmp.path(), ".github/skills/b-py", "## X\n");
        write_criteria(tmp.path(), ".github/skills/a-py", "## X\n");
        write_criteria(tmp.path(), ".github/plugins/p/skills/a-py", "## X\n");
        std::fs::create_dir_all(tmp.path().join(".github/skills/no-criteria")).unwrap();

        let skills = CriteriaLoader::new(tmp.path()).list_skills();
        assert_eq!(skills, vec!["a-py", "b-py"]);
    }
}
