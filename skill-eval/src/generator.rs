//! Code-generation collaborators
//!
//! The feedback loop only needs something that turns a prompt into code. Live
//! model-backed generators are supplied by embedding applications; this module
//! provides the trait plus deterministic generators for tests and dry runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::criteria::Language;
use crate::error::{EvalError, Result};
use crate::scenario::Scenario;

/// A request for generated code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub skill_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    /// Provider-specific settings (model, temperature, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, skill_id: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), skill_id: skill_id.into(), scenario_id: None, config: None }
    }

    pub fn with_scenario(mut self, scenario_id: impl Into<String>) -> Self {
        self.scenario_id = Some(scenario_id.into());
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }
}

/// Code returned by a generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GeneratedCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into(), model: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Turns a prompt into code
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedCode>;
}

#[async_trait]
impl<G: CodeGenerator + ?Sized> CodeGenerator for Arc<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedCode> {
        (**self).generate(request).await
    }
}

/// Pull the code out of a generator reply.
///
/// The first fenced block tagged with `language` wins, then the first fenced block
/// of any kind; a reply without fences is returned trimmed.
pub fn extract_code_block(text: &str, language: &Language) -> String {
    let mut blocks: Vec<(String, String)> = Vec::new();
    let mut open: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match open.take() {
            None if trimmed.starts_with("```") => {
                let tag = trimmed.trim_start_matches('`').trim().to_string();
                open = Some((tag, Vec::new()));
            }
            None => {}
            Some((tag, lines)) if trimmed.starts_with("```") => {
                blocks.push((tag, lines.join("\n")));
            }
            Some((tag, mut lines)) => {
                lines.push(line);
                open = Some((tag, lines));
            }
        }
    }
    // A reply cut off mid-fence still carries usable code.
    if let Some((tag, lines)) = open {
        blocks.push((tag, lines.join("\n")));
    }

    blocks
        .iter()
        .find(|(tag, _)| !tag.is_empty() && &Language::from_fence_tag(tag) == language)
        .or_else(|| blocks.first())
        .map(|(_, code)| code.trim().to_string())
        .unwrap_or_else(|| text.trim().to_string())
}

/// Minimal well-formed program in `language`
pub fn placeholder_code(language: &Language) -> &'static str {
    match language {
        Language::TypeScript => "export function main(): void {}\n",
        Language::JavaScript => "function main() {}\n",
        Language::CSharp => {
            "public static class Program\n{\n    public static void Main() { }\n}\n"
        }
        Language::Java => {
            "public class Main {\n    public static void main(String[] args) { }\n}\n"
        }
        Language::Python | Language::Other(_) => "def main() -> None:\n    pass\n",
    }
}

/// Deterministic generator returning registered replies per scenario
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    responses: BTreeMap<String, String>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reply for one scenario
    pub fn with_response(mut self, scenario: &str, code: &str) -> Self {
        self.responses.insert(scenario.to_string(), code.to_string());
        self
    }

    /// Register every scenario's `mock_response`
    pub fn from_scenarios<'a>(scenarios: impl IntoIterator<Item = &'a Scenario>) -> Self {
        let responses = scenarios
            .into_iter()
            .filter_map(|s| s.mock_response.as_ref().map(|r| (s.name.clone(), r.clone())))
            .collect();
        Self { responses }
    }
}

#[async_trait]
impl CodeGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedCode> {
        let language = Language::from_skill_name(&request.skill_id);
        let reply = request
            .scenario_id
            .as_ref()
            .and_then(|id| self.responses.get(id))
            .map(|r| extract_code_block(r, &language))
            .unwrap_or_else(|| placeholder_code(&language).to_string());
        Ok(GeneratedCode::new(reply).with_model("mock"))
    }
}

/// Replays a fixed sequence of replies, repeating the last one
#[derive(Debug)]
pub struct ScriptedGenerator {
    replies: Vec<String>,
    fail_at: Option<usize>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            fail_at: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail the `call`-th request (1-based)
    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedCode> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().await.push(request.prompt.clone());

        if self.fail_at == Some(call) {
            let message = format!("scripted failure on call {}", call);
            return Err(EvalError::generation(self.name(), message));
        }

        let reply = self
            .replies
            .get(call - 1)
            .or_else(|| self.replies.last())
            .ok_or_else(|| EvalError::generation(self.name(), "no scripted replies"))?;
        Ok(GeneratedCode::new(reply.clone()))
    }
}

/// Enforces a wall-clock limit on every call to the wrapped generator
#[derive(Debug)]
pub struct TimeoutGenerator<G> {
    inner: G,
    timeout: Duration,
}

impl<G: CodeGenerator> TimeoutGenerator<G> {
    pub fn new(inner: G, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<G: CodeGenerator> CodeGenerator for TimeoutGenerator<G> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedCode> {
        tokio::time::timeout(self.timeout, self.inner.generate(request))
            .await
            .map_err(|_| EvalError::Timeout {
                generator: self.inner.name().to_string(),
                seconds: self.timeout.as_secs(),
            })?
    }
}
