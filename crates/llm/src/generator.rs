//! Generative model providers.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use docqa_core::{GenerationRequest, GenerativeModel, LlmError, Result};

/// Settings for the Ollama generation client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Client for a local Ollama server's generate API.
pub struct OllamaGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Provider(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerativeModel for OllamaGenerator {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let body = OllamaRequest {
            model: &self.config.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.config.timeout_secs)
            } else {
                LlmError::Provider(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(LlmError::Provider(format!("generate returned {}", response.status())).into());
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }

    fn identifier(&self) -> String {
        format!("ollama:{}", self.config.model)
    }
}

/// Generator that always returns the same response, for tests (no server
/// required).
pub struct StaticGenerator {
    response: String,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl StaticGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GenerativeModel for StaticGenerator {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().push(request.clone());
        Ok(self.response.clone())
    }

    fn identifier(&self) -> String {
        "static".to_string()
    }
}

/// Generator that replays queued responses in order, for tests with
/// sequential calls.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, response: impl Into<String>) {
        self.responses.lock().push_back(response.into());
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedGenerator {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().push(request.clone());
        match self.responses.lock().pop_front() {
            Some(response) => Ok(response),
            None => Err(LlmError::Provider("scripted generator ran out of responses".to_string())
                .into()),
        }
    }

    fn identifier(&self) -> String {
        "scripted".to_string()
    }
}

/// Generator that picks a response by prompt substring, for tests that
/// issue concurrent calls where arrival order is not fixed.
pub struct RoutingGenerator {
    routes: Vec<(String, String)>,
    fallback: String,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl RoutingGenerator {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            routes: Vec::new(),
            fallback: fallback.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Respond with `response` whenever the prompt contains `pattern`.
    /// Routes are tried in registration order.
    pub fn route(mut self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.routes.push((pattern.into(), response.into()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GenerativeModel for RoutingGenerator {
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().push(request.clone());
        for (pattern, response) in &self.routes {
            if request.prompt.contains(pattern.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(self.fallback.clone())
    }

    fn identifier(&self) -> String {
        "routing".to_string()
    }
}
