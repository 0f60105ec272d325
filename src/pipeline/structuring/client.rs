use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::prompt::EVALUATION_SYSTEM_PROMPT;
use super::types::LlmClient;
use super::StructuringError;
use crate::config::ServiceConfig;

/// Blocking client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatCompletionsClient {
    api_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    /// Fails with `NotConfigured` when no API key is set.
    pub fn new(config: &ServiceConfig) -> Result<Self, StructuringError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(StructuringError::NotConfigured)?
            .to_string();

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn build_messages<'a>(prompt: &'a str, system: &'a str) -> Vec<ChatMessage<'a>> {
    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: prompt,
    });
    messages
}

fn first_choice_content(response: ChatResponse) -> Result<String, StructuringError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| StructuringError::ResponseParsing("response contained no choices".into()))
}

impl LlmClient for ChatCompletionsClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
    ) -> Result<String, StructuringError> {
        let body = ChatRequest {
            model,
            messages: build_messages(prompt, system),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    StructuringError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    StructuringError::ServiceUnreachable(self.api_url.clone())
                } else {
                    StructuringError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::ServiceStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;

        first_choice_content(parsed)
    }
}

/// Mock LLM client for testing. Answers evaluation prompts and extraction
/// prompts with separately configured replies and counts every call.
pub struct MockLlmClient {
    extraction: String,
    evaluation: String,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new(extraction: &str) -> Self {
        Self {
            extraction: extraction.to_string(),
            evaluation: String::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_evaluation(mut self, evaluation: &str) -> Self {
        self.evaluation = evaluation.to_string();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockLlmClient {
    fn generate(
        &self,
        _model: &str,
        _prompt: &str,
        system: &str,
    ) -> Result<String, StructuringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if system == EVALUATION_SYSTEM_PROMPT {
            Ok(self.evaluation.clone())
        } else {
            Ok(self.extraction.clone())
        }
    }
}
