//! Chat-completions implementation of the advisory analyzer.
//!
//! Talks to any OpenAI-compatible endpoint. The endpoint may be given as a
//! bare host, a `/v1` base, or the full completions URL. Transient
//! failures retry with a linear backoff; attempts and backoff are part of
//! the client configuration. The response is expected to be a single JSON
//! report, optionally wrapped in a markdown code fence.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::warn;

use crate::advisor::{AdvisorError, AdvisoryAnalyzer, EnrichedAnswer, validate_report};
use crate::report::PlacementReport;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub request_timeout: Duration,
    /// Total tries per analyze call, including the first.
    pub max_attempts: u32,
    /// Waits grow linearly: backoff, 2×backoff, ...
    pub retry_backoff: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env_var("LLM_API_KEY"),
            model: env_var("LLM_MODEL").unwrap_or(defaults.model),
            endpoint: env_var("LLM_API_ENDPOINT").unwrap_or(defaults.endpoint),
            request_timeout: env_parse("LLM_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            max_attempts: env_parse("LLM_MAX_ATTEMPTS")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_attempts),
            retry_backoff: env_parse("LLM_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

impl ChatResponse {
    fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Clone)]
pub struct LlmAdvisor {
    config: LlmConfig,
    chat_url: String,
    client: reqwest::Client,
}

impl LlmAdvisor {
    pub fn new(config: LlmConfig) -> Self {
        let chat_url = chat_url(&config.endpoint);
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            chat_url,
            client,
        }
    }

    pub fn from_env() -> Self {
        Self::new(LlmConfig::from_env())
    }

    pub fn is_available(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
            && !self.config.model.trim().is_empty()
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, AdvisorError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(AdvisorError::NotConfigured("LLM_API_KEY"))?;

        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false
        });

        let mut attempt = 1u32;
        loop {
            match self.try_chat(api_key, &payload).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.config.max_attempts && err.is_transient() => {
                    warn!(attempt, error = %err, "advisor request failed, retrying");
                    sleep(self.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_chat(
        &self,
        api_key: &str,
        payload: &serde_json::Value,
    ) -> Result<ChatResponse, AdvisorError> {
        let response = self
            .client
            .post(&self.chat_url)
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::HttpStatus { status, body });
        }

        Ok(response.json().await?)
    }
}

impl AdvisoryAnalyzer for LlmAdvisor {
    async fn analyze(
        &self,
        history: &[EnrichedAnswer],
    ) -> Result<PlacementReport, AdvisorError> {
        let messages = [
            ChatMessage {
                role: "system".into(),
                content: SYSTEM_PROMPT.into(),
            },
            ChatMessage {
                role: "user".into(),
                content: build_user_prompt(history)?,
            },
        ];

        let response = self.chat(&messages).await?;
        let raw = response.first_content().ok_or(AdvisorError::EmptyChoices)?;
        let report = parse_report(raw)?;
        validate_report(&report)?;
        Ok(report)
    }
}

const SYSTEM_PROMPT: &str = r#"You are an ESL placement analyst for children aged 4-12. Given a student's adaptive test results, determine their Novakid level.

NOVAKID LEVEL SYSTEM:
- Level 0 (pre-A1): Complete beginner, basic words only
- Level 1 (A1): Basic vocabulary and simple phrases
- Level 2 (A1+): Expanded vocabulary and basic grammar
- Level 3 (A2): Simple conversations and grammar
- Level 4 (B1): Complex sentences and varied vocabulary
- Level 5 (B2): Fluent communication and complex grammar

Consider accuracy patterns across mechanics, performance at different levels, consistency of responses, and the skills demonstrated.

Return ONLY valid JSON in this exact format:
{
  "placement": {
    "novakid_level": 2,
    "confidence": 0.75,
    "cefr_equivalent": "A1+",
    "level_justification": "Consistent performance at Level 2 tasks with some Level 3 success"
  },
  "skill_analysis": {
    "vocabulary": {"score": 0.7, "evidence": ["Correctly identified 7/10 vocabulary items"]},
    "pronunciation": {"score": 0.8, "evidence": ["Good self-assessment on basic words"]},
    "grammar": {"score": 0.6, "evidence": ["Understands present simple"]}
  },
  "recommendations": {
    "immediate_focus": ["Review past tense forms"],
    "strengths_to_build_on": ["Good pronunciation foundation"],
    "suggested_starting_point": "Begin at Novakid Level 2 with grammar support",
    "estimated_progress": "Ready for Level 3 in 4-6 weeks with regular practice"
  }
}"#;

fn build_user_prompt(history: &[EnrichedAnswer]) -> Result<String, AdvisorError> {
    let results = serde_json::to_string_pretty(history)?;
    Ok(format!("TEST RESULTS:\n{results}"))
}

/// Parse a report from raw model output, tolerating markdown code fences.
fn parse_report(raw: &str) -> Result<PlacementReport, AdvisorError> {
    let trimmed = raw.trim();
    let json_str = trimmed
        .strip_prefix("```json")
        .and_then(|s| s.strip_suffix("```"))
        .or_else(|| trimmed.strip_prefix("```").and_then(|s| s.strip_suffix("```")))
        .unwrap_or(trimmed);

    Ok(serde_json::from_str(json_str.trim())?)
}

/// Full chat-completions URL from the configured endpoint. Accepts a bare
/// host, a `/v1` base, or the completions URL itself.
fn chat_url(endpoint: &str) -> String {
    let base = endpoint.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key)?.parse().ok()
}
