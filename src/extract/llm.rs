//! Instruction-driven content filter
//!
//! Delegates segment retention to an external text-generation provider.
//! Unlike the heuristic filters this one has externally-variable latency
//! and can fail outright, so calls are chunked under a token budget,
//! retried a bounded number of times, and any terminal failure surfaces as
//! a [`FilterError`] that the pipeline turns into a raw-markdown-only
//! outcome rather than a dropped page.

use crate::config::{resolve_llm_token, LlmConfig};
use crate::extract::segment::Segment;
use crate::extract::FilterError;
use crate::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Rough token estimate: ~4 characters per token
fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Provider seam for the instruction filter
///
/// Injectable so tests can script responses and failures.
#[async_trait]
pub trait InstructionClient: Send + Sync {
    /// Sends one instruction + content prompt, returning the raw completion
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, FilterError>;
}

/// Instruction-driven filter over a provider client
pub struct LlmFilter {
    client: Arc<dyn InstructionClient>,
    instruction: String,
    chunk_token_threshold: usize,
    max_retries: u32,
}

impl LlmFilter {
    pub fn new(client: Arc<dyn InstructionClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            instruction: config.instruction.clone(),
            chunk_token_threshold: config.chunk_token_threshold,
            max_retries: config.max_retries,
        }
    }

    /// Selects the indices of segments the provider says to keep
    pub async fn select(&self, segments: &[Segment]) -> Result<Vec<usize>, FilterError> {
        let mut selected = Vec::new();

        for chunk in chunk_segments(segments, self.chunk_token_threshold) {
            let prompt = build_prompt(&self.instruction, segments, &chunk);
            let response = self.complete_with_retries(&prompt).await?;
            let kept = parse_kept_numbers(&response)?;

            // The prompt numbers segments 1..=len within the chunk
            for number in kept {
                if number >= 1 && number <= chunk.len() {
                    selected.push(chunk[number - 1]);
                }
            }
        }

        selected.sort_unstable();
        Ok(selected)
    }

    async fn complete_with_retries(&self, prompt: &str) -> Result<String, FilterError> {
        let system = "You decide which numbered segments of a web page to keep. \
                      Reply with a JSON array of the segment numbers to keep and nothing else.";

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }

            match self.client.complete(system, prompt).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!(
                        "Instruction filter attempt {}/{} failed: {}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FilterError::Provider("instruction filter failed with no attempts".to_string())
        }))
    }
}

/// Groups segment indices into chunks bounded by the token threshold
///
/// A single oversized segment still forms its own chunk; nothing is
/// silently dropped.
fn chunk_segments(segments: &[Segment], token_threshold: usize) -> Vec<Vec<usize>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut current_tokens = 0;

    for (i, segment) in segments.iter().enumerate() {
        let tokens = estimate_tokens(&segment.text);

        if !current.is_empty() && current_tokens + tokens > token_threshold {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }

        current.push(i);
        current_tokens += tokens;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn build_prompt(instruction: &str, segments: &[Segment], chunk: &[usize]) -> String {
    let mut prompt = String::new();
    prompt.push_str(instruction);
    prompt.push_str("\n\nSegments:\n");

    for (number, &index) in chunk.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", number + 1, segments[index].text));
    }

    prompt
}

/// Extracts the JSON array of kept segment numbers from a completion
fn parse_kept_numbers(response: &str) -> Result<Vec<usize>, FilterError> {
    let start = response.find('[');
    let end = response.rfind(']');

    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Vec<usize>>(&response[start..=end]).map_err(|e| {
                FilterError::BadResponse(format!("unparseable segment list: {}", e))
            })
        }
        _ => Err(FilterError::BadResponse(format!(
            "no JSON array in response: {:?}",
            response.chars().take(80).collect::<String>()
        ))),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Production client speaking an OpenAI-compatible chat-completions API
pub struct HttpInstructionClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    token: String,
}

impl HttpInstructionClient {
    /// Builds the client from configuration, resolving the credential
    ///
    /// Fails before any fetch when the provider is unknown or no credential
    /// resolves.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        let token = resolve_llm_token(config)?;

        let (prefix, model) = config
            .provider
            .split_once('/')
            .unwrap_or((config.provider.as_str(), "gpt-4o"));

        let endpoint = match prefix {
            "openai" => "https://api.openai.com/v1/chat/completions".to_string(),
            "groq" => "https://api.groq.com/openai/v1/chat/completions".to_string(),
            other => {
                return Err(ConfigError::Validation(format!(
                    "unsupported LLM provider '{}': expected openai/... or groq/...",
                    other
                )))
            }
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ConfigError::Validation(format!("failed to build LLM client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            token,
        })
    }
}

#[async_trait]
impl InstructionClient for HttpInstructionClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, FilterError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| FilterError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FilterError::Provider(format!(
                "provider returned HTTP {}",
                status
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| FilterError::BadResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| FilterError::BadResponse("empty choices".to_string()))
    }
}
