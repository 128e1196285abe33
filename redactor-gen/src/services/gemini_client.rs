//! Gemini API client
//!
//! Implements [`CompletionProvider`] over the `generateContent` and
//! `streamGenerateContent` endpoints. Every request carries the fixed system
//! instruction and the same permissive safety settings.

use async_trait::async_trait;
use futures::StreamExt;
use redactor_common::config::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::completion_client::{
    CompletionError, CompletionProvider, FragmentStream, SYSTEM_INSTRUCTION,
};
use super::model_resolver::{resolve_model, ModelCache, ProbeOutcome};
use super::sse_decoder::SseDecoder;

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

const FINISH_MAX_TOKENS: &str = "MAX_TOKENS";
const SAFETY_FINISH_REASONS: [&str; 4] = ["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(prompt: &'a str, max_output: u32) -> Self {
        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTION,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: max_output,
            },
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }
}

/// Response body, also the shape of each streamed frame
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
    }

    fn is_blocked(&self) -> bool {
        let prompt_blocked = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_ref())
            .is_some();
        let output_blocked = self
            .finish_reason()
            .is_some_and(|reason| SAFETY_FINISH_REASONS.contains(&reason));
        prompt_blocked || output_blocked
    }
}

/// Classify a complete (non-streamed) response
pub fn interpret_response(
    model: &str,
    response: &GenerateContentResponse,
) -> Result<String, CompletionError> {
    if response.is_blocked() {
        return Err(CompletionError::SafetyBlocked);
    }

    let text = response.text();
    if response.finish_reason() == Some(FINISH_MAX_TOKENS) {
        if text.trim().is_empty() {
            return Err(CompletionError::Truncated);
        }
        warn!(
            model = %model,
            chars = text.chars().count(),
            "Provider output hit the length limit, using partial content"
        );
        return Ok(text);
    }

    if text.trim().is_empty() {
        return Err(CompletionError::EmptyResult);
    }

    Ok(text)
}

/// Per-stream bookkeeping across frames
#[derive(Debug, Default)]
struct StreamState {
    produced_chars: usize,
    hit_length_limit: bool,
}

impl StreamState {
    /// Text carried by one frame, or the failure it signals
    fn read_frame(&mut self, data: &str) -> Result<Option<String>, CompletionError> {
        if data.trim() == "[DONE]" {
            return Ok(None);
        }

        let frame: GenerateContentResponse =
            serde_json::from_str(data).map_err(|e| CompletionError::Decode(e.to_string()))?;
        if frame.is_blocked() {
            return Err(CompletionError::SafetyBlocked);
        }
        if frame.finish_reason() == Some(FINISH_MAX_TOKENS) {
            self.hit_length_limit = true;
        }

        let text = frame.text();
        if text.is_empty() {
            return Ok(None);
        }
        self.produced_chars += text.chars().count();
        Ok(Some(text))
    }

    /// Verdict once the provider closed the stream
    fn finish(&self, model: &str) -> Result<(), CompletionError> {
        if self.hit_length_limit {
            if self.produced_chars == 0 {
                return Err(CompletionError::Truncated);
            }
            warn!(
                model = %model,
                chars = self.produced_chars,
                "Provider stream hit the length limit, using partial content"
            );
        }
        Ok(())
    }
}

fn status_error(model: &str, status: reqwest::StatusCode, body: String) -> CompletionError {
    match status.as_u16() {
        404 => CompletionError::ModelNotFound(model.to_string()),
        429 => CompletionError::QuotaExceeded(model.to_string()),
        code => CompletionError::Api {
            status: code,
            message: body,
        },
    }
}

/// Gemini API client
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    candidates: Vec<String>,
    model_cache: ModelCache,
}

impl GeminiClient {
    pub fn new(config: &ProviderConfig, api_key: Option<String>) -> Result<Self, CompletionError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            candidates: config.models.clone(),
            model_cache: ModelCache::new(),
        })
    }

    fn api_key(&self) -> Result<&str, CompletionError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompletionError::NotConfigured("API key is not set".to_string()))
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/{}/models/{}", self.base_url, API_VERSION, model)
    }

    /// Cached model, resolving it first when absent
    pub async fn selected_model(&self) -> Result<String, CompletionError> {
        if let Some(model) = self.model_cache.get().await {
            return Ok(model);
        }

        let mut probes = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            let outcome = self.probe(candidate).await?;
            let available = outcome == ProbeOutcome::Available;
            if !available {
                warn!(model = %candidate, outcome = ?outcome, "Skipping model candidate");
            }
            probes.push((candidate.clone(), outcome));
            if available {
                break;
            }
        }

        let model = resolve_model(&probes)?;
        info!(model = %model, "Selected provider model");
        self.model_cache.set(model.clone()).await;
        Ok(model)
    }

    async fn probe(&self, model: &str) -> Result<ProbeOutcome, CompletionError> {
        let response = match self
            .http_client
            .get(self.model_url(model))
            .header(API_KEY_HEADER, self.api_key()?)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(ProbeOutcome::Failed(e.to_string())),
        };

        let status = response.status();
        let outcome = match status.as_u16() {
            200..=299 => ProbeOutcome::Available,
            404 => ProbeOutcome::NotFound,
            429 => ProbeOutcome::QuotaExceeded,
            _ => {
                let body = response.text().await.unwrap_or_default();
                ProbeOutcome::Failed(format!("{}: {}", status, body))
            }
        };
        Ok(outcome)
    }

    /// POST one generation request, mapping non-success statuses
    async fn send(
        &self,
        model: &str,
        method: &str,
        prompt: &str,
        max_output: u32,
    ) -> Result<reqwest::Response, CompletionError> {
        let url = format!("{}:{}", self.model_url(model), method);
        debug!(model = %model, method = %method, prompt_chars = prompt.chars().count(), "Calling provider");

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key()?)
            .json(&GenerateContentRequest::new(prompt, max_output))
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = status_error(model, status, body);
            if error.invalidates_model() {
                warn!(model = %model, error = %error, "Dropping cached model choice");
                self.model_cache.clear().await;
            }
            return Err(error);
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(&self, prompt: &str, max_output: u32) -> Result<String, CompletionError> {
        let model = self.selected_model().await?;
        let response = self
            .send(&model, "generateContent", prompt, max_output)
            .await?;

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        interpret_response(&model, &body)
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        max_output: u32,
    ) -> Result<FragmentStream, CompletionError> {
        let model = self.selected_model().await?;
        let response = self
            .send(&model, "streamGenerateContent?alt=sse", prompt, max_output)
            .await?;

        let mut bytes = Box::pin(response.bytes_stream());
        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            let mut state = StreamState::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| CompletionError::Network(e.to_string()))?;
                decoder.push_chunk(&chunk);
                while let Some(data) = decoder.next_data() {
                    if let Some(text) = state.read_frame(&data)? {
                        yield text;
                    }
                }
            }

            if let Some(data) = decoder.finish() {
                if let Some(text) = state.read_frame(&data)? {
                    yield text;
                }
            }

            state.finish(&model)?;
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_carries_instruction_and_safety() {
        let body = serde_json::to_value(GenerateContentRequest::new("Write", 512)).unwrap();

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            SYSTEM_INSTRUCTION
        );
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Write");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);

        let settings = body["safetySettings"].as_array().unwrap();
        assert_eq!(settings.len(), 4);
        assert!(settings.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
    }

    #[test]
    fn test_interpret_plain_text() {
        let body = response(json!({
            "candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "world"}]}, "finishReason": "STOP"}]
        }));
        assert_eq!(interpret_response("m", &body).unwrap(), "Hello world");
    }

    #[test]
    fn test_interpret_safety_block() {
        let prompt_blocked = response(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        assert!(matches!(
            interpret_response("m", &prompt_blocked),
            Err(CompletionError::SafetyBlocked)
        ));

        let output_blocked = response(json!({"candidates": [{"finishReason": "SAFETY"}]}));
        assert!(matches!(
            interpret_response("m", &output_blocked),
            Err(CompletionError::SafetyBlocked)
        ));
    }

    #[test]
    fn test_interpret_truncation() {
        let partial = response(json!({
            "candidates": [{"content": {"parts": [{"text": "partial"}]}, "finishReason": "MAX_TOKENS"}]
        }));
        assert_eq!(interpret_response("m", &partial).unwrap(), "partial");

        let nothing = response(json!({"candidates": [{"finishReason": "MAX_TOKENS"}]}));
        assert!(matches!(
            interpret_response("m", &nothing),
            Err(CompletionError::Truncated)
        ));
    }

    #[test]
    fn test_interpret_empty() {
        let empty = response(json!({"candidates": []}));
        assert!(matches!(
            interpret_response("m", &empty),
            Err(CompletionError::EmptyResult)
        ));

        let whitespace = response(json!({
            "candidates": [{"content": {"parts": [{"text": "  \n"}]}, "finishReason": "STOP"}]
        }));
        assert!(matches!(
            interpret_response("m", &whitespace),
            Err(CompletionError::EmptyResult)
        ));
    }

    #[test]
    fn test_stream_state_length_limit() {
        let mut state = StreamState::default();
        let frame = r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#;
        assert_eq!(state.read_frame(frame).unwrap(), None);
        assert!(matches!(state.finish("m"), Err(CompletionError::Truncated)));

        let mut state = StreamState::default();
        let frame = r#"{"candidates":[{"content":{"parts":[{"text":"abc"}]},"finishReason":"MAX_TOKENS"}]}"#;
        assert_eq!(state.read_frame(frame).unwrap().as_deref(), Some("abc"));
        assert!(state.finish("m").is_ok());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error("m", reqwest::StatusCode::TOO_MANY_REQUESTS, String::new()),
            CompletionError::QuotaExceeded(_)
        ));
        assert!(matches!(
            status_error("m", reqwest::StatusCode::NOT_FOUND, String::new()),
            CompletionError::ModelNotFound(_)
        ));
        assert!(matches!(
            status_error("m", reqwest::StatusCode::BAD_REQUEST, "bad".into()),
            CompletionError::Api { status: 400, .. }
        ));
    }
}
