//! Google Gemini `generateContent` backend.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use super::{classify_status, classify_transport, BackendAdapter, Prompt, RateLimiter};
use crate::error::{BackendError, BackendResult};
use crate::security::BackendCredentials;
use crate::types::BackendDescriptor;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Backend adapter over the Gemini REST API.
pub struct GeminiBackend {
    client: Client,
    credentials: BackendCredentials,
    descriptor: BackendDescriptor,
    limiter: Arc<RateLimiter>,
}

impl GeminiBackend {
    pub fn new(credentials: BackendCredentials, limiter: Arc<RateLimiter>) -> Self {
        let descriptor = BackendDescriptor::gemini(&credentials.model);
        Self {
            client: Client::new(),
            credentials,
            descriptor,
            limiter,
        }
    }

    pub fn with_descriptor(mut self, descriptor: BackendDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        let base = self
            .credentials
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL);
        format!("{}/models/{}:generateContent", base, self.descriptor.model)
    }

    async fn call(&self, prompt: &Prompt) -> BackendResult<String> {
        let name = self.descriptor.name.as_str();
        self.limiter.acquire(name).await;

        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &prompt.system,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &prompt.user }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: self.descriptor.max_tokens,
                response_mime_type: prompt.json_output.then_some("application/json"),
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.credentials.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(name, status, &body));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(name, e.to_string()))?;

        if let Some(usage) = &generated.usage_metadata {
            debug!(
                backend = name,
                prompt_tokens = usage.prompt_token_count,
                completion_tokens = usage.candidates_token_count,
                estimated_cost_usd = self
                    .descriptor
                    .cost
                    .estimate(usage.prompt_token_count, usage.candidates_token_count),
                "Backend call completed"
            );
        }

        generated.into_text(name)
    }
}

#[async_trait]
impl BackendAdapter for GeminiBackend {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn generate(&self, prompt: &Prompt, deadline: Instant) -> BackendResult<String> {
        match timeout_at(deadline, self.call(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::timeout(
                &self.descriptor.name,
                "deadline elapsed before completion",
            )),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl GenerateResponse {
    /// Concatenate the text parts of the first candidate.
    fn into_text(self, backend: &str) -> BackendResult<String> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::invalid_response(backend, "no candidates returned"))?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if matches!(reason, "SAFETY" | "RECITATION" | "BLOCKLIST") {
                return Err(BackendError::invalid_response(
                    backend,
                    format!("generation stopped: {}", reason),
                ));
            }
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BackendError::invalid_response(backend, "empty completion"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendErrorKind;

    #[test]
    fn test_request_uses_camel_case() {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: "sys" }],
            },
            contents: vec![],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 1024,
                response_mime_type: Some("application/json"),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert!(json["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn test_text_parts_are_joined() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"grants\":"},{"text":"[]}"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_text("gemini").unwrap(), r#"{"grants":[]}"#);
    }

    #[test]
    fn test_safety_stop_is_invalid_response() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"SAFETY"}]}"#,
        )
        .unwrap();
        let err = response.into_text("gemini").unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::InvalidResponse);
    }

    #[test]
    fn test_no_candidates_is_invalid_response() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(
            response.into_text("gemini").unwrap_err().kind,
            BackendErrorKind::InvalidResponse
        );
    }
}
