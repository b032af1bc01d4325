//! OpenAI chat-completions backend.

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

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Backend adapter over the OpenAI chat-completions API.
pub struct OpenAiBackend {
    client: Client,
    credentials: BackendCredentials,
    descriptor: BackendDescriptor,
    limiter: Arc<RateLimiter>,
}

impl OpenAiBackend {
    pub fn new(credentials: BackendCredentials, limiter: Arc<RateLimiter>) -> Self {
        let descriptor = BackendDescriptor::openai(&credentials.model);
        Self {
            client: Client::new(),
            credentials,
            descriptor,
            limiter,
        }
    }

    /// Replace the default descriptor (floor, token cap, cost).
    pub fn with_descriptor(mut self, descriptor: BackendDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn base_url(&self) -> &str {
        self.credentials
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
    }

    async fn call(&self, prompt: &Prompt) -> BackendResult<String> {
        let name = self.descriptor.name.as_str();
        self.limiter.acquire(name).await;

        let request = ChatRequest {
            model: &self.descriptor.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.1,
            max_tokens: self.descriptor.max_tokens,
            response_format: prompt.json_output.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url()))
            .bearer_auth(self.credentials.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(name, status, &body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(name, e.to_string()))?;

        if let Some(usage) = &chat.usage {
            debug!(
                backend = name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                estimated_cost_usd = self
                    .descriptor
                    .cost
                    .estimate(usage.prompt_tokens, usage.completion_tokens),
                "Backend call completed"
            );
        }

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| BackendError::invalid_response(name, "empty completion"))
    }
}

#[async_trait]
impl BackendAdapter for OpenAiBackend {
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
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
