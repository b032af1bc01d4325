use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;

use crate::backends::{
    BackendAdapter, FallbackController, GeminiBackend, OpenAiBackend, RateLimiter,
};
use crate::discovery::DEFAULT_INTER_TASK_DELAY;
use crate::quality::StatusMonitor;
use crate::security::BackendCredentials;
use crate::types::{BackendDescriptor, GEMINI, OPENAI};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Oracle configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub openai: Option<BackendCredentials>,
    pub gemini: Option<BackendCredentials>,
    pub primary_backend: String,
    pub pinned_backend: Option<String>,
    pub inter_task_delay: Duration,
    pub status_refresh: Duration,
}

impl OracleConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_model = var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let gemini_model = var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let primary_backend = var("PRIMARY_BACKEND")
            .map(|b| b.trim().to_lowercase())
            .unwrap_or_else(|| OPENAI.to_string());
        let pinned_backend = var("PIN_BACKEND").map(|b| b.trim().to_lowercase());
        for name in std::iter::once(&primary_backend).chain(pinned_backend.iter()) {
            if name != OPENAI && name != GEMINI {
                bail!("unknown backend {:?}: expected {} or {}", name, OPENAI, GEMINI);
            }
        }

        let inter_task_delay = match var("INTER_TASK_DELAY_SECS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .context("INTER_TASK_DELAY_SECS must be a whole number of seconds")?,
            ),
            None => DEFAULT_INTER_TASK_DELAY,
        };
        let status_refresh = match var("STATUS_REFRESH_HOURS") {
            Some(raw) => {
                let hours: u64 = raw
                    .trim()
                    .parse()
                    .context("STATUS_REFRESH_HOURS must be a whole number of hours")?;
                let secs = hours
                    .checked_mul(3600)
                    .context("STATUS_REFRESH_HOURS is too large")?;
                Duration::from_secs(secs)
            }
            None => crate::quality::status::DEFAULT_REFRESH_INTERVAL,
        };

        Ok(Self {
            openai: var("OPENAI_API_KEY").map(|key| {
                BackendCredentials::new(&key, openai_model).with_base_url(var("OPENAI_BASE_URL"))
            }),
            gemini: var("GOOGLE_API_KEY").map(|key| {
                BackendCredentials::new(&key, gemini_model).with_base_url(var("GEMINI_BASE_URL"))
            }),
            primary_backend,
            pinned_backend,
            inter_task_delay,
            status_refresh,
        })
    }

    /// Descriptors of the backends that have a key.
    pub fn descriptors(&self) -> Vec<BackendDescriptor> {
        let mut descriptors = Vec::new();
        if let Some(creds) = &self.openai {
            descriptors.push(BackendDescriptor::openai(&creds.model));
        }
        if let Some(creds) = &self.gemini {
            descriptors.push(BackendDescriptor::gemini(&creds.model));
        }
        descriptors
    }

    /// Adapters for every configured backend, sharing one limiter.
    pub fn backends(&self) -> Vec<Arc<dyn BackendAdapter>> {
        let limiter = Arc::new(RateLimiter::from_descriptors(&self.descriptors()));
        let mut backends: Vec<Arc<dyn BackendAdapter>> = Vec::new();
        if let Some(creds) = &self.openai {
            backends.push(Arc::new(OpenAiBackend::new(creds.clone(), limiter.clone())));
        }
        if let Some(creds) = &self.gemini {
            backends.push(Arc::new(GeminiBackend::new(creds.clone(), limiter.clone())));
        }
        backends
    }

    /// Fallback controller over the configured backends.
    ///
    /// Fails when no backend key is set at all.
    pub fn controller(&self) -> Result<FallbackController> {
        let backends = self.backends();
        if backends.is_empty() {
            bail!("no AI backend configured: set OPENAI_API_KEY and/or GOOGLE_API_KEY");
        }
        Ok(FallbackController::new(backends)
            .with_primary(self.primary_backend.clone())
            .with_pinned(self.pinned_backend.clone()))
    }

    pub fn status_monitor(&self) -> StatusMonitor {
        StatusMonitor::new(self.status_refresh)
    }
}
