//! Client for the external authenticity-analysis service, plus the bounded
//! worker pool that rations calls to it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use factlens_common::Verdict;
use factlens_config::AnalysisConfig;
use serde::Serialize;
use tokio::sync::Semaphore;

/// Payload handed to the analysis service for one extracted article.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub text: String,
    pub images: Vec<String>,
    pub source_url: String,
}

/// Seam over the analysis backend; the HTTP implementation is the production
/// one, tests substitute their own.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyse(&self, request: &AnalysisRequest) -> anyhow::Result<Verdict>;
}

/// JSON-over-HTTP analysis client.
pub struct HttpAnalysisService {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpAnalysisService {
    pub fn new(config: &AnalysisConfig) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow!("analysis endpoint is not configured"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            auth_token: config.auth_token.clone(),
        })
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn analyse(&self, request: &AnalysisRequest) -> anyhow::Result<Verdict> {
        let mut call = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.auth_token {
            call = call.bearer_auth(token);
        }
        let response = call
            .send()
            .await
            .context("analysis request failed to send")?
            .error_for_status()
            .context("analysis service returned an error status")?;
        response
            .json::<Verdict>()
            .await
            .context("analysis response was not a valid verdict")
    }
}

/// Bounded pool in front of an [`AnalysisService`].
///
/// Slot acquisition is FIFO-fair (semaphore queue order) and slots are held
/// as RAII permits, so a panicking, failing, or timed-out call can never
/// leak one. Each admitted call is retried with exponential backoff.
pub struct AnalysisPool {
    service: Arc<dyn AnalysisService>,
    slots: Arc<Semaphore>,
    timeout: Duration,
    max_attempts: u32,
}

impl AnalysisPool {
    pub fn new(service: Arc<dyn AnalysisService>, config: &AnalysisConfig) -> Self {
        Self {
            service,
            slots: Arc::new(Semaphore::new(config.pool_size.max(1))),
            timeout: config.timeout(),
            max_attempts: config.max_attempts.max(1),
        }
    }

    pub async fn analyse(&self, request: &AnalysisRequest) -> anyhow::Result<Verdict> {
        let _permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .context("analysis pool closed")?;

        let mut last_error = anyhow!("analysis never attempted");
        for attempt in 1..=self.max_attempts {
            match tokio::time::timeout(self.timeout, self.service.analyse(request)).await {
                Ok(Ok(verdict)) => return Ok(verdict),
                Ok(Err(err)) => {
                    tracing::warn!(attempt, error = %err, "analysis call failed");
                    last_error = err;
                }
                Err(_) => {
                    tracing::warn!(attempt, timeout = ?self.timeout, "analysis call timed out");
                    last_error = anyhow!("analysis timed out after {:?}", self.timeout);
                }
            }
            if attempt < self.max_attempts {
                let backoff = Duration::from_secs(1) * 2u32.pow(attempt - 1);
                tokio::time::sleep(backoff).await;
            }
        }
        Err(last_error.context(format!("analysis failed after {} attempts", self.max_attempts)))
    }
}
