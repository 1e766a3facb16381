use std::time::Duration;

use async_trait::async_trait;
use levo_models::{AdvisorConfig, Advice, MarketSignal, PositionSnapshot, SuggestedAmounts};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::AdvisoryError;
use crate::parser::parse_advice;
use crate::prompts::build_prompt;

/// Decision oracle. Mockable for testing.
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn decide(
        &self,
        snapshot: &PositionSnapshot,
        signal: &MarketSignal,
        cancel: &CancellationToken,
    ) -> Result<Advice, AdvisoryError>;
}

/// Posts the prompt to the oracle's message endpoint.
///
/// The POST exchange is bounded by `timeout`. After the reply arrives the
/// advisor waits `settle` before treating it as final; both waits end early
/// with [`AdvisoryError::Cancelled`] when the session is stopped.
pub struct HttpAdvisor {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
    settle: Duration,
    user_id: String,
    user_name: String,
    suggested: SuggestedAmounts,
}

impl HttpAdvisor {
    pub fn new(config: &AdvisorConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            settle: Duration::from_secs(config.settle_seconds),
            user_id: config.user_id.clone(),
            user_name: config.user_name.clone(),
            suggested: config.suggested.clone(),
        }
    }

    async fn exchange(&self, text: String) -> Result<String, AdvisoryError> {
        let body = json!({
            "text": text,
            "userId": self.user_id,
            "userName": self.user_name,
        });
        let response = self.http.post(&self.url).json(&body).send().await?;
        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(AdvisoryError::Transport(format!(
                "{} returned {status}: {raw}",
                self.url
            )));
        }
        Ok(raw)
    }
}

#[async_trait]
impl Advisor for HttpAdvisor {
    async fn decide(
        &self,
        snapshot: &PositionSnapshot,
        signal: &MarketSignal,
        cancel: &CancellationToken,
    ) -> Result<Advice, AdvisoryError> {
        let prompt = build_prompt(snapshot, signal, &self.suggested)?;
        let text = serde_json::to_string_pretty(&prompt)?;
        debug!(prompt_len = text.len(), "Sending prompt to advisor");

        let raw = tokio::select! {
            _ = cancel.cancelled() => return Err(AdvisoryError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.exchange(text)) => {
                result.map_err(|_| AdvisoryError::Timeout(self.timeout.as_secs()))??
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return Err(AdvisoryError::Cancelled),
            _ = tokio::time::sleep(self.settle) => {}
        }

        let advice = parse_advice(&raw)?;
        info!(decision = %advice.decision, "Advisor decided");
        Ok(advice)
    }
}
