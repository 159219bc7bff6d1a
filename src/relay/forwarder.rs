//! Outbound JSON POST to the peer service.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::config::PeerConfig;
use crate::http::response::CONTENT_TYPE_JSON;

/// Failures while notifying the peer.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Failed to build peer client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Peer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Peer request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Peer answered with status {0}")]
    Status(u16),
}

/// What the peer said back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardReceipt {
    pub status: u16,
    pub body: String,
}

/// Coarse result of one forward, used for metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    Delivered,
    Rejected,
    Failed,
}

impl ForwardOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardOutcome::Delivered => "delivered",
            ForwardOutcome::Rejected => "rejected",
            ForwardOutcome::Failed => "failed",
        }
    }
}

/// Posts prediction payloads to a fixed peer URL.
#[derive(Debug, Clone)]
pub struct PeerForwarder {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl PeerForwarder {
    pub fn new(config: &PeerConfig) -> Result<Self, ForwardError> {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(ForwardError::Client)?;

        Ok(Self {
            client,
            url: config.url(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one payload. Non-2xx replies are errors.
    pub async fn send(&self, payload: &str) -> Result<ForwardReceipt, ForwardError> {
        let request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(payload.to_owned())
            .send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => return Err(ForwardError::Timeout(self.timeout)),
            Ok(Err(e)) => return Err(ForwardError::Transport(e)),
            Err(_) => return Err(ForwardError::Timeout(self.timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Status(status.as_u16()));
        }

        // The reply body is informational; a truncated read is not a failure.
        let body = response.text().await.unwrap_or_default();
        Ok(ForwardReceipt {
            status: status.as_u16(),
            body,
        })
    }

    /// Send and log the outcome. Never fails.
    pub async fn forward(&self, payload: &str) -> ForwardOutcome {
        tracing::debug!(url = %self.url, bytes = payload.len(), "Forwarding prediction");

        match self.send(payload).await {
            Ok(receipt) => {
                tracing::info!(
                    url = %self.url,
                    status = receipt.status,
                    "Prediction delivered to peer"
                );
                ForwardOutcome::Delivered
            }
            Err(ForwardError::Status(status)) => {
                tracing::warn!(url = %self.url, status, "Peer rejected prediction");
                ForwardOutcome::Rejected
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Failed to forward prediction");
                ForwardOutcome::Failed
            }
        }
    }
}
