pub mod push;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::PushMessage;

pub use push::{FcmProvider, MockPushProvider};

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Authentication error: {0}")]
    Authentication(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Message name assigned by the provider, e.g. `projects/p/messages/123`.
    pub provider_id: Option<String>,
}

impl ProviderResponse {
    pub fn success(provider_id: Option<String>) -> Self {
        Self { provider_id }
    }
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send(&self, push: &PushMessage) -> Result<ProviderResponse, ProviderError>;
    /// Whether the provider can currently accept sends.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
