use super::{ProviderError, ProviderResponse, PushProvider};
use crate::config::FcmConfig;
use crate::models::PushMessage;
use crate::services::credentials::{AccessTokenSource, ServiceAccountKey};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub struct FcmProvider {
    project_id: String,
    api_base_url: String,
    token_source: AccessTokenSource,
    client: Client,
}

#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Debug, Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    notification: FcmNotification<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorEnvelope {
    error: FcmError,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct FcmError {
    code: i32,
    message: String,
    status: String,
}

impl FcmProvider {
    pub fn new(
        project_id: String,
        api_base_url: String,
        token_source: AccessTokenSource,
        client: Client,
    ) -> Self {
        Self {
            project_id,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token_source,
            client,
        }
    }

    /// Resolve credentials once at startup.
    ///
    /// A configured access token wins; otherwise the service-account key is
    /// read from `credentials_path` and also supplies the default project id.
    pub fn from_config(config: &FcmConfig) -> Result<Self, ProviderError> {
        let client = Client::new();

        let (project_id, token_source) = match &config.access_token {
            Some(token) => {
                let project_id = config.project_id.clone().ok_or_else(|| {
                    ProviderError::Configuration(
                        "FCM project_id is required with a static access token".to_string(),
                    )
                })?;
                (project_id, AccessTokenSource::Static(token.clone()))
            }
            None => {
                let key = ServiceAccountKey::from_file(&config.credentials_path)?;
                let project_id = config
                    .project_id
                    .clone()
                    .unwrap_or_else(|| key.project_id.clone());
                (
                    project_id,
                    AccessTokenSource::service_account(key, client.clone()),
                )
            }
        };

        if project_id.is_empty() {
            return Err(ProviderError::Configuration(
                "FCM project_id is not configured".to_string(),
            ));
        }

        tracing::info!(project_id = %project_id, "FCM credentials loaded");

        Ok(Self::new(
            project_id,
            config.api_base_url.clone(),
            token_source,
            client,
        ))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base_url, self.project_id
        )
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn send(&self, push: &PushMessage) -> Result<ProviderResponse, ProviderError> {
        let access_token = self.token_source.access_token().await?;

        let request = FcmRequest {
            message: FcmMessage {
                token: &push.token,
                notification: FcmNotification {
                    title: &push.title,
                    body: &push.body,
                },
                data: push.data.as_ref(),
            },
        };

        let response = self
            .client
            .post(self.send_url())
            .bearer_auth(&access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to connect to FCM: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<FcmErrorEnvelope>(&body) {
                Ok(envelope) => ProviderError::SendFailed(format!(
                    "FCM error ({}): {}",
                    envelope.error.status, envelope.error.message
                )),
                Err(_) => ProviderError::SendFailed(format!(
                    "FCM API returned error status {}: {}",
                    status, body
                )),
            });
        }

        let fcm_response: FcmResponse = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse FCM response: {}", e))
        })?;

        tracing::info!(
            message_name = ?fcm_response.name,
            "Push notification sent successfully via FCM"
        );

        Ok(ProviderResponse::success(fcm_response.name))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.token_source.access_token().await.map(|_| ())
    }
}

/// In-process push provider that records what it would have sent.
pub struct MockPushProvider {
    enabled: bool,
    failure: Option<ProviderError>,
    send_count: AtomicU64,
    sent: Mutex<Vec<PushMessage>>,
}

impl MockPushProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            failure: None,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every send fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(true)
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent_messages(&self) -> Vec<PushMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PushProvider for MockPushProvider {
    async fn send(&self, push: &PushMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "Mock push provider is not enabled".to_string(),
            ));
        }

        let count = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(push.clone());
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        tracing::info!(
            title = %push.title,
            "[MOCK] Push notification would be sent"
        );

        Ok(ProviderResponse::success(Some(format!("mock-push-{}", count))))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ProviderError::NotEnabled(
                "Mock push provider is not enabled".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use secrecy::Secret;
    use serde_json::json;

    fn static_provider(base_url: String) -> FcmProvider {
        FcmProvider::new(
            "demo".to_string(),
            base_url,
            AccessTokenSource::Static(Secret::new("static-token".to_string())),
            Client::new(),
        )
    }

    #[tokio::test]
    async fn sends_v1_message_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/projects/demo/messages:send")
            .match_header("authorization", "Bearer static-token")
            .match_body(Matcher::Json(json!({
                "message": {
                    "token": "TOK",
                    "notification": { "title": "New Message", "body": "hi" }
                }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"projects/demo/messages/0:1"}"#)
            .create_async()
            .await;

        let provider = static_provider(server.url());
        let response = provider
            .send(&PushMessage::relayed("TOK", "hi"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            response.provider_id.as_deref(),
            Some("projects/demo/messages/0:1")
        );
    }

    #[tokio::test]
    async fn maps_fcm_error_envelope() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/projects/demo/messages:send")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#,
            )
            .create_async()
            .await;

        let err = static_provider(server.url())
            .send(&PushMessage::relayed("stale", "hi"))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Send error: FCM error (NOT_FOUND): Requested entity was not found."
        );
    }

    #[tokio::test]
    async fn non_json_error_body_keeps_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/projects/demo/messages:send")
            .with_status(502)
            .with_body("upstream down")
            .create_async()
            .await;

        let err = static_provider(server.url())
            .send(&PushMessage::relayed("TOK", "hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::SendFailed(_)));
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("upstream down"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_connection_error() {
        let err = static_provider("http://127.0.0.1:1".to_string())
            .send(&PushMessage::relayed("TOK", "hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Connection(_)));
    }

    #[test]
    fn static_token_requires_project_id() {
        let config = FcmConfig {
            enabled: true,
            project_id: None,
            credentials_path: "firebase.json".to_string(),
            access_token: Some(Secret::new("t".to_string())),
            api_base_url: "https://fcm.googleapis.com".to_string(),
        };

        assert!(matches!(
            FcmProvider::from_config(&config),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn mock_records_messages() {
        let provider = MockPushProvider::new(true);
        provider
            .send(&PushMessage::relayed("TOK", "hi"))
            .await
            .unwrap();

        assert_eq!(provider.send_count(), 1);
        assert_eq!(provider.sent_messages()[0].token, "TOK");
    }

    #[tokio::test]
    async fn failing_mock_still_counts_attempt() {
        let provider = MockPushProvider::failing(ProviderError::SendFailed("boom".to_string()));
        let err = provider
            .send(&PushMessage::relayed("TOK", "hi"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Send error: boom");
        assert_eq!(provider.send_count(), 1);
    }

    #[tokio::test]
    async fn disabled_mock_rejects_sends() {
        let provider = MockPushProvider::new(false);
        assert!(matches!(
            provider.send(&PushMessage::relayed("TOK", "hi")).await,
            Err(ProviderError::NotEnabled(_))
        ));
        assert_eq!(provider.send_count(), 0);
        assert!(provider.health_check().await.is_err());
    }

    #[tokio::test]
    async fn static_token_provider_is_healthy() {
        assert!(static_provider("http://127.0.0.1:1".to_string())
            .health_check()
            .await
            .is_ok());
    }
}
