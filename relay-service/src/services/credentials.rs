//! OAuth2 credentials for the FCM HTTP v1 API.
//!
//! FCM accepts a short-lived Google access token. It is minted from a
//! service-account key by signing an RS256 JWT assertion and exchanging it
//! at the key's `token_uri`. A static token can be configured instead, which
//! skips the exchange entirely.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::providers::ProviderError;

pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: Secret<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Configuration(format!(
                "Failed to read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(raw).map_err(|e| {
            ProviderError::Configuration(format!("Invalid service account key: {}", e))
        })
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

pub struct CachedToken {
    token: String,
    refresh_at: Instant,
}

pub enum AccessTokenSource {
    Static(Secret<String>),
    ServiceAccount {
        key: ServiceAccountKey,
        client: Client,
        cached: RwLock<Option<CachedToken>>,
    },
}

impl AccessTokenSource {
    pub fn service_account(key: ServiceAccountKey, client: Client) -> Self {
        AccessTokenSource::ServiceAccount {
            key,
            client,
            cached: RwLock::new(None),
        }
    }

    /// A bearer token valid for at least the next minute.
    pub async fn access_token(&self) -> Result<String, ProviderError> {
        match self {
            AccessTokenSource::Static(token) => Ok(token.expose_secret().clone()),
            AccessTokenSource::ServiceAccount {
                key,
                client,
                cached,
            } => {
                if let Some(token) = cached.read().await.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.token.clone());
                    }
                }

                let mut slot = cached.write().await;
                if let Some(token) = slot.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.token.clone());
                    }
                }

                let minted = mint_access_token(key, client).await?;
                let lifetime = Duration::from_secs(minted.expires_in);
                let token = minted.access_token;
                *slot = Some(CachedToken {
                    token: token.clone(),
                    refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
                });
                Ok(token)
            }
        }
    }
}

fn sign_assertion(key: &ServiceAccountKey) -> Result<String, ProviderError> {
    let iat = Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: FCM_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
        .map_err(|e| ProviderError::Authentication(format!("Invalid private key: {}", e)))?;

    encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| ProviderError::Authentication(format!("Failed to sign assertion: {}", e)))
}

async fn mint_access_token(
    key: &ServiceAccountKey,
    client: &Client,
) -> Result<TokenResponse, ProviderError> {
    let assertion = sign_assertion(key)?;

    let response = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| {
            ProviderError::Connection(format!("Failed to reach token endpoint: {}", e))
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Authentication(format!(
            "Token endpoint returned {}: {}",
            status, body
        )));
    }

    let token: TokenResponse = response.json().await.map_err(|e| {
        ProviderError::Authentication(format!("Failed to parse token response: {}", e))
    })?;

    tracing::debug!(
        client_email = %key.client_email,
        expires_in = token.expires_in,
        "Minted FCM access token"
    );

    Ok(token)
}
