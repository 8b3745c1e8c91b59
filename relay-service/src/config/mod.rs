use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

pub const DEFAULT_FCM_API_BASE_URL: &str = "https://fcm.googleapis.com";

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub fcm: FcmConfig,
    pub exposure: ExposureConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub recipients_collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    pub enabled: bool,
    /// Falls back to the `project_id` of the service-account key.
    pub project_id: Option<String>,
    /// Service-account key file, as downloaded from the Firebase console.
    pub credentials_path: String,
    /// Pre-minted bearer token. Takes precedence over `credentials_path`.
    pub access_token: Option<Secret<String>>,
    pub api_base_url: String,
}

/// What the relay echoes back to callers on failure paths.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExposureConfig {
    /// Omit `userData` from the token-missing 404 body.
    pub redact_user_data: bool,
    /// Send an empty `stack` on 500 responses.
    pub redact_diagnostics: bool,
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = is_prod();

        Ok(RelayConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("relay_db"), is_prod)?,
                recipients_collection: get_env("RECIPIENTS_COLLECTION", Some("users"), is_prod)?,
            },
            fcm: FcmConfig::from_env(is_prod)?,
            exposure: ExposureConfig {
                redact_user_data: get_flag("RELAY_REDACT_USER_DATA"),
                redact_diagnostics: get_flag("RELAY_REDACT_DIAGNOSTICS"),
            },
        })
    }
}

impl FcmConfig {
    /// FCM settings from the environment.
    ///
    /// In production FCM is on unless disabled, and disabling it is an error.
    /// The key file path is only required when the key file will be read.
    pub fn from_env(is_prod: bool) -> Result<Self, AppError> {
        let enabled = fcm_enabled(env::var("FCM_ENABLED").ok(), is_prod)?;
        let access_token = env::var("FCM_ACCESS_TOKEN")
            .ok()
            .filter(|v| !v.is_empty())
            .map(Secret::new);
        let needs_key_file = enabled && access_token.is_none();

        Ok(FcmConfig {
            enabled,
            project_id: env::var("FCM_PROJECT_ID").ok().filter(|v| !v.is_empty()),
            credentials_path: get_env(
                "FCM_CREDENTIALS_PATH",
                Some("firebase.json"),
                is_prod && needs_key_file,
            )?,
            access_token,
            api_base_url: get_env(
                "FCM_API_BASE_URL",
                Some(DEFAULT_FCM_API_BASE_URL),
                false,
            )?,
        })
    }
}

fn fcm_enabled(raw: Option<String>, is_prod: bool) -> Result<bool, AppError> {
    let enabled = match raw {
        Some(value) => value.parse().unwrap_or(false),
        None => is_prod,
    };

    if is_prod && !enabled {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "FCM_ENABLED must be true in production"
        )));
    }

    Ok(enabled)
}

pub fn is_prod() -> bool {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod"
}

fn get_flag(key: &str) -> bool {
    env::var(key)
        .unwrap_or_else(|_| "false".to_string())
        .parse()
        .unwrap_or(false)
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
