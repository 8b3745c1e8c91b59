//! Application startup and lifecycle management.
//!
//! Wires the recipient store and push provider into shared state, builds the
//! router, and runs the HTTP server until a shutdown signal arrives.

use crate::config::RelayConfig;
use crate::handlers::{health_check, metrics_endpoint, readiness_check, relay_handler};
use crate::services::{FcmProvider, MockPushProvider, MongoRecipientStore, PushProvider, RecipientStore};
use axum::{middleware::from_fn, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::{make_request_span, metrics_middleware, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub recipients: Arc<dyn RecipientStore>,
    pub push_provider: Arc<dyn PushProvider>,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        recipients: Arc<dyn RecipientStore>,
        push_provider: Arc<dyn PushProvider>,
    ) -> Self {
        Self {
            config,
            recipients,
            push_provider,
        }
    }
}

/// Probe and metrics routes, with every other request going to the relay.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .fallback(relay_handler)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    ///
    /// Connects to MongoDB and, when FCM is enabled, loads its credentials.
    /// Either failing aborts startup.
    pub async fn build(config: RelayConfig) -> Result<Self, AppError> {
        let recipients = MongoRecipientStore::connect(
            &config.mongodb.uri,
            &config.mongodb.database,
            &config.mongodb.recipients_collection,
        )
        .await?;

        let push_provider: Arc<dyn PushProvider> = if config.fcm.enabled {
            let provider = FcmProvider::from_config(&config.fcm).map_err(|e| {
                tracing::error!("Failed to initialize FCM provider: {}", e);
                AppError::ConfigError(anyhow::Error::new(e))
            })?;
            tracing::info!("FCM push provider initialized");
            Arc::new(provider)
        } else {
            tracing::warn!("FCM provider disabled, using mock push provider; nothing will be delivered");
            Arc::new(MockPushProvider::new(true))
        };

        Self::build_with(config, Arc::new(recipients), push_provider).await
    }

    /// Build around already constructed collaborators.
    pub async fn build_with(
        config: RelayConfig,
        recipients: Arc<dyn RecipientStore>,
        push_provider: Arc<dyn PushProvider>,
    ) -> Result<Self, AppError> {
        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Relay service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, recipients, push_provider),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT or SIGTERM, then drain in-flight requests.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
pub(crate) fn test_state(
    recipients: Arc<dyn RecipientStore>,
    push_provider: Arc<dyn PushProvider>,
    exposure: crate::config::ExposureConfig,
) -> AppState {
    use crate::config::{FcmConfig, MongoConfig, DEFAULT_FCM_API_BASE_URL};

    let config = RelayConfig {
        common: service_core::config::Config::default(),
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "relay_test".to_string(),
            recipients_collection: "users".to_string(),
        },
        fcm: FcmConfig {
            enabled: false,
            project_id: None,
            credentials_path: "firebase.json".to_string(),
            access_token: None,
            api_base_url: DEFAULT_FCM_API_BASE_URL.to_string(),
        },
        exposure,
    };

    AppState::new(config, recipients, push_provider)
}
