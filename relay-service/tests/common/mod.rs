#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use relay_service::config::{
    ExposureConfig, FcmConfig, MongoConfig, RelayConfig, DEFAULT_FCM_API_BASE_URL,
};
use relay_service::services::{InMemoryRecipientStore, MockPushProvider};
use relay_service::startup::{build_router, AppState, Application};
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use tower::util::ServiceExt;

pub fn test_config() -> RelayConfig {
    RelayConfig {
        // Use random port for testing (port 0)
        common: CoreConfig {
            port: 0,
            ..CoreConfig::default()
        },
        mongodb: MongoConfig {
            uri: std::env::var("TEST_MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            database: "relay_test".to_string(),
            recipients_collection: "users".to_string(),
        },
        fcm: FcmConfig {
            enabled: false, // Use mock
            project_id: None,
            credentials_path: "firebase.json".to_string(),
            access_token: None,
            api_base_url: DEFAULT_FCM_API_BASE_URL.to_string(),
        },
        exposure: ExposureConfig::default(),
    }
}

pub struct RelayResult {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl RelayResult {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Response body is not JSON")
    }
}

/// Router-level harness around an in-memory store and a mock provider.
pub struct TestApp {
    pub store: Arc<InMemoryRecipientStore>,
    pub provider: Arc<MockPushProvider>,
    router: Router,
}

impl TestApp {
    pub fn new(store: InMemoryRecipientStore, provider: MockPushProvider) -> Self {
        let store = Arc::new(store);
        let provider = Arc::new(provider);
        let state = AppState::new(test_config(), store.clone(), provider.clone());

        Self {
            store,
            provider,
            router: build_router(state),
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: &str) -> RelayResult {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        RelayResult {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    pub async fn post(&self, body: &str) -> RelayResult {
        self.request(Method::POST, "/", body).await
    }
}

/// Start a real server on a random port and return its base URL.
pub async fn spawn_server(store: InMemoryRecipientStore, provider: MockPushProvider) -> String {
    let app = Application::build_with(test_config(), Arc::new(store), Arc::new(provider))
        .await
        .expect("Failed to build test application");

    let address = format!("http://127.0.0.1:{}", app.port());

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    // Wait for the server to be ready by polling the health endpoint
    let client = reqwest::Client::new();
    let health_url = format!("{}/health", address);
    for _ in 0..50 {
        if client.get(&health_url).send().await.is_ok() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    address
}
