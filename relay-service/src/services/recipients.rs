use async_trait::async_trait;
use mongodb::{
    bson::{doc, Bson, Document},
    Client as MongoClient, Collection,
};
use serde_json::Value;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::models::RecipientRecord;

/// Read-only access to recipient documents keyed by recipient id.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    async fn get(&self, recipient_id: &str) -> Result<Option<RecipientRecord>, AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct MongoRecipientStore {
    client: MongoClient,
    recipients: Collection<Document>,
}

impl MongoRecipientStore {
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, collection = %collection, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let recipients = client.database(database).collection(collection);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, recipients })
    }
}

#[async_trait]
impl RecipientStore for MongoRecipientStore {
    async fn get(&self, recipient_id: &str) -> Result<Option<RecipientRecord>, AppError> {
        let document = self
            .recipients
            .find_one(doc! { "_id": recipient_id }, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to look up recipient: {}", e);
                AppError::from(e)
            })?;

        Ok(document.map(document_to_record))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }
}

/// Drop the key and render the rest as relaxed extended JSON.
fn document_to_record(mut document: Document) -> RecipientRecord {
    document.remove("_id");
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(fields) => RecipientRecord::new(fields),
        _ => RecipientRecord::default(),
    }
}

/// Map-backed store for tests and local runs.
#[derive(Default)]
pub struct InMemoryRecipientStore {
    records: RwLock<HashMap<String, RecipientRecord>>,
    failure: Option<String>,
    lookups: AtomicU64,
}

impl InMemoryRecipientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every lookup fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Insert a record. Non-object values are stored as empty records.
    pub fn with_record(self, recipient_id: impl Into<String>, record: Value) -> Self {
        self.insert(recipient_id, record);
        self
    }

    pub fn insert(&self, recipient_id: impl Into<String>, record: Value) {
        let record = match record {
            Value::Object(fields) => RecipientRecord::new(fields),
            _ => RecipientRecord::default(),
        };
        if let Ok(mut records) = self.records.write() {
            records.insert(recipient_id.into(), record);
        }
    }

    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecipientStore for InMemoryRecipientStore {
    async fn get(&self, recipient_id: &str) -> Result<Option<RecipientRecord>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.failure {
            return Err(AppError::DatabaseError(anyhow::anyhow!(message.clone())));
        }

        let records = self
            .records
            .read()
            .map_err(|_| AppError::DatabaseError(anyhow::anyhow!("recipient store poisoned")))?;
        Ok(records.get(recipient_id).cloned())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        match &self.failure {
            Some(message) => Err(AppError::DatabaseError(anyhow::anyhow!(message.clone()))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    #[test]
    fn document_conversion_drops_id() {
        let record = document_to_record(doc! {
            "_id": "u1",
            "fcmToken": "TOK",
            "name": "Ada",
        });

        assert_eq!(record.push_token(), Some("TOK"));
        assert!(!record.fields().contains_key("_id"));
        assert_eq!(record.into_value(), json!({ "fcmToken": "TOK", "name": "Ada" }));
    }

    #[test]
    fn document_conversion_uses_relaxed_json() {
        let record = document_to_record(doc! {
            "_id": ObjectId::new(),
            "visits": 3_i32,
            "tags": ["a", "b"],
        });

        assert_eq!(record.into_value(), json!({ "visits": 3, "tags": ["a", "b"] }));
    }

    #[tokio::test]
    async fn in_memory_store_finds_records() {
        let store = InMemoryRecipientStore::new().with_record("u1", json!({ "fcmToken": "TOK" }));

        let record = store.get("u1").await.unwrap().unwrap();
        assert_eq!(record.push_token(), Some("TOK"));
        assert!(store.get("ghost").await.unwrap().is_none());
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn failing_store_reports_database_error() {
        let store = InMemoryRecipientStore::failing("connection reset");
        let err = store.get("u1").await.unwrap_err();

        assert!(matches!(err, AppError::DatabaseError(_)));
        assert_eq!(err.to_string(), "Database error: connection reset");
        assert!(store.health_check().await.is_err());
    }

    #[tokio::test]
    async fn malformed_uri_fails_to_connect() {
        let err = MongoRecipientStore::connect("not-a-mongodb-uri", "relay_db", "users")
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AppError::DatabaseError(_)));
    }

    #[tokio::test]
    #[ignore = "Requires MongoDB (set TEST_MONGODB_URI)"]
    async fn mongo_store_reads_users_collection() {
        let uri = std::env::var("TEST_MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let database = "relay_store_test";
        let store = MongoRecipientStore::connect(&uri, database, "users")
            .await
            .unwrap();

        let client = MongoClient::with_uri_str(&uri).await.unwrap();
        let users: Collection<Document> = client.database(database).collection("users");
        users
            .insert_one(doc! { "_id": "u1", "fcmToken": "TOK" }, None)
            .await
            .ok();

        store.health_check().await.unwrap();
        let record = store.get("u1").await.unwrap().unwrap();
        assert_eq!(record.push_token(), Some("TOK"));
        assert!(store.get("ghost").await.unwrap().is_none());

        client.database(database).drop(None).await.unwrap();
    }
}
