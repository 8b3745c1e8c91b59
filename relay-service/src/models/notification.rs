use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use validator::Validate;

/// Title stamped on every relayed notification.
pub const RELAYED_NOTIFICATION_TITLE: &str = "New Message";

/// Field of a recipient record holding the device's push token.
pub const PUSH_TOKEN_FIELD: &str = "fcmToken";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    #[validate(length(min = 1, message = "recipientId cannot be empty"))]
    pub recipient_id: String,
    pub content: String,
}

/// A recipient document as stored, minus its key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientRecord(Map<String, Value>);

impl RecipientRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The stored push token. Empty and non-string values count as missing.
    pub fn push_token(&self) -> Option<&str> {
        self.0
            .get(PUSH_TOKEN_FIELD)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for RecipientRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: Option<HashMap<String, String>>,
}

impl PushMessage {
    /// The message relayed for a request: fixed title, request content as body.
    pub fn relayed(token: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            title: RELAYED_NOTIFICATION_TITLE.to_string(),
            body: content.into(),
            data: None,
        }
    }
}
