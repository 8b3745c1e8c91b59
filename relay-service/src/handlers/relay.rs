use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{Method, StatusCode};
use serde_json::json;
use validator::Validate;

use crate::config::ExposureConfig;
use crate::error::RelayError;
use crate::models::{NotificationRequest, PushMessage, RelayResponse};
use crate::services::{record_provider_call, record_relay_outcome};
use crate::startup::AppState;

/// Largest request body the relay will buffer.
pub const MAX_RELAY_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Single relay endpoint. Every method other than `OPTIONS` is treated as a
/// send request.
///
/// The body is taken unbuffered so that read failures, including bodies over
/// [`MAX_RELAY_BODY_BYTES`], are answered on the relay's own error path.
#[tracing::instrument(skip(state, body))]
pub async fn relay_handler(
    State(state): State<AppState>,
    method: Method,
    body: Body,
) -> RelayResponse {
    relay(&state, &method, body).await
}

/// Answer one relay request. Always produces a response.
pub async fn relay(state: &AppState, method: &Method, body: Body) -> RelayResponse {
    if *method == Method::OPTIONS {
        record_relay_outcome("preflight");
        return RelayResponse::preflight();
    }

    match deliver(state, body).await {
        Ok(recipient_id) => {
            record_relay_outcome("sent");
            RelayResponse::json(
                StatusCode::OK,
                &json!({
                    "message": "Notification sent successfully",
                    "recipientId": recipient_id,
                }),
            )
        }
        Err(err) => {
            record_relay_outcome(err.outcome());
            error_response(err, &state.config.exposure)
        }
    }
}

/// Read, parse, look up, send. Returns the recipient id on success.
async fn deliver(state: &AppState, body: Body) -> Result<String, RelayError> {
    let body = to_bytes(body, MAX_RELAY_BODY_BYTES).await?;
    let request: NotificationRequest = serde_json::from_slice(&body)?;
    request.validate()?;

    tracing::info!(recipient_id = %request.recipient_id, "Received notification request");

    let record = state
        .recipients
        .get(&request.recipient_id)
        .await?
        .ok_or_else(|| RelayError::RecipientNotFound {
            recipient_id: request.recipient_id.clone(),
        })?;

    let token = record
        .push_token()
        .ok_or_else(|| RelayError::TokenNotFound {
            recipient_id: request.recipient_id.clone(),
            record: record.clone(),
        })?;

    let message = PushMessage::relayed(token, request.content);

    match state.push_provider.send(&message).await {
        Ok(response) => {
            record_provider_call("push", "success");
            tracing::info!(
                recipient_id = %request.recipient_id,
                provider_id = ?response.provider_id,
                "Notification relayed"
            );
        }
        Err(e) => {
            record_provider_call("push", "failure");
            return Err(e.into());
        }
    }

    Ok(request.recipient_id)
}

fn error_response(err: RelayError, exposure: &ExposureConfig) -> RelayResponse {
    match err {
        RelayError::RecipientNotFound { recipient_id } => {
            tracing::info!(recipient_id = %recipient_id, "User document not found");
            RelayResponse::json(
                StatusCode::NOT_FOUND,
                &json!({
                    "message": "User not found",
                    "recipientId": recipient_id,
                }),
            )
        }
        RelayError::TokenNotFound {
            recipient_id,
            record,
        } => {
            tracing::info!(recipient_id = %recipient_id, "FCM token not found");
            let body = if exposure.redact_user_data {
                json!({ "message": "FCM token not found" })
            } else {
                json!({
                    "message": "FCM token not found",
                    "userData": record.into_value(),
                })
            };
            RelayResponse::json(StatusCode::NOT_FOUND, &body)
        }
        err => {
            let message = err.to_string();
            let report = anyhow::Error::from(err);
            tracing::error!(error = ?report, "Relay request failed");

            let stack = if exposure.redact_diagnostics {
                String::new()
            } else {
                format!("{:?}", report)
            };

            RelayResponse::failure(&json!({
                "error": message,
                "stack": stack,
            }))
        }
    }
}
