use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

/// Status, headers and encoded body produced for every relay request.
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl RelayResponse {
    /// Answer to a CORS preflight probe.
    pub fn preflight() -> Self {
        Self {
            status: StatusCode::OK,
            headers: cors_headers(),
            body: String::new(),
        }
    }

    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self {
            status,
            headers: cors_headers(),
            body: body.to_string(),
        }
    }

    /// 500 responses carry only the origin and content-type headers.
    pub fn failure(body: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers,
            body: body.to_string(),
        }
    }
}

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preflight_is_empty_with_full_cors_headers() {
        let response = RelayResponse::preflight();
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.body.is_empty());
        assert_eq!(response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            response.headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type"
        );
        assert_eq!(
            response.headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "POST, OPTIONS"
        );
        assert_eq!(response.headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn failure_omits_method_and_header_allowances() {
        let response = RelayResponse::failure(&json!({ "error": "boom", "stack": "" }));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers.len(), 2);
        assert!(!response
            .headers
            .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
        assert!(!response
            .headers
            .contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
    }

    #[test]
    fn json_body_is_encoded() {
        let response = RelayResponse::json(StatusCode::NOT_FOUND, &json!({ "message": "x" }));
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body, json!({ "message": "x" }));
    }
}
