//! Relay error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages returned to clients are generic; the underlying cause is logged
//! server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Relay error type.
///
/// Maps to HTTP status codes:
/// - `InvalidToken`: 401 Unauthorized
/// - `RoomClosed`: 503 Service Unavailable
/// - `History`: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum RelayError {
    /// Connection token failed validation.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// History store operation failed.
    #[error("History store error: {0}")]
    History(String),

    /// The room actor has retired or stopped and no longer accepts requests.
    #[error("Room closed: {0}")]
    RoomClosed(String),

}

impl RelayError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            RelayError::RoomClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            RelayError::InvalidToken(reason) => ("INVALID_TOKEN", reason.clone()),
            RelayError::History(err) => {
                tracing::error!(target: "relay.history", error = %err, "History operation failed");
                ("HISTORY_ERROR", "An internal storage error occurred".to_string())
            }
            RelayError::RoomClosed(room) => {
                tracing::warn!(target: "relay.availability", room = %room, "Room unavailable");
                (
                    "ROOM_UNAVAILABLE",
                    "Room temporarily unavailable".to_string(),
                )
            }
        };

        let status = self.status_code();
        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"room-relay\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            RelayError::InvalidToken("bad".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            RelayError::RoomClosed("lobby".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RelayError::History("timeout".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unauthorized_response_has_www_authenticate() {
        let response = RelayError::InvalidToken("expired".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let header = response.headers().get("WWW-Authenticate").unwrap();
        assert!(header.to_str().unwrap().contains("invalid_token"));
    }

    #[tokio::test]
    async fn test_history_response_hides_details() {
        let response =
            RelayError::History("connection refused at 10.0.0.7:6379".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "HISTORY_ERROR");
        assert!(!json.to_string().contains("10.0.0.7"));
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", RelayError::History("timeout".to_string())),
            "History store error: timeout"
        );
        assert_eq!(
            format!("{}", RelayError::RoomClosed("lobby".to_string())),
            "Room closed: lobby"
        );
    }
}
