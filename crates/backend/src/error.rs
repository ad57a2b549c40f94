//! Error types for backend calls.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Postgres unique constraint violation.
pub const UNIQUE_VIOLATION: &str = "23505";

/// PostgREST code returned when a single-row select matched nothing.
pub const NO_ROWS: &str = "PGRST116";

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("no rows returned")]
    NotFound,

    #[error("realtime channel error: {0}")]
    Realtime(String),

    #[error("invalid payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    pub fn api(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn realtime(message: impl Into<String>) -> Self {
        Self::Realtime(message.into())
    }

    /// The backend error code, when the platform supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            Self::NotFound => Some(NO_ROWS),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(UNIQUE_VIOLATION)
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(NO_ROWS)
    }
}

/// Union of the error bodies produced by the data, auth and storage services.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl ApiErrorBody {
    pub(crate) fn into_error(self, status: StatusCode) -> BackendError {
        let code = self.code.and_then(|value| match value {
            serde_json::Value::String(code) => Some(code),
            serde_json::Value::Number(code) => Some(code.to_string()),
            _ => None,
        });

        let message = self
            .message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .or(self.details)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        BackendError::api(status.as_u16(), code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_detected_from_code() {
        let err = BackendError::api(409, Some(UNIQUE_VIOLATION.to_string()), "duplicate key");
        assert!(err.is_unique_violation());
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "duplicate key");
    }

    #[test]
    fn not_found_reports_no_rows_code() {
        assert!(BackendError::NotFound.is_not_found());
        assert_eq!(BackendError::NotFound.code(), Some(NO_ROWS));
    }

    #[test]
    fn error_body_prefers_message_then_description() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        let err = body.into_error(StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid login credentials");

        let body: ApiErrorBody =
            serde_json::from_str(r#"{"code":"23505","message":"duplicate key value"}"#).unwrap();
        let err = body.into_error(StatusCode::CONFLICT);
        assert!(err.is_unique_violation());
    }

    #[test]
    fn empty_body_falls_back_to_status_reason() {
        let err = ApiErrorBody::default().into_error(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "Service Unavailable");
    }
}
