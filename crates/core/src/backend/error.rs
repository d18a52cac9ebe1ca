use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;

/// Non-2xx response from the FinTrack backend.
#[derive(Debug, Clone)]
pub struct BackendError {
    pub status: StatusCode,
    /// The body's `error` field when present.
    pub message: String,
    pub body: Option<Value>,
}

impl BackendError {
    pub fn from_response(status: StatusCode, text: &str) -> Self {
        let body = serde_json::from_str::<Value>(text).ok();
        let message = body
            .as_ref()
            .and_then(|v| v.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
        Self {
            status,
            message,
            body,
        }
    }

    /// Expired or missing session.
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn is_retryable(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS || self.status.is_server_error()
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend HTTP {}: {}", self.status, self.message)
    }
}

impl std::error::Error for BackendError {}
