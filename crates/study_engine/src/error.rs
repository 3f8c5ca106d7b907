use study_core::{FailureKind, RequestFailure};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("invalid api url: {0}")]
    InvalidUrl(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("not signed in; request was not sent")]
    Unauthenticated,
    #[error("unauthorized: {detail}")]
    Unauthorized { detail: String },
    #[error("http status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the backend refused the request for quota or rate reasons.
    ///
    /// The backend has no typed error contract; besides HTTP 429 the detail
    /// text is inspected for the markers the generation endpoints use.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ApiError::Status { status: 429, .. } => true,
            ApiError::Status { detail, .. } => {
                let detail = detail.to_lowercase();
                detail.contains("429") || detail.contains("quota") || detail.contains("rate limit")
            }
            _ => false,
        }
    }

    pub fn kind(&self) -> FailureKind {
        if self.is_rate_limited() {
            return FailureKind::RateLimited;
        }
        match self {
            ApiError::InvalidUrl(_) | ApiError::Network(_) => FailureKind::Network,
            ApiError::Timeout(_) => FailureKind::Timeout,
            ApiError::Unauthenticated => FailureKind::Unauthenticated,
            ApiError::Unauthorized { .. } => FailureKind::Unauthorized,
            ApiError::Status { status, .. } => FailureKind::HttpStatus(*status),
            ApiError::Decode(_) => FailureKind::Decode,
        }
    }

    /// The failure as the core state machine consumes it.
    pub fn failure(&self) -> RequestFailure {
        let message = match self {
            ApiError::Unauthorized { detail } | ApiError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        };
        RequestFailure::new(self.kind(), message)
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(err.to_string());
    }
    if err.is_decode() {
        return ApiError::Decode(err.to_string());
    }
    ApiError::Network(err.to_string())
}

/// Human-readable detail of an error body.
///
/// FastAPI style `{"detail": "..."}` and `{"detail": [{"msg": "..."}]}` bodies
/// are unpacked; anything else falls back to the trimmed body text.
pub(crate) fn error_detail(body: &str) -> Option<String> {
    const MAX_DETAIL: usize = 300;

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return Some(detail.clone()),
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                    .collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            _ => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_DETAIL).collect())
}
