//! Record-store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP status to the store error taxonomy.
    pub fn from_http_status(status: u16, detail: String) -> Self {
        match status {
            401 => Self::AuthError(detail),
            403 => Self::PermissionDenied(detail),
            404 => Self::NotFound(detail),
            429 => Self::RateLimited(1000),
            500..=599 => Self::Unavailable(detail),
            _ => Self::RequestFailed(detail),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Network(_) | StoreError::RateLimited(_) | StoreError::Unavailable(_)
        )
    }

    /// Retry-After hint in milliseconds, when the server provided one.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            StoreError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            StoreError::from_http_status(401, "x".into()),
            StoreError::AuthError(_)
        ));
        assert!(matches!(
            StoreError::from_http_status(503, "x".into()),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from_http_status(418, "x".into()),
            StoreError::RequestFailed(_)
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::RateLimited(500).is_retryable());
        assert!(StoreError::Unavailable("down".into()).is_retryable());
        assert!(!StoreError::NotFound("abc".into()).is_retryable());
        assert!(!StoreError::AuthError("bad key".into()).is_retryable());
    }
}
