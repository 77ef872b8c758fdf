//! Error taxonomy shared by the store, translator and dispatch layers.

use thiserror::Error;

/// Failure raised by a record backend. The store adapter never lets this
/// escape; it is logged and folded into an `Unavailable`/`Failed` outcome.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(String),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Failure reported by the external translator.
#[derive(Debug, Clone, Error)]
pub enum TranslationError {
    #[error("translator API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to reach translator: {0}")]
    Request(String),

    #[error("failed to parse translator response: {0}")]
    Parse(String),

    #[error("translator response contained no choices")]
    EmptyResponse,
}

impl TranslationError {
    /// Short machine-readable code for the response contract
    pub fn code(&self) -> String {
        match self {
            TranslationError::Api { status, .. } => format!("http_{}", status),
            TranslationError::Request(_) => "request_failed".to_string(),
            TranslationError::Parse(_) => "invalid_response".to_string(),
            TranslationError::EmptyResponse => "empty_response".to_string(),
        }
    }

    /// 5xx, 429 and transport failures are transient; other 4xx are not
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::Api { status, .. } => *status == 429 || *status >= 500,
            TranslationError::Request(_)
            | TranslationError::Parse(_)
            | TranslationError::EmptyResponse => true,
        }
    }
}

/// Request rejected before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== TranslationError Tests ====================

    #[test]
    fn test_translation_error_codes() {
        let api = TranslationError::Api {
            status: 503,
            body: "down".to_string(),
        };
        assert_eq!(api.code(), "http_503");
        assert_eq!(
            TranslationError::Request("refused".to_string()).code(),
            "request_failed"
        );
        assert_eq!(TranslationError::EmptyResponse.code(), "empty_response");
    }

    #[test]
    fn test_translation_error_retryable_statuses() {
        let status = |s: u16| TranslationError::Api {
            status: s,
            body: String::new(),
        };

        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable(), "rate limit is transient");
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(TranslationError::Request("timeout".to_string()).is_retryable());
    }

    #[test]
    fn test_translation_error_display_mentions_status() {
        let err = TranslationError::Api {
            status: 500,
            body: "Internal Server Error".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("Internal Server Error"));
    }

    // ==================== ValidationError Tests ====================

    #[test]
    fn test_missing_fields_message_lists_all() {
        let err = ValidationError::MissingFields(vec!["title", "description"]);
        assert_eq!(err.to_string(), "missing required fields: title, description");
    }

    #[test]
    fn test_invalid_field_message() {
        let err = ValidationError::InvalidField {
            field: "year".to_string(),
            reason: "expected an integer".to_string(),
        };
        assert!(err.to_string().contains("'year'"));
    }

    // ==================== StoreError Tests ====================

    #[test]
    fn test_store_error_from_pool_timeout_is_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_store_error_from_row_not_found_is_query() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Query(_)));
    }
}
