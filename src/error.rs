//! Error types for document ingestion and querying.

use thiserror::Error;

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Ingestion and query errors.
///
/// `Clone` so one in-flight ingestion result can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// The source is unreadable or no page yielded any text.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Fetching the source failed.
    #[error("Network error: {message}")]
    Network { message: String, retryable: bool },

    /// The source has not finished ingesting yet.
    #[error("Document not ready: {0}")]
    IndexUnavailable(String),

    /// A newer ingestion of the same source superseded this one.
    #[error("Ingestion cancelled")]
    Cancelled,

    /// Reading a local source failed.
    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// True when the same call may succeed later without any change.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Network { retryable, .. } => *retryable,
            IngestError::IndexUnavailable(_) | IngestError::Cancelled => true,
            IngestError::Extraction(_) | IngestError::Io(_) | IngestError::Internal(_) => false,
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        let retryable = e.is_timeout()
            || e.is_connect()
            || e.is_request()
            || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429);
        IngestError::Network {
            message: e.to_string(),
            retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(IngestError::Cancelled.is_retryable());
        assert!(IngestError::IndexUnavailable("k".into()).is_retryable());
        assert!(IngestError::Network {
            message: "timeout".into(),
            retryable: true
        }
        .is_retryable());
        assert!(!IngestError::Network {
            message: "404".into(),
            retryable: false
        }
        .is_retryable());
        assert!(!IngestError::Extraction("bad".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let e = IngestError::Extraction("no text on any page".into());
        assert_eq!(e.to_string(), "Extraction failed: no text on any page");
    }
}
