//! Order Source Port (Driven Port)
//!
//! Interface for reading paid-but-undelivered orders from the store.

use async_trait::async_trait;

use crate::domain::order::OrderRecord;

/// Failure to read pending orders. The cycle is skipped and retried on the
/// next tick.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Request could not be sent or the response body could not be read.
    #[error("order store request failed: {0}")]
    Transport(String),

    /// Store answered with a non-success status.
    #[error("order store returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Response body was not a JSON array.
    #[error("order store response could not be decoded: {0}")]
    Decode(String),
}

impl FetchError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
        }
    }
}

/// A single malformed record in an otherwise readable response. The record
/// is dropped and the rest of the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Record has no identifier, or an empty one.
    #[error("order record at index {index} has no identifier")]
    MissingId {
        /// Position in the response array.
        index: usize,
    },

    /// Record could not be decoded at all.
    #[error("order record at index {index} is malformed: {reason}")]
    Malformed {
        /// Position in the response array.
        index: usize,
        /// Decoder message.
        reason: String,
    },
}

/// Port for reading pending orders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Fetch orders with `status = paid AND delivered = false`, oldest first.
    ///
    /// An empty store yields an empty vector, not an error.
    async fn fetch(&self) -> Result<Vec<OrderRecord>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_messages_carry_detail() {
        let err = FetchError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "order store returned HTTP 500: boom");
        assert_eq!(err.kind(), "status");
    }

    #[test]
    fn parse_error_names_index() {
        let err = ParseError::MissingId { index: 3 };
        assert!(err.to_string().contains("index 3"));
    }
}
