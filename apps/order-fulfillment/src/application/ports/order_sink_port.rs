//! Order Sink Port (Driven Port)
//!
//! Interface for marking an order delivered in the store.

use async_trait::async_trait;

/// Failure to write the delivered acknowledgment. Logged only: the order is
/// not re-dispatched and the tracker entry is kept.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpdateError {
    /// Request could not be sent.
    #[error("order store update failed: {0}")]
    Transport(String),

    /// Store answered with a status other than 200 or 204.
    #[error("order store rejected update with HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
}

/// Port for acknowledging delivered orders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Set `delivered = true, status = delivered` on exactly this order.
    async fn acknowledge(&self, order_id: &str) -> Result<(), UpdateError>;
}
