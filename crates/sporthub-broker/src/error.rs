//! Broker error types.

use thiserror::Error;

/// Errors raised by broker backends.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Could not reach the broker.
    #[error("broker connection failed: {0}")]
    Connection(String),

    /// The named exchange has not been declared.
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),

    /// The named queue has not been declared.
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    /// The queue already has an active consumer.
    #[error("queue {0} already has a consumer")]
    ConsumerBusy(String),

    /// The broker URL scheme is not supported.
    #[error("unsupported broker url: {0}")]
    UnsupportedUrl(String),

    /// A backend command failed.
    #[error("broker command failed: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for BrokerError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            Self::Connection(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}
