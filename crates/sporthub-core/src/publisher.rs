//! Event publishing port.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Failure to hand an event to the bus.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The payload could not be serialized.
    #[error("failed to serialize event payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No broker connection is available.
    #[error("broker not connected")]
    NotConnected,

    /// The broker rejected or failed to accept the message.
    #[error("broker publish failed: {0}")]
    Broker(String),
}

/// Publishes serialized events to the topic exchange.
///
/// Implementations must not retry; callers treat failures as non-fatal.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes a JSON payload under `routing_key`.
    async fn publish_json(
        &self,
        routing_key: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError>;
}

/// Serializes `event` and publishes it, logging and swallowing any failure.
///
/// Event delivery is secondary to the write that produced it, so a broker
/// outage never fails the originating request.
pub async fn publish_best_effort<E: Serialize + Sync>(
    publisher: &dyn EventPublisher,
    routing_key: &str,
    event: &E,
) {
    let payload = match serde_json::to_value(event) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(routing_key, error = %err, "dropping event: serialization failed");
            return;
        }
    };
    if let Err(err) = publisher.publish_json(routing_key, payload).await {
        tracing::warn!(routing_key, error = %err, "dropping event: publish failed");
    }
}
