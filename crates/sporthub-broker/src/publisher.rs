//! `EventPublisher` implementations over a broker.

use std::sync::Arc;

use async_trait::async_trait;
use sporthub_core::publisher::{EventPublisher, PublishError};
use tracing::debug;

use crate::broker::Broker;

/// Publishes JSON events to one exchange.
#[derive(Clone)]
pub struct BrokerPublisher {
    broker: Arc<dyn Broker>,
    exchange: String,
}

impl BrokerPublisher {
    /// Publisher writing to `exchange` on `broker`.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, exchange: impl Into<String>) -> Self {
        Self {
            broker,
            exchange: exchange.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for BrokerPublisher {
    async fn publish_json(
        &self,
        routing_key: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        let body = serde_json::to_vec(&payload)?;
        self.broker
            .publish(&self.exchange, routing_key, &body)
            .await
            .map_err(|e| PublishError::Broker(e.to_string()))?;
        debug!(exchange = %self.exchange, routing_key, "event published");
        Ok(())
    }
}

/// Publisher used while no broker connection exists. Every publish fails
/// with `PublishError::NotConnected`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedPublisher;

#[async_trait]
impl EventPublisher for DisconnectedPublisher {
    async fn publish_json(
        &self,
        _routing_key: &str,
        _payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        Err(PublishError::NotConnected)
    }
}
