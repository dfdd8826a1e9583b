//! Deliveries and their acknowledgement handles.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::BrokerError;

/// Settles a single delivery with the backend it came from.
#[async_trait]
pub trait Acker: Send + Sync {
    /// Removes the message from its queue.
    async fn ack(self: Box<Self>) -> Result<(), BrokerError>;

    /// Rejects the message. With `requeue` it is redelivered to the same queue;
    /// without, it moves to the queue's dead-letter target (or is dropped).
    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), BrokerError>;
}

/// A message handed to a consumer. It must be settled with [`Delivery::ack`]
/// or [`Delivery::nack`].
pub struct Delivery {
    /// Routing key the message was published with.
    pub routing_key: String,
    /// Raw message body.
    pub payload: Vec<u8>,
    /// 1 for the first delivery, incremented on every requeue.
    pub attempt: u32,
    acker: Box<dyn Acker>,
}

impl Delivery {
    /// Builds a delivery settled through `acker`.
    #[must_use]
    pub fn new(
        routing_key: impl Into<String>,
        payload: Vec<u8>,
        attempt: u32,
        acker: Box<dyn Acker>,
    ) -> Self {
        Self {
            routing_key: routing_key.into(),
            payload,
            attempt,
            acker,
        }
    }

    /// Acknowledges successful processing.
    ///
    /// # Errors
    ///
    /// Returns a `BrokerError` if the backend rejects the acknowledgement.
    pub async fn ack(self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    /// Negatively acknowledges the message.
    ///
    /// # Errors
    ///
    /// Returns a `BrokerError` if the backend rejects the call.
    pub async fn nack(self, requeue: bool) -> Result<(), BrokerError> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("routing_key", &self.routing_key)
            .field("payload_len", &self.payload.len())
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// Stream of deliveries from one queue. Ends when the consumer is closed.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, BrokerError>> + Send>>;
