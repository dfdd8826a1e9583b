//! Test publishers: record or reject published events.

use std::sync::Mutex;

use async_trait::async_trait;
use sporthub_core::publisher::{EventPublisher, PublishError};

/// A publisher that records every `(routing_key, payload)` it is handed.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingPublisher {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything published so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().unwrap().clone()
    }

    /// Returns the routing keys published so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn routing_keys(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|(routing_key, _)| routing_key)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_json(
        &self,
        routing_key: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        self.published
            .lock()
            .unwrap()
            .push((routing_key.to_owned(), payload));
        Ok(())
    }
}

/// A publisher that always fails as if the broker were down.
#[derive(Debug)]
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish_json(
        &self,
        _routing_key: &str,
        _payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        Err(PublishError::NotConnected)
    }
}
