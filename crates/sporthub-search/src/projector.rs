//! Projection of change envelopes into the search index.
//!
//! Per message: decode, route filter, validate, then either delete from the
//! index or re-fetch the activity's document from its origin and replace it,
//! then evict the cached copies, then acknowledge. Session events are folded
//! into an update of their parent activity, whose document carries the
//! earliest session's schedule window.

use std::sync::Arc;

use futures::StreamExt;
use sporthub_broker::{Delivery, DeliveryStream};
use sporthub_core::event::{EventEnvelope, EventOp, routing};
use sporthub_core::search::{DocumentSource, SearchIndex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::service::CacheInvalidator;

/// Default number of delivery attempts before a failing message is
/// dead-lettered.
pub const DEFAULT_MAX_REDELIVERIES: u32 = 3;

/// What a successfully handled message did to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// The message does not affect search documents.
    Skipped,
    /// The document with this id was replaced.
    Upserted(String),
    /// The document with this id was removed.
    Deleted(String),
}

/// Why a message could not be projected.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The message can never succeed; it is dead-lettered without retry.
    #[error("poison message: {0}")]
    Poison(String),
    /// A dependency failed; the message may succeed on redelivery.
    #[error("projection failed: {0}")]
    Processing(String),
}

/// Applies change envelopes to the index.
pub struct Projector {
    index: Arc<dyn SearchIndex>,
    source: Arc<dyn DocumentSource>,
    cache: Arc<dyn CacheInvalidator>,
    max_redeliveries: u32,
}

impl Projector {
    /// Builds a projector.
    #[must_use]
    pub fn new(
        index: Arc<dyn SearchIndex>,
        source: Arc<dyn DocumentSource>,
        cache: Arc<dyn CacheInvalidator>,
        max_redeliveries: u32,
    ) -> Self {
        Self {
            index,
            source,
            cache,
            max_redeliveries: max_redeliveries.max(1),
        }
    }

    /// Projects one message.
    ///
    /// # Errors
    ///
    /// `ProjectionError::Poison` for undecodable payloads or a missing
    /// activity id; `ProjectionError::Processing` for origin or index failures.
    pub async fn handle(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<Projection, ProjectionError> {
        if routing_key.starts_with(routing::BOOKING_PREFIX) {
            return Ok(Projection::Skipped);
        }
        let envelope: EventEnvelope = serde_json::from_slice(payload)
            .map_err(|e| ProjectionError::Poison(format!("undecodable envelope: {e}")))?;
        let id = envelope.primary_id();
        if id.is_empty() {
            return Err(ProjectionError::Poison("envelope has no activityId".to_owned()));
        }

        if envelope.op == EventOp::Delete && !envelope.is_session_event() {
            self.index
                .delete(id)
                .await
                .map_err(|e| ProjectionError::Processing(e.to_string()))?;
            self.cache.invalidate(id).await;
            info!(id, "search document deleted");
            return Ok(Projection::Deleted(id.to_owned()));
        }

        let doc = self
            .source
            .fetch_activity_document(id)
            .await
            .map_err(|e| ProjectionError::Processing(e.to_string()))?;
        if doc.id != id {
            return Err(ProjectionError::Processing(format!(
                "origin returned document {} for activity {id}",
                doc.id
            )));
        }
        self.index
            .upsert(&doc)
            .await
            .map_err(|e| ProjectionError::Processing(e.to_string()))?;
        self.cache.invalidate(id).await;
        info!(
            id,
            op = envelope.op.as_str(),
            session_event = envelope.is_session_event(),
            "search document upserted"
        );
        Ok(Projection::Upserted(id.to_owned()))
    }

    /// Projects a delivery and settles it: ack on success, dead-letter poison
    /// immediately, requeue processing failures until the attempt limit.
    pub async fn settle(&self, delivery: Delivery) {
        let outcome = self.handle(&delivery.routing_key, &delivery.payload).await;
        let routing_key = delivery.routing_key.clone();
        let attempt = delivery.attempt;

        let settled = match outcome {
            Ok(projection) => {
                debug!(routing_key = %routing_key, ?projection, "message projected");
                delivery.ack().await
            }
            Err(ProjectionError::Poison(reason)) => {
                warn!(routing_key = %routing_key, reason = %reason, "dead-lettering poison");
                delivery.nack(false).await
            }
            Err(ProjectionError::Processing(reason)) if attempt < self.max_redeliveries => {
                warn!(routing_key = %routing_key, attempt, reason = %reason, "requeueing message");
                delivery.nack(true).await
            }
            Err(ProjectionError::Processing(reason)) => {
                error!(
                    routing_key = %routing_key,
                    attempt,
                    reason = %reason,
                    "retries exhausted, dead-lettering"
                );
                delivery.nack(false).await
            }
        };
        if let Err(err) = settled {
            error!(routing_key = %routing_key, error = %err, "failed to settle delivery");
        }
    }

    /// Consumes `deliveries` until `cancel` fires or the stream ends.
    pub async fn run(&self, mut deliveries: DeliveryStream, cancel: CancellationToken) {
        info!("projector started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("projector stopping on shutdown");
                    return;
                }
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => self.settle(delivery).await,
                    Some(Err(err)) => {
                        error!(error = %err, "delivery stream failed, projector stopping");
                        return;
                    }
                    None => {
                        info!("delivery stream closed, projector stopping");
                        return;
                    }
                },
            }
        }
    }
}
