//! Supervision of the search index projector.
//!
//! The worker connects to the broker with backoff, declares the topology and
//! runs the [`Projector`] until the delivery stream ends, then reconnects.
//! When the broker stays unreachable the worker exits and the search service
//! keeps answering reads from the index it already has.

use std::sync::Arc;

use sporthub_broker::{BrokerConnector, RetryPolicy, Topology, connect_with_backoff};
use sporthub_search::Projector;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Keeps one projector consuming the sync queue.
pub struct SyncWorker {
    connector: Arc<dyn BrokerConnector>,
    policy: RetryPolicy,
    topology: Topology,
    projector: Arc<Projector>,
}

impl SyncWorker {
    /// Builds a worker.
    #[must_use]
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        policy: RetryPolicy,
        topology: Topology,
        projector: Arc<Projector>,
    ) -> Self {
        Self {
            connector,
            policy,
            topology,
            projector,
        }
    }

    /// Runs until `cancel` fires or the broker cannot be reached.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            let Some(broker) =
                connect_with_backoff(self.connector.as_ref(), &self.policy, &cancel).await
            else {
                if !cancel.is_cancelled() {
                    warn!("index sync disabled, serving reads only");
                }
                return;
            };

            match self.topology.declare(broker.as_ref()).await {
                Ok(()) => match broker.consume(&self.topology.queue).await {
                    Ok(deliveries) => {
                        info!(queue = %self.topology.queue, "index sync consuming");
                        self.projector.run(deliveries, cancel.clone()).await;
                    }
                    Err(err) => {
                        error!(queue = %self.topology.queue, error = %err, "consume failed");
                    }
                },
                Err(err) => error!(error = %err, "topology declaration failed"),
            }

            if cancel.is_cancelled() {
                return;
            }
            warn!("index sync interrupted, reconnecting");
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(self.policy.initial_delay) => {}
            }
        }
    }
}
