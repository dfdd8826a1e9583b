//! In-process broker backed by tokio channels.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::broker::{Broker, BrokerConnector};
use crate::delivery::{Acker, Delivery, DeliveryStream};
use crate::error::BrokerError;
use crate::topology::{QueueSpec, routing_key_matches};

/// A message waiting in an in-memory queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub attempt: u32,
}

struct Queue {
    dead_letter: Option<String>,
    sender: mpsc::UnboundedSender<QueuedMessage>,
    receiver: Option<mpsc::UnboundedReceiver<QueuedMessage>>,
}

#[derive(Default)]
struct State {
    exchanges: HashMap<String, Vec<(String, String)>>,
    queues: HashMap<String, Queue>,
}

/// Topic-exchange broker living inside one process.
///
/// Queues buffer messages until a consumer attaches; each queue admits a
/// single consumer at a time.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, BrokerError> {
        self.state
            .lock()
            .map_err(|_| BrokerError::Backend("in-memory broker lock poisoned".to_owned()))
    }

    /// Removes and returns every message buffered in `queue`.
    ///
    /// Returns nothing once a consumer has attached to the queue.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::UnknownQueue` if the queue was never declared.
    pub fn drain(&self, queue: &str) -> Result<Vec<QueuedMessage>, BrokerError> {
        let mut state = self.lock()?;
        let queue_state = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_owned()))?;
        let mut drained = Vec::new();
        if let Some(receiver) = queue_state.receiver.as_mut() {
            while let Ok(message) = receiver.try_recv() {
                drained.push(message);
            }
        }
        Ok(drained)
    }

    fn targets(&self, queue: &str) -> Result<Targets, BrokerError> {
        let state = self.lock()?;
        let queue_state = state
            .queues
            .get(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_owned()))?;
        let dead_letter = queue_state
            .dead_letter
            .as_ref()
            .and_then(|name| state.queues.get(name))
            .map(|dlq| dlq.sender.clone());
        Ok(Targets {
            queue: queue.to_owned(),
            requeue: queue_state.sender.clone(),
            dead_letter,
        })
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_exchange(&self, exchange: &str) -> Result<(), BrokerError> {
        self.lock()?.exchanges.entry(exchange.to_owned()).or_default();
        Ok(())
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), BrokerError> {
        let mut state = self.lock()?;
        state.queues.entry(spec.name.clone()).or_insert_with(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            Queue {
                dead_letter: spec.dead_letter.clone(),
                sender,
                receiver: Some(receiver),
            }
        });
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), BrokerError> {
        let mut state = self.lock()?;
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::UnknownQueue(queue.to_owned()));
        }
        let bindings = state
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| BrokerError::UnknownExchange(exchange.to_owned()))?;
        let binding = (queue.to_owned(), pattern.to_owned());
        if !bindings.contains(&binding) {
            bindings.push(binding);
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let state = self.lock()?;
        let bindings = state
            .exchanges
            .get(exchange)
            .ok_or_else(|| BrokerError::UnknownExchange(exchange.to_owned()))?;

        let mut delivered = HashSet::new();
        for (queue, pattern) in bindings {
            if delivered.contains(queue.as_str()) || !routing_key_matches(pattern, routing_key) {
                continue;
            }
            if let Some(target) = state.queues.get(queue) {
                let message = QueuedMessage {
                    routing_key: routing_key.to_owned(),
                    payload: payload.to_vec(),
                    attempt: 1,
                };
                if target.sender.send(message).is_err() {
                    warn!(queue = %queue, "queue consumer gone, message dropped");
                }
                delivered.insert(queue.as_str());
            }
        }
        if delivered.is_empty() {
            debug!(exchange, routing_key, "unroutable message dropped");
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, BrokerError> {
        let receiver = {
            let mut state = self.lock()?;
            let queue_state = state
                .queues
                .get_mut(queue)
                .ok_or_else(|| BrokerError::UnknownQueue(queue.to_owned()))?;
            queue_state
                .receiver
                .take()
                .ok_or_else(|| BrokerError::ConsumerBusy(queue.to_owned()))?
        };
        let targets = self.targets(queue)?;
        let consumer = Consumer {
            receiver: Some(receiver),
            queue: queue.to_owned(),
            state: Arc::clone(&self.state),
        };

        let stream = futures::stream::unfold(
            (consumer, targets),
            |(mut consumer, targets)| async move {
                let message = consumer.receiver.as_mut()?.recv().await?;
                let acker = Box::new(MemoryAcker {
                    targets: targets.clone(),
                    message: message.clone(),
                });
                let delivery =
                    Delivery::new(message.routing_key, message.payload, message.attempt, acker);
                Some((Ok(delivery), (consumer, targets)))
            },
        );
        Ok(Box::pin(stream))
    }
}

/// Hands the receiver back to its queue when the consumer stream is dropped.
struct Consumer {
    receiver: Option<mpsc::UnboundedReceiver<QueuedMessage>>,
    queue: String,
    state: Arc<Mutex<State>>,
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };
        if let Ok(mut state) = self.state.lock()
            && let Some(queue) = state.queues.get_mut(&self.queue)
        {
            queue.receiver = Some(receiver);
        }
    }
}

#[derive(Clone)]
struct Targets {
    queue: String,
    requeue: mpsc::UnboundedSender<QueuedMessage>,
    dead_letter: Option<mpsc::UnboundedSender<QueuedMessage>>,
}

struct MemoryAcker {
    targets: Targets,
    message: QueuedMessage,
}

#[async_trait]
impl Acker for MemoryAcker {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), BrokerError> {
        let Self { targets, message } = *self;
        if requeue {
            let redelivery = QueuedMessage {
                attempt: message.attempt.saturating_add(1),
                ..message
            };
            return targets
                .requeue
                .send(redelivery)
                .map_err(|_| BrokerError::UnknownQueue(targets.queue));
        }
        match targets.dead_letter {
            Some(dead_letter) => dead_letter
                .send(message)
                .map_err(|_| BrokerError::Backend("dead-letter queue closed".to_owned())),
            None => {
                warn!(queue = %targets.queue, "rejected message dropped, no dead-letter queue");
                Ok(())
            }
        }
    }
}

/// Connector that hands out one shared [`InMemoryBroker`].
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    broker: InMemoryBroker,
}

impl InMemoryConnector {
    /// Wraps an existing broker.
    #[must_use]
    pub fn new(broker: InMemoryBroker) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl BrokerConnector for InMemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn Broker>, BrokerError> {
        Ok(Arc::new(self.broker.clone()))
    }
}
