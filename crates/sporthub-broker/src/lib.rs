//! SportHub Broker: topic-routed event bus.
//!
//! Publishers write to a topic exchange; durable queues bound by routing-key
//! patterns (`*` matches one word, `#` matches zero or more) decouple them from
//! consumers. Deliveries are acknowledged explicitly: `ack` after successful
//! processing, `nack(true)` to redeliver, `nack(false)` to dead-letter.
//!
//! Two backends implement [`Broker`]: [`InMemoryBroker`] for a single process
//! and [`RedisBroker`] on Redis Streams for separate processes.

mod broker;
mod delivery;
mod error;
mod memory;
mod publisher;
mod redis_streams;
mod retry;
mod topology;

pub use broker::{Broker, BrokerConnector, connector_for_url};
pub use delivery::{Acker, Delivery, DeliveryStream};
pub use error::BrokerError;
pub use memory::{InMemoryBroker, InMemoryConnector, QueuedMessage};
pub use publisher::{BrokerPublisher, DisconnectedPublisher};
pub use redis_streams::{RedisBroker, RedisConnector};
pub use retry::{RetryPolicy, connect_with_backoff};
pub use topology::{QueueSpec, Topology, routing_key_matches};
