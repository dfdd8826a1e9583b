//! Broker on Redis Streams.
//!
//! Each queue is a stream `sporthub:queue:{name}` read through a consumer
//! group of the same name. Exchanges and their bindings live in sets, so a
//! publish resolves the matching queues and appends one entry to each.
//! Settled entries are acknowledged and deleted; redeliveries and
//! dead-lettering append a fresh entry with the attempt count carried over.
//!
//! Consumers keep a stable name. On every `consume` the consumer first reads
//! back its own unsettled entries, then switches to new ones. While idle it
//! claims entries that another consumer left unsettled for longer than the
//! reclaim threshold.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamPendingId, StreamReadOptions,
    StreamReadReply,
};
use tracing::{debug, info, warn};

use crate::broker::{Broker, BrokerConnector};
use crate::delivery::{Acker, Delivery, DeliveryStream};
use crate::error::BrokerError;
use crate::topology::{QueueSpec, routing_key_matches};

const EXCHANGES_KEY: &str = "sporthub:exchanges";
const READ_BATCH: usize = 16;
const READ_BLOCK_MS: usize = 2_000;
const RECLAIM_SCAN: usize = 100;
/// Unsettled time after which another consumer's entry may be claimed.
pub const DEFAULT_RECLAIM_IDLE: Duration = Duration::from_secs(60);

fn queue_key(queue: &str) -> String {
    format!("sporthub:queue:{queue}")
}

fn queue_meta_key(queue: &str) -> String {
    format!("sporthub:queue-meta:{queue}")
}

fn bindings_key(exchange: &str) -> String {
    format!("sporthub:bindings:{exchange}")
}

/// Bindings are stored as `"{queue} {pattern}"`; neither part contains spaces.
fn encode_binding(queue: &str, pattern: &str) -> String {
    format!("{queue} {pattern}")
}

fn decode_binding(raw: &str) -> Option<(&str, &str)> {
    raw.split_once(' ')
}

/// Entries held by consumers other than `consumer` for at least `min_idle`.
fn reclaimable(pending: &[StreamPendingId], consumer: &str, min_idle: Duration) -> Vec<String> {
    pending
        .iter()
        .filter(|entry| entry.consumer != consumer)
        .filter(|entry| {
            let idle = u64::try_from(entry.last_delivered_ms).unwrap_or(u64::MAX);
            Duration::from_millis(idle) >= min_idle
        })
        .map(|entry| entry.id.clone())
        .collect()
}

/// Broker backed by Redis Streams.
#[derive(Clone)]
pub struct RedisBroker {
    client: redis::Client,
    conn: ConnectionManager,
    consumer: String,
    reclaim_idle: Duration,
}

impl RedisBroker {
    /// Connects to the Redis server at `url`; streams are read as `consumer`.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Connection` if the server is unreachable.
    pub async fn connect(url: &str, consumer: impl Into<String>) -> Result<Self, BrokerError> {
        let client =
            redis::Client::open(url).map_err(|e| BrokerError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            conn,
            consumer: consumer.into(),
            reclaim_idle: DEFAULT_RECLAIM_IDLE,
        })
    }

    /// Overrides how long another consumer's entry stays unsettled before it
    /// is claimed.
    #[must_use]
    pub fn with_reclaim_idle(mut self, idle: Duration) -> Self {
        self.reclaim_idle = idle;
        self
    }

    async fn dead_letter_of(&self, queue: &str) -> Result<Option<String>, BrokerError> {
        let mut conn = self.conn.clone();
        let dead_letter: Option<String> = conn.hget(queue_meta_key(queue), "dead_letter").await?;
        Ok(dead_letter)
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn declare_exchange(&self, exchange: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.sadd(EXCHANGES_KEY, exchange).await?;
        Ok(())
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let created: Result<(), redis::RedisError> = conn
            .xgroup_create_mkstream(queue_key(&spec.name), &spec.name, "0")
            .await;
        match created {
            Ok(()) => {}
            Err(err) if err.code() == Some("BUSYGROUP") => {}
            Err(err) => return Err(err.into()),
        }
        if let Some(dead_letter) = &spec.dead_letter {
            let _: i64 = conn
                .hset(queue_meta_key(&spec.name), "dead_letter", dead_letter)
                .await?;
        }
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let known: bool = conn.sismember(EXCHANGES_KEY, exchange).await?;
        if !known {
            return Err(BrokerError::UnknownExchange(exchange.to_owned()));
        }
        let _: i64 = conn
            .sadd(bindings_key(exchange), encode_binding(queue, pattern))
            .await?;
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let known: bool = conn.sismember(EXCHANGES_KEY, exchange).await?;
        if !known {
            return Err(BrokerError::UnknownExchange(exchange.to_owned()));
        }
        let bindings: Vec<String> = conn.smembers(bindings_key(exchange)).await?;
        let queues: BTreeSet<&str> = bindings
            .iter()
            .filter_map(|raw| decode_binding(raw))
            .filter(|(_, pattern)| routing_key_matches(pattern, routing_key))
            .map(|(queue, _)| queue)
            .collect();

        if queues.is_empty() {
            debug!(exchange, routing_key, "unroutable message dropped");
        }
        for queue in queues {
            append(&mut conn, &queue_key(queue), routing_key, payload, 1).await?;
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, BrokerError> {
        let dead_letter = self.dead_letter_of(queue).await?;
        // Blocking reads get their own connection so acks never queue behind them.
        let reader = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        info!(queue, consumer = %self.consumer, "redis stream consumer started");

        let state = ReadState {
            reader,
            conn: self.conn.clone(),
            queue: queue.to_owned(),
            consumer: self.consumer.clone(),
            dead_letter,
            cursor: Cursor::Backlog("0".to_owned()),
            reclaim_idle: self.reclaim_idle,
            buffered: VecDeque::new(),
        };
        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(delivery) = state.buffered.pop_front() {
                    return Some((Ok(delivery), state));
                }
                if let Err(err) = state.fill().await {
                    return Some((Err(err), state));
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

/// Where the next group read starts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    /// Re-reading this consumer's unsettled entries after the given id.
    Backlog(String),
    /// Reading entries never delivered to any consumer.
    Live,
}

struct ReadState {
    reader: MultiplexedConnection,
    conn: ConnectionManager,
    queue: String,
    consumer: String,
    dead_letter: Option<String>,
    cursor: Cursor,
    reclaim_idle: Duration,
    buffered: VecDeque<Delivery>,
}

impl ReadState {
    async fn fill(&mut self) -> Result<(), BrokerError> {
        let key = queue_key(&self.queue);
        match self.cursor.clone() {
            Cursor::Backlog(after) => {
                let options = StreamReadOptions::default()
                    .group(&self.queue, &self.consumer)
                    .count(READ_BATCH);
                let entries = self.read(&key, &after, &options).await?;
                match entries.last() {
                    Some(last) => self.cursor = Cursor::Backlog(last.id.clone()),
                    None => {
                        debug!(queue = %self.queue, "backlog drained");
                        self.cursor = Cursor::Live;
                    }
                }
                self.buffer(&key, entries);
            }
            Cursor::Live => {
                let options = StreamReadOptions::default()
                    .group(&self.queue, &self.consumer)
                    .count(READ_BATCH)
                    .block(READ_BLOCK_MS);
                let entries = self.read(&key, ">", &options).await?;
                if entries.is_empty() {
                    self.reclaim(&key).await?;
                } else {
                    self.buffer(&key, entries);
                }
            }
        }
        Ok(())
    }

    async fn read(
        &mut self,
        key: &str,
        after: &str,
        options: &StreamReadOptions,
    ) -> Result<Vec<StreamId>, BrokerError> {
        let reply: Option<StreamReadReply> =
            self.reader.xread_options(&[key], &[after], options).await?;
        Ok(reply
            .map(|r| r.keys)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|stream| stream.ids)
            .collect())
    }

    /// Claims entries another consumer left unsettled for too long.
    async fn reclaim(&mut self, key: &str) -> Result<(), BrokerError> {
        let pending: StreamPendingCountReply = self
            .conn
            .xpending_count(key, &self.queue, "-", "+", RECLAIM_SCAN)
            .await?;
        let ids = reclaimable(&pending.ids, &self.consumer, self.reclaim_idle);
        if ids.is_empty() {
            return Ok(());
        }
        let min_idle = usize::try_from(self.reclaim_idle.as_millis()).unwrap_or(usize::MAX);
        let claimed: StreamClaimReply = self
            .conn
            .xclaim(key, &self.queue, &self.consumer, min_idle, &ids)
            .await?;
        if !claimed.ids.is_empty() {
            warn!(
                queue = %self.queue,
                claimed = claimed.ids.len(),
                "claimed entries left unsettled by another consumer"
            );
        }
        self.buffer(key, claimed.ids);
        Ok(())
    }

    fn buffer(&mut self, key: &str, entries: Vec<StreamId>) {
        for entry in entries {
            let delivery = self.to_delivery(key, entry);
            self.buffered.push_back(delivery);
        }
    }

    fn to_delivery(&self, key: &str, entry: StreamId) -> Delivery {
        let routing_key: String = entry.get("routing_key").unwrap_or_default();
        let payload: Vec<u8> = entry.get("payload").unwrap_or_default();
        let attempt: u32 = entry.get("attempt").unwrap_or(1);
        let acker = RedisAcker {
            conn: self.conn.clone(),
            stream: key.to_owned(),
            group: self.queue.clone(),
            entry_id: entry.id,
            dead_letter: self.dead_letter.as_deref().map(queue_key),
            routing_key: routing_key.clone(),
            payload: payload.clone(),
            attempt,
        };
        Delivery::new(routing_key, payload, attempt, Box::new(acker))
    }
}

struct RedisAcker {
    conn: ConnectionManager,
    stream: String,
    group: String,
    entry_id: String,
    dead_letter: Option<String>,
    routing_key: String,
    payload: Vec<u8>,
    attempt: u32,
}

impl RedisAcker {
    async fn settle(&mut self) -> Result<(), BrokerError> {
        let _: i64 = self
            .conn
            .xack(&self.stream, &self.group, &[&self.entry_id])
            .await?;
        let _: i64 = self.conn.xdel(&self.stream, &[&self.entry_id]).await?;
        Ok(())
    }
}

#[async_trait]
impl Acker for RedisAcker {
    async fn ack(mut self: Box<Self>) -> Result<(), BrokerError> {
        self.settle().await
    }

    async fn nack(mut self: Box<Self>, requeue: bool) -> Result<(), BrokerError> {
        if requeue {
            let stream = self.stream.clone();
            let next_attempt = self.attempt.saturating_add(1);
            append(
                &mut self.conn,
                &stream,
                &self.routing_key,
                &self.payload,
                next_attempt,
            )
            .await?;
        } else if let Some(dead_letter) = self.dead_letter.clone() {
            append(
                &mut self.conn,
                &dead_letter,
                &self.routing_key,
                &self.payload,
                self.attempt,
            )
            .await?;
        } else {
            warn!(stream = %self.stream, "rejected message dropped, no dead-letter queue");
        }
        self.settle().await
    }
}

async fn append(
    conn: &mut ConnectionManager,
    stream: &str,
    routing_key: &str,
    payload: &[u8],
    attempt: u32,
) -> Result<(), BrokerError> {
    let attempt = attempt.to_string();
    let fields: [(&str, &[u8]); 3] = [
        ("routing_key", routing_key.as_bytes()),
        ("payload", payload),
        ("attempt", attempt.as_bytes()),
    ];
    let _: String = conn.xadd(stream, "*", &fields).await?;
    Ok(())
}

/// Connector for [`RedisBroker`].
#[derive(Debug, Clone)]
pub struct RedisConnector {
    url: String,
    consumer: String,
}

impl RedisConnector {
    /// Connector for the server at `url`, reading streams as `consumer`.
    #[must_use]
    pub fn new(url: impl Into<String>, consumer: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            consumer: consumer.into(),
        }
    }
}

#[async_trait]
impl BrokerConnector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn Broker>, BrokerError> {
        let broker = RedisBroker::connect(&self.url, self.consumer.clone()).await?;
        Ok(Arc::new(broker))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use uuid::Uuid;

    use super::*;
    use crate::topology::Topology;

    fn pending(id: &str, consumer: &str, idle_ms: usize) -> StreamPendingId {
        StreamPendingId {
            id: id.to_owned(),
            consumer: consumer.to_owned(),
            last_delivered_ms: idle_ms,
            times_delivered: 1,
        }
    }

    #[test]
    fn test_binding_encoding_splits_on_first_space() {
        let raw = encode_binding("search_sync", "activity.#");
        assert_eq!(decode_binding(&raw), Some(("search_sync", "activity.#")));
    }

    #[test]
    fn test_queue_keys_are_namespaced() {
        assert_eq!(queue_key("search_sync"), "sporthub:queue:search_sync");
        assert_eq!(
            queue_meta_key("search_sync"),
            "sporthub:queue-meta:search_sync"
        );
    }

    #[test]
    fn test_reclaimable_skips_own_and_recent_entries() {
        let entries = [
            pending("1-0", "search-a", 90_000),
            pending("2-0", "search-b", 90_000),
            pending("3-0", "search-a", 5_000),
        ];

        let ids = reclaimable(&entries, "search-b", Duration::from_secs(60));

        assert_eq!(ids, vec!["1-0".to_owned()]);
    }

    #[test]
    fn test_reclaimable_with_zero_idle_takes_every_foreign_entry() {
        let entries = [pending("1-0", "search-a", 0), pending("2-0", "search-c", 0)];

        let ids = reclaimable(&entries, "search-b", Duration::ZERO);

        assert_eq!(ids, vec!["1-0".to_owned(), "2-0".to_owned()]);
    }

    // The tests below need a Redis server at REDIS_URL (default localhost).

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned())
    }

    async fn declared(consumer: &str) -> (RedisBroker, Topology) {
        let suffix = Uuid::new_v4().simple().to_string();
        let topology = Topology {
            exchange: format!("events-{suffix}"),
            queue: format!("sync-{suffix}"),
            dead_letter_queue: Some(format!("sync-{suffix}.dead")),
            binding_pattern: "#".to_owned(),
        };
        let broker = RedisBroker::connect(&redis_url(), consumer).await.unwrap();
        topology.declare(&broker).await.unwrap();
        (broker, topology)
    }

    async fn publish_all(broker: &RedisBroker, topology: &Topology, keys: &[&str]) {
        for key in keys {
            broker
                .publish(&topology.exchange, key, key.as_bytes())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_unsettled_entries_are_redelivered_to_the_same_consumer() {
        // Arrange
        let (broker, topology) = declared("search-a").await;
        let keys = ["activity.created", "activity.updated", "activity.deleted"];
        publish_all(&broker, &topology, &keys).await;
        let mut first = broker.consume(&topology.queue).await.unwrap();
        first.next().await.unwrap().unwrap().ack().await.unwrap();
        drop(first);

        // Act
        let mut second = broker.consume(&topology.queue).await.unwrap();
        let a = second.next().await.unwrap().unwrap();
        let b = second.next().await.unwrap().unwrap();

        // Assert
        assert_eq!(a.routing_key, "activity.updated");
        assert_eq!(b.routing_key, "activity.deleted");
        a.ack().await.unwrap();
        b.ack().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_entries_left_by_another_consumer_are_claimed_when_idle() {
        // Arrange
        let (departed, topology) = declared("search-a").await;
        publish_all(&departed, &topology, &["activity.created", "activity.updated"]).await;
        let mut stream = departed.consume(&topology.queue).await.unwrap();
        stream.next().await.unwrap().unwrap().ack().await.unwrap();
        drop(stream);
        let survivor = RedisBroker::connect(&redis_url(), "search-b")
            .await
            .unwrap()
            .with_reclaim_idle(Duration::ZERO);

        // Act
        let mut stream = survivor.consume(&topology.queue).await.unwrap();
        let claimed = tokio::time::timeout(Duration::from_secs(10), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // Assert
        assert_eq!(claimed.routing_key, "activity.updated");
        claimed.ack().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_nack_requeues_then_dead_letters() {
        // Arrange
        let (broker, topology) = declared("search-a").await;
        publish_all(&broker, &topology, &["activity.created"]).await;
        let mut stream = broker.consume(&topology.queue).await.unwrap();

        // Act
        let first = stream.next().await.unwrap().unwrap();
        first.nack(true).await.unwrap();
        let second = stream.next().await.unwrap().unwrap();
        let second_attempt = second.attempt;
        second.nack(false).await.unwrap();
        let dead_letter = topology.dead_letter_queue.clone().unwrap();
        let mut dead = broker.consume(&dead_letter).await.unwrap();
        let parked = dead.next().await.unwrap().unwrap();

        // Assert
        assert_eq!(second_attempt, 2);
        assert_eq!(parked.routing_key, "activity.created");
        assert_eq!(parked.attempt, 2);
        parked.ack().await.unwrap();
    }
}
