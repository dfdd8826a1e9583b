//! Exchange/queue topology and topic routing-key matching.

use tracing::info;

use crate::broker::Broker;
use crate::error::BrokerError;

/// A durable queue declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    /// Queue name.
    pub name: String,
    /// Queue that receives messages rejected without requeue.
    pub dead_letter: Option<String>,
}

impl QueueSpec {
    /// A queue without a dead-letter target.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dead_letter: None,
        }
    }

    /// Routes rejected messages to `queue`.
    #[must_use]
    pub fn with_dead_letter(mut self, queue: impl Into<String>) -> Self {
        self.dead_letter = Some(queue.into());
        self
    }
}

/// The full consumer-side topology: one exchange, one bound queue and its
/// dead-letter queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    pub queue: String,
    pub dead_letter_queue: Option<String>,
    pub binding_pattern: String,
}

impl Topology {
    /// Declares the exchange, the dead-letter queue, the work queue and the
    /// binding. Declarations are idempotent.
    ///
    /// # Errors
    ///
    /// Propagates the first failing broker call.
    pub async fn declare(&self, broker: &dyn Broker) -> Result<(), BrokerError> {
        broker.declare_exchange(&self.exchange).await?;

        let mut spec = QueueSpec::new(&self.queue);
        if let Some(dead_letter) = &self.dead_letter_queue {
            broker.declare_queue(&QueueSpec::new(dead_letter)).await?;
            spec = spec.with_dead_letter(dead_letter);
        }
        broker.declare_queue(&spec).await?;
        broker
            .bind_queue(&self.queue, &self.exchange, &self.binding_pattern)
            .await?;

        info!(
            exchange = %self.exchange,
            queue = %self.queue,
            pattern = %self.binding_pattern,
            "broker topology declared"
        );
        Ok(())
    }
}

/// Topic-exchange matching: words are separated by `.`, `*` matches exactly
/// one word and `#` matches zero or more words.
#[must_use]
pub fn routing_key_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = if routing_key.is_empty() {
        Vec::new()
    } else {
        routing_key.split('.').collect()
    };
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.split_first(), key.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => {
            match_words(rest, key) || (!key.is_empty() && match_words(pattern, &key[1..]))
        }
        (None, Some(_)) | (Some(_), None) => false,
        (Some((&"*", rest)), Some((_, key_rest))) => match_words(rest, key_rest),
        (Some((word, rest)), Some((key_word, key_rest))) => {
            word == key_word && match_words(rest, key_rest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_matches_everything() {
        assert!(routing_key_matches("#", "activity.created"));
        assert!(routing_key_matches("#", "activity.session.updated"));
        assert!(routing_key_matches("#", "booking.created"));
    }

    #[test]
    fn test_star_matches_exactly_one_word() {
        assert!(routing_key_matches("activity.*", "activity.created"));
        assert!(!routing_key_matches("activity.*", "activity.session.created"));
    }

    #[test]
    fn test_trailing_hash_matches_zero_or_more_words() {
        assert!(routing_key_matches("activity.#", "activity"));
        assert!(routing_key_matches("activity.#", "activity.session.deleted"));
        assert!(!routing_key_matches("activity.#", "booking.created"));
    }

    #[test]
    fn test_hash_in_the_middle() {
        assert!(routing_key_matches("activity.#.deleted", "activity.deleted"));
        assert!(routing_key_matches(
            "activity.#.deleted",
            "activity.session.deleted"
        ));
        assert!(!routing_key_matches(
            "activity.#.deleted",
            "activity.session.created"
        ));
    }

    #[test]
    fn test_literal_pattern_requires_exact_key() {
        assert!(routing_key_matches("booking.created", "booking.created"));
        assert!(!routing_key_matches("booking.created", "booking.cancelled"));
    }
}
