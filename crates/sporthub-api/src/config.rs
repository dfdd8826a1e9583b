//! Typed configuration read from the environment.
//!
//! `.env` files are loaded by the binaries through `dotenvy` before these
//! structs are built. Parsing goes through a lookup function so tests can
//! supply variables without touching the process environment.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Source of configuration values by variable name.
pub trait Lookup {
    /// Returns the raw value of `name`, if set.
    fn get(&self, name: &str) -> Option<String>;
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl Lookup for Environment {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

fn text(env: &impl Lookup, name: &str, default: &str) -> String {
    env.get(name)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn optional_text(env: &impl Lookup, name: &str) -> Option<String> {
    env.get(name)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn number<T>(env: &impl Lookup, name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match optional_text(env, name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{name} must be a valid number: {e}"))),
    }
}

/// Settings shared by the broker-facing parts of both services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// `memory://` or `redis://host:port`.
    pub url: String,
    /// Topic exchange carrying activity events.
    pub exchange: String,
    /// Stable consumer name; unsettled entries are re-read under it after a restart.
    pub consumer: String,
}

impl BrokerConfig {
    fn from_lookup(env: &impl Lookup, service: &str) -> Self {
        let consumer = optional_text(env, "BROKER_CONSUMER_NAME")
            .or_else(|| optional_text(env, "HOSTNAME"))
            .unwrap_or_else(|| service.to_owned());
        Self {
            url: text(env, "BROKER_URL", "memory://"),
            exchange: text(env, "BROKER_EXCHANGE", "activities.events"),
            consumer,
        }
    }
}

/// Configuration of the activities service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivitiesConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Event bus.
    pub broker: BrokerConfig,
    /// Base URL of the users service.
    pub users_api_base_url: String,
    /// Bound on each concurrent enrollment branch.
    pub enroll_branch_timeout: Duration,
    /// Timeout for outbound HTTP calls.
    pub http_timeout: Duration,
    /// Bound on graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl ActivitiesConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a number is malformed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(&Environment)
    }

    /// Reads configuration from `env`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a number is malformed.
    pub fn from_lookup(env: &impl Lookup) -> Result<Self, AppError> {
        let database_url = optional_text(env, "DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".to_owned())
        })?;
        Ok(Self {
            database_url,
            host: text(env, "HOST", "0.0.0.0"),
            port: number(env, "PORT", 8082)?,
            broker: BrokerConfig::from_lookup(env, "activities-api"),
            users_api_base_url: text(env, "USERS_API_BASE_URL", "http://localhost:8081"),
            enroll_branch_timeout: Duration::from_millis(number(
                env,
                "ENROLL_BRANCH_TIMEOUT_MS",
                5000,
            )?),
            http_timeout: Duration::from_millis(number(env, "HTTP_TIMEOUT_MS", 5000)?),
            shutdown_timeout: Duration::from_secs(number(env, "SHUTDOWN_TIMEOUT_SECS", 10)?),
        })
    }
}

/// Configuration of the search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Solr core URL.
    pub solr_url: String,
    /// Shared cache tier; the in-memory tier is used when unset.
    pub redis_url: Option<String>,
    /// Time-to-live of both cache tiers.
    pub cache_ttl: Duration,
    /// Entry bound of the local tier.
    pub local_cache_size: usize,
    /// Event bus.
    pub broker: BrokerConfig,
    /// Queue the projector consumes.
    pub queue: String,
    /// Queue receiving rejected messages.
    pub dead_letter_queue: String,
    /// Binding pattern between the exchange and `queue`.
    pub routing_key: String,
    /// Delivery attempts before a failing message is dead-lettered.
    pub max_redeliveries: u32,
    /// Base URL of the activities service.
    pub activities_api_base: String,
    /// Timeout for outbound HTTP calls.
    pub http_timeout: Duration,
    /// Bound on graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl SearchConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a number is malformed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(&Environment)
    }

    /// Reads configuration from `env`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a number is malformed.
    pub fn from_lookup(env: &impl Lookup) -> Result<Self, AppError> {
        Ok(Self {
            host: text(env, "HOST", "0.0.0.0"),
            port: number(env, "PORT", 8080)?,
            solr_url: text(env, "SOLR_URL", "http://localhost:8983/solr/activities"),
            redis_url: optional_text(env, "REDIS_URL"),
            cache_ttl: Duration::from_secs(number(env, "CACHE_TTL_SECONDS", 60)?),
            local_cache_size: number(env, "LOCAL_CACHE_SIZE", 10_000)?,
            broker: BrokerConfig::from_lookup(env, "search-api"),
            queue: text(env, "BROKER_QUEUE", "search_sync"),
            dead_letter_queue: text(env, "BROKER_DEAD_LETTER_QUEUE", "search_sync.dead"),
            routing_key: text(env, "BROKER_ROUTING_KEY", "#"),
            max_redeliveries: number(env, "BROKER_MAX_REDELIVERIES", 3)?,
            activities_api_base: text(env, "ACTIVITIES_API_BASE", "http://localhost:8082"),
            http_timeout: Duration::from_millis(number(env, "HTTP_TIMEOUT_MS", 5000)?),
            shutdown_timeout: Duration::from_secs(number(env, "SHUTDOWN_TIMEOUT_SECS", 10)?),
        })
    }
}
