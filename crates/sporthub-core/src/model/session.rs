//! Sessions: dated, capacity-bounded occurrences of an activity.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A persisted session.
///
/// `capacity` is a ceiling compared against the live count of confirmed
/// bookings; it is never decremented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: i64,
    /// Parent activity.
    pub activity_id: i64,
    /// Calendar date.
    pub date: NaiveDate,
    /// Local start time.
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Local end time.
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    /// Maximum confirmed bookings.
    pub capacity: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Start time as a zero-padded 24-hour `HH:MM` string.
    #[must_use]
    pub fn start_hhmm(&self) -> String {
        self.start_time.format("%H:%M").to_string()
    }

    /// Start of the session as a UTC instant.
    #[must_use]
    pub fn starts_at(&self) -> DateTime<Utc> {
        NaiveDateTime::new(self.date, self.start_time).and_utc()
    }

    /// End of the session as a UTC instant.
    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        NaiveDateTime::new(self.date, self.end_time).and_utc()
    }
}

/// Fields required to create a session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewSession {
    /// Parent activity.
    pub activity_id: i64,
    /// Calendar date.
    pub date: NaiveDate,
    /// Local start time.
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Local end time.
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    /// Maximum confirmed bookings.
    pub capacity: i32,
}

impl NewSession {
    /// Checks the time window and capacity.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the end is not after the start or
    /// the capacity is negative.
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_window(self.start_time, self.end_time, self.capacity)
    }
}

/// Partial update of a session; `Some` fields were present in the request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionPatch {
    /// New date.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// New start time.
    #[serde(default, with = "hhmm::option")]
    pub start_time: Option<NaiveTime>,
    /// New end time.
    #[serde(default, with = "hhmm::option")]
    pub end_time: Option<NaiveTime>,
    /// New capacity.
    #[serde(default)]
    pub capacity: Option<i32>,
}

impl SessionPatch {
    /// Returns `true` when no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.capacity.is_none()
    }

    /// Returns `current` with the present fields applied, validated as a whole.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an empty patch or if the merged
    /// session would have an invalid window or capacity.
    pub fn merge(&self, current: &Session) -> Result<Session, DomainError> {
        if self.is_empty() {
            return Err(DomainError::Validation("update contains no fields".to_owned()));
        }
        let mut merged = current.clone();
        if let Some(date) = self.date {
            merged.date = date;
        }
        if let Some(start) = self.start_time {
            merged.start_time = start;
        }
        if let Some(end) = self.end_time {
            merged.end_time = end;
        }
        if let Some(capacity) = self.capacity {
            merged.capacity = capacity;
        }
        validate_window(merged.start_time, merged.end_time, merged.capacity)?;
        Ok(merged)
    }
}

fn validate_window(start: NaiveTime, end: NaiveTime, capacity: i32) -> Result<(), DomainError> {
    if end <= start {
        return Err(DomainError::Validation(
            "end_time must be after start_time".to_owned(),
        ));
    }
    if capacity < 0 {
        return Err(DomainError::Validation(
            "capacity must be zero or greater".to_owned(),
        ));
    }
    Ok(())
}

/// Serde helpers for `HH:MM` times (seconds accepted on input).
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    /// Parses `HH:MM` or `HH:MM:SS`.
    ///
    /// # Errors
    ///
    /// Returns a chrono parse error for any other shape.
    pub fn parse(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
    }

    /// Serializes as `HH:MM`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    /// Deserializes from `HH:MM` or `HH:MM:SS`.
    ///
    /// # Errors
    ///
    /// Returns a custom error for malformed times.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(raw.trim()).map_err(serde::de::Error::custom)
    }

    /// Optional variant.
    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serializes `Some` as `HH:MM`, `None` as null.
        ///
        /// # Errors
        ///
        /// Propagates serializer errors.
        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => super::serialize(time, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Deserializes an optional `HH:MM` time.
        ///
        /// # Errors
        ///
        /// Returns a custom error for malformed times.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.map(|raw| super::parse(raw.trim()).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
