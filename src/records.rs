//! Address records handed in by data loaders
//!
//! Records are read-only inputs. Every field except the address is optional
//! and stays `None` when the explorer response did not carry it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{PatternError, Result};

/// One address-like record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Address string (may be empty)
    #[serde(default)]
    pub address: String,
    /// Balance in BTC-like units
    #[serde(default)]
    pub balance: Option<f64>,
    /// Number of transactions
    #[serde(default)]
    pub transactions: Option<f64>,
    /// First activity
    #[serde(default, with = "flexible_timestamp")]
    pub first_seen: Option<DateTime<Utc>>,
    /// Last activity
    #[serde(default, with = "flexible_timestamp")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Record {
    /// Record with only an address set
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_transactions(mut self, transactions: f64) -> Self {
        self.transactions = Some(transactions);
        self
    }

    pub fn with_first_seen(mut self, first_seen: DateTime<Utc>) -> Self {
        self.first_seen = Some(first_seen);
        self
    }

    pub fn with_last_seen(mut self, last_seen: DateTime<Utc>) -> Self {
        self.last_seen = Some(last_seen);
        self
    }

    /// Age in fractional days relative to `now`, if `first_seen` is known
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<f64> {
        self.first_seen
            .map(|first| ((now - first).num_milliseconds() as f64 / MILLIS_PER_DAY).max(0.0))
    }

    /// Span between first and last activity in fractional days
    pub fn active_span_days(&self) -> Option<f64> {
        match (self.first_seen, self.last_seen) {
            (Some(first), Some(last)) => {
                Some((last - first).num_milliseconds() as f64 / MILLIS_PER_DAY)
            }
            _ => None,
        }
    }

    /// Transactions per active day; `None` without a positive span
    pub fn activity_ratio(&self) -> Option<f64> {
        let span = self.active_span_days()?;
        let transactions = self.transactions?;
        if span > 0.0 {
            Some(transactions / span)
        } else {
            None
        }
    }
}

pub(crate) const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Load records from a JSON file.
///
/// Accepts either a bare array or an object with a `records` array.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_records(&content)
}

/// Parse records from a JSON string (see [`load_records`])
pub fn parse_records(content: &str) -> Result<Vec<Record>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Payload {
        List(Vec<Record>),
        Wrapped { records: Vec<Record> },
    }

    if content.trim().is_empty() {
        return Err(PatternError::InvalidInput("record payload is empty".to_string()));
    }

    let value: serde_json::Value = serde_json::from_str(content)?;
    if !(value.is_array() || value.get("records").is_some()) {
        return Err(PatternError::UnsupportedFormat(
            "expected a JSON array or an object with a `records` array".to_string(),
        ));
    }

    match serde_json::from_value(value)? {
        Payload::List(records) | Payload::Wrapped { records } => Ok(records),
    }
}

/// Timestamps arrive either as RFC 3339 strings or as epoch milliseconds.
mod flexible_timestamp {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Float(f64),
        Text(DateTime<Utc>),
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Raw>::deserialize(deserializer)?;
        Ok(match raw {
            None => None,
            Some(Raw::Text(dt)) => Some(dt),
            Some(Raw::Millis(ms)) => Utc.timestamp_millis_opt(ms).single(),
            Some(Raw::Float(ms)) => Utc.timestamp_millis_opt(ms as i64).single(),
        })
    }
}
