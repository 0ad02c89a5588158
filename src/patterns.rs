//! Heuristic pattern discovery over raw records
//!
//! Four grouping passes run in a fixed order: sequential activity, calendar
//! eras, balance bands and shared address prefixes. Confidence values are
//! fixed per pass and configurable, not derived from the data.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::records::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Sequential,
    Temporal,
    BalancePattern,
    AddressPrefix,
}

/// A group of records sharing a trait
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub description: String,
    /// Member addresses, never empty
    pub addresses: Vec<String>,
    pub confidence: f64,
    /// Always `addresses.len()`
    pub frequency: usize,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, Value>,
}

impl Pattern {
    fn from_group(
        id: String,
        pattern_type: PatternType,
        description: String,
        confidence: f64,
        group: &[&Record],
    ) -> Self {
        let first_seen = group.iter().filter_map(|r| r.first_seen).min();
        let last_seen = group.iter().filter_map(|r| r.last_seen.or(r.first_seen)).max();
        Self {
            id,
            pattern_type,
            description,
            addresses: group.iter().map(|r| r.address.clone()).collect(),
            confidence,
            frequency: group.len(),
            first_seen,
            last_seen,
            metadata: BTreeMap::new(),
        }
    }

    fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// Discovery thresholds and confidences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryParams {
    /// Maximum gap between consecutive first-seen times inside a sequence
    pub sequential_gap_hours: f64,
    pub sequential_min_size: usize,
    pub sequential_confidence: f64,
    pub temporal_min_size: usize,
    pub temporal_confidence: f64,
    pub balance_min_size: usize,
    pub balance_confidence: f64,
    /// Characters compared for the address prefix pass
    pub prefix_length: usize,
    pub prefix_min_size: usize,
    pub prefix_confidence: f64,
}

impl Default for DiscoveryParams {
    fn default() -> Self {
        Self {
            sequential_gap_hours: 24.0,
            sequential_min_size: 3,
            sequential_confidence: 0.8,
            temporal_min_size: 10,
            temporal_confidence: 0.75,
            balance_min_size: 10,
            balance_confidence: 0.7,
            prefix_length: 4,
            prefix_min_size: 5,
            prefix_confidence: 0.9,
        }
    }
}

/// Calendar-year eras, inclusive on both ends
const ERAS: [(i32, i32); 5] = [(2009, 2010), (2011, 2013), (2014, 2017), (2018, 2021), (2022, 2024)];

/// Balance bands as `(name, slug, lower inclusive, upper exclusive)`
const BALANCE_BANDS: [(&str, &str, f64, f64); 5] = [
    ("Small", "small", 0.0, 1.0),
    ("Medium", "medium", 1.0, 10.0),
    ("Large", "large", 10.0, 100.0),
    ("Very Large", "very_large", 100.0, 1000.0),
    ("Whale", "whale", 1000.0, f64::INFINITY),
];

/// Run all passes: sequential, temporal, balance, prefix
pub fn discover_patterns(records: &[Record], params: &DiscoveryParams) -> Vec<Pattern> {
    let mut patterns = sequential_patterns(records, params);
    patterns.extend(temporal_patterns(records, params));
    patterns.extend(balance_patterns(records, params));
    patterns.extend(prefix_patterns(records, params));
    debug!(records = records.len(), patterns = patterns.len(), "pattern discovery finished");
    patterns
}

/// Chains of records first seen within `sequential_gap_hours` of each other
pub fn sequential_patterns(records: &[Record], params: &DiscoveryParams) -> Vec<Pattern> {
    let mut dated: Vec<(&Record, DateTime<Utc>)> = records
        .iter()
        .filter_map(|r| r.first_seen.map(|t| (r, t)))
        .collect();
    dated.sort_by_key(|(_, t)| *t);

    let gap_ms = params.sequential_gap_hours * 3_600_000.0;
    if !(gap_ms >= 0.0) {
        debug!(gap_hours = params.sequential_gap_hours, "no sequential grouping for a negative gap");
        return Vec::new();
    }
    let max_gap = Duration::try_milliseconds(gap_ms as i64).unwrap_or(Duration::MAX);
    let mut groups: Vec<Vec<&Record>> = Vec::new();
    let mut current: Vec<&Record> = Vec::new();
    let mut previous: Option<DateTime<Utc>> = None;

    for (record, seen) in dated {
        if let Some(prev) = previous {
            if seen - prev >= max_gap {
                groups.push(std::mem::take(&mut current));
            }
        }
        current.push(record);
        previous = Some(seen);
    }
    groups.push(current);

    groups
        .into_iter()
        .filter(|g| g.len() >= params.sequential_min_size.max(1))
        .enumerate()
        .map(|(i, group)| {
            Pattern::from_group(
                format!("sequential_{}", i),
                PatternType::Sequential,
                format!("{} addresses first seen in close succession", group.len()),
                params.sequential_confidence,
                &group,
            )
        })
        .collect()
}

/// Records grouped by the era of their first-seen year
pub fn temporal_patterns(records: &[Record], params: &DiscoveryParams) -> Vec<Pattern> {
    ERAS.iter()
        .filter_map(|&(start, end)| {
            let group: Vec<&Record> = records
                .iter()
                .filter(|r| r.first_seen.map(|t| (start..=end).contains(&t.year())).unwrap_or(false))
                .collect();
            if group.is_empty() || group.len() < params.temporal_min_size {
                return None;
            }
            Some(
                Pattern::from_group(
                    format!("temporal_{}_{}", start, end),
                    PatternType::Temporal,
                    format!("{} addresses first active in {}-{}", group.len(), start, end),
                    params.temporal_confidence,
                    &group,
                )
                .with_metadata("startYear", json!(start))
                .with_metadata("endYear", json!(end)),
            )
        })
        .collect()
}

/// Records grouped by balance band
pub fn balance_patterns(records: &[Record], params: &DiscoveryParams) -> Vec<Pattern> {
    BALANCE_BANDS
        .iter()
        .filter_map(|&(name, slug, lower, upper)| {
            let group: Vec<&Record> = records
                .iter()
                .filter(|r| r.balance.map(|b| b >= lower && b < upper).unwrap_or(false))
                .collect();
            if group.is_empty() || group.len() < params.balance_min_size {
                return None;
            }
            let avg_balance =
                group.iter().filter_map(|r| r.balance).sum::<f64>() / group.len() as f64;
            Some(
                Pattern::from_group(
                    format!("balance_{}", slug),
                    PatternType::BalancePattern,
                    format!("{} addresses in the {} balance range", group.len(), name),
                    params.balance_confidence,
                    &group,
                )
                .with_metadata("range", json!(name))
                .with_metadata("avgBalance", json!(avg_balance)),
            )
        })
        .collect()
}

/// Records sharing their leading address characters
pub fn prefix_patterns(records: &[Record], params: &DiscoveryParams) -> Vec<Pattern> {
    let mut by_prefix: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    for record in records.iter().filter(|r| !r.address.is_empty()) {
        let prefix: String = record.address.chars().take(params.prefix_length).collect();
        by_prefix.entry(prefix).or_default().push(record);
    }

    by_prefix
        .into_iter()
        .filter(|(_, group)| group.len() >= params.prefix_min_size.max(1))
        .map(|(prefix, group)| {
            Pattern::from_group(
                format!("prefix_{}", prefix),
                PatternType::AddressPrefix,
                format!("{} addresses share the prefix '{}'", group.len(), prefix),
                params.prefix_confidence,
                &group,
            )
            .with_metadata("prefix", json!(prefix))
        })
        .collect()
}
