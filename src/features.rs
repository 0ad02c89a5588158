//! Feature extraction and normalization
//!
//! Turns address records into fixed-length numeric vectors for the
//! distance-based algorithms.

use chrono::{DateTime, Utc};
use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{PatternError, Result};
use crate::records::Record;

/// Number of features produced per record
pub const FEATURE_DIMENSION: usize = 5;

/// Human-readable feature names, in vector order
pub const FEATURE_NAMES: [&str; FEATURE_DIMENSION] = [
    "log_balance",
    "log_transactions",
    "log_age_days",
    "log_activity_ratio",
    "prefix_hash",
];

/// Feature vector derived from one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Address of the source record
    pub address: String,
    /// Feature values in [`FEATURE_NAMES`] order
    pub features: Vec<f64>,
    /// Whether min-max normalization has been applied
    pub normalized: bool,
    /// The source record
    pub metadata: Record,
    /// Reference time the age features were measured against
    #[serde(default)]
    pub reference_time: Option<DateTime<Utc>>,
}

impl FeatureVector {
    /// Build a vector directly (mostly for tests and callers with their own features)
    pub fn new(address: impl Into<String>, features: Vec<f64>) -> Self {
        let address = address.into();
        Self {
            metadata: Record::new(address.clone()),
            address,
            features,
            normalized: false,
            reference_time: None,
        }
    }

    /// Feature dimension
    pub fn dimension(&self) -> usize {
        self.features.len()
    }
}

/// Extract features relative to the current time
pub fn extract_features(records: &[Record]) -> Vec<FeatureVector> {
    extract_features_at(records, Utc::now())
}

/// Extract features relative to a fixed reference time
pub fn extract_features_at(records: &[Record], now: DateTime<Utc>) -> Vec<FeatureVector> {
    let vectors: Vec<FeatureVector> = records
        .iter()
        .map(|record| FeatureVector {
            address: record.address.clone(),
            features: record_features(record, now),
            normalized: false,
            metadata: record.clone(),
            reference_time: Some(now),
        })
        .collect();

    debug!(count = vectors.len(), "extracted feature vectors");
    vectors
}

fn record_features(record: &Record, now: DateTime<Utc>) -> Vec<f64> {
    let log_balance = match record.balance {
        Some(b) if b > 0.0 => (b + 1.0).log10(),
        _ => 0.0,
    };

    let log_transactions = match record.transactions {
        Some(t) if t > 0.0 => (t + 1.0).log10(),
        _ => 0.0,
    };

    let log_age = record
        .age_days(now)
        .map(|age| (age + 1.0).log10())
        .unwrap_or(0.0);

    let log_activity = record
        .activity_ratio()
        .map(|ratio| (ratio + 1.0).log10())
        .unwrap_or(0.0);

    vec![
        log_balance,
        log_transactions,
        log_age,
        log_activity,
        prefix_hash(&record.address),
    ]
}

/// Crude prefix fingerprint: sum of the first four character codes / 1000.
///
/// Collisions are expected.
pub fn prefix_hash(address: &str) -> f64 {
    address.chars().take(4).map(|c| c as u32 as f64).sum::<f64>() / 1000.0
}

/// Min-max scale every dimension to [0, 1] across the batch.
///
/// A dimension whose values are all equal maps to 0. Vectors are assumed to
/// share one dimension; see [`try_normalize_features`] for a checked variant.
pub fn normalize_features(vectors: &[FeatureVector]) -> Vec<FeatureVector> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dimension = first.dimension();

    let ranges: Vec<(f64, f64)> = (0..dimension)
        .map(|d| {
            match vectors
                .iter()
                .filter_map(|v| v.features.get(d).copied())
                .minmax_by(crate::math::cmp_f64)
            {
                MinMaxResult::NoElements => (0.0, 0.0),
                MinMaxResult::OneElement(v) => (v, v),
                MinMaxResult::MinMax(min, max) => (min, max),
            }
        })
        .collect();

    vectors
        .iter()
        .map(|v| {
            let features = v
                .features
                .iter()
                .zip(ranges.iter())
                .map(|(&value, &(min, max))| {
                    let range = max - min;
                    if range == 0.0 {
                        0.0
                    } else {
                        (value - min) / range
                    }
                })
                .collect();

            FeatureVector {
                address: v.address.clone(),
                features,
                normalized: true,
                metadata: v.metadata.clone(),
                reference_time: v.reference_time,
            }
        })
        .collect()
}

/// Check that every vector shares the first vector's dimension
pub fn check_dimensions(vectors: &[FeatureVector]) -> Result<()> {
    if let Some(first) = vectors.first() {
        let expected = first.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.dimension() != expected) {
            return Err(PatternError::DimensionMismatch {
                expected,
                found: bad.dimension(),
            });
        }
    }
    Ok(())
}

/// [`normalize_features`] with the uniform-dimension check applied first
pub fn try_normalize_features(vectors: &[FeatureVector]) -> Result<Vec<FeatureVector>> {
    check_dimensions(vectors)?;
    Ok(normalize_features(vectors))
}

/// Borrow the raw feature slices of a batch
pub(crate) fn feature_slices(vectors: &[FeatureVector]) -> Vec<&[f64]> {
    vectors.iter().map(|v| v.features.as_slice()).collect()
}
