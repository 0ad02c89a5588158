//! Anomaly detection engine
//!
//! Four independent detectors produce [`Anomaly`] records:
//! - isolation forest (seedable random partitioning)
//! - local outlier factor (k-nearest-neighbor density)
//! - per-dimension z-score / IQR outliers
//! - deterministic rules over the raw records
//!
//! Detectors never fail; degenerate input yields an empty list. Multiple
//! detectors may flag the same address and nothing is deduplicated.

pub mod isolation_forest;
pub mod lof;
pub mod rules;
pub mod statistical;

pub use isolation_forest::{isolation_forest, isolation_scores, IsolationForestParams};
pub use lof::{local_outlier_factor, lof_scores, LofParams};
pub use rules::{pattern_anomalies, RuleThresholds, RuleType};
pub use statistical::{statistical_outliers, z_score_severity, StatisticalMethod, StatisticalParams};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::features::{FeatureVector, FEATURE_DIMENSION, FEATURE_NAMES};

/// What kind of deviation an anomaly describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    IsolationForest,
    LocalOutlier,
    StatisticalOutlier,
    UnusualBalance,
    UnusualActivity,
    UnusualTiming,
}

/// Anomaly severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Tier a score-to-threshold ratio: ≥2 critical, ≥1.5 high, ≥1.2 medium
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 2.0 {
            Self::Critical
        } else if ratio >= 1.5 {
            Self::High
        } else if ratio >= 1.2 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Selectable detector for the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyAlgorithm {
    IsolationForest,
    Lof,
    /// Statistical detector with the method from its own parameters
    Statistical,
}

impl std::str::FromStr for AnomalyAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isolation_forest" | "isolation-forest" | "iforest" => Ok(Self::IsolationForest),
            "lof" | "local_outlier_factor" => Ok(Self::Lof),
            "statistical" | "zscore" | "z-score" | "iqr" => Ok(Self::Statistical),
            other => Err(format!("unknown anomaly algorithm '{}'", other)),
        }
    }
}

/// Handling of anomalies whose score is NaN or infinite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NanPolicy {
    /// Remove them before returning
    #[default]
    Filter,
    /// Return them unchanged
    Propagate,
}

/// One flagged record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub address: String,
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub score: f64,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    /// Diagnostic values that led to the decision
    pub features: BTreeMap<String, f64>,
}

impl Anomaly {
    pub(crate) fn new(
        id: String,
        address: impl Into<String>,
        anomaly_type: AnomalyType,
        severity: Severity,
        score: f64,
        description: String,
    ) -> Self {
        Self {
            id,
            address: address.into(),
            anomaly_type,
            severity,
            score,
            description,
            detected_at: Utc::now(),
            features: BTreeMap::new(),
        }
    }

    pub(crate) fn with_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.features.insert(name.into(), value);
        self
    }

    pub(crate) fn with_features(mut self, features: BTreeMap<String, f64>) -> Self {
        self.features.extend(features);
        self
    }
}

/// Apply a [`NanPolicy`] to detector output
pub fn apply_nan_policy(anomalies: Vec<Anomaly>, policy: NanPolicy) -> Vec<Anomaly> {
    match policy {
        NanPolicy::Propagate => anomalies,
        NanPolicy::Filter => {
            let before = anomalies.len();
            let kept: Vec<Anomaly> = anomalies.into_iter().filter(|a| a.score.is_finite()).collect();
            if kept.len() < before {
                warn!(removed = before - kept.len(), "dropped anomalies with non-finite scores");
            }
            kept
        }
    }
}

/// Name for dimension `index`; generic `f{index}` outside the extracted layout
pub(crate) fn dimension_name(index: usize, dimension: usize) -> String {
    if dimension == FEATURE_DIMENSION {
        FEATURE_NAMES[index].to_string()
    } else {
        format!("f{}", index)
    }
}

/// Feature values of a vector keyed by dimension name
pub(crate) fn feature_map(vector: &FeatureVector) -> BTreeMap<String, f64> {
    let dimension = vector.dimension();
    vector
        .features
        .iter()
        .enumerate()
        .map(|(i, &v)| (dimension_name(i, dimension), v))
        .collect()
}
