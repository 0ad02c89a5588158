//! Analysis configuration
//!
//! Every section has defaults, so partial TOML/JSON files and the empty
//! object are valid configurations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::anomaly::{
    AnomalyAlgorithm, IsolationForestParams, LofParams, NanPolicy, RuleThresholds, StatisticalParams,
};
use crate::clustering::{ClusterAlgorithm, DbscanParams, HierarchicalParams, KMeansParams};
use crate::correlation::CorrelationParams;
use crate::errors::{PatternError, Result};
use crate::patterns::DiscoveryParams;

/// Environment variable selecting the clustering algorithm
pub const ENV_CLUSTER_ALGORITHM: &str = "PATTERNS_CLUSTER_ALGORITHM";
/// Environment variable selecting the anomaly detector
pub const ENV_ANOMALY_ALGORITHM: &str = "PATTERNS_ANOMALY_ALGORITHM";
/// Environment variable fixing the random seed
pub const ENV_SEED: &str = "PATTERNS_SEED";

/// Pattern recognition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternRecognitionConfig {
    pub enable_clustering: bool,
    pub enable_anomaly_detection: bool,
    pub enable_correlation: bool,

    pub cluster_algorithm: ClusterAlgorithm,
    pub anomaly_algorithm: AnomalyAlgorithm,

    /// Seed for k-means initialization and isolation forest sampling;
    /// entropy-seeded when absent
    pub seed: Option<u64>,
    /// Time that record ages are measured against; now when absent
    pub reference_time: Option<DateTime<Utc>>,

    pub kmeans: KMeansParams,
    pub dbscan: DbscanParams,
    pub hierarchical: HierarchicalParams,
    pub isolation_forest: IsolationForestParams,
    pub lof: LofParams,
    pub statistical: StatisticalParams,
    pub rules: RuleThresholds,
    pub correlation: CorrelationParams,
    pub discovery: DiscoveryParams,
    pub nan_policy: NanPolicy,
}

impl Default for PatternRecognitionConfig {
    fn default() -> Self {
        Self {
            enable_clustering: true,
            enable_anomaly_detection: true,
            enable_correlation: true,
            cluster_algorithm: ClusterAlgorithm::KMeans,
            anomaly_algorithm: AnomalyAlgorithm::IsolationForest,
            seed: None,
            reference_time: None,
            kmeans: KMeansParams::default(),
            dbscan: DbscanParams::default(),
            hierarchical: HierarchicalParams::default(),
            isolation_forest: IsolationForestParams::default(),
            lof: LofParams::default(),
            statistical: StatisticalParams::default(),
            rules: RuleThresholds::default(),
            correlation: CorrelationParams::default(),
            discovery: DiscoveryParams::default(),
            nan_policy: NanPolicy::Filter,
        }
    }
}

impl PatternRecognitionConfig {
    /// Load configuration from a `.toml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = match extension(path).as_deref() {
            Some("toml") => toml::from_str(&content)?,
            Some("json") | None => serde_json::from_str(&content)?,
            Some(other) => {
                return Err(PatternError::UnsupportedFormat(format!(
                    "config extension '.{}' (expected .toml or .json)",
                    other
                )))
            }
        };
        Ok(config)
    }

    /// Save configuration; the format follows the file extension
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match extension(path).as_deref() {
            Some("toml") => toml::to_string_pretty(self)?,
            Some("json") | None => serde_json::to_string_pretty(self)?,
            Some(other) => {
                return Err(PatternError::UnsupportedFormat(format!(
                    "config extension '.{}' (expected .toml or .json)",
                    other
                )))
            }
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults overridden by `PATTERNS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_CLUSTER_ALGORITHM) {
            self.cluster_algorithm = value.parse().map_err(PatternError::Configuration)?;
        }
        if let Some(value) = lookup(ENV_ANOMALY_ALGORITHM) {
            self.anomaly_algorithm = value.parse().map_err(PatternError::Configuration)?;
        }
        if let Some(value) = lookup(ENV_SEED) {
            let seed = value
                .trim()
                .parse::<u64>()
                .map_err(|e| PatternError::Configuration(format!("{} '{}': {}", ENV_SEED, value, e)))?;
            self.seed = Some(seed);
        }
        Ok(self)
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| -> Result<()> { Err(PatternError::Configuration(msg.to_string())) };

        if !(self.kmeans.tolerance >= 0.0) {
            return fail("k-means tolerance must be non-negative");
        }
        if !(self.dbscan.epsilon > 0.0) {
            return fail("DBSCAN epsilon must be greater than 0");
        }
        if self.dbscan.min_samples == 0 {
            return fail("DBSCAN min_samples must be greater than 0");
        }
        if self.isolation_forest.num_trees == 0 {
            return fail("isolation forest needs at least one tree");
        }
        if self.isolation_forest.max_samples < 2 {
            return fail("isolation forest max_samples must be at least 2");
        }
        let c = self.isolation_forest.contamination;
        if !(c > 0.0 && c <= 0.5) {
            return fail("contamination must be in (0, 0.5]");
        }
        if !(self.lof.threshold > 0.0) {
            return fail("LOF threshold must be greater than 0");
        }
        if !(self.statistical.z_threshold > 0.0) {
            return fail("z-score threshold must be greater than 0");
        }
        if !(self.statistical.iqr_multiplier >= 0.0) {
            return fail("IQR multiplier must be non-negative");
        }
        let rules = &self.rules;
        if [rules.high_balance, rules.high_transactions, rules.burst_transactions, rules.burst_window_days]
            .iter()
            .any(|v| !(*v >= 0.0))
        {
            return fail("rule thresholds must be non-negative");
        }
        if !(self.discovery.sequential_gap_hours >= 0.0) {
            return fail("sequential gap must be non-negative");
        }
        if self.discovery.prefix_length == 0 {
            return fail("prefix length must be greater than 0");
        }
        let confidences = [
            self.discovery.sequential_confidence,
            self.discovery.temporal_confidence,
            self.discovery.balance_confidence,
            self.discovery.prefix_confidence,
        ];
        if confidences.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return fail("pattern confidences must be in [0, 1]");
        }
        if self.correlation.min_samples < 3 {
            return fail("correlation min_samples must be at least 3");
        }

        Ok(())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
