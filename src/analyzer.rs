//! Pattern analyzer - main entry point
//!
//! Runs extraction, normalization, clustering, anomaly detection, pattern
//! discovery and correlation in sequence and aggregates the outputs.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::anomaly::{
    apply_nan_policy, isolation_forest, local_outlier_factor, pattern_anomalies, statistical_outliers, Anomaly,
    AnomalyAlgorithm, AnomalyType, Severity,
};
use crate::clustering::{
    dbscan_clustering, hierarchical_clustering, kmeans_clustering, Cluster, ClusterAlgorithm,
};
use crate::config::PatternRecognitionConfig;
use crate::correlation::{analyze_correlations, Correlation};
use crate::errors::Result;
use crate::features::{extract_features_at, try_normalize_features, FeatureVector};
use crate::patterns::{discover_patterns, Pattern};
use crate::records::Record;

/// Cluster-presence component of the overall confidence
const CLUSTER_CONFIDENCE: (f64, f64) = (0.8, 0.5);
/// Anomaly-presence component of the overall confidence
const ANOMALY_CONFIDENCE: (f64, f64) = (0.7, 0.5);

/// Aggregated output of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecognitionResult {
    pub patterns: Vec<Pattern>,
    pub clusters: Vec<Cluster>,
    pub anomalies: Vec<Anomaly>,
    pub correlations: Vec<Correlation>,
    /// Heuristic overall confidence in [0, 1]
    pub confidence: f64,
    /// Wall-clock duration of the run
    pub processing_time_ms: f64,
}

/// Counts derived from a [`PatternRecognitionResult`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_patterns: usize,
    pub total_clusters: usize,
    pub total_anomalies: usize,
    pub total_correlations: usize,
    pub anomalies_by_severity: BTreeMap<Severity, usize>,
    pub anomalies_by_type: BTreeMap<AnomalyType, usize>,
    /// Members of regular clusters
    pub clustered_members: usize,
    /// Members of the DBSCAN noise bucket
    pub noise_members: usize,
}

impl PatternRecognitionResult {
    pub fn summary(&self) -> AnalysisSummary {
        let mut summary = AnalysisSummary {
            total_patterns: self.patterns.len(),
            total_clusters: self.clusters.iter().filter(|c| !c.noise).count(),
            total_anomalies: self.anomalies.len(),
            total_correlations: self.correlations.len(),
            ..AnalysisSummary::default()
        };

        for anomaly in &self.anomalies {
            *summary.anomalies_by_severity.entry(anomaly.severity).or_default() += 1;
            *summary.anomalies_by_type.entry(anomaly.anomaly_type).or_default() += 1;
        }
        for cluster in &self.clusters {
            if cluster.noise {
                summary.noise_members += cluster.size;
            } else {
                summary.clustered_members += cluster.size;
            }
        }
        summary
    }

    /// Anomalies at or above `severity`
    pub fn anomalies_at_least(&self, severity: Severity) -> impl Iterator<Item = &Anomaly> {
        self.anomalies.iter().filter(move |a| a.severity >= severity)
    }
}

/// `mean(mean pattern confidence or 0, 0.8 | 0.5, 0.7 | 0.5)`
pub fn overall_confidence(patterns: &[Pattern], clusters: &[Cluster], anomalies: &[Anomaly]) -> f64 {
    let pattern_confidence = if patterns.is_empty() {
        0.0
    } else {
        patterns.iter().map(|p| p.confidence).sum::<f64>() / patterns.len() as f64
    };
    let cluster_confidence = if clusters.is_empty() {
        CLUSTER_CONFIDENCE.1
    } else {
        CLUSTER_CONFIDENCE.0
    };
    let anomaly_confidence = if anomalies.is_empty() {
        ANOMALY_CONFIDENCE.1
    } else {
        ANOMALY_CONFIDENCE.0
    };
    (pattern_confidence + cluster_confidence + anomaly_confidence) / 3.0
}

/// Reusable analyzer holding a validated configuration
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    config: PatternRecognitionConfig,
}

impl PatternAnalyzer {
    /// Create an analyzer; fails on invalid configuration
    pub fn new(config: PatternRecognitionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PatternRecognitionConfig {
        &self.config
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Run the full pipeline over `records`
    pub fn analyze(&self, records: &[Record]) -> Result<PatternRecognitionResult> {
        let start = Instant::now();
        let config = &self.config;
        info!("🔍 Analyzing {} records", records.len());

        let now = config.reference_time.unwrap_or_else(Utc::now);
        let mut rng = self.rng();

        // 1. Feature extraction and normalization
        let vectors = extract_features_at(records, now);
        let normalized = try_normalize_features(&vectors)?;

        // 2. Clustering
        let clusters = if config.enable_clustering {
            self.cluster(&normalized, &mut rng)
        } else {
            Vec::new()
        };

        // 3. Anomaly detection, rule anomalies always appended
        let anomalies = if config.enable_anomaly_detection {
            let mut found = self.detect(&normalized, &mut rng);
            found.extend(pattern_anomalies(records, &config.rules));
            apply_nan_policy(found, config.nan_policy)
        } else {
            Vec::new()
        };

        // 4. Pattern discovery
        let patterns = discover_patterns(records, &config.discovery);

        // 5. Correlation
        let correlations = if config.enable_correlation {
            analyze_correlations(records, &config.correlation, now)
        } else {
            Vec::new()
        };

        let confidence = overall_confidence(&patterns, &clusters, &anomalies);
        let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        info!(
            clusters = clusters.len(),
            anomalies = anomalies.len(),
            patterns = patterns.len(),
            correlations = correlations.len(),
            "✅ Analysis finished in {:.2}ms (confidence {:.2})",
            processing_time_ms,
            confidence
        );

        Ok(PatternRecognitionResult {
            patterns,
            clusters,
            anomalies,
            correlations,
            confidence,
            processing_time_ms,
        })
    }

    /// Extract and normalize features for `records`
    pub fn prepare(&self, records: &[Record]) -> Result<Vec<FeatureVector>> {
        let now = self.config.reference_time.unwrap_or_else(Utc::now);
        try_normalize_features(&extract_features_at(records, now))
    }

    /// Clustering stage over raw records
    pub fn cluster_records(&self, records: &[Record]) -> Result<Vec<Cluster>> {
        let vectors = self.prepare(records)?;
        Ok(self.cluster(&vectors, &mut self.rng()))
    }

    /// Anomaly stage over raw records, rule anomalies included
    pub fn detect_records(&self, records: &[Record]) -> Result<Vec<Anomaly>> {
        let vectors = self.prepare(records)?;
        let mut found = self.detect(&vectors, &mut self.rng());
        found.extend(pattern_anomalies(records, &self.config.rules));
        Ok(apply_nan_policy(found, self.config.nan_policy))
    }

    /// Clustering stage only, on already normalized vectors
    pub fn cluster(&self, vectors: &[FeatureVector], rng: &mut StdRng) -> Vec<Cluster> {
        let config = &self.config;
        debug!(algorithm = ?config.cluster_algorithm, "clustering {} vectors", vectors.len());
        match config.cluster_algorithm {
            ClusterAlgorithm::KMeans => kmeans_clustering(vectors, &config.kmeans, rng),
            ClusterAlgorithm::Dbscan => dbscan_clustering(vectors, &config.dbscan),
            ClusterAlgorithm::Hierarchical => hierarchical_clustering(vectors, &config.hierarchical),
        }
    }

    /// Selected detector only, on already normalized vectors
    pub fn detect(&self, vectors: &[FeatureVector], rng: &mut StdRng) -> Vec<Anomaly> {
        let config = &self.config;
        debug!(algorithm = ?config.anomaly_algorithm, "detecting anomalies in {} vectors", vectors.len());
        match config.anomaly_algorithm {
            AnomalyAlgorithm::IsolationForest => isolation_forest(vectors, &config.isolation_forest, rng),
            AnomalyAlgorithm::Lof => local_outlier_factor(vectors, &config.lof),
            AnomalyAlgorithm::Statistical => statistical_outliers(vectors, &config.statistical),
        }
    }
}

/// Analyze `records` with `config`
pub fn analyze_patterns(records: &[Record], config: &PatternRecognitionConfig) -> Result<PatternRecognitionResult> {
    PatternAnalyzer::new(config.clone())?.analyze(records)
}
