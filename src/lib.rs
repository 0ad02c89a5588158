#![allow(clippy::needless_range_loop)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::doc_lazy_continuation)]
// src/lib.rs

//! In-memory pattern recognition over address records: feature extraction,
//! clustering, anomaly detection, correlation and heuristic grouping.

pub mod analyzer;
pub mod anomaly;
pub mod cli;
pub mod clustering;
pub mod config;
pub mod correlation;
pub mod errors;
pub mod features;
pub mod math;
pub mod patterns;
pub mod records;

pub use analyzer::{analyze_patterns, AnalysisSummary, PatternAnalyzer, PatternRecognitionResult};
pub use anomaly::{
    isolation_forest, local_outlier_factor, pattern_anomalies, statistical_outliers, Anomaly, AnomalyAlgorithm,
    AnomalyType, NanPolicy, Severity,
};
pub use clustering::{dbscan_clustering, hierarchical_clustering, kmeans_clustering, Cluster, ClusterAlgorithm};
pub use config::PatternRecognitionConfig;
pub use correlation::{pearson_correlation, spearman_correlation, Correlation, Significance};
pub use errors::{PatternError, Result};
pub use features::{extract_features, normalize_features, FeatureVector};
pub use patterns::{discover_patterns, Pattern, PatternType};
pub use records::{load_records, Record};
