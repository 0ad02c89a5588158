//! Clustering engine
//!
//! Three interchangeable algorithms share one output shape:
//! - k-means (seedable random initialization)
//! - DBSCAN (density reachability, explicit noise policy)
//! - agglomerative hierarchical clustering (centroid linkage)

pub mod dbscan;
pub mod hierarchical;
pub mod kmeans;

pub use dbscan::{dbscan_clustering, DbscanParams, NoiseHandling};
pub use hierarchical::{hierarchical_clustering, HierarchicalParams};
pub use kmeans::{kmeans_clustering, EmptyClusterPolicy, KMeansParams};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;
use crate::math::euclidean_distance;

/// Selectable clustering algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterAlgorithm {
    #[serde(rename = "kmeans")]
    KMeans,
    Dbscan,
    Hierarchical,
}

impl std::str::FromStr for ClusterAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmeans" | "k-means" | "k_means" => Ok(Self::KMeans),
            "dbscan" => Ok(Self::Dbscan),
            "hierarchical" | "agglomerative" => Ok(Self::Hierarchical),
            other => Err(format!("unknown cluster algorithm '{}'", other)),
        }
    }
}

/// Aggregate statistics over a cluster's source records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterFeatures {
    pub avg_balance: f64,
    pub avg_transactions: f64,
    pub avg_age_days: f64,
}

/// A group of feature vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    /// Per-dimension mean of the members
    pub centroid: Vec<f64>,
    /// Member addresses
    pub members: Vec<String>,
    /// Always `members.len()`
    pub size: usize,
    /// `1 / (1 + mean member distance to centroid)`, in (0, 1]
    pub cohesion: f64,
    pub features: ClusterFeatures,
    /// Set only on the DBSCAN noise bucket
    #[serde(default)]
    pub noise: bool,
}

impl Cluster {
    /// Build a cluster from its member vectors and centroid
    pub(crate) fn from_members(id: String, centroid: Vec<f64>, members: &[&FeatureVector]) -> Self {
        let cohesion = cohesion(&centroid, members);
        Self {
            id,
            members: members.iter().map(|m| m.address.clone()).collect(),
            size: members.len(),
            cohesion,
            features: aggregate_features(members),
            centroid,
            noise: false,
        }
    }
}

/// `1 / (1 + average distance to centroid)`; 1 for an empty member list
pub fn cohesion(centroid: &[f64], members: &[&FeatureVector]) -> f64 {
    if members.is_empty() {
        return 1.0;
    }
    let avg = members
        .iter()
        .map(|m| euclidean_distance(&m.features, centroid))
        .sum::<f64>()
        / members.len() as f64;
    1.0 / (1.0 + avg)
}

fn aggregate_features(members: &[&FeatureVector]) -> ClusterFeatures {
    if members.is_empty() {
        return ClusterFeatures::default();
    }
    let n = members.len() as f64;
    // Ages follow the time the features were extracted at
    let now = members
        .iter()
        .find_map(|m| m.reference_time)
        .unwrap_or_else(Utc::now);

    let avg_balance = members
        .iter()
        .map(|m| m.metadata.balance.unwrap_or(0.0))
        .sum::<f64>()
        / n;
    let avg_transactions = members
        .iter()
        .map(|m| m.metadata.transactions.unwrap_or(0.0))
        .sum::<f64>()
        / n;
    let avg_age_days = members
        .iter()
        .map(|m| m.metadata.age_days(now).unwrap_or(0.0))
        .sum::<f64>()
        / n;

    ClusterFeatures {
        avg_balance,
        avg_transactions,
        avg_age_days,
    }
}

/// Index of the closest centroid (lowest index wins ties)
pub(crate) fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = euclidean_distance(point, c);
        if d < best_distance {
            best_distance = d;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Record;

    #[test]
    fn test_cohesion_bounds() {
        let a = FeatureVector::new("a", vec![0.0, 0.0]);
        let b = FeatureVector::new("b", vec![2.0, 0.0]);
        let c = cohesion(&[1.0, 0.0], &[&a, &b]);
        assert!((c - 0.5).abs() < 1e-12);
        assert_eq!(cohesion(&[1.0, 0.0], &[]), 1.0);
    }

    #[test]
    fn test_from_members_aggregates() {
        let mut a = FeatureVector::new("a", vec![0.0]);
        a.metadata = Record::new("a").with_balance(2.0).with_transactions(10.0);
        let mut b = FeatureVector::new("b", vec![0.0]);
        b.metadata = Record::new("b").with_balance(4.0);

        let cluster = Cluster::from_members("kmeans_0".to_string(), vec![0.0], &[&a, &b]);
        assert_eq!(cluster.size, 2);
        assert_eq!(cluster.members, vec!["a", "b"]);
        assert_eq!(cluster.cohesion, 1.0);
        assert_eq!(cluster.features.avg_balance, 3.0);
        assert_eq!(cluster.features.avg_transactions, 5.0);
        assert_eq!(cluster.features.avg_age_days, 0.0);
        assert!(!cluster.noise);
    }

    #[test]
    fn test_ages_use_extraction_reference_time() {
        use crate::features::extract_features_at;
        use chrono::{Duration, TimeZone};

        let reference = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let records = vec![
            Record::new("a").with_first_seen(reference - Duration::days(10)),
            Record::new("b").with_first_seen(reference - Duration::days(30)),
        ];
        let vectors = extract_features_at(&records, reference);
        let members: Vec<&FeatureVector> = vectors.iter().collect();

        let cluster = Cluster::from_members("kmeans_0".to_string(), vec![0.0; 5], &members);
        assert_eq!(cluster.features.avg_age_days, 20.0);
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("k-means".parse::<ClusterAlgorithm>(), Ok(ClusterAlgorithm::KMeans));
        assert_eq!("DBSCAN".parse::<ClusterAlgorithm>(), Ok(ClusterAlgorithm::Dbscan));
        assert!("spectral".parse::<ClusterAlgorithm>().is_err());
    }
}
