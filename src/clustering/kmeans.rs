//! k-means clustering

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{nearest_centroid, Cluster};
use crate::features::FeatureVector;
use crate::math::{centroid, euclidean_distance};

/// What happens to a centroid that lost all of its members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyClusterPolicy {
    /// Reset to the all-zero vector (never resampled)
    #[default]
    ZeroCentroid,
    /// Keep the centroid from the previous iteration
    KeepPrevious,
}

/// k-means parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansParams {
    /// Target number of clusters
    pub k: usize,
    /// Upper bound on update iterations
    pub max_iterations: usize,
    /// Convergence bound on the largest centroid shift
    pub tolerance: f64,
    pub empty_cluster: EmptyClusterPolicy,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            k: 5,
            max_iterations: 100,
            tolerance: 1e-4,
            empty_cluster: EmptyClusterPolicy::ZeroCentroid,
        }
    }
}

impl KMeansParams {
    pub fn with_k(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }
}

/// Partition vectors into at most `k` clusters.
///
/// Initial centroids are `min(k, n)` distinct input vectors drawn from `rng`.
/// Clusters left without members after the final assignment are dropped.
pub fn kmeans_clustering<R>(vectors: &[FeatureVector], params: &KMeansParams, rng: &mut R) -> Vec<Cluster>
where
    R: Rng + ?Sized,
{
    if vectors.is_empty() || params.k == 0 {
        return Vec::new();
    }

    let n = vectors.len();
    let dimension = vectors[0].dimension();
    let k = params.k.min(n);
    if k < params.k {
        warn!(requested = params.k, available = n, "k exceeds record count, clamping");
    }

    let mut centroids: Vec<Vec<f64>> = rand::seq::index::sample(rng, n, k)
        .into_iter()
        .map(|i| vectors[i].features.clone())
        .collect();

    let mut assignments = vec![0usize; n];
    for iteration in 0..params.max_iterations {
        for (slot, v) in assignments.iter_mut().zip(vectors.iter()) {
            *slot = nearest_centroid(&v.features, &centroids);
        }

        let updated: Vec<Vec<f64>> = (0..k)
            .map(|c| {
                let members: Vec<&[f64]> = vectors
                    .iter()
                    .zip(assignments.iter())
                    .filter(|(_, a)| **a == c)
                    .map(|(v, _)| v.features.as_slice())
                    .collect();

                if members.is_empty() {
                    match params.empty_cluster {
                        EmptyClusterPolicy::ZeroCentroid => vec![0.0; dimension],
                        EmptyClusterPolicy::KeepPrevious => centroids[c].clone(),
                    }
                } else {
                    centroid(members, dimension)
                }
            })
            .collect();

        let max_shift = centroids
            .iter()
            .zip(updated.iter())
            .map(|(old, new)| euclidean_distance(old, new))
            .fold(0.0, f64::max);
        centroids = updated;

        if max_shift < params.tolerance {
            debug!(iterations = iteration + 1, "k-means converged");
            break;
        }
    }

    // Final assignment against the settled centroids
    let mut groups: Vec<Vec<&FeatureVector>> = vec![Vec::new(); k];
    for v in vectors {
        groups[nearest_centroid(&v.features, &centroids)].push(v);
    }

    let clusters: Vec<Cluster> = groups
        .iter()
        .zip(centroids)
        .filter(|(members, _)| !members.is_empty())
        .enumerate()
        .map(|(i, (members, c))| Cluster::from_members(format!("kmeans_{}", i), c, members))
        .collect();

    debug!(clusters = clusters.len(), "k-means finished");
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn two_blobs() -> Vec<FeatureVector> {
        let mut vectors = Vec::new();
        for i in 0..5 {
            let jitter = i as f64 * 0.01;
            vectors.push(FeatureVector::new(format!("low_{}", i), vec![0.1 + jitter, 0.1]));
            vectors.push(FeatureVector::new(format!("high_{}", i), vec![0.9 - jitter, 0.9]));
        }
        vectors
    }

    #[test]
    fn test_kmeans_empty_input() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(kmeans_clustering(&[], &KMeansParams::with_k(5), &mut rng).is_empty());
    }

    #[test]
    fn test_kmeans_zero_k() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(kmeans_clustering(&two_blobs(), &KMeansParams::with_k(0), &mut rng).is_empty());
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let vectors = two_blobs();
        let mut rng = StdRng::seed_from_u64(42);
        let clusters = kmeans_clustering(&vectors, &KMeansParams::with_k(2), &mut rng);

        assert_eq!(clusters.len(), 2);
        for cluster in &clusters {
            assert_eq!(cluster.size, 5);
            let prefixes: HashSet<&str> = cluster
                .members
                .iter()
                .map(|m| m.split('_').next().unwrap())
                .collect();
            assert_eq!(prefixes.len(), 1, "blob members must not mix: {:?}", cluster.members);
            assert!(cluster.cohesion > 0.0 && cluster.cohesion <= 1.0);
        }
    }

    #[test]
    fn test_kmeans_membership_complete() {
        let vectors = two_blobs();
        let mut rng = StdRng::seed_from_u64(3);
        let clusters = kmeans_clustering(&vectors, &KMeansParams::with_k(4), &mut rng);

        let mut members: Vec<String> = clusters.iter().flat_map(|c| c.members.clone()).collect();
        members.sort();
        let mut expected: Vec<String> = vectors.iter().map(|v| v.address.clone()).collect();
        expected.sort();
        assert_eq!(members, expected);
    }

    #[test]
    fn test_kmeans_deterministic_with_seed() {
        let vectors = two_blobs();
        let a = kmeans_clustering(&vectors, &KMeansParams::with_k(3), &mut StdRng::seed_from_u64(11));
        let b = kmeans_clustering(&vectors, &KMeansParams::with_k(3), &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn test_kmeans_k_larger_than_input() {
        let vectors = vec![
            FeatureVector::new("a", vec![0.0]),
            FeatureVector::new("b", vec![1.0]),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let clusters = kmeans_clustering(&vectors, &KMeansParams::with_k(5), &mut rng);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.cohesion == 1.0));
    }
}
