//! Agglomerative clustering with centroid linkage

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Cluster;
use crate::features::FeatureVector;
use crate::math::{centroid, euclidean_distance};

/// Hierarchical clustering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalParams {
    /// Number of clusters to stop merging at
    pub k: usize,
}

impl Default for HierarchicalParams {
    fn default() -> Self {
        Self { k: 5 }
    }
}

/// Merge singletons bottom-up until `min(k, n)` clusters remain.
///
/// Each step merges the pair whose centroids are closest; ties resolve to the
/// lowest `(i, j)` pair in current cluster order.
pub fn hierarchical_clustering(vectors: &[FeatureVector], params: &HierarchicalParams) -> Vec<Cluster> {
    if vectors.is_empty() || params.k == 0 {
        return Vec::new();
    }

    let dimension = vectors[0].dimension();
    let target = params.k.min(vectors.len());

    let mut groups: Vec<Vec<usize>> = (0..vectors.len()).map(|i| vec![i]).collect();
    let mut centroids: Vec<Vec<f64>> = vectors.iter().map(|v| v.features.clone()).collect();
    let mut merges = 0usize;

    while groups.len() > target {
        let mut best = (0, 1);
        let mut best_distance = f64::INFINITY;
        for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                let d = euclidean_distance(&centroids[i], &centroids[j]);
                if d < best_distance {
                    best_distance = d;
                    best = (i, j);
                }
            }
        }

        let (keep, absorb) = best;
        let absorbed = groups.remove(absorb);
        centroids.remove(absorb);
        groups[keep].extend(absorbed);
        centroids[keep] = centroid(
            groups[keep].iter().map(|&idx| vectors[idx].features.as_slice()),
            dimension,
        );
        merges += 1;
    }

    debug!(merges, clusters = groups.len(), "hierarchical clustering finished");

    groups
        .iter()
        .zip(centroids)
        .enumerate()
        .map(|(i, (group, c))| {
            let members: Vec<&FeatureVector> = group.iter().map(|&idx| &vectors[idx]).collect();
            Cluster::from_members(format!("hierarchical_{}", i), c, &members)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(values: &[f64]) -> Vec<FeatureVector> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| FeatureVector::new(format!("p{}", i), vec![v]))
            .collect()
    }

    #[test]
    fn test_hierarchical_empty_and_zero_k() {
        assert!(hierarchical_clustering(&[], &HierarchicalParams::default()).is_empty());
        assert!(hierarchical_clustering(&points(&[1.0]), &HierarchicalParams { k: 0 }).is_empty());
    }

    #[test]
    fn test_hierarchical_merges_nearest() {
        let vectors = points(&[0.0, 0.1, 0.2, 5.0, 5.1]);
        let clusters = hierarchical_clustering(&vectors, &HierarchicalParams { k: 2 });

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].id, "hierarchical_0");
        assert_eq!(clusters[0].members, vec!["p0", "p1", "p2"]);
        assert_eq!(clusters[1].members, vec!["p3", "p4"]);
        assert!((clusters[1].centroid[0] - 5.05).abs() < 1e-12);
    }

    #[test]
    fn test_hierarchical_k_at_least_n_keeps_singletons() {
        let vectors = points(&[0.0, 1.0, 2.0]);
        let clusters = hierarchical_clustering(&vectors, &HierarchicalParams { k: 10 });
        assert_eq!(clusters.len(), 3);
        assert!(clusters.iter().all(|c| c.size == 1 && c.cohesion == 1.0));
    }

    #[test]
    fn test_hierarchical_tie_prefers_lowest_pair() {
        // p0-p1 and p1-p2 are equally close; p0 and p1 merge first
        let vectors = points(&[0.0, 1.0, 2.0]);
        let clusters = hierarchical_clustering(&vectors, &HierarchicalParams { k: 2 });
        assert_eq!(clusters[0].members, vec!["p0", "p1"]);
        assert_eq!(clusters[1].members, vec!["p2"]);
    }

    #[test]
    fn test_hierarchical_membership_complete() {
        let vectors = points(&[3.0, 0.5, 9.0, 1.5, 7.0, 2.0]);
        let clusters = hierarchical_clustering(&vectors, &HierarchicalParams { k: 3 });
        let total: usize = clusters.iter().map(|c| c.size).sum();
        assert_eq!(total, vectors.len());
    }
}
