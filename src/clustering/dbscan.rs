//! DBSCAN density clustering

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use super::Cluster;
use crate::features::{feature_slices, FeatureVector};
use crate::math::{centroid, euclidean_distance};

/// What to do with points that belong to no dense region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseHandling {
    /// Noise points appear in no cluster
    #[default]
    Drop,
    /// Noise points are returned as one extra cluster flagged `noise`
    CollectSeparately,
}

/// DBSCAN parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbscanParams {
    /// Neighborhood radius
    pub epsilon: f64,
    /// Minimum neighborhood size (the point itself included) for a core point
    pub min_samples: usize,
    pub noise_handling: NoiseHandling,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            epsilon: 0.5,
            min_samples: 5,
            noise_handling: NoiseHandling::Drop,
        }
    }
}

/// Cluster by density reachability.
///
/// Core points (ε-neighborhood of at least `min_samples`, self included) seed
/// clusters and expand transitively; border points join the first cluster
/// that reaches them.
pub fn dbscan_clustering(vectors: &[FeatureVector], params: &DbscanParams) -> Vec<Cluster> {
    if vectors.is_empty() {
        return Vec::new();
    }

    let points = feature_slices(vectors);
    let n = points.len();
    let region_query = |i: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| euclidean_distance(points[i], points[j]) <= params.epsilon)
            .collect()
    };

    let mut visited = vec![false; n];
    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut next_cluster = 0usize;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let neighbors = region_query(i);
        if neighbors.len() < params.min_samples {
            continue;
        }

        let cluster_id = next_cluster;
        next_cluster += 1;
        labels[i] = Some(cluster_id);

        let mut queue: VecDeque<usize> = neighbors.into();
        while let Some(j) = queue.pop_front() {
            if !visited[j] {
                visited[j] = true;
                let expansion = region_query(j);
                if expansion.len() >= params.min_samples {
                    queue.extend(expansion);
                }
            }
            if labels[j].is_none() {
                labels[j] = Some(cluster_id);
            }
        }
    }

    let dimension = vectors[0].dimension();
    let mut clusters: Vec<Cluster> = (0..next_cluster)
        .map(|cid| {
            let members: Vec<&FeatureVector> = vectors
                .iter()
                .zip(labels.iter())
                .filter(|(_, label)| **label == Some(cid))
                .map(|(v, _)| v)
                .collect();
            let c = centroid(members.iter().map(|m| m.features.as_slice()), dimension);
            Cluster::from_members(format!("dbscan_{}", cid), c, &members)
        })
        .collect();

    let noise: Vec<&FeatureVector> = vectors
        .iter()
        .zip(labels.iter())
        .filter(|(_, label)| label.is_none())
        .map(|(v, _)| v)
        .collect();

    debug!(
        clusters = clusters.len(),
        noise = noise.len(),
        epsilon = params.epsilon,
        min_samples = params.min_samples,
        "DBSCAN finished"
    );

    if params.noise_handling == NoiseHandling::CollectSeparately && !noise.is_empty() {
        let c = centroid(noise.iter().map(|m| m.features.as_slice()), dimension);
        let mut bucket = Cluster::from_members("dbscan_noise".to_string(), c, &noise);
        bucket.noise = true;
        clusters.push(bucket);
    }

    clusters
}
