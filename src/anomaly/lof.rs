//! Local outlier factor

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{feature_map, Anomaly, AnomalyType, Severity};
use crate::features::{feature_slices, FeatureVector};
use crate::math::{cmp_f64, euclidean_distance};

/// LOF parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LofParams {
    /// Neighborhood size, clamped to `n - 1`
    pub k: usize,
    /// LOF value above which a point is flagged
    pub threshold: f64,
}

impl Default for LofParams {
    fn default() -> Self {
        Self { k: 20, threshold: 1.5 }
    }
}

/// LOF value of every vector, in input order.
///
/// Empty when fewer than two vectors are given or `k` is zero.
pub fn lof_scores(vectors: &[FeatureVector], k: usize) -> Vec<f64> {
    let n = vectors.len();
    let k = k.min(n.saturating_sub(1));
    if n < 2 || k == 0 {
        return Vec::new();
    }

    let points = feature_slices(vectors);
    let distances: Vec<Vec<f64>> = points
        .iter()
        .map(|a| points.iter().map(|b| euclidean_distance(a, b)).collect())
        .collect();

    // k nearest neighbors per point, computed once
    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            let mut others: Vec<usize> = (0..n).filter(|&j| j != i).collect();
            others.sort_by(|&a, &b| cmp_f64(&distances[i][a], &distances[i][b]).then(a.cmp(&b)));
            others.truncate(k);
            others
        })
        .collect();

    let k_distance: Vec<f64> = (0..n)
        .map(|i| neighbors[i].last().map(|&o| distances[i][o]).unwrap_or(0.0))
        .collect();

    let lrd: Vec<f64> = (0..n)
        .map(|i| {
            let reach = neighbors[i]
                .iter()
                .map(|&o| distances[i][o].max(k_distance[o]))
                .sum::<f64>()
                / k as f64;
            1.0 / (reach + 1e-10)
        })
        .collect();

    (0..n)
        .map(|i| {
            let neighbor_lrd = neighbors[i].iter().map(|&o| lrd[o]).sum::<f64>() / k as f64;
            neighbor_lrd / lrd[i]
        })
        .collect()
}

/// Flag vectors whose LOF exceeds `params.threshold`
pub fn local_outlier_factor(vectors: &[FeatureVector], params: &LofParams) -> Vec<Anomaly> {
    let scores = lof_scores(vectors, params.k);
    if scores.is_empty() {
        return Vec::new();
    }
    debug!(
        k = params.k.min(vectors.len() - 1),
        threshold = params.threshold,
        "LOF scored {} vectors",
        scores.len()
    );

    vectors
        .iter()
        .zip(scores.iter())
        .enumerate()
        .filter(|(_, (_, &lof))| lof > params.threshold)
        .map(|(i, (v, &lof))| {
            let ratio = lof / params.threshold;
            Anomaly::new(
                format!("lof_{}", i),
                v.address.clone(),
                AnomalyType::LocalOutlier,
                Severity::from_ratio(ratio),
                lof,
                format!("Local outlier factor {:.3} exceeds {:.2}", lof, params.threshold),
            )
            .with_features(feature_map(v))
            .with_feature("lof", lof)
        })
        .collect()
}
