//! Isolation forest
//!
//! Points that random axis-aligned splits isolate quickly (short paths) are
//! anomalous. Score is `2^(-E[h(x)] / c(ψ))`, so it lies in (0, 1] and values
//! well above 0.5 indicate isolation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{feature_map, Anomaly, AnomalyType, Severity};
use crate::features::{feature_slices, FeatureVector};
use crate::math::cmp_f64;

const EULER_GAMMA: f64 = 0.5772156649;

/// Isolation forest parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationForestParams {
    pub num_trees: usize,
    /// Upper bound on the per-tree sample size ψ
    pub max_samples: usize,
    /// Expected outlier share, in (0, 0.5]
    pub contamination: f64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            num_trees: 100,
            max_samples: 256,
            contamination: 0.1,
        }
    }
}

enum IsolationNode {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
}

impl IsolationNode {
    fn build<R: Rng + ?Sized>(data: &[&[f64]], depth: usize, height_limit: usize, rng: &mut R) -> Self {
        if depth >= height_limit || data.len() <= 1 {
            return Self::Leaf { size: data.len() };
        }

        let num_features = data[0].len();
        if num_features == 0 {
            return Self::Leaf { size: data.len() };
        }

        let feature = rng.gen_range(0..num_features);
        let (min, max) = data
            .iter()
            .filter_map(|p| p.get(feature).copied())
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

        if min >= max {
            return Self::Leaf { size: data.len() };
        }

        let value = min + rng.gen::<f64>() * (max - min);
        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) = data
            .iter()
            .copied()
            .partition(|p| p.get(feature).map(|&x| x < value).unwrap_or(false));

        Self::Split {
            feature,
            value,
            left: Box::new(Self::build(&left, depth + 1, height_limit, rng)),
            right: Box::new(Self::build(&right, depth + 1, height_limit, rng)),
        }
    }

    fn path_length(&self, point: &[f64], depth: usize) -> f64 {
        match self {
            Self::Leaf { size } => depth as f64 + average_path_length(*size),
            Self::Split {
                feature,
                value,
                left,
                right,
            } => {
                let x = point.get(*feature).copied().unwrap_or(0.0);
                if x < *value {
                    left.path_length(point, depth + 1)
                } else {
                    right.path_length(point, depth + 1)
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `m` points
pub fn average_path_length(m: usize) -> f64 {
    match m {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let m = m as f64;
            2.0 * ((m - 1.0).ln() + EULER_GAMMA) - 2.0 * (m - 1.0) / m
        }
    }
}

/// Anomaly score of every vector, in input order.
///
/// Empty when fewer than two vectors are given.
pub fn isolation_scores<R>(vectors: &[FeatureVector], params: &IsolationForestParams, rng: &mut R) -> Vec<f64>
where
    R: Rng + ?Sized,
{
    let n = vectors.len();
    if n < 2 || params.num_trees == 0 {
        return Vec::new();
    }

    let points = feature_slices(vectors);
    let sample_size = params.max_samples.clamp(2, n);
    let height_limit = (sample_size as f64).log2().ceil() as usize;

    let trees: Vec<IsolationNode> = (0..params.num_trees)
        .map(|_| {
            let sample: Vec<&[f64]> = (0..sample_size).map(|_| points[rng.gen_range(0..n)]).collect();
            IsolationNode::build(&sample, 0, height_limit, rng)
        })
        .collect();

    let normalizer = average_path_length(sample_size);
    points
        .iter()
        .map(|p| {
            let avg = trees.iter().map(|t| t.path_length(p, 0)).sum::<f64>() / trees.len() as f64;
            2f64.powf(-avg / normalizer)
        })
        .collect()
}

/// Flag the highest-scoring `contamination` share of vectors.
///
/// The threshold is the score at descending rank `floor(n * contamination)`;
/// only scores strictly above it are flagged.
pub fn isolation_forest<R>(vectors: &[FeatureVector], params: &IsolationForestParams, rng: &mut R) -> Vec<Anomaly>
where
    R: Rng + ?Sized,
{
    let scores = isolation_scores(vectors, params, rng);
    if scores.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    if ranked.is_empty() {
        warn!("isolation forest produced no finite scores");
        return Vec::new();
    }
    ranked.sort_by(|a, b| cmp_f64(b, a));
    let rank = ((scores.len() as f64 * params.contamination).floor() as usize).min(ranked.len() - 1);
    let threshold = ranked[rank];
    debug!(threshold, trees = params.num_trees, "isolation forest threshold");

    vectors
        .iter()
        .zip(scores.iter())
        .enumerate()
        .filter(|(_, (_, &score))| score > threshold)
        .map(|(i, (v, &score))| {
            let ratio = score / threshold;
            Anomaly::new(
                format!("iforest_{}", i),
                v.address.clone(),
                AnomalyType::IsolationForest,
                Severity::from_ratio(ratio),
                score,
                format!(
                    "Isolation score {:.3} exceeds threshold {:.3} ({:.2}x)",
                    score, threshold, ratio
                ),
            )
            .with_features(feature_map(v))
            .with_feature("threshold", threshold)
        })
        .collect()
}
