//! Per-dimension statistical outliers (z-score and IQR fences)

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{dimension_name, Anomaly, AnomalyType, Severity};
use crate::features::FeatureVector;
use crate::math::{cmp_f64, mean, quantile_sorted, std_dev};

/// Outlier test applied per dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticalMethod {
    /// `|x - mean| / std > z_threshold`
    #[default]
    ZScore,
    /// `x` outside `[Q1 - m·IQR, Q3 + m·IQR]`
    Iqr,
}

/// Statistical detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticalParams {
    pub method: StatisticalMethod,
    pub z_threshold: f64,
    pub iqr_multiplier: f64,
}

impl Default for StatisticalParams {
    fn default() -> Self {
        Self {
            method: StatisticalMethod::ZScore,
            z_threshold: 3.0,
            iqr_multiplier: 3.0,
        }
    }
}

/// Severity for a z-score, non-decreasing in `|z|`
pub fn z_score_severity(z: f64, threshold: f64) -> Severity {
    Severity::from_ratio(z.abs() / threshold)
}

/// Deviation of one value in one dimension
struct Violation {
    dimension: usize,
    value: f64,
    /// |z| for z-score, distance past the fence in IQR units for IQR
    deviation: f64,
}

/// Flag records with at least one outlying dimension.
///
/// Each flagged record yields one anomaly describing its worst dimension and
/// the number of dimensions in violation. Dimensions without spread (std or
/// IQR of 0) are skipped.
pub fn statistical_outliers(vectors: &[FeatureVector], params: &StatisticalParams) -> Vec<Anomaly> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dimension = first.dimension();

    let mut violations: Vec<Vec<Violation>> = (0..vectors.len()).map(|_| Vec::new()).collect();
    for d in 0..dimension {
        let column: Vec<f64> = vectors
            .iter()
            .map(|v| v.features.get(d).copied().unwrap_or(0.0))
            .collect();

        match params.method {
            StatisticalMethod::ZScore => {
                let m = mean(&column);
                let s = std_dev(&column);
                if s == 0.0 || !s.is_finite() {
                    debug!(dimension = d, "skipping dimension without spread");
                    continue;
                }
                for (i, &value) in column.iter().enumerate() {
                    let z = (value - m) / s;
                    if z.abs() > params.z_threshold {
                        violations[i].push(Violation {
                            dimension: d,
                            value,
                            deviation: z.abs(),
                        });
                    }
                }
            }
            StatisticalMethod::Iqr => {
                let mut sorted = column.clone();
                sorted.sort_by(cmp_f64);
                let (Some(q1), Some(q3)) = (quantile_sorted(&sorted, 0.25), quantile_sorted(&sorted, 0.75))
                else {
                    continue;
                };
                let iqr = q3 - q1;
                if iqr == 0.0 || !iqr.is_finite() {
                    debug!(dimension = d, "skipping dimension with zero IQR");
                    continue;
                }
                let lower = q1 - params.iqr_multiplier * iqr;
                let upper = q3 + params.iqr_multiplier * iqr;
                for (i, &value) in column.iter().enumerate() {
                    let beyond = if value < lower {
                        lower - value
                    } else if value > upper {
                        value - upper
                    } else {
                        continue;
                    };
                    violations[i].push(Violation {
                        dimension: d,
                        value,
                        deviation: beyond / iqr,
                    });
                }
            }
        }
    }

    vectors
        .iter()
        .zip(violations)
        .enumerate()
        .filter_map(|(i, (v, found))| {
            let worst = found
                .iter()
                .max_by(|a, b| cmp_f64(&a.deviation, &b.deviation))?;
            let name = dimension_name(worst.dimension, dimension);

            let (severity, description) = match params.method {
                StatisticalMethod::ZScore => (
                    z_score_severity(worst.deviation, params.z_threshold),
                    format!(
                        "{} z-score {:.2} exceeds {:.1} ({} dimension(s) in violation)",
                        name,
                        worst.deviation,
                        params.z_threshold,
                        found.len()
                    ),
                ),
                StatisticalMethod::Iqr => (
                    Severity::Medium,
                    format!(
                        "{} lies {:.2} IQR outside the fence ({} dimension(s) in violation)",
                        name,
                        worst.deviation,
                        found.len()
                    ),
                ),
            };

            Some(
                Anomaly::new(
                    format!("stat_{}", i),
                    v.address.clone(),
                    AnomalyType::StatisticalOutlier,
                    severity,
                    worst.deviation,
                    description,
                )
                .with_feature(name, worst.value)
                .with_feature("violations", found.len() as f64),
            )
        })
        .collect()
}
