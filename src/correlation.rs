//! Correlation between record series
//!
//! Coefficients are descriptive. The p-value comes from the Student-t
//! distribution with `n - 2` degrees of freedom and assumes the usual
//! normality conditions, which address data rarely meets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::{debug, warn};

use crate::math::cmp_f64;
use crate::records::Record;

/// Record field a series is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesField {
    Balance,
    Transactions,
    AgeDays,
    ActivityRatio,
}

impl SeriesField {
    /// Field value for one record, if present
    pub fn value(&self, record: &Record, now: DateTime<Utc>) -> Option<f64> {
        match self {
            Self::Balance => record.balance,
            Self::Transactions => record.transactions,
            Self::AgeDays => record.age_days(now),
            Self::ActivityRatio => record.activity_ratio(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::Transactions => "transactions",
            Self::AgeDays => "age_days",
            Self::ActivityRatio => "activity_ratio",
        }
    }
}

impl std::str::FromStr for SeriesField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "balance" => Ok(Self::Balance),
            "transactions" | "tx" => Ok(Self::Transactions),
            "age" | "age_days" => Ok(Self::AgeDays),
            "activity" | "activity_ratio" => Ok(Self::ActivityRatio),
            other => Err(format!("unknown series field '{}'", other)),
        }
    }
}

/// Two fields to correlate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub first: SeriesField,
    pub second: SeriesField,
}

impl CorrelationPair {
    pub fn new(first: SeriesField, second: SeriesField) -> Self {
        Self { first, second }
    }
}

impl Default for CorrelationPair {
    fn default() -> Self {
        Self::new(SeriesField::Balance, SeriesField::Transactions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    /// Pearson over average ranks
    Spearman,
}

/// Strength class of |coefficient|
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    VeryStrong,
    Strong,
    Moderate,
    Weak,
    None,
}

impl Significance {
    pub fn from_coefficient(coefficient: f64) -> Self {
        let r = coefficient.abs();
        if r >= 0.8 {
            Self::VeryStrong
        } else if r >= 0.6 {
            Self::Strong
        } else if r >= 0.4 {
            Self::Moderate
        } else if r >= 0.2 {
            Self::Weak
        } else {
            Self::None
        }
    }
}

/// Correlation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationParams {
    pub pairs: Vec<CorrelationPair>,
    pub method: CorrelationMethod,
    /// Minimum number of usable record pairs
    pub min_samples: usize,
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self {
            pairs: vec![CorrelationPair::default()],
            method: CorrelationMethod::Pearson,
            min_samples: 11,
        }
    }
}

/// Correlation between two series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub dataset1: String,
    pub dataset2: String,
    /// In [-1, 1]
    pub coefficient: f64,
    pub p_value: f64,
    pub significance: Significance,
    pub method: CorrelationMethod,
    pub sample_size: usize,
}

/// Pearson correlation coefficient.
///
/// 0 with fewer than two values or a constant series. Extra values of the
/// longer series are ignored.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 || is_constant(&x[..n]) || is_constant(&y[..n]) {
        return 0.0;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let (dx, dy) = (a - mean_x, b - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    // Separate square roots keep dust-sized series from underflowing
    let denom = var_x.sqrt() * var_y.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        0.0
    } else {
        (cov / denom).clamp(-1.0, 1.0)
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Spearman rank correlation (ties get their average rank)
pub fn spearman_correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    pearson_correlation(&average_ranks(&x[..n]), &average_ranks(&y[..n]))
}

fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| cmp_f64(&values[a], &values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end share their mean
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Two-tailed p-value for `coefficient` over `n` samples
pub fn correlation_p_value(coefficient: f64, n: usize) -> f64 {
    if n < 3 || !coefficient.is_finite() {
        return 1.0;
    }
    let r2 = coefficient * coefficient;
    if r2 >= 1.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = (r2 * df / (1.0 - r2)).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t)).clamp(0.0, 1.0),
        Err(e) => {
            warn!(df, error = %e, "no t distribution for p-value");
            1.0
        }
    }
}

/// Correlate one field pair across records.
///
/// Only records where both fields are present and positive contribute.
/// `None` when fewer than `min_samples` pairs remain.
pub fn analyze_correlation(
    records: &[Record],
    pair: &CorrelationPair,
    method: CorrelationMethod,
    min_samples: usize,
    now: DateTime<Utc>,
) -> Option<Correlation> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = records
        .iter()
        .filter_map(|r| {
            let x = pair.first.value(r, now).filter(|v| *v > 0.0)?;
            let y = pair.second.value(r, now).filter(|v| *v > 0.0)?;
            Some((x, y))
        })
        .unzip();

    if xs.len() < min_samples.max(2) {
        debug!(
            usable = xs.len(),
            required = min_samples,
            "not enough samples for {} vs {}",
            pair.first.name(),
            pair.second.name()
        );
        return None;
    }

    let coefficient = match method {
        CorrelationMethod::Pearson => pearson_correlation(&xs, &ys),
        CorrelationMethod::Spearman => spearman_correlation(&xs, &ys),
    };

    Some(Correlation {
        dataset1: pair.first.name().to_string(),
        dataset2: pair.second.name().to_string(),
        coefficient,
        p_value: correlation_p_value(coefficient, xs.len()),
        significance: Significance::from_coefficient(coefficient),
        method,
        sample_size: xs.len(),
    })
}

/// Run every configured pair
pub fn analyze_correlations(records: &[Record], params: &CorrelationParams, now: DateTime<Utc>) -> Vec<Correlation> {
    params
        .pairs
        .iter()
        .filter_map(|pair| analyze_correlation(records, pair, params.method, params.min_samples, now))
        .collect()
}
