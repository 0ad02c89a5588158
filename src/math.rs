//! Small numeric helpers shared by the clustering, anomaly and correlation code

/// Euclidean distance between two points.
///
/// Extra trailing dimensions of the longer slice are ignored.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 for an empty slice
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Index-based quantile over an already sorted slice: `sorted[floor(n * q)]`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64 * q).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// Per-dimension mean of a set of points; `dimension` zeros when empty.
pub fn centroid<'a, I>(points: I, dimension: usize) -> Vec<f64>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut sum = vec![0.0; dimension];
    let mut count = 0usize;
    for point in points {
        for (acc, v) in sum.iter_mut().zip(point.iter()) {
            *acc += v;
        }
        count += 1;
    }
    if count > 0 {
        for v in &mut sum {
            *v /= count as f64;
        }
    }
    sum
}

/// Sort comparator for floats that keeps NaN last
pub fn cmp_f64(a: &f64, b: &f64) -> std::cmp::Ordering {
    a.partial_cmp(b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert_eq!(std_dev(&values), 2.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
    }

    #[test]
    fn test_quantile_sorted() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&sorted, 0.25), Some(2.0));
        assert_eq!(quantile_sorted(&sorted, 0.75), Some(4.0));
        assert_eq!(quantile_sorted(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn test_centroid() {
        let a = [0.0, 2.0];
        let b = [2.0, 4.0];
        let c = centroid([&a[..], &b[..]], 2);
        assert_eq!(c, vec![1.0, 3.0]);

        let empty: Vec<&[f64]> = Vec::new();
        assert_eq!(centroid(empty, 3), vec![0.0; 3]);
    }

    #[test]
    fn test_cmp_f64_nan_last() {
        let mut values = vec![f64::NAN, 3.0, 1.0];
        values.sort_by(cmp_f64);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], 3.0);
        assert!(values[2].is_nan());
    }
}
