//! Numeric helpers shared by the detection and root-cause services.

/// Arithmetic mean. Returns `None` for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n-1 denominator). Returns `None` when fewer
/// than two values are present.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Population standard deviation (n denominator). Used for the log-domain
/// standardization path where records are the full account population.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Median via the same interpolation rule as [`percentile`].
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Percentile with linear interpolation between ranks:
/// `k = (n-1) * p / 100`, result interpolated between `floor(k)` and
/// `ceil(k)`. Input order does not matter; values are sorted internally.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let k = (sorted.len() - 1) as f64 * p / 100.0;
    let f = k.floor() as usize;
    let c = k.ceil() as usize;
    if f == c {
        return Some(sorted[f]);
    }
    Some(sorted[f] + (k - f as f64) * (sorted[c] - sorted[f]))
}

/// Round to two decimal places (reported averages).
#[inline]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Round to four decimal places (standardized scores).
#[inline]
pub fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        let std = sample_std(&values).unwrap();
        assert!((std - 2.138).abs() < 0.001);
        let pop = population_std(&values).unwrap();
        assert!((pop - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), None);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        // k = 3 * 0.25 = 0.75 -> 1.0 + 0.75 * (2.0 - 1.0)
        assert_eq!(percentile(&values, 25.0), Some(1.75));
        assert_eq!(percentile(&values, 50.0), Some(2.5));
        assert_eq!(percentile(&values, 75.0), Some(3.25));
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(4.0));
    }

    #[test]
    fn test_percentile_order_independent() {
        let a = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        let b = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&a, 25.0), percentile(&b, 25.0));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round4(0.123456), 0.1235);
    }
}
