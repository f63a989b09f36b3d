// =============================================================================
// Descriptive Statistics
// =============================================================================
//
// SMA, linearly-weighted "EMA", population standard deviation and z-score
// over a comparison series.  Every function returns `Option<T>` so callers
// handle empty input and degenerate (zero-variance) series explicitly.
//
// The EMA here is not an exponential decay.  Weights are spaced linearly from
// 1.0 down to 0.0 across the series in generation order:
//
//   w_i = 1 - i / (n - 1)          (w = [1.0] when n == 1)
//   EMA = sum(w_i * x_i) / sum(w_i)
// =============================================================================

/// Arithmetic mean. `None` for an empty series.
pub fn sma(series: &[f64]) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    let mean = series.iter().sum::<f64>() / series.len() as f64;
    mean.is_finite().then_some(mean)
}

/// Weights spaced linearly from 1.0 to 0.0 over `n` points.
pub fn linear_decay_weights(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let last = (n - 1) as f64;
            (0..n).map(|i| 1.0 - i as f64 / last).collect()
        }
    }
}

/// Weighted average using [`linear_decay_weights`]; the first sample gets the
/// highest weight.
pub fn linear_weighted_ema(series: &[f64]) -> Option<f64> {
    let weights = linear_decay_weights(series.len());
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let weighted: f64 = series.iter().zip(&weights).map(|(x, w)| x * w).sum();
    let ema = weighted / total;
    ema.is_finite().then_some(ema)
}

/// Population standard deviation (divides by `n`).
pub fn population_std_dev(series: &[f64]) -> Option<f64> {
    let mean = sma(series)?;
    let variance =
        series.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / series.len() as f64;
    let std_dev = variance.sqrt();
    std_dev.is_finite().then_some(std_dev)
}

/// `(value - mean) / std_dev`, or `None` when `std_dev` is not positive.
///
/// Also `None` for a positive but tiny `std_dev` whose quotient
/// overflows: an infinite z-score cannot be serialised as JSON.
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> Option<f64> {
    if std_dev <= 0.0 {
        return None;
    }
    let z = (value - mean) / std_dev;
    z.is_finite().then_some(z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_empty_input() {
        assert!(sma(&[]).is_none());
    }

    #[test]
    fn sma_known_value() {
        assert!((sma(&[2.0, 4.0, 6.0]).unwrap() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn weights_span_one_to_zero() {
        let w = linear_decay_weights(5);
        assert_eq!(w.len(), 5);
        assert!((w[0] - 1.0).abs() < 1e-12);
        assert!((w[2] - 0.5).abs() < 1e-12);
        assert!(w[4].abs() < 1e-12);
        assert_eq!(linear_decay_weights(1), vec![1.0]);
        assert!(linear_decay_weights(0).is_empty());
    }

    #[test]
    fn ema_biases_toward_first_sample() {
        // weights [1, 0.5, 0] => (1*1 + 0.5*2) / 1.5
        let ema = linear_weighted_ema(&[1.0, 2.0, 3.0]).unwrap();
        assert!((ema - 2.0 / 1.5).abs() < 1e-10, "got {ema}");
        assert!(ema < sma(&[1.0, 2.0, 3.0]).unwrap());
    }

    #[test]
    fn ema_single_point_and_empty() {
        assert!((linear_weighted_ema(&[7.0]).unwrap() - 7.0).abs() < 1e-10);
        assert!(linear_weighted_ema(&[]).is_none());
    }

    #[test]
    fn std_dev_is_population() {
        // mean 5, squared deviations sum to 32, n = 8 => variance 4
        let series = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std_dev(&series).unwrap() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn std_dev_flat_series_is_zero() {
        assert_eq!(population_std_dev(&[100.0; 20]), Some(0.0));
    }

    #[test]
    fn z_score_guards_zero_std_dev() {
        assert!(z_score(10.0, 10.0, 0.0).is_none());
        assert!((z_score(12.0, 10.0, 1.0).unwrap() - 2.0).abs() < 1e-10);
        assert!((z_score(8.0, 10.0, 2.0).unwrap() + 1.0).abs() < 1e-10);
    }

    #[test]
    fn z_score_overflow_is_none() {
        assert!(z_score(1e300, 0.0, 1e-300).is_none());
        assert!(z_score(-1e300, 0.0, f64::MIN_POSITIVE).is_none());
        assert!((z_score(1.0, 0.0, 1e-300).unwrap() - 1e300).abs() < 1e290);
    }

    #[test]
    fn handles_nan_input() {
        assert!(sma(&[1.0, f64::NAN]).is_none());
        assert!(population_std_dev(&[1.0, f64::NAN]).is_none());
    }
}
