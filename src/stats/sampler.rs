// =============================================================================
// Comparison Series Sources
// =============================================================================
//
// The profiler judges a price against a "typical recent trading range".
// Where that range comes from is a seam: the default source draws uniformly
// from a band around the observed price, tests inject a seeded generator or a
// fixed series, and a historical-price feed can slot in without touching the
// profiler math.
// =============================================================================

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Supplies the comparison series for one observation.
pub trait SampleSource: Send {
    /// Return `size` comparison prices for `ticker` observed at `price`.
    fn comparison_series(&mut self, ticker: &str, price: f64, size: usize) -> Vec<f64>;
}

/// Uniform draws from `[price * (1 - band), price * (1 + band)]`.
pub struct UniformBandSampler {
    rng: Pcg64,
    band_pct: f64,
}

impl UniformBandSampler {
    /// `seed == None` seeds from OS entropy; `Some(s)` gives reproducible
    /// draws.
    pub fn new(band_pct: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => Pcg64::seed_from_u64(s),
            None => Pcg64::from_entropy(),
        };
        Self {
            rng,
            band_pct: band_pct.abs(),
        }
    }
}

impl SampleSource for UniformBandSampler {
    fn comparison_series(&mut self, _ticker: &str, price: f64, size: usize) -> Vec<f64> {
        let low = price * (1.0 - self.band_pct);
        let high = price * (1.0 + self.band_pct);
        if !low.is_finite() || !high.is_finite() || low > high {
            return Vec::new();
        }
        (0..size).map(|_| self.rng.gen_range(low..=high)).collect()
    }
}

/// Replays a fixed series regardless of the observed price.
///
/// Used for deterministic tests and for feeding real closing prices.
#[derive(Debug, Clone)]
pub struct FixedSeries {
    series: Vec<f64>,
}

impl FixedSeries {
    pub fn new(series: Vec<f64>) -> Self {
        Self { series }
    }
}

impl SampleSource for FixedSeries {
    fn comparison_series(&mut self, _ticker: &str, _price: f64, size: usize) -> Vec<f64> {
        self.series.iter().copied().take(size).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_draws_stay_inside_band() {
        let mut s = UniformBandSampler::new(0.10, Some(7));
        let series = s.comparison_series("MSFT", 100.0, 500);
        assert_eq!(series.len(), 500);
        assert!(series.iter().all(|x| (90.0..=110.0).contains(x)));
    }

    #[test]
    fn same_seed_same_draws() {
        let mut a = UniformBandSampler::new(0.10, Some(42));
        let mut b = UniformBandSampler::new(0.10, Some(42));
        assert_eq!(
            a.comparison_series("X", 50.0, 20),
            b.comparison_series("X", 50.0, 20)
        );
    }

    #[test]
    fn zero_band_is_constant() {
        let mut s = UniformBandSampler::new(0.0, Some(1));
        let series = s.comparison_series("X", 10.0, 20);
        assert!(series.iter().all(|x| (*x - 10.0).abs() < 1e-12));
    }

    #[test]
    fn fixed_series_truncates_to_size() {
        let mut s = FixedSeries::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.comparison_series("X", 0.0, 2), vec![1.0, 2.0]);
        assert_eq!(s.comparison_series("X", 0.0, 10).len(), 3);
    }
}
