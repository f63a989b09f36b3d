// =============================================================================
// Statistical Profiler
// =============================================================================
//
// Given an observation with a price and its comparison series, compute
//   sma      = mean(series)
//   ema      = linearly-weighted mean (first sample heaviest)
//   std_dev  = population standard deviation
//   z_score  = (price - sma) / std_dev, or None when std_dev == 0 or the
//              quotient overflows
//
// Calling the profiler for an observation without a price is a contract
// violation and is rejected before any computation happens.
// =============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::descriptive;
use super::sampler::SampleSource;
use crate::types::{Observation, StatisticalProfile};

fn default_sample_size() -> usize {
    20
}

fn default_band_pct() -> f64 {
    0.10
}

/// Shape of the synthesised comparison distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerSettings {
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Half-width of the uniform band as a fraction of price (0.10 = ±10%).
    #[serde(default = "default_band_pct")]
    pub band_pct: f64,
}

impl Default for ProfilerSettings {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            band_pct: default_band_pct(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("observation from {url} has no price; profiling is not defined")]
    MissingPrice { url: String },

    #[error("observation from {url} has non-positive price {price}")]
    NonPositivePrice { url: String, price: f64 },

    #[error("comparison series for {url} is empty")]
    EmptySeries { url: String },
}

/// Reject observations the profiler must never see.
fn checked_price(observation: &Observation) -> Result<f64, ProfileError> {
    match observation.price {
        None => Err(ProfileError::MissingPrice {
            url: observation.url.clone(),
        }),
        Some(price) if !(price.is_finite() && price > 0.0) => Err(ProfileError::NonPositivePrice {
            url: observation.url.clone(),
            price,
        }),
        Some(price) => Ok(price),
    }
}

/// Profile `observation` against an already drawn `series`.
pub fn profile_against(
    observation: &Observation,
    series: &[f64],
) -> Result<StatisticalProfile, ProfileError> {
    let price = checked_price(observation)?;
    let empty = || ProfileError::EmptySeries {
        url: observation.url.clone(),
    };

    let sma = descriptive::sma(series).ok_or_else(empty)?;
    let ema = descriptive::linear_weighted_ema(series).ok_or_else(empty)?;
    let std_dev = descriptive::population_std_dev(series).ok_or_else(empty)?;
    let z_score = descriptive::z_score(price, sma, std_dev);

    debug!(
        url = %observation.url,
        price,
        sma,
        std_dev,
        z_score = ?z_score,
        "observation profiled"
    );

    Ok(StatisticalProfile {
        sma,
        ema,
        std_dev,
        z_score,
    })
}

/// Draws the comparison series from a [`SampleSource`] and profiles.
pub struct StatisticalProfiler {
    settings: ProfilerSettings,
}

impl StatisticalProfiler {
    pub fn new(settings: ProfilerSettings) -> Self {
        Self { settings }
    }

    /// Draw the comparison series for `observation`. The price contract is
    /// checked first so a `None` price never reaches the source.
    pub fn draw_series(
        &self,
        observation: &Observation,
        source: &mut dyn SampleSource,
    ) -> Result<Vec<f64>, ProfileError> {
        let price = checked_price(observation)?;
        Ok(source.comparison_series(&observation.ticker, price, self.settings.sample_size))
    }

    pub fn profile(
        &self,
        observation: &Observation,
        source: &mut dyn SampleSource,
    ) -> Result<StatisticalProfile, ProfileError> {
        let series = self.draw_series(observation, source)?;
        profile_against(observation, &series)
    }
}

impl Default for StatisticalProfiler {
    fn default() -> Self {
        Self::new(ProfilerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::sampler::{FixedSeries, UniformBandSampler};
    use chrono::Utc;

    fn obs(price: Option<f64>) -> Observation {
        Observation {
            url: "https://example.com".into(),
            ticker: "MSFT".into(),
            price,
            captured_at: Utc::now(),
            source_digest: String::new(),
        }
    }

    /// Source that records whether it was asked for a series.
    struct Tripwire(bool);

    impl SampleSource for Tripwire {
        fn comparison_series(&mut self, _: &str, _: f64, size: usize) -> Vec<f64> {
            self.0 = true;
            vec![1.0; size]
        }
    }

    #[test]
    fn rejects_missing_price_without_sampling() {
        let mut trip = Tripwire(false);
        let err = StatisticalProfiler::default()
            .profile(&obs(None), &mut trip)
            .unwrap_err();
        assert!(matches!(err, ProfileError::MissingPrice { .. }));
        assert!(!trip.0, "source must not be consulted");
    }

    #[test]
    fn rejects_zero_price() {
        let err = profile_against(&obs(Some(0.0)), &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ProfileError::NonPositivePrice { .. }));
    }

    #[test]
    fn rejects_empty_series() {
        let err = profile_against(&obs(Some(10.0)), &[]).unwrap_err();
        assert!(matches!(err, ProfileError::EmptySeries { .. }));
    }

    #[test]
    fn constant_series_gives_null_z_score() {
        let mut src = FixedSeries::new(vec![50.0; 20]);
        let p = StatisticalProfiler::default()
            .profile(&obs(Some(55.0)), &mut src)
            .unwrap();
        assert_eq!(p.std_dev, 0.0);
        assert!(p.z_score.is_none());
        assert!((p.sma - 50.0).abs() < 1e-10);
    }

    #[test]
    fn known_series_profile() {
        // Alternating 99 / 101: mean 100, population std-dev 1.
        let series: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 99.0 } else { 101.0 }).collect();
        let p = profile_against(&obs(Some(100.5)), &series).unwrap();
        assert!((p.sma - 100.0).abs() < 1e-10);
        assert!((p.std_dev - 1.0).abs() < 1e-10);
        assert!((p.z_score.unwrap() - 0.5).abs() < 1e-10);
        // The heaviest weight sits on a 99, so the EMA leans below the mean.
        assert!(p.ema < p.sma);
    }

    #[test]
    fn seeded_profile_is_deterministic() {
        let profiler = StatisticalProfiler::default();
        let o = obs(Some(123.45));
        let a = profiler
            .profile(&o, &mut UniformBandSampler::new(0.10, Some(2024)))
            .unwrap();
        let b = profiler
            .profile(&o, &mut UniformBandSampler::new(0.10, Some(2024)))
            .unwrap();
        assert_eq!(a, b);
        assert!(a.sma > 123.45 * 0.9 && a.sma < 123.45 * 1.1);
        assert!(a.std_dev > 0.0);
        assert!(a.z_score.is_some());
    }
}
