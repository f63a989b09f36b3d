// =============================================================================
// Statistical Rules — 4 fixed checks on an observation and its profile
// =============================================================================
//
// Rules (always evaluated and reported in this order):
//   1. NoUnrealisticJump   — |price - sma| / sma <= 0.20
//   2. ZScoreInRange       — z_score present and within [-3, 3]
//   3. WithinStdDevBand    — |price - sma| <= 4 * std_dev
//   4. NoExtremeDeviation  — |price - sma| <= 5 * std_dev
//
// Thresholds are inclusive: a value exactly on the boundary passes, with a
// few ulps of slack so rounding in `price - sma` cannot push a boundary
// price (e.g. `1.2 * sma`) over the limit.
// An observation without a profile fails all four by default; the rules are
// never evaluated against missing numbers.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{
    Observation, RuleOutcome, RuleVerdict, StatRule, StatisticalProfile, ValidationVerdict,
};

fn default_max_jump_pct() -> f64 {
    0.20
}

fn default_z_score_limit() -> f64 {
    3.0
}

fn default_std_dev_band() -> f64 {
    4.0
}

fn default_extreme_std_dev() -> f64 {
    5.0
}

/// Boundaries of the four statistical rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Largest allowed relative distance from the SMA (0.20 = 20%).
    #[serde(default = "default_max_jump_pct")]
    pub max_jump_pct: f64,

    /// Symmetric z-score bound.
    #[serde(default = "default_z_score_limit")]
    pub z_score_limit: f64,

    /// Std-dev multiple for the "3-4 sigma" band rule.
    #[serde(default = "default_std_dev_band")]
    pub std_dev_band: f64,

    /// Std-dev multiple beyond which a deviation is extreme.
    #[serde(default = "default_extreme_std_dev")]
    pub extreme_std_dev: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            max_jump_pct: default_max_jump_pct(),
            z_score_limit: default_z_score_limit(),
            std_dev_band: default_std_dev_band(),
            extreme_std_dev: default_extreme_std_dev(),
        }
    }
}

const INSUFFICIENT_DATA: &str = "insufficient data: no price to profile";

const BOUNDARY_ULPS: f64 = 8.0;

/// `value <= limit`, widened by [`BOUNDARY_ULPS`] at `magnitude`. NaN fails.
fn within(value: f64, limit: f64, magnitude: f64) -> bool {
    value <= limit + BOUNDARY_ULPS * f64::EPSILON * magnitude.abs()
}

/// Evaluate a single rule.
pub fn evaluate_rule(
    rule: StatRule,
    price: f64,
    profile: &StatisticalProfile,
    thresholds: &RuleThresholds,
) -> RuleVerdict {
    let deviation = (price - profile.sma).abs();
    let magnitude = price.abs().max(profile.sma.abs());

    let (pass, rationale) = match rule {
        StatRule::NoUnrealisticJump => {
            if profile.sma > 0.0 {
                let jump = deviation / profile.sma;
                (
                    within(deviation, thresholds.max_jump_pct * profile.sma, magnitude),
                    format!(
                        "{:.2}% from SMA (limit {:.0}%)",
                        jump * 100.0,
                        thresholds.max_jump_pct * 100.0
                    ),
                )
            } else {
                (false, "SMA is not positive".to_string())
            }
        }
        StatRule::ZScoreInRange => match profile.z_score {
            Some(z) => (
                within(z.abs(), thresholds.z_score_limit, thresholds.z_score_limit),
                format!("z-score {:.2} (limit ±{:.1})", z, thresholds.z_score_limit),
            ),
            None => (
                false,
                "z-score undefined: comparison series has no variability".to_string(),
            ),
        },
        StatRule::WithinStdDevBand => (
            within(deviation, thresholds.std_dev_band * profile.std_dev, magnitude),
            format!(
                "deviation {:.2} vs {:.1}σ = {:.2}",
                deviation,
                thresholds.std_dev_band,
                thresholds.std_dev_band * profile.std_dev
            ),
        ),
        StatRule::NoExtremeDeviation => (
            within(deviation, thresholds.extreme_std_dev * profile.std_dev, magnitude),
            format!(
                "deviation {:.2} vs {:.1}σ = {:.2}",
                deviation,
                thresholds.extreme_std_dev,
                thresholds.extreme_std_dev * profile.std_dev
            ),
        ),
    };

    RuleVerdict {
        rule,
        outcome: RuleOutcome::from_pass(pass),
        rationale: Some(rationale),
    }
}

/// Run the full battery for one observation.
///
/// `profile == None` (or an observation without a price) yields four
/// default failures.
pub fn validate(
    observation: &Observation,
    profile: Option<&StatisticalProfile>,
    thresholds: &RuleThresholds,
) -> ValidationVerdict {
    let rules = match (observation.profilable_price(), profile) {
        (Some(price), Some(profile)) => StatRule::ALL
            .iter()
            .map(|&rule| evaluate_rule(rule, price, profile, thresholds))
            .collect(),
        _ => StatRule::ALL
            .iter()
            .map(|&rule| RuleVerdict {
                rule,
                outcome: RuleOutcome::Fail,
                rationale: Some(INSUFFICIENT_DATA.to_string()),
            })
            .collect(),
    };

    let verdict = ValidationVerdict { rules };
    debug!(
        url = %observation.url,
        failed = verdict.failed_rules().count(),
        "statistical rules evaluated"
    );
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn profile(sma: f64, std_dev: f64, price: f64) -> StatisticalProfile {
        StatisticalProfile {
            sma,
            ema: sma,
            std_dev,
            z_score: if std_dev > 0.0 {
                Some((price - sma) / std_dev)
            } else {
                None
            },
        }
    }

    #[test]
    fn jump_boundary_is_inclusive() {
        let t = RuleThresholds::default();
        let at = evaluate_rule(StatRule::NoUnrealisticJump, 120.0, &profile(100.0, 10.0, 120.0), &t);
        assert_eq!(at.outcome, RuleOutcome::Pass);
        let over = evaluate_rule(StatRule::NoUnrealisticJump, 120.01, &profile(100.0, 10.0, 120.01), &t);
        assert_eq!(over.outcome, RuleOutcome::Fail);
    }

    const UNEVEN_SMAS: [f64; 6] = [123.45, 99.99, 410.12, 57.3, 0.7, 1234.56];

    #[test]
    fn jump_boundary_holds_for_uneven_smas() {
        let t = RuleThresholds::default();
        for sma in UNEVEN_SMAS {
            for price in [sma * 1.2, sma * 0.8] {
                let v = evaluate_rule(StatRule::NoUnrealisticJump, price, &profile(sma, 1.0, price), &t);
                assert_eq!(v.outcome, RuleOutcome::Pass, "sma {sma}, price {price}");
            }
            let over = sma * 1.2001;
            let v = evaluate_rule(StatRule::NoUnrealisticJump, over, &profile(sma, 1.0, over), &t);
            assert_eq!(v.outcome, RuleOutcome::Fail, "sma {sma}, price {over}");
        }
    }

    #[test]
    fn sigma_boundaries_hold_for_uneven_smas() {
        let t = RuleThresholds::default();
        for sma in UNEVEN_SMAS {
            let std_dev = sma * 0.03;
            let at_band = sma + 4.0 * std_dev;
            let p = profile(sma, std_dev, at_band);
            assert_eq!(
                evaluate_rule(StatRule::WithinStdDevBand, at_band, &p, &t).outcome,
                RuleOutcome::Pass,
                "sma {sma}"
            );
            let at_extreme = sma - 5.0 * std_dev;
            let p = profile(sma, std_dev, at_extreme);
            assert_eq!(
                evaluate_rule(StatRule::NoExtremeDeviation, at_extreme, &p, &t).outcome,
                RuleOutcome::Pass,
                "sma {sma}"
            );
            let beyond = sma + 5.01 * std_dev;
            let p = profile(sma, std_dev, beyond);
            assert_eq!(
                evaluate_rule(StatRule::NoExtremeDeviation, beyond, &p, &t).outcome,
                RuleOutcome::Fail,
                "sma {sma}"
            );
        }
    }

    #[test]
    fn null_z_score_fails_range_rule() {
        let t = RuleThresholds::default();
        let v = evaluate_rule(StatRule::ZScoreInRange, 100.0, &profile(100.0, 0.0, 100.0), &t);
        assert_eq!(v.outcome, RuleOutcome::Fail);
    }

    #[test]
    fn z_score_boundary_is_inclusive() {
        let t = RuleThresholds::default();
        let v = evaluate_rule(StatRule::ZScoreInRange, 103.0, &profile(100.0, 1.0, 103.0), &t);
        assert_eq!(v.outcome, RuleOutcome::Pass);
        let v = evaluate_rule(StatRule::ZScoreInRange, 97.0, &profile(100.0, 1.0, 97.0), &t);
        assert_eq!(v.outcome, RuleOutcome::Pass);
    }

    #[test]
    fn sigma_band_rules() {
        let t = RuleThresholds::default();
        // deviation 4.5: outside 4σ, inside 5σ
        let p = profile(100.0, 1.0, 104.5);
        assert_eq!(evaluate_rule(StatRule::WithinStdDevBand, 104.5, &p, &t).outcome, RuleOutcome::Fail);
        assert_eq!(evaluate_rule(StatRule::NoExtremeDeviation, 104.5, &p, &t).outcome, RuleOutcome::Pass);
        // exactly on the 5σ boundary
        let p = profile(100.0, 1.0, 105.0);
        assert_eq!(evaluate_rule(StatRule::NoExtremeDeviation, 105.0, &p, &t).outcome, RuleOutcome::Pass);
    }

    #[test]
    fn rules_come_out_in_fixed_order() {
        let v = validate(&obs(Some(100.5)), Some(&profile(100.0, 1.0, 100.5)), &RuleThresholds::default());
        let order: Vec<StatRule> = v.rules.iter().map(|r| r.rule).collect();
        assert_eq!(order, StatRule::ALL.to_vec());
        assert!(v.all_pass());
    }

    #[test]
    fn missing_profile_fails_everything_by_default() {
        let v = validate(&obs(None), None, &RuleThresholds::default());
        assert_eq!(v.rules.len(), 4);
        assert!(v.rules.iter().all(|r| r.outcome == RuleOutcome::Fail));
        assert!(v.rules[0].rationale.as_deref().unwrap().contains("insufficient data"));
    }

    #[test]
    fn zero_std_dev_with_price_off_mean() {
        // Constant comparison series: any deviation breaks both sigma rules.
        let v = validate(&obs(Some(101.0)), Some(&profile(100.0, 0.0, 101.0)), &RuleThresholds::default());
        assert_eq!(v.outcome(StatRule::NoUnrealisticJump), Some(RuleOutcome::Pass));
        assert_eq!(v.outcome(StatRule::ZScoreInRange), Some(RuleOutcome::Fail));
        assert_eq!(v.outcome(StatRule::WithinStdDevBand), Some(RuleOutcome::Fail));
        assert_eq!(v.outcome(StatRule::NoExtremeDeviation), Some(RuleOutcome::Fail));
    }
}
