// =============================================================================
// Shared types used across the Price Sentry pipeline
// =============================================================================
//
// Closed set of record types that flow between stages.  Everything here is
// created once by the stage that owns it and is read-only afterwards.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Placeholder used wherever a ticker could not be extracted.
pub const TICKER_NOT_AVAILABLE: &str = "N/A";

/// One organic result returned by a search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Page text captured by the scraper for a single URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub url: String,
    pub scraped_text: String,
    pub captured_at: DateTime<Utc>,
    /// Set when the page fetch failed; `scraped_text` is empty in that case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RawRecord {
    pub fn new(url: impl Into<String>, scraped_text: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            scraped_text: scraped_text.into(),
            captured_at,
            error: None,
        }
    }

    /// A record for a URL whose fetch failed.
    pub fn errored(url: impl Into<String>, error: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            scraped_text: String::new(),
            captured_at,
            error: Some(error.into()),
        }
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }

    /// SHA-256 hex fingerprint of the scraped text.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.scraped_text.as_bytes()))
    }
}

/// A typed price observation extracted from a [`RawRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub url: String,
    /// First 2-5 letter uppercase run in the page, or `"N/A"`.
    pub ticker: String,
    /// `None` exactly when no dollar amount was found in the page text.
    pub price: Option<f64>,
    pub captured_at: DateTime<Utc>,
    pub source_digest: String,
}

impl Observation {
    /// Price usable by the profiler: present and strictly positive.
    pub fn profilable_price(&self) -> Option<f64> {
        self.price.filter(|p| p.is_finite() && *p > 0.0)
    }

    /// `"$123.45"` or `"N/A"`, the form handed to narrative collaborators.
    pub fn display_price(&self) -> String {
        match self.price {
            Some(p) => format!("${p:.2}"),
            None => TICKER_NOT_AVAILABLE.to_string(),
        }
    }
}

/// Descriptive statistics of an observation against its comparison series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticalProfile {
    pub sma: f64,
    pub ema: f64,
    pub std_dev: f64,
    /// `None` when `std_dev == 0`, and also when `std_dev` is so small
    /// that the quotient overflows to infinity. Either way the z-score rule
    /// fails.
    pub z_score: Option<f64>,
}

/// Binary outcome of a single validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOutcome {
    Pass,
    Fail,
}

impl RuleOutcome {
    pub fn from_pass(pass: bool) -> Self {
        if pass {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    pub fn is_fail(self) -> bool {
        self == Self::Fail
    }
}

impl std::fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "Pass"),
            Self::Fail => write!(f, "Fail"),
        }
    }
}

/// The fixed battery of statistical rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatRule {
    NoUnrealisticJump,
    ZScoreInRange,
    WithinStdDevBand,
    NoExtremeDeviation,
}

impl StatRule {
    pub const ALL: [StatRule; 4] = [
        StatRule::NoUnrealisticJump,
        StatRule::ZScoreInRange,
        StatRule::WithinStdDevBand,
        StatRule::NoExtremeDeviation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::NoUnrealisticJump => "No unrealistic price jumps (>20%)",
            Self::ZScoreInRange => "Z-score within range (-3 to 3)",
            Self::WithinStdDevBand => "Price within 3-4 std deviations",
            Self::NoExtremeDeviation => "No extreme deviation (>5x std dev)",
        }
    }
}

impl std::fmt::Display for StatRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Verdict of one statistical rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleVerdict {
    pub rule: StatRule,
    pub outcome: RuleOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Ordered rule verdicts for a single observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub rules: Vec<RuleVerdict>,
}

impl ValidationVerdict {
    pub fn outcome(&self, rule: StatRule) -> Option<RuleOutcome> {
        self.rules.iter().find(|r| r.rule == rule).map(|r| r.outcome)
    }

    pub fn failed_rules(&self) -> impl Iterator<Item = StatRule> + '_ {
        self.rules.iter().filter(|r| r.outcome.is_fail()).map(|r| r.rule)
    }

    pub fn all_pass(&self) -> bool {
        self.rules.iter().all(|r| !r.outcome.is_fail())
    }
}

/// Ordered anomaly sentences for one observation. Empty when nothing failed.
pub type InsightSet = Vec<String>;
