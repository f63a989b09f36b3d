// =============================================================================
// Observation Extractor — RawRecord -> Observation
// =============================================================================
//
// Pulls a ticker and a dollar price out of free page text.  The first match
// in document order wins for both fields.  This is a known source of false
// positives (a capitalised word such as "NEW" is taken for a ticker) and is
// kept as-is for compatibility with existing consumers of the output.
// =============================================================================

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{Observation, RawRecord, TICKER_NOT_AVAILABLE};

lazy_static! {
    static ref TICKER_RE: Regex = Regex::new(r"\b[A-Z]{2,5}\b").unwrap();
    static ref PRICE_RE: Regex = Regex::new(r"\$\d{1,5}(\.\d{1,2})?").unwrap();
}

/// First uppercase letter run of length 2-5 bounded by word boundaries.
pub fn extract_ticker(text: &str) -> Option<&str> {
    TICKER_RE.find(text).map(|m| m.as_str())
}

/// First `$` amount in the text, parsed to `f64`.
pub fn extract_price(text: &str) -> Option<f64> {
    let raw = PRICE_RE.find(text)?.as_str();
    parse_dollar_amount(raw)
}

/// Parse a `"$1,234.56"`-style string. Returns `None` on anything unparsable.
pub fn parse_dollar_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned.trim().parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Turn a scraped record into a typed observation. Never fails: missing
/// fields degrade to `"N/A"` / `None`.
pub fn extract(record: &RawRecord) -> Observation {
    let text = record.scraped_text.as_str();
    Observation {
        url: record.url.clone(),
        ticker: extract_ticker(text)
            .unwrap_or(TICKER_NOT_AVAILABLE)
            .to_string(),
        price: extract_price(text),
        captured_at: record.captured_at,
        source_digest: record.digest(),
    }
}
