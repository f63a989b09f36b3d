// =============================================================================
// Narrative (batch) Rules — payload assembly for external judgement
// =============================================================================
//
// Six cross-record checks are judged by the narrative generator rather than
// computed here:
//
//   Timestamp Present, Correct Timestamp Order, No Weekend Entries,
//   No Public Holidays, 4-Digit Ticker Symbol, Valid Ticker Names
//
// This module only builds the payload (url, ticker, timestamp, price per
// record) and the verbatim table template.  The reply is stored as opaque
// text.  Rows that match one of the six criteria are parsed for display, but
// a verdict is never produced locally for a row the reply does not contain.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{Observation, RuleOutcome};

/// The six criteria, in table order.
pub const NARRATIVE_CRITERIA: [&str; 6] = [
    "Timestamp Present",
    "Correct Timestamp Order",
    "No Weekend Entries",
    "No Public Holidays",
    "4-Digit Ticker Symbol",
    "Valid Ticker Names",
];

const TABLE_TEMPLATE: &str = "\
| Validation Criteria                | Result    | Reason                                  |
|------------------------------------|--------   |------------------------------------     |
| Timestamp Present                  | Pass/Fail | Explanation of missing values, if any  |
| Correct Timestamp Order            | Pass/Fail | Explanation of timestamp order check   |
| No Weekend Entries                 | Pass/Fail | Explanation of weekend check           |
| No Public Holidays                 | Pass/Fail | Explanation of public holiday check    |
| 4-Digit Ticker Symbol              | Pass/Fail | Explanation of ticker validity         |
| Valid Ticker Names                 | Pass/Fail | Explanation of recognized tickers      |";

/// Timestamp layout handed to the generator.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One record of the batch as seen by the external judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRecord {
    pub url: String,
    pub ticker: String,
    pub price: String,
    pub timestamp: String,
}

impl From<&Observation> for NarrativeRecord {
    fn from(obs: &Observation) -> Self {
        Self {
            url: obs.url.clone(),
            ticker: obs.ticker.clone(),
            price: obs.display_price(),
            timestamp: obs.captured_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

pub fn build_payload(observations: &[Observation]) -> Vec<NarrativeRecord> {
    observations.iter().map(NarrativeRecord::from).collect()
}

/// Prompt asking the generator to fill the six-row table for `payload`.
pub fn build_prompt(payload: &[NarrativeRecord]) -> String {
    let data = serde_json::to_string_pretty(payload).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are an expert financial analyst. Validate the following stock price data.\n\
         Ensure answers are based on Eastern Standard Time (EST) and follow strict validation rules.\n\n\
         Data:\n{data}\n\n\
         Provide results in this table format:\n\n{TABLE_TEMPLATE}\n"
    )
}

/// A row of the generator's table that names one of the six criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRuleRow {
    pub criterion: String,
    /// `None` when the result cell was neither "Pass" nor "Fail".
    pub outcome: Option<RuleOutcome>,
    pub reason: String,
}

/// Output of the batch-rule stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeValidation {
    pub payload: Vec<NarrativeRecord>,
    /// Generator reply, untouched.
    pub raw_text: String,
    /// Recognised rows in criterion order; may be shorter than six.
    pub rows: Vec<NarrativeRuleRow>,
}

impl NarrativeValidation {
    pub fn from_reply(payload: Vec<NarrativeRecord>, raw_text: String) -> Self {
        let rows = parse_rows(&raw_text);
        Self {
            payload,
            raw_text,
            rows,
        }
    }
}

fn parse_outcome(cell: &str) -> Option<RuleOutcome> {
    let cell = cell.trim_matches(|c: char| c == '*' || c.is_whitespace());
    if cell.eq_ignore_ascii_case("pass") {
        Some(RuleOutcome::Pass)
    } else if cell.eq_ignore_ascii_case("fail") {
        Some(RuleOutcome::Fail)
    } else {
        None
    }
}

/// Pick out markdown table rows whose first cell names a known criterion.
pub fn parse_rows(text: &str) -> Vec<NarrativeRuleRow> {
    let mut found: Vec<Option<NarrativeRuleRow>> = vec![None; NARRATIVE_CRITERIA.len()];

    for line in text.lines() {
        let line = line.trim();
        if !line.starts_with('|') {
            continue;
        }
        let cells: Vec<&str> = line
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();
        if cells.len() < 2 {
            continue;
        }
        let name = cells[0].trim_matches('*').trim();
        let Some(idx) = NARRATIVE_CRITERIA
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
        else {
            continue;
        };
        if found[idx].is_some() {
            continue;
        }
        found[idx] = Some(NarrativeRuleRow {
            criterion: NARRATIVE_CRITERIA[idx].to_string(),
            outcome: parse_outcome(cells[1]),
            reason: cells.get(2).map(|s| s.to_string()).unwrap_or_default(),
        });
    }

    found.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn obs(ticker: &str, price: Option<f64>) -> Observation {
        Observation {
            url: "https://example.com".into(),
            ticker: ticker.into(),
            price,
            captured_at: Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap(),
            source_digest: String::new(),
        }
    }

    #[test]
    fn payload_carries_ticker_timestamp_price() {
        let payload = build_payload(&[obs("MSFT", Some(123.45)), obs("N/A", None)]);
        assert_eq!(payload[0].price, "$123.45");
        assert_eq!(payload[0].timestamp, "2024-03-09 10:00:00");
        assert_eq!(payload[1].price, "N/A");
    }

    #[test]
    fn prompt_contains_verbatim_template() {
        let prompt = build_prompt(&build_payload(&[obs("MSFT", Some(1.0))]));
        for criterion in NARRATIVE_CRITERIA {
            assert!(prompt.contains(criterion), "missing {criterion}");
        }
        assert!(prompt.contains(TABLE_TEMPLATE));
        assert!(prompt.contains("\"ticker\": \"MSFT\""));
    }

    #[test]
    fn parses_known_rows_and_ignores_the_rest() {
        let reply = "\
| Validation Criteria | Result | Reason |
|---|---|---|
| Timestamp Present | Pass | all rows have timestamps |
| No Weekend Entries | **Fail** | 2024-03-09 is a Saturday |
| Something Else | Pass | ignored |
";
        let rows = parse_rows(reply);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].criterion, "Timestamp Present");
        assert_eq!(rows[0].outcome, Some(RuleOutcome::Pass));
        assert_eq!(rows[1].criterion, "No Weekend Entries");
        assert_eq!(rows[1].outcome, Some(RuleOutcome::Fail));
        assert!(rows[1].reason.contains("Saturday"));
    }

    #[test]
    fn free_text_reply_yields_no_rows() {
        let v = NarrativeValidation::from_reply(Vec::new(), "I cannot judge this.".into());
        assert!(v.rows.is_empty());
        assert_eq!(v.raw_text, "I cannot judge this.");
    }
}
