// =============================================================================
// Anomaly Reasoner — failed rules -> fixed insight sentences
// =============================================================================
//
// Deterministic, order-preserving mapping: each failing statistical rule
// contributes its own sentence, independent of the other rules.  No text in
// this stage comes from the narrative generator.
// =============================================================================

use crate::types::{InsightSet, StatRule, ValidationVerdict};

/// Template sentence attached to a failing rule.
pub fn insight_for(rule: StatRule) -> &'static str {
    match rule {
        StatRule::NoUnrealisticJump => "Potential price volatility or data anomaly detected.",
        StatRule::ZScoreInRange => {
            "Z-score indicates a significant deviation from the mean, warranting further investigation."
        }
        StatRule::WithinStdDevBand => {
            "Price is outside typical standard deviation range, suggesting possible outliers."
        }
        StatRule::NoExtremeDeviation => "Extreme price deviation detected, requires thorough review.",
    }
}

/// Insights for one verdict, in rule order. Empty when every rule passed.
pub fn reason(verdict: &ValidationVerdict) -> InsightSet {
    verdict
        .failed_rules()
        .map(|rule| insight_for(rule).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RuleOutcome, RuleVerdict};

    fn verdict(outcomes: [RuleOutcome; 4]) -> ValidationVerdict {
        ValidationVerdict {
            rules: StatRule::ALL
                .iter()
                .zip(outcomes)
                .map(|(&rule, outcome)| RuleVerdict {
                    rule,
                    outcome,
                    rationale: None,
                })
                .collect(),
        }
    }

    #[test]
    fn all_pass_gives_empty_set() {
        let v = verdict([RuleOutcome::Pass; 4]);
        assert!(reason(&v).is_empty());
    }

    #[test]
    fn all_fail_gives_four_sentences_in_rule_order() {
        let insights = reason(&verdict([RuleOutcome::Fail; 4]));
        let expected: Vec<String> = StatRule::ALL.iter().map(|r| insight_for(*r).to_string()).collect();
        assert_eq!(insights, expected);
    }

    #[test]
    fn each_rule_maps_independently() {
        use RuleOutcome::{Fail, Pass};
        let insights = reason(&verdict([Pass, Fail, Pass, Fail]));
        assert_eq!(
            insights,
            vec![
                insight_for(StatRule::ZScoreInRange).to_string(),
                insight_for(StatRule::NoExtremeDeviation).to_string(),
            ]
        );
    }
}
