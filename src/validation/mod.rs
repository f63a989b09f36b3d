// =============================================================================
// Validation Module
// =============================================================================
//
// Two independent rule families:
// - statistical: four numeric checks per observation, computed locally
// - narrative:   six batch checks judged by the narrative generator

pub mod narrative;
pub mod statistical;

pub use narrative::{NarrativeRecord, NarrativeRuleRow, NarrativeValidation};
pub use statistical::{validate, RuleThresholds};
