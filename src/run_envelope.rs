// =============================================================================
// Run Envelope — Auditable record of every analysis run
// =============================================================================
//
// The full RunState can be large (scraped text, generator replies).  The
// envelope keeps just enough to audit a run after the fact: how far it got,
// how many observations were priced and flagged, and which collaborators
// failed.
// =============================================================================

use serde::Serialize;

use crate::pipeline::{PipelineStage, RunState};

/// Complete auditable record of an analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct RunEnvelope {
    /// Unique identifier for this run (UUID v4).
    pub id: String,

    pub ticker: String,

    /// Furthest stage the run wrote.
    pub stage: PipelineStage,

    /// Raw records scraped or supplied.
    pub records: usize,

    /// Observations with an extracted price.
    pub priced: usize,

    /// Observations failing at least one statistical rule.
    pub anomalous: usize,

    /// Collaborator failure messages, stage-level and per record.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,

    /// ISO 8601 timestamp of when this envelope was created.
    pub created_at: String,
}

impl RunEnvelope {
    pub fn from_state(state: &RunState) -> Self {
        let records = state.raw_records.produced().map_or(0, Vec::len);
        let priced = state
            .observations
            .produced()
            .map_or(0, |obs| obs.iter().filter(|o| o.price.is_some()).count());
        let anomalous = state
            .verdicts
            .produced()
            .map_or(0, |v| v.iter().filter(|v| !v.all_pass()).count());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ticker: state.ticker.clone(),
            stage: state.stage(),
            records,
            priced,
            anomalous,
            failures: state.collaborator_failures(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
