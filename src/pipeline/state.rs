// =============================================================================
// Run State — the record threaded through every pipeline stage
// =============================================================================
//
// Each data field is written by exactly one stage and never by a later one.
// A field is either not yet run, produced, an explicit "no data" sentinel, or
// a failed collaborator stage.  The pipeline position is derived from which
// fields are set rather than stored separately.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{InsightSet, Observation, RawRecord, SearchHit, StatisticalProfile, ValidationVerdict};
use crate::validation::NarrativeValidation;

/// Output slot of a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum StageOutput<T> {
    NotRun,
    Produced(T),
    /// Sentinel written when the stage's input was empty.
    NoData(String),
    /// Collaborator failure that prevented the whole stage from producing.
    Failed(String),
}

impl<T> Default for StageOutput<T> {
    fn default() -> Self {
        Self::NotRun
    }
}

impl<T> StageOutput<T> {
    pub fn is_not_run(&self) -> bool {
        matches!(self, Self::NotRun)
    }

    /// True once the stage has written anything, sentinel included.
    pub fn is_settled(&self) -> bool {
        !self.is_not_run()
    }

    pub fn produced(&self) -> Option<&T> {
        match self {
            Self::Produced(v) => Some(v),
            _ => None,
        }
    }

    /// Sentinel text for `NoData`/`Failed`, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::NoData(r) | Self::Failed(r) => Some(r),
            _ => None,
        }
    }
}

impl<T> StageOutput<Vec<T>> {
    /// Produced and non-empty.
    pub fn non_empty(&self) -> Option<&[T]> {
        self.produced().map(Vec::as_slice).filter(|v| !v.is_empty())
    }
}

/// Pipeline position. Transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Empty,
    Searched,
    Scraped,
    Extracted,
    Profiled,
    Validated,
    Reasoned,
    Summarized,
}

impl PipelineStage {
    /// Name used in sentinel messages.
    pub fn activity(self) -> &'static str {
        match self {
            Self::Empty => "input",
            Self::Searched => "search",
            Self::Scraped => "scraping",
            Self::Extracted => "extraction",
            Self::Profiled => "analysis",
            Self::Validated => "validation",
            Self::Reasoned => "reasoning",
            Self::Summarized => "summary",
        }
    }

    /// `"No data available for <activity>."`
    pub fn no_data_sentinel(self) -> String {
        format!("No data available for {}.", self.activity())
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Summary produced by the narrative generator for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub url: String,
    /// Generated text, or `None` when generation failed for this record.
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything one analysis run knows.
///
/// Per-observation vectors (`profiles`, `verdicts`, `insights`) are aligned
/// by index with `observations`.  `profiles[i] == None` marks an observation
/// that had no usable price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunState {
    pub ticker: String,
    #[serde(default)]
    pub search_hits: StageOutput<Vec<SearchHit>>,
    #[serde(default)]
    pub raw_records: StageOutput<Vec<RawRecord>>,
    #[serde(default)]
    pub observations: StageOutput<Vec<Observation>>,
    #[serde(default)]
    pub profiles: StageOutput<Vec<Option<StatisticalProfile>>>,
    #[serde(default)]
    pub verdicts: StageOutput<Vec<ValidationVerdict>>,
    #[serde(default)]
    pub narrative_validation: StageOutput<NarrativeValidation>,
    #[serde(default)]
    pub insights: StageOutput<Vec<InsightSet>>,
    #[serde(default)]
    pub summaries: StageOutput<Vec<RecordSummary>>,
}

impl RunState {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Self::default()
        }
    }

    /// Start a run from records scraped elsewhere, skipping search/scrape.
    pub fn from_records(ticker: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            ticker: ticker.into(),
            search_hits: StageOutput::NoData("Records supplied by caller.".to_string()),
            raw_records: StageOutput::Produced(records),
            ..Self::default()
        }
    }

    /// Furthest stage whose output has been written.
    pub fn stage(&self) -> PipelineStage {
        let settled = [
            (PipelineStage::Summarized, self.summaries.is_settled()),
            (PipelineStage::Reasoned, self.insights.is_settled()),
            (PipelineStage::Validated, self.verdicts.is_settled()),
            (PipelineStage::Profiled, self.profiles.is_settled()),
            (PipelineStage::Extracted, self.observations.is_settled()),
            (PipelineStage::Scraped, self.raw_records.is_settled()),
            (PipelineStage::Searched, self.search_hits.is_settled()),
        ];
        settled
            .into_iter()
            .find(|(_, done)| *done)
            .map(|(stage, _)| stage)
            .unwrap_or(PipelineStage::Empty)
    }

    /// Collaborator failures recorded so far, stage-level and per record.
    pub fn collaborator_failures(&self) -> Vec<String> {
        let mut failures = Vec::new();

        if let StageOutput::Failed(r) = &self.search_hits {
            failures.push(r.clone());
        }
        if let Some(records) = self.raw_records.produced() {
            failures.extend(records.iter().filter_map(|r| r.error.clone()));
        }
        if let StageOutput::Failed(r) = &self.narrative_validation {
            failures.push(r.clone());
        }
        match &self.summaries {
            StageOutput::Produced(s) => failures.extend(s.iter().filter_map(|s| s.error.clone())),
            StageOutput::Failed(r) => failures.push(r.clone()),
            _ => {}
        }

        failures
    }
}
