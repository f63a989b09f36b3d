// =============================================================================
// Pipeline Orchestrator — runs the stages in order for one ticker
// =============================================================================
//
//   search → scrape → extract → profile → validate → narrative validation
//          → reason → summarize
//
// A stage that has nothing to work on writes its sentinel and the run keeps
// going; a run always reaches `Summarized`.  Collaborators are injected as
// trait objects so the same orchestrator serves production, the one-shot
// CLI mode and the tests.
// =============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use super::parallel::WorkerPool;
use super::stages;
use super::state::{RunState, StageOutput};
use crate::collaborators::{NarrativeGenerator, PageFetcher, SearchProvider};
use crate::stats::{ProfilerSettings, SampleSource, StatisticalProfiler};
use crate::types::RawRecord;
use crate::validation::RuleThresholds;

/// Knobs the orchestrator passes down to individual stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub search_limit: usize,
    pub fetch_concurrency: usize,
    pub worker_limit: usize,
    pub profiler: ProfilerSettings,
    pub thresholds: RuleThresholds,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            search_limit: 5,
            fetch_concurrency: 4,
            worker_limit: 4,
            profiler: ProfilerSettings::default(),
            thresholds: RuleThresholds::default(),
        }
    }
}

/// Builds the comparison-series source for one run.
///
/// Every run gets its own source, so a seeded sampler yields the same draws
/// for the same input no matter how many runs came before or run alongside.
pub type SamplerFactory = Arc<dyn Fn() -> Box<dyn SampleSource> + Send + Sync>;

/// Extract, profile and validate: CPU-only, no collaborators.
struct OfflineStages {
    profiler: StatisticalProfiler,
    thresholds: RuleThresholds,
    pool: WorkerPool,
    sampler_factory: SamplerFactory,
}

impl OfflineStages {
    fn run(&self, state: RunState) -> RunState {
        let mut sampler = (self.sampler_factory)();
        let state = stages::extract(state);
        let state = stages::profile(state, &self.profiler, &mut *sampler, &self.pool);
        stages::validate(state, &self.thresholds)
    }
}

pub struct Pipeline {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    generator: Arc<dyn NarrativeGenerator>,
    offline: Arc<OfflineStages>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        generator: Arc<dyn NarrativeGenerator>,
        sampler_factory: SamplerFactory,
        settings: PipelineSettings,
    ) -> Self {
        let offline = OfflineStages {
            profiler: StatisticalProfiler::new(settings.profiler.clone()),
            thresholds: settings.thresholds.clone(),
            pool: WorkerPool::new(settings.worker_limit),
            sampler_factory,
        };
        debug!(
            workers = offline.pool.worker_limit(),
            search_limit = settings.search_limit,
            "pipeline ready"
        );
        Self {
            search,
            fetcher,
            generator,
            offline: Arc::new(offline),
            settings,
        }
    }

    /// Full run for `ticker`, starting from a web search.
    #[instrument(skip(self), name = "pipeline::run")]
    pub async fn run(&self, ticker: &str) -> RunState {
        let state = RunState::new(ticker);
        let state = stages::search(state, self.search.as_ref(), self.settings.search_limit).await;
        let state = stages::scrape(state, self.fetcher.as_ref(), self.settings.fetch_concurrency).await;
        self.finish(state).await
    }

    /// Run from already-scraped records; search and scrape are skipped.
    #[instrument(skip(self, records), name = "pipeline::run_records", fields(records = records.len()))]
    pub async fn run_records(&self, ticker: &str, records: Vec<RawRecord>) -> RunState {
        self.finish(RunState::from_records(ticker, records)).await
    }

    async fn finish(&self, state: RunState) -> RunState {
        let offline = Arc::clone(&self.offline);
        let mut fallback = state.clone();
        let state = match tokio::task::spawn_blocking(move || offline.run(state)).await {
            Ok(state) => state,
            Err(e) => {
                error!(ticker = %fallback.ticker, error = %e, "offline stages aborted");
                fallback.observations = StageOutput::Failed(format!("offline stages aborted: {e}"));
                fallback
            }
        };

        let state = stages::validate_narrative(state, self.generator.as_ref()).await;
        let state = stages::reason(state);
        let state = stages::summarize(state, self.generator.as_ref(), self.settings.fetch_concurrency).await;

        info!(
            ticker = %state.ticker,
            stage = %state.stage(),
            failures = state.collaborator_failures().len(),
            "pipeline run complete"
        );
        state
    }

    /// The offline part of a run on the calling thread: extract, profile
    /// and validate.
    pub fn run_core(&self, state: RunState) -> RunState {
        self.offline.run(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollaboratorError;
    use crate::pipeline::state::{PipelineStage, StageOutput};
    use crate::stats::{FixedSeries, UniformBandSampler};
    use crate::types::{RuleOutcome, SearchHit};
    use async_trait::async_trait;
    use chrono::Utc;

    struct OneHit;

    #[async_trait]
    impl SearchProvider for OneHit {
        async fn search(&self, query: &str, _: usize) -> Result<Vec<SearchHit>, CollaboratorError> {
            Ok(vec![SearchHit {
                title: format!("{query} stock"),
                url: "https://quotes.example.com/msft".into(),
                snippet: String::new(),
            }])
        }
    }

    struct Offline;

    #[async_trait]
    impl SearchProvider for Offline {
        async fn search(&self, _: &str, _: usize) -> Result<Vec<SearchHit>, CollaboratorError> {
            Err(CollaboratorError::SearchUnavailable("offline".into()))
        }
    }

    struct QuotePage;

    #[async_trait]
    impl PageFetcher for QuotePage {
        async fn fetch(&self, _: &str) -> Result<String, CollaboratorError> {
            Ok("Microsoft MSFT last trade $100.50".into())
        }
    }

    struct Canned;

    #[async_trait]
    impl NarrativeGenerator for Canned {
        async fn generate(&self, _: &str) -> Result<String, CollaboratorError> {
            Ok("| Valid Ticker Names | Pass | MSFT is listed |".into())
        }
    }

    fn pipeline(search: Arc<dyn SearchProvider>) -> Pipeline {
        let series: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 99.0 } else { 101.0 }).collect();
        Pipeline::new(
            search,
            Arc::new(QuotePage),
            Arc::new(Canned),
            Arc::new(move || Box::new(FixedSeries::new(series.clone())) as Box<dyn SampleSource>),
            PipelineSettings::default(),
        )
    }

    fn seeded_pipeline(seed: u64) -> Pipeline {
        let settings = PipelineSettings::default();
        let band_pct = settings.profiler.band_pct;
        Pipeline::new(
            Arc::new(Offline),
            Arc::new(QuotePage),
            Arc::new(Canned),
            Arc::new(move || Box::new(UniformBandSampler::new(band_pct, Some(seed))) as Box<dyn SampleSource>),
            settings,
        )
    }

    fn priced(text: &str) -> Vec<RawRecord> {
        vec![RawRecord::new("https://a", text, Utc::now())]
    }

    #[tokio::test]
    async fn full_run_reaches_summary() {
        let state = pipeline(Arc::new(OneHit)).run("MSFT").await;

        assert_eq!(state.stage(), PipelineStage::Summarized);
        let obs = &state.observations.produced().unwrap()[0];
        assert_eq!(obs.price, Some(100.5));

        // z = 0.5 against a 100 ± 1 series: every rule passes.
        let verdict = &state.verdicts.produced().unwrap()[0];
        assert!(verdict.rules.iter().all(|r| r.outcome == RuleOutcome::Pass));
        assert!(state.insights.produced().unwrap()[0].is_empty());

        let nv = state.narrative_validation.produced().unwrap();
        assert_eq!(nv.rows[0].criterion, "Valid Ticker Names");
        assert_eq!(state.summaries.produced().unwrap().len(), 1);
        assert!(state.collaborator_failures().is_empty());
    }

    #[tokio::test]
    async fn search_outage_still_completes_with_sentinels() {
        let state = pipeline(Arc::new(Offline)).run("MSFT").await;

        assert!(matches!(state.search_hits, StageOutput::Failed(_)));
        assert_eq!(state.summaries.reason(), Some("No data available for summary."));
        assert_eq!(state.stage(), PipelineStage::Summarized);
        assert_eq!(state.collaborator_failures(), vec!["search unavailable: offline".to_string()]);
    }

    #[tokio::test]
    async fn supplied_records_skip_search() {
        let records = vec![RawRecord::new("https://a", "MSFT at $250.00", Utc::now())];
        let state = pipeline(Arc::new(Offline)).run_records("MSFT", records).await;

        assert!(!matches!(state.search_hits, StageOutput::Failed(_)));
        assert_eq!(state.observations.produced().unwrap()[0].price, Some(250.0));
        // 150% above the comparison mean.
        assert_eq!(state.insights.produced().unwrap()[0].len(), 4);
    }

    #[tokio::test]
    async fn seeded_runs_are_identical_across_calls() {
        let pipeline = seeded_pipeline(99);
        let first = pipeline.run_records("MSFT", priced("MSFT at $123.45")).await;
        // An unrelated run in between must not shift the draws.
        pipeline.run_records("MSFT", priced("MSFT at $310.00")).await;
        let second = pipeline.run_records("MSFT", priced("MSFT at $123.45")).await;

        assert_eq!(first.profiles, second.profiles);
        assert_eq!(first.verdicts, second.verdicts);
        assert_eq!(first.insights, second.insights);

        let p = first.profiles.produced().unwrap()[0].unwrap();
        assert!((p.sma - 121.47235114790394).abs() < 1e-10);
    }

    #[tokio::test]
    async fn concurrent_seeded_runs_agree() {
        let pipeline = Arc::new(seeded_pipeline(7));
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move { pipeline.run_records("MSFT", priced("MSFT at $100.00")).await })
            })
            .collect();

        let mut profiles = Vec::new();
        for task in tasks {
            profiles.push(task.await.unwrap().profiles);
        }
        assert!(profiles.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn run_core_matches_between_calls() {
        let pipeline = seeded_pipeline(99);
        let a = pipeline.run_core(RunState::from_records("MSFT", priced("MSFT at $123.45")));
        let b = pipeline.run_core(RunState::from_records("MSFT", priced("MSFT at $123.45")));
        assert_eq!(a.profiles, b.profiles);
        assert_eq!(a.stage(), PipelineStage::Validated);
    }
}
