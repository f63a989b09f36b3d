// =============================================================================
// Pipeline Stages — RunState in, RunState out
// =============================================================================
//
// Every stage:
//   - takes the whole RunState by value and returns it,
//   - writes only its own field,
//   - writes the "No data available for <stage>." sentinel when its
//     predecessor produced nothing, and
//   - returns the state untouched if its own field is already written.
//
// Collaborator stages (search, scrape, narrative validation, summary) are
// async and take the collaborator as an injected trait object.  The
// statistical stages are synchronous and never touch the network.
// =============================================================================

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::parallel::WorkerPool;
use super::state::{PipelineStage, RecordSummary, RunState, StageOutput};
use crate::collaborators::{NarrativeGenerator, PageFetcher, SearchProvider};
use crate::extractor;
use crate::reasoner;
use crate::stats::{profile_against, SampleSource, StatisticalProfiler};
use crate::types::{Observation, RawRecord};
use crate::validation::{self, narrative, NarrativeValidation, RuleThresholds};

fn already_written(stage: PipelineStage, ticker: &str) {
    debug!(%stage, ticker, "stage output already written, leaving state unchanged");
}

fn short_circuit<T>(stage: PipelineStage, ticker: &str) -> StageOutput<T> {
    info!(%stage, ticker, "no input for stage, writing sentinel");
    StageOutput::NoData(stage.no_data_sentinel())
}

// -----------------------------------------------------------------------------
// Searched
// -----------------------------------------------------------------------------

/// Query the search provider for the run's ticker.
///
/// An empty result and a provider failure both leave nothing for the next
/// stage; the failure is kept as `Failed` so it is visible to the caller.
pub async fn search(mut state: RunState, provider: &dyn SearchProvider, limit: usize) -> RunState {
    const STAGE: PipelineStage = PipelineStage::Searched;
    if state.search_hits.is_settled() {
        already_written(STAGE, &state.ticker);
        return state;
    }

    let query = state.ticker.trim().to_string();
    if query.is_empty() || limit == 0 {
        state.search_hits = short_circuit(STAGE, &state.ticker);
        return state;
    }

    state.search_hits = match provider.search(&query, limit).await {
        Ok(hits) if hits.is_empty() => short_circuit(STAGE, &state.ticker),
        Ok(hits) => {
            info!(ticker = %state.ticker, count = hits.len(), "search complete");
            StageOutput::Produced(hits)
        }
        Err(e) => {
            warn!(ticker = %state.ticker, error = %e, "search provider failed");
            StageOutput::Failed(e.to_string())
        }
    };
    state
}

// -----------------------------------------------------------------------------
// Scraped
// -----------------------------------------------------------------------------

/// Fetch every search hit. A failed URL becomes an errored record and the
/// rest of the batch carries on.
pub async fn scrape(mut state: RunState, fetcher: &dyn PageFetcher, concurrency: usize) -> RunState {
    const STAGE: PipelineStage = PipelineStage::Scraped;
    if state.raw_records.is_settled() {
        already_written(STAGE, &state.ticker);
        return state;
    }

    let urls: Vec<String> = match state.search_hits.non_empty() {
        Some(hits) => hits.iter().map(|h| h.url.clone()).collect(),
        None => {
            state.raw_records = short_circuit(STAGE, &state.ticker);
            return state;
        }
    };

    let records: Vec<RawRecord> = stream::iter(urls)
        .map(|url| async move {
            let result = fetcher.fetch(&url).await;
            let captured_at = Utc::now();
            match result {
                Ok(text) => RawRecord::new(url, text, captured_at),
                Err(e) => {
                    warn!(url = %url, error = %e, "page fetch failed, record marked errored");
                    RawRecord::errored(url, e.to_string(), captured_at)
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    info!(
        ticker = %state.ticker,
        records = records.len(),
        errored = records.iter().filter(|r| r.is_errored()).count(),
        "scrape complete"
    );
    state.raw_records = StageOutput::Produced(records);
    state
}

// -----------------------------------------------------------------------------
// Extracted
// -----------------------------------------------------------------------------

pub fn extract(mut state: RunState) -> RunState {
    const STAGE: PipelineStage = PipelineStage::Extracted;
    if state.observations.is_settled() {
        already_written(STAGE, &state.ticker);
        return state;
    }

    let observations: Option<Vec<Observation>> = state
        .raw_records
        .non_empty()
        .map(|records| records.iter().map(extractor::extract).collect());

    state.observations = match observations {
        Some(obs) => {
            debug!(
                ticker = %state.ticker,
                priced = obs.iter().filter(|o| o.price.is_some()).count(),
                total = obs.len(),
                "observations extracted"
            );
            StageOutput::Produced(obs)
        }
        None => short_circuit(STAGE, &state.ticker),
    };
    state
}

// -----------------------------------------------------------------------------
// Profiled
// -----------------------------------------------------------------------------

/// Attach a profile to every observation with a usable price.
///
/// Comparison series are drawn from `source` sequentially in observation
/// order; only the arithmetic runs on the worker pool.  Observations without
/// a positive price get `None` and the profiler is never called for them.
pub fn profile(
    mut state: RunState,
    profiler: &StatisticalProfiler,
    source: &mut dyn SampleSource,
    pool: &WorkerPool,
) -> RunState {
    const STAGE: PipelineStage = PipelineStage::Profiled;
    if state.profiles.is_settled() {
        already_written(STAGE, &state.ticker);
        return state;
    }

    let profiles = state.observations.non_empty().map(|observations| {
        let jobs: Vec<(&Observation, Option<Vec<f64>>)> = observations
            .iter()
            .map(|obs| {
                let series = obs
                    .profilable_price()
                    .and_then(|_| profiler.draw_series(obs, &mut *source).ok());
                (obs, series)
            })
            .collect();

        pool.map(&jobs, |(obs, series)| {
            let series = series.as_ref()?;
            match profile_against(obs, series) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(url = %obs.url, error = %e, "observation could not be profiled");
                    None
                }
            }
        })
    });

    state.profiles = match profiles {
        Some(p) => StageOutput::Produced(p),
        None => short_circuit(STAGE, &state.ticker),
    };
    state
}

// -----------------------------------------------------------------------------
// Validated
// -----------------------------------------------------------------------------

/// Run the four statistical rules for every observation.
pub fn validate(mut state: RunState, thresholds: &RuleThresholds) -> RunState {
    const STAGE: PipelineStage = PipelineStage::Validated;
    if state.verdicts.is_settled() {
        already_written(STAGE, &state.ticker);
        return state;
    }

    let verdicts = match (state.observations.non_empty(), state.profiles.produced()) {
        (Some(observations), Some(profiles)) => Some(
            observations
                .iter()
                .enumerate()
                .map(|(i, obs)| {
                    let profile = profiles.get(i).and_then(Option::as_ref);
                    validation::validate(obs, profile, thresholds)
                })
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };

    state.verdicts = match verdicts {
        Some(v) => {
            info!(
                ticker = %state.ticker,
                observations = v.len(),
                clean = v.iter().filter(|v| v.all_pass()).count(),
                "statistical validation complete"
            );
            StageOutput::Produced(v)
        }
        None => short_circuit(STAGE, &state.ticker),
    };
    state
}

/// Ask the narrative generator to judge the six batch rules.
pub async fn validate_narrative(mut state: RunState, generator: &dyn NarrativeGenerator) -> RunState {
    const STAGE: PipelineStage = PipelineStage::Validated;
    if state.narrative_validation.is_settled() {
        already_written(STAGE, &state.ticker);
        return state;
    }

    let Some(payload) = state.observations.non_empty().map(narrative::build_payload) else {
        state.narrative_validation = short_circuit(STAGE, &state.ticker);
        return state;
    };

    let prompt = narrative::build_prompt(&payload);
    state.narrative_validation = match generator.generate(&prompt).await {
        Ok(reply) => {
            let result = NarrativeValidation::from_reply(payload, reply);
            info!(
                ticker = %state.ticker,
                rows = result.rows.len(),
                reply = %result.raw_text,
                "narrative validation received"
            );
            StageOutput::Produced(result)
        }
        Err(e) => {
            warn!(ticker = %state.ticker, error = %e, "narrative validation failed");
            StageOutput::Failed(e.to_string())
        }
    };
    state
}

// -----------------------------------------------------------------------------
// Reasoned
// -----------------------------------------------------------------------------

pub fn reason(mut state: RunState) -> RunState {
    const STAGE: PipelineStage = PipelineStage::Reasoned;
    if state.insights.is_settled() {
        already_written(STAGE, &state.ticker);
        return state;
    }

    let insights = state
        .verdicts
        .non_empty()
        .map(|verdicts| verdicts.iter().map(reasoner::reason).collect::<Vec<_>>());

    state.insights = match insights {
        Some(i) => {
            debug!(
                ticker = %state.ticker,
                flagged = i.iter().filter(|set| !set.is_empty()).count(),
                "insights derived"
            );
            StageOutput::Produced(i)
        }
        None => short_circuit(STAGE, &state.ticker),
    };
    state
}

// -----------------------------------------------------------------------------
// Summarized
// -----------------------------------------------------------------------------

fn summary_prompt(obs: &Observation, insights: &[String]) -> String {
    let insight_lines = if insights.is_empty() {
        "none".to_string()
    } else {
        insights.join("; ")
    };
    format!(
        "You are a financial analyst. Summarize the stock data and provide key insights.\n\
         Include a theoretical explanation of the stock's movement and key takeaways.\n\n\
         Data:\n\
         URL: {}\n\
         Ticker: {}\n\
         Price: {}\n\
         Anomaly flags: {}\n\n\
         Provide a structured response including:\n\
         - Theory behind stock movement (e.g., supply/demand, market trends, news impact)\n\
         - Summary of key financial insights\n\
         - Final takeaway message for investors\n",
        obs.url,
        obs.ticker,
        obs.display_price(),
        insight_lines
    )
}

/// One generated summary per observation. A failed record keeps its error
/// and the others are still summarised.
pub async fn summarize(mut state: RunState, generator: &dyn NarrativeGenerator, concurrency: usize) -> RunState {
    const STAGE: PipelineStage = PipelineStage::Summarized;
    if state.summaries.is_settled() {
        already_written(STAGE, &state.ticker);
        return state;
    }

    let prompts: Vec<(String, String)> =
        match (state.observations.non_empty(), state.insights.non_empty()) {
            (Some(observations), Some(insights)) => observations
                .iter()
                .enumerate()
                .map(|(i, obs)| {
                    let flags = insights.get(i).map(Vec::as_slice).unwrap_or(&[]);
                    (obs.url.clone(), summary_prompt(obs, flags))
                })
                .collect(),
            _ => {
                state.summaries = short_circuit(STAGE, &state.ticker);
                return state;
            }
        };

    let summaries: Vec<RecordSummary> = stream::iter(prompts)
        .map(|(url, prompt)| async move {
            match generator.generate(&prompt).await {
                Ok(text) => RecordSummary {
                    url,
                    summary: Some(text),
                    error: None,
                },
                Err(e) => {
                    warn!(url = %url, error = %e, "summary generation failed");
                    RecordSummary {
                        url,
                        summary: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    info!(
        ticker = %state.ticker,
        summaries = summaries.iter().filter(|s| s.summary.is_some()).count(),
        "summaries generated"
    );
    state.summaries = StageOutput::Produced(summaries);
    state
}
