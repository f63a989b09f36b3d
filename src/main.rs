// =============================================================================
// Price Sentry — Main Entry Point
// =============================================================================
//
// Two modes:
//   - SENTRY_TICKER set: run one analysis, print the RunState as JSON, exit.
//   - otherwise: serve the REST API until Ctrl+C.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod collaborators;
mod extractor;
mod pipeline;
mod reasoner;
mod run_envelope;
mod runtime_config;
mod stats;
mod types;
mod validation;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::collaborators::{build_http_client, BingSearch, ChatCompletionsGenerator, HttpPageFetcher};
use crate::pipeline::{Pipeline, SamplerFactory};
use crate::runtime_config::{RuntimeConfig, DEFAULT_CONFIG_PATH};
use crate::stats::{SampleSource, UniformBandSampler};

/// Wire the production collaborators into a pipeline.
fn build_pipeline(config: &RuntimeConfig) -> anyhow::Result<Pipeline> {
    let client = build_http_client(&config.http.user_agent, config.http.timeout_secs)?;

    let api_key = std::env::var("SENTRY_LLM_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        warn!("SENTRY_LLM_API_KEY not set, narrative validation and summaries will fail");
    }

    let search = BingSearch::new(client.clone(), config.http.search_base_url.clone());
    let fetcher = HttpPageFetcher::new(client.clone());
    let generator = ChatCompletionsGenerator::new(client, config.llm.clone(), api_key);

    let (band_pct, seed) = (config.profiler.band_pct, config.sampler_seed);
    let sampler_factory: SamplerFactory =
        Arc::new(move || Box::new(UniformBandSampler::new(band_pct, seed)) as Box<dyn SampleSource>);

    Ok(Pipeline::new(
        Arc::new(search),
        Arc::new(fetcher),
        Arc::new(generator),
        sampler_factory,
        config.pipeline_settings(),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var("SENTRY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = RuntimeConfig::load_or_init(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_overrides(|key| std::env::var(key).ok());

    info!(
        search_limit = config.search_limit,
        fetch_concurrency = config.fetch_concurrency,
        worker_limit = config.worker_limit,
        seeded = config.sampler_seed.is_some(),
        "Price Sentry starting"
    );

    // ── 2. Pipeline ──────────────────────────────────────────────────────
    let pipeline = Arc::new(build_pipeline(&config)?);

    // ── 3. One-shot mode ─────────────────────────────────────────────────
    if let Some(ticker) = std::env::var("SENTRY_TICKER")
        .ok()
        .filter(|t| !t.trim().is_empty())
    {
        let run = pipeline.run(ticker.trim()).await;
        let json = serde_json::to_string_pretty(&run).context("failed to serialise run state")?;
        println!("{json}");
        return Ok(());
    }

    // ── 4. API server ────────────────────────────────────────────────────
    let state = Arc::new(AppState::new(config, pipeline));
    let bind_addr = std::env::var("SENTRY_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening. Press Ctrl+C to stop.");

    axum::serve(listener, api::rest::router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received — stopping gracefully");
        })
        .await
        .context("API server failed")?;

    info!("Price Sentry shut down complete.");
    Ok(())
}
