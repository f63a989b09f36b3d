// =============================================================================
// Runtime Configuration — pipeline settings with atomic save
// =============================================================================
//
// Every tunable of the price sentry lives here: fan-out limits, profiler and
// rule thresholds, HTTP client settings and the narrative generator
// deployment.  Secrets (the generator API key) are never stored in the file;
// they come from the environment only.
//
// The file is written once, with defaults, when it does not exist yet; after
// that it belongs to the operator.  Environment overrides are applied to the
// in-memory copy only and never reach the file.  Writes use an atomic
// tmp + rename pattern to prevent corruption on crash.  All fields carry
// `#[serde(default)]` so that adding new fields never breaks loading an
// older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collaborators::bing::DEFAULT_SEARCH_URL;
use crate::collaborators::chat::LlmSettings;
use crate::pipeline::PipelineSettings;
use crate::stats::ProfilerSettings;
use crate::validation::RuleThresholds;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "sentry_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_search_limit() -> usize {
    5
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_worker_limit() -> usize {
    4
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_search_base_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

// =============================================================================
// HttpSettings
// =============================================================================

/// Settings for the shared HTTP client used by search and page fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Search URL prefix; the query is appended.
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            search_base_url: default_search_base_url(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Fan-out -------------------------------------------------------------

    /// Maximum search results requested per run.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Concurrent page fetches and summary generations.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Threads used for per-observation statistics.
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,

    // --- Statistics ----------------------------------------------------------

    /// Seed for the comparison-series sampler. `None` seeds from entropy.
    #[serde(default)]
    pub sampler_seed: Option<u64>,

    #[serde(default)]
    pub profiler: ProfilerSettings,

    #[serde(default)]
    pub thresholds: RuleThresholds,

    // --- Collaborators -------------------------------------------------------

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub llm: LlmSettings,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            fetch_concurrency: default_fetch_concurrency(),
            worker_limit: default_worker_limit(),
            sampler_seed: None,
            profiler: ProfilerSettings::default(),
            thresholds: RuleThresholds::default(),
            http: HttpSettings::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            search_limit = config.search_limit,
            worker_limit = config.worker_limit,
            seeded = config.sampler_seed.is_some(),
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Load `path`, or write the defaults there first if it does not exist.
    ///
    /// Call before [`RuntimeConfig::apply_overrides`] so the seeded file
    /// holds only file-level settings.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        let config = Self::default();
        config.save(path)?;
        info!(path = %path.display(), "no runtime config found, wrote defaults");
        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `SENTRY_*` overrides. `lookup` is `std::env::var(..).ok()` in
    /// production.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("SENTRY_SAMPLER_SEED") {
            match raw.trim().parse::<u64>() {
                Ok(seed) => self.sampler_seed = Some(seed),
                Err(e) => warn!(value = %raw, error = %e, "ignoring invalid SENTRY_SAMPLER_SEED"),
            }
        }
        if let Some(endpoint) = lookup("SENTRY_LLM_ENDPOINT").filter(|s| !s.trim().is_empty()) {
            self.llm.endpoint = endpoint;
        }
    }

    /// The subset of settings the pipeline needs.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            search_limit: self.search_limit,
            fetch_concurrency: self.fetch_concurrency.max(1),
            worker_limit: self.worker_limit.max(1),
            profiler: self.profiler.clone(),
            thresholds: self.thresholds.clone(),
        }
    }
}
