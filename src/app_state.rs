// =============================================================================
// Central Application State — Price Sentry
// =============================================================================
//
// Ties together the runtime configuration, the shared pipeline and the audit
// trail of recent runs and errors, and provides a serialisable snapshot for
// the REST API.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
//   - The runtime config is read-only after startup.
//   - The pipeline holds no per-run mutable state.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::pipeline::{Pipeline, RunState};
use crate::run_envelope::RunEnvelope;
use crate::runtime_config::RuntimeConfig;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Ticker of the run that produced the error, if any.
    pub ticker: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;
/// Maximum number of recent runs to retain.
const MAX_RECENT_RUNS: usize = 100;

/// Shared across all request handlers via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, bumped on every recorded
    /// run or error.
    pub state_version: AtomicU64,

    /// Effective config, environment overrides included.
    pub runtime_config: RuntimeConfig,

    pub pipeline: Arc<Pipeline>,

    pub recent_runs: RwLock<Vec<RunEnvelope>>,
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the service was started. Used for uptime.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, pipeline: Arc<Pipeline>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: config,
            pipeline,
            recent_runs: RwLock::new(Vec::new()),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted when the limit is
    /// reached.
    pub fn push_error(&self, msg: String, ticker: Option<String>) {
        let record = ErrorRecord {
            message: msg,
            ticker,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Run Audit ───────────────────────────────────────────────────────

    /// Record a finished run: its envelope goes into the run log and every
    /// collaborator failure into the error log.
    pub fn record_run(&self, state: &RunState) -> RunEnvelope {
        let envelope = RunEnvelope::from_state(state);

        for failure in &envelope.failures {
            self.push_error(failure.clone(), Some(envelope.ticker.clone()));
        }

        let mut runs = self.recent_runs.write();
        runs.push(envelope.clone());
        while runs.len() > MAX_RECENT_RUNS {
            runs.remove(0);
        }
        drop(runs);

        self.increment_version();
        envelope
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    pub fn build_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            recent_runs: self.recent_runs.read().clone(),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

/// Serialisable view of the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub recent_runs: Vec<RunEnvelope>,
    pub recent_errors: Vec<ErrorRecord>,
}
