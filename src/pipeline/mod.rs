pub mod orchestrator;
pub mod parallel;
pub mod stages;
pub mod state;

pub use orchestrator::{Pipeline, PipelineSettings, SamplerFactory};
pub use state::{PipelineStage, RecordSummary, RunState, StageOutput};
