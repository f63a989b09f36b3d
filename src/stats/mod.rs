// =============================================================================
// Statistics Module
// =============================================================================
//
// Pure descriptive statistics plus the profiler that attaches them to a price
// observation.  The comparison series is supplied through `SampleSource` so
// the math never depends on where the series came from.

pub mod descriptive;
pub mod profiler;
pub mod sampler;

pub use profiler::{profile_against, ProfileError, ProfilerSettings, StatisticalProfiler};
pub use sampler::{FixedSeries, SampleSource, UniformBandSampler};
