//! Scenario Scaler
//!
//! Makes indicator values from heterogeneous scenarios comparable by
//! scaling each scenario against one reference scenario:
//! - Canonical spatial unit index
//! - Append-only scenario store with a single reference
//! - Set-based spatial alignment with coverage reporting
//! - Pluggable normalization (ratio, difference, percent change, min-max)
//! - Memoized, incremental pipeline that invalidates on reference change

pub mod alignment;
pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod scaling;
pub mod scenario;
pub mod spatial;

// Re-exports for convenience
pub use alignment::{Aligner, AlignmentResult};
pub use config::{EngineConfig, RunConfig};
pub use error::{ScalingError, ScalingResult};
pub use pipeline::{Pipeline, PipelineEvent, PipelineState, ResultKey, ScaledResults};
pub use scaling::{NormalizationRule, RuleKind, ScaleStatus, ScaledValue, ScalingEngine};
pub use scenario::{Scenario, ScenarioStore};
pub use spatial::{SpatialIndex, SpatialUnit};
