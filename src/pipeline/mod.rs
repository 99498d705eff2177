// Station pipeline: ingestion, processing, and the sequential driver

pub mod ingestion;
pub mod processing;
pub mod runner;

// Re-export key types from each stage
pub use ingestion::InputSource;
pub use runner::{Pipeline, PipelineResult};
