// Pipeline orchestration: sequences extraction, weighting and aggregation
// for one thread and time window.

pub mod network;

pub use network::{run, run_from_database, PipelineOptions, PipelineOutput};
