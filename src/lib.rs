//! # analytics-pipeline
//!
//! Client-side analytics pipeline. Application code reports discrete
//! events through [`Analytics`]; the pipeline enriches them with session
//! and environment context, buffers them in order, and delivers them to a
//! remote sink in bounded batches with exponential-backoff retry.

pub mod config;
pub mod enrich;
pub mod environment;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod session;
pub mod sink;
pub mod telemetry;
pub mod tracker;

pub use enrich::Properties;
pub use environment::{Environment, EnvironmentSnapshot, HostEnvironment};
pub use error::{Error, Result};
pub use pipeline::{FlushOutcome, PipelineConfig, SkipReason};
pub use tracker::{Analytics, AnalyticsBuilder, DrainSummary};
