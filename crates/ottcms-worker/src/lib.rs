//! Queue worker for the OTT CMS.
//!
//! This crate provides:
//! - Job executor consuming the Redis Streams queue
//! - Frame-extraction dispatch to the extraction service
//! - Poster generation from extracted frames
//! - Graceful shutdown

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod logging;

pub use config::WorkerConfig;
pub use context::WorkerContext;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
