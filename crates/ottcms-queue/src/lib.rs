//! Redis Streams job queue.
//!
//! This crate provides:
//! - Job enqueueing with idempotency keys
//! - Consumer-group reads and recovery of jobs left by crashed workers
//! - A dead-letter stream for failed jobs

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{track_key, ExtractFramesJob, GeneratePosterJob, QueueJob};
pub use queue::{JobQueue, QueueConfig};
