//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] ottcms_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] ottcms_firestore::FirestoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] ottcms_queue::QueueError),

    #[error("Provider error: {0}")]
    Provider(#[from] ottcms_providers::ProviderError),

    #[error(transparent)]
    Domain(#[from] ottcms_models::DomainError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
