//! Structured job logging.
//!
//! Every line carries the job id and the operation so a single job can be
//! followed across the executor and the job handlers.

use tracing::{error, info, warn, Span};

use ottcms_models::JobId;
use ottcms_queue::QueueJob;

/// Job logger with `job_id` and `operation` fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
        }
    }

    /// Logger named after the queued job's kind.
    pub fn for_job(job: &QueueJob) -> Self {
        Self::new(job.job_id(), job.kind())
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, operation = self.operation, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, operation = self.operation, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, operation = self.operation, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, operation = self.operation, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, operation = self.operation, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    /// Span attached to everything a job does.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, operation = self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ottcms_models::PosterProjectId;
    use ottcms_queue::ExtractFramesJob;

    #[test]
    fn logger_carries_job_fields() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "extract_frames");
        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.operation(), "extract_frames");
    }

    #[test]
    fn logger_for_queued_job_uses_kind() {
        let job = QueueJob::ExtractFrames(ExtractFramesJob::new(PosterProjectId::new(), "raw/v.mp4", 8));
        let logger = JobLogger::for_job(&job);
        assert_eq!(logger.operation(), job.kind());
        assert_eq!(logger.job_id(), job.job_id().to_string());
    }
}
