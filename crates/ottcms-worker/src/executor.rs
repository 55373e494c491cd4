//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use ottcms_queue::{JobQueue, QueueJob};

use crate::config::WorkerConfig;
use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::jobs::{finishes_track, process_job, record_failure};
use crate::logging::JobLogger;

/// Jobs read from the stream per poll.
const MAX_BATCH: usize = 5;
/// How long a poll blocks on an empty stream.
const BLOCK_MS: u64 = 1000;

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    ctx: Arc<WorkerContext>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(queue: JobQueue, ctx: WorkerContext) -> Self {
        let config = ctx.config.clone();
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            ctx: Arc::new(ctx),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Consume jobs until shutdown is signalled.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = tokio::spawn(Self::claim_loop(
            Arc::clone(&self.queue),
            Arc::clone(&self.ctx),
            Arc::clone(&self.job_semaphore),
            self.consumer_name.clone(),
            self.shutdown.subscribe(),
        ));

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!("Shutdown timeout reached with jobs still running");
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Periodically take over jobs left pending by crashed workers.
    async fn claim_loop(
        queue: Arc<JobQueue>,
        ctx: Arc<WorkerContext>,
        semaphore: Arc<Semaphore>,
        consumer_name: String,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let min_idle_ms = ctx.config.claim_min_idle.as_millis() as u64;
        let mut interval = tokio::time::interval(ctx.config.claim_interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let jobs = match queue.claim_pending(&consumer_name, min_idle_ms, MAX_BATCH).await {
                        Ok(jobs) => jobs,
                        Err(e) => {
                            warn!("Failed to claim pending jobs: {}", e);
                            continue;
                        }
                    };
                    if !jobs.is_empty() {
                        info!("Claimed {} pending jobs", jobs.len());
                    }
                    for (message_id, job) in jobs {
                        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                            break;
                        };
                        let ctx = Arc::clone(&ctx);
                        let queue = Arc::clone(&queue);
                        tokio::spawn(async move {
                            let _permit = permit;
                            Self::execute_job(ctx, queue, message_id, job).await;
                        });
                    }
                }
            }
        }
    }

    /// Consume and process jobs from the queue.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, BLOCK_MS, available.min(MAX_BATCH))
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            let ctx = Arc::clone(&self.ctx);
            let queue = Arc::clone(&self.queue);
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(ctx, queue, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Execute a single job. Failures are terminal: the project records the
    /// error and the message moves to the DLQ.
    async fn execute_job(ctx: Arc<WorkerContext>, queue: Arc<JobQueue>, message_id: String, job: QueueJob) {
        let logger = JobLogger::for_job(&job);
        let span = logger.create_span();

        async {
            match process_job(&ctx, &job).await {
                Ok(()) => {
                    counter!("ottcms_jobs_completed_total", "type" => job.kind()).increment(1);
                    if let Err(e) = queue.ack(&message_id).await {
                        logger.log_error(&format!("failed to ack: {}", e));
                    }
                    if finishes_track(&job) {
                        if let Err(e) = queue.clear_dedup(&job).await {
                            logger.log_warning(&format!("failed to clear dedup key: {}", e));
                        }
                    }
                }
                Err(e) => {
                    counter!("ottcms_jobs_failed_total", "type" => job.kind()).increment(1);
                    let message = e.to_string();
                    logger.log_error(&message);

                    if let Err(record_err) = record_failure(&ctx, &job, &message).await {
                        logger.log_error(&format!("failed to record failure on project: {}", record_err));
                    }
                    if let Err(dlq_err) = queue.dlq(&message_id, &job, &message).await {
                        logger.log_error(&format!("failed to move to DLQ: {}", dlq_err));
                    }
                    if let Err(e) = queue.clear_dedup(&job).await {
                        logger.log_warning(&format!("failed to clear dedup key: {}", e));
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        while self.job_semaphore.available_permits() < self.config.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
