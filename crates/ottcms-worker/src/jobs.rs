//! Job handlers.

pub mod frames;
pub mod poster;

use tracing::warn;

use ottcms_models::{GenerationStatus, RawMediaStatus};
use ottcms_queue::QueueJob;

use crate::context::WorkerContext;
use crate::error::WorkerResult;

/// Run a job to completion.
pub async fn process_job(ctx: &WorkerContext, job: &QueueJob) -> WorkerResult<()> {
    match job {
        QueueJob::ExtractFrames(j) => frames::submit_extraction(ctx, j).await,
        QueueJob::GeneratePoster(j) => poster::generate_poster(ctx, j).await,
    }
}

/// Whether the job's track is finished once the handler returns.
///
/// Frame extraction only ends when the service calls back, so its track
/// stays claimed after a successful submission.
pub fn finishes_track(job: &QueueJob) -> bool {
    matches!(job, QueueJob::GeneratePoster(_))
}

/// Record a handler failure on the project's track.
///
/// A project that already left `generating` is left untouched.
pub async fn record_failure(ctx: &WorkerContext, job: &QueueJob, error: &str) -> WorkerResult<()> {
    let track = job.track();
    let mut project = ctx.load_project(job.project_id()).await?;
    if project.status.get(track) != GenerationStatus::Generating {
        return Ok(());
    }
    project.fail(track, error)?;
    ctx.projects.save(&project).await?;

    if let (QueueJob::ExtractFrames(_), Some(media_id)) = (job, &project.source_media_id) {
        let result: WorkerResult<()> = async {
            if let Some(mut media) = ctx.media.get(media_id).await? {
                if media.try_transition(RawMediaStatus::FrameGenerationFailed, Some(error.to_string())) {
                    ctx.media.save(&media).await?;
                }
            }
            Ok(())
        }
        .await;
        if let Err(e) = result {
            warn!(media_id = %media_id, error = %e, "Failed to mark frame generation failure on media");
        }
    }
    Ok(())
}
