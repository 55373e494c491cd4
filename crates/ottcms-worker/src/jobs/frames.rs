//! Frame-extraction dispatch.

use ottcms_models::{GenerationStatus, PosterProjectId};
use ottcms_providers::ExtractionRequest;
use ottcms_queue::ExtractFramesJob;

use crate::context::WorkerContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;

/// Storage prefix the extraction service writes frames under.
pub fn frames_prefix(project_id: &PosterProjectId) -> String {
    format!("frames/{}/", project_id)
}

/// Hand the video to the extraction service.
///
/// Results arrive later on the frames callback.
pub async fn submit_extraction(ctx: &WorkerContext, job: &ExtractFramesJob) -> WorkerResult<()> {
    let logger = JobLogger::new(&job.job_id, "extract_frames");
    logger.log_start(&format!("project {} video {}", job.project_id, job.video_key));

    let project = ctx.load_project(&job.project_id).await?;
    if project.status.frames != GenerationStatus::Generating {
        logger.log_warning(&format!("frames are {}, skipping redelivered job", project.status.frames));
        return Ok(());
    }

    let video_url = ctx.storage.presign_get(&job.video_key, ctx.config.presign_ttl).await?;
    let request = ExtractionRequest {
        project_id: job.project_id.to_string(),
        video_url,
        frame_count: job.frame_count,
        output_prefix: frames_prefix(&job.project_id),
        callback_url: ctx.config.frames_callback_url(&job.project_id),
        callback_secret: ctx.config.webhook_secret.clone(),
    };

    let task_id = ctx.extractor.submit(&request).await?;
    logger.log_completion(&format!("submitted extraction task {}", task_id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_per_project() {
        assert_eq!(frames_prefix(&PosterProjectId::from("p1")), "frames/p1/");
    }
}
