//! Poster generation from extracted frames.

use futures::future::try_join_all;

use ottcms_models::{GenerationStatus, GenerationTrack};
use ottcms_providers::ImageData;
use ottcms_queue::GeneratePosterJob;

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Content type for a stored frame, from its extension.
pub fn frame_mime_type(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

async fn download_frames(ctx: &WorkerContext, keys: &[String]) -> WorkerResult<Vec<ImageData>> {
    let downloads = keys.iter().map(|key| async move {
        let bytes = ctx.storage.download_bytes(key).await?;
        Ok::<_, WorkerError>(ImageData {
            mime_type: frame_mime_type(key).to_string(),
            bytes,
        })
    });
    try_join_all(downloads).await
}

/// Render posters for a prompt and store them next to it.
pub async fn generate_poster(ctx: &WorkerContext, job: &GeneratePosterJob) -> WorkerResult<()> {
    let logger = JobLogger::new(&job.job_id, "generate_poster");
    logger.log_start(&format!("project {} prompt {}", job.project_id, job.prompt_id));

    let project = ctx.load_project(&job.project_id).await?;
    if project.status.poster != GenerationStatus::Generating {
        logger.log_warning(&format!("poster is {}, skipping redelivered job", project.status.poster));
        return Ok(());
    }

    let prompts = ctx.projects.prompts(&job.project_id);
    let mut prompt = prompts
        .get(&job.prompt_id)
        .await?
        .ok_or_else(|| WorkerError::job_failed(format!("prompt {} not found", job.prompt_id)))?;

    let references = download_frames(ctx, &prompt.frame_keys).await?;
    logger.log_progress(&format!("downloaded {} reference frames", references.len()));

    let images = ctx.image_gen.generate(&prompt.rendered_prompt, &references).await?;

    let mut keys = Vec::with_capacity(images.len());
    for (i, image) in images.into_iter().enumerate() {
        let key = prompt.output_key(i + 1);
        ctx.storage.upload_bytes(image.bytes, &key, &image.mime_type).await?;
        keys.push(key);
    }
    prompt.output_keys = keys;
    prompts.save(&prompt).await?;

    // Generation can take minutes; apply the result to the current document.
    let mut project = ctx.load_project(&job.project_id).await?;
    project.complete(GenerationTrack::Poster)?;
    ctx.projects.save(&project).await?;

    logger.log_completion(&format!("stored {} posters", prompt.output_keys.len()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(frame_mime_type("frames/p/1.PNG"), "image/png");
        assert_eq!(frame_mime_type("frames/p/1.webp"), "image/webp");
        assert_eq!(frame_mime_type("frames/p/1.jpg"), "image/jpeg");
        assert_eq!(frame_mime_type("frames/p/noext"), "image/jpeg");
    }
}
