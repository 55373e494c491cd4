//! Poster projects: frame extraction, prompts and poster generation.
//!
//! Long-running work is queued; this service only moves the project's
//! frames/poster tracks into `generating` and records callback results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use ottcms_firestore::{PosterProjectRepository, RawMediaRepository};
use ottcms_models::{
    ContentType, DomainError, FramesCallback, GenerationTrack, JobId, MediaId, PageParams, Paginated,
    PosterProject, PosterProjectId, Prompt, PromptId, RawMediaStatus,
};
use ottcms_queue::{ExtractFramesJob, GeneratePosterJob, JobQueue, QueueJob};

use crate::error::{ApiError, ApiResult};
use crate::security::{sanitize_string, sanitize_title};
use crate::services::found;

pub const DEFAULT_FRAME_COUNT: u32 = 12;
pub const MAX_FRAME_COUNT: u32 = 60;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 128))]
    pub content_id: String,
    pub content_type: ContentType,
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[serde(default)]
    pub source_media_id: Option<MediaId>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExtractFramesRequest {
    /// Defaults to the storage key of the project's source media.
    #[serde(default)]
    pub video_key: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 60))]
    pub frame_count: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromptRequest {
    #[validate(length(min = 1, max = 5000))]
    pub user_input: String,
    /// Frames sent as references; defaults to every extracted frame.
    #[serde(default)]
    pub frame_keys: Vec<String>,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePosterRequest {
    pub prompt_id: PromptId,
}

/// Reply for work accepted onto the queue.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: JobId,
    pub project_id: PosterProjectId,
    pub track: &'static str,
}

fn check<T: Validate>(request: &T) -> ApiResult<()> {
    request
        .validate()
        .map_err(|e| DomainError::invalid_state(e.to_string()).into())
}

/// Resolve the frames a prompt references against the project's frames.
pub fn select_frames(project: &PosterProject, requested: Vec<String>) -> ApiResult<Vec<String>> {
    if requested.is_empty() {
        return Ok(project.frames.iter().map(|f| f.key.clone()).collect());
    }
    if let Some(unknown) = requested
        .iter()
        .find(|key| !project.frames.iter().any(|f| &f.key == *key))
    {
        return Err(DomainError::invalid_state(format!(
            "frame {unknown} does not belong to project {}",
            project.id
        ))
        .into());
    }
    Ok(requested)
}

#[derive(Clone)]
pub struct PosterService {
    projects: PosterProjectRepository,
    media: RawMediaRepository,
    queue: Arc<JobQueue>,
}

impl PosterService {
    pub fn new(projects: PosterProjectRepository, media: RawMediaRepository, queue: Arc<JobQueue>) -> Self {
        Self { projects, media, queue }
    }

    pub async fn create_project(&self, request: CreateProjectRequest) -> ApiResult<PosterProject> {
        check(&request)?;
        if let Some(media_id) = &request.source_media_id {
            found(self.media.get(media_id).await?, "media", media_id)?;
        }
        let mut project = PosterProject::new(request.content_id, request.content_type, sanitize_title(&request.title));
        project.source_media_id = request.source_media_id;
        self.projects.create(&project).await?;
        info!(project_id = %project.id, "Created poster project");
        Ok(project)
    }

    pub async fn get_project(&self, project_id: &PosterProjectId) -> ApiResult<PosterProject> {
        found(self.projects.get(project_id).await?, "poster project", project_id)
    }

    pub async fn list_projects(&self, params: &PageParams) -> ApiResult<Paginated<PosterProject>> {
        Ok(self.projects.list(params).await?)
    }

    pub async fn update_project(
        &self,
        project_id: &PosterProjectId,
        request: UpdateProjectRequest,
    ) -> ApiResult<PosterProject> {
        check(&request)?;
        let mut project = self.get_project(project_id).await?;
        project.title = sanitize_title(&request.title);
        project.updated_at = chrono::Utc::now();
        self.projects.save(&project).await?;
        Ok(project)
    }

    /// Delete a project together with its prompts.
    pub async fn delete_project(&self, project_id: &PosterProjectId) -> ApiResult<()> {
        self.get_project(project_id).await?;
        self.projects.delete(project_id).await?;
        info!(project_id = %project_id, "Deleted poster project");
        Ok(())
    }

    /// Start frame extraction in the background.
    pub async fn extract_frames(
        &self,
        project_id: &PosterProjectId,
        request: ExtractFramesRequest,
    ) -> ApiResult<JobAccepted> {
        check(&request)?;
        let mut project = self.get_project(project_id).await?;

        let video_key = match request.video_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
            Some(key) if key.contains("..") => {
                return Err(DomainError::invalid_state(format!("invalid video key {key}")).into())
            }
            Some(key) => key,
            None => {
                let media_id = project.source_media_id.clone().ok_or_else(|| {
                    DomainError::invalid_state(format!("project {} has no source media", project.id))
                })?;
                let media = found(self.media.get(&media_id).await?, "media", &media_id)?;
                if !media.status.is_uploaded() {
                    return Err(DomainError::invalid_state(format!("media {} is {}", media.id, media.status)).into());
                }
                media.storage_key
            }
        };
        let frame_count = request.frame_count.unwrap_or(DEFAULT_FRAME_COUNT).min(MAX_FRAME_COUNT);

        project.start(GenerationTrack::Frames)?;
        self.projects.save(&project).await?;

        let job = ExtractFramesJob::new(project.id.clone(), video_key, frame_count);
        let job_id = job.job_id.clone();
        self.enqueue_or_fail(&mut project, QueueJob::ExtractFrames(job)).await?;
        self.mark_source_media(&project, RawMediaStatus::FrameGenerationStarted, None).await;

        Ok(JobAccepted {
            job_id,
            project_id: project.id,
            track: GenerationTrack::Frames.as_str(),
        })
    }

    /// Record the extraction service's result.
    pub async fn frames_callback(
        &self,
        project_id: &PosterProjectId,
        callback: FramesCallback,
    ) -> ApiResult<PosterProject> {
        let mut project = self.get_project(project_id).await?;
        if project.status.frames != ottcms_models::GenerationStatus::Generating {
            return Err(DomainError::invalid_state(format!(
                "project {} is not extracting frames (frames: {})",
                project.id, project.status.frames
            ))
            .into());
        }

        match callback {
            FramesCallback::Completed { frames } => {
                info!(project_id = %project.id, frames = frames.len(), "Frame extraction completed");
                project.frames = frames;
                project.complete(GenerationTrack::Frames)?;
                self.projects.save(&project).await?;
                self.mark_source_media(&project, RawMediaStatus::FrameGenerationCompleted, None).await;
            }
            FramesCallback::Failed { error } => {
                warn!(project_id = %project.id, error = %error, "Frame extraction failed");
                project.fail(GenerationTrack::Frames, error.clone())?;
                self.projects.save(&project).await?;
                self.mark_source_media(&project, RawMediaStatus::FrameGenerationFailed, Some(error)).await;
            }
        }

        if let Err(e) = self.queue.release_track(GenerationTrack::Frames, &project.id).await {
            warn!(project_id = %project.id, error = %e, "Failed to release frames track");
        }
        Ok(project)
    }

    pub async fn create_prompt(&self, project_id: &PosterProjectId, request: CreatePromptRequest) -> ApiResult<Prompt> {
        check(&request)?;
        let project = self.get_project(project_id).await?;
        let frame_keys = select_frames(&project, request.frame_keys)?;
        let prompts = self.projects.prompts(&project.id);
        let latest = prompts.latest_version().await?;
        let style = request.style.map(|s| sanitize_title(&s)).filter(|s| !s.is_empty());
        let prompt = Prompt::next(&project, latest, sanitize_string(&request.user_input), frame_keys, style);
        prompts.create(&prompt).await?;
        info!(project_id = %project.id, prompt_id = %prompt.id, version = prompt.version, "Created prompt");
        Ok(prompt)
    }

    pub async fn list_prompts(&self, project_id: &PosterProjectId) -> ApiResult<Vec<Prompt>> {
        self.get_project(project_id).await?;
        Ok(self.projects.prompts(project_id).list().await?)
    }

    /// Start poster generation for one prompt in the background.
    pub async fn generate_poster(
        &self,
        project_id: &PosterProjectId,
        request: GeneratePosterRequest,
    ) -> ApiResult<JobAccepted> {
        let mut project = self.get_project(project_id).await?;
        let prompt = found(
            self.projects.prompts(&project.id).get(&request.prompt_id).await?,
            "prompt",
            &request.prompt_id,
        )?;

        project.start(GenerationTrack::Poster)?;
        self.projects.save(&project).await?;

        let job = GeneratePosterJob::new(project.id.clone(), prompt.id);
        let job_id = job.job_id.clone();
        self.enqueue_or_fail(&mut project, QueueJob::GeneratePoster(job)).await?;

        Ok(JobAccepted {
            job_id,
            project_id: project.id,
            track: GenerationTrack::Poster.as_str(),
        })
    }

    /// Enqueue, or record the failure on the project's track.
    async fn enqueue_or_fail(&self, project: &mut PosterProject, job: QueueJob) -> ApiResult<()> {
        let track = job.track();
        match self.queue.enqueue(job).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = ApiError::from(e);
                project.fail(track, err.to_string())?;
                self.projects.save(project).await?;
                Err(err)
            }
        }
    }

    async fn mark_source_media(&self, project: &PosterProject, status: RawMediaStatus, note: Option<String>) {
        let Some(media_id) = &project.source_media_id else {
            return;
        };
        let result = async {
            if let Some(mut media) = self.media.get(media_id).await? {
                if media.try_transition(status, note) {
                    self.media.save(&media).await?;
                }
            }
            Ok::<_, ottcms_firestore::FirestoreError>(())
        }
        .await;
        if let Err(e) = result {
            warn!(media_id = %media_id, error = %e, "Failed to update source media status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ottcms_models::ExtractedFrame;

    fn project_with_frames() -> PosterProject {
        let mut project = PosterProject::new("ep-1", ContentType::Episode, "Pilot");
        project.frames = vec![
            ExtractedFrame {
                key: "frames/p/1.jpg".into(),
                timestamp_ms: 1000,
            },
            ExtractedFrame {
                key: "frames/p/2.jpg".into(),
                timestamp_ms: 2000,
            },
        ];
        project
    }

    #[test]
    fn project_request_is_camel_case() {
        let request: CreateProjectRequest = serde_json::from_value(serde_json::json!({
            "contentId": "ep-1",
            "contentType": "episode",
            "title": "Pilot",
            "sourceMediaId": "m-1"
        }))
        .unwrap();
        assert_eq!(request.content_id, "ep-1");
        assert_eq!(request.source_media_id.map(|m| m.to_string()), Some("m-1".to_string()));

        let accepted = JobAccepted {
            job_id: JobId::from("j-1"),
            project_id: PosterProjectId::from("p-1"),
            track: "frames",
        };
        let json = serde_json::to_value(&accepted).unwrap();
        assert_eq!(json["jobId"], "j-1");
        assert_eq!(json["projectId"], "p-1");
    }

    #[test]
    fn empty_selection_uses_every_frame() {
        let keys = select_frames(&project_with_frames(), vec![]).unwrap();
        assert_eq!(keys, vec!["frames/p/1.jpg", "frames/p/2.jpg"]);
    }

    #[test]
    fn unknown_frames_are_rejected() {
        let project = project_with_frames();
        assert!(select_frames(&project, vec!["frames/p/2.jpg".into()]).is_ok());
        let err = select_frames(&project, vec!["frames/other/9.jpg".into()]).unwrap_err();
        assert_eq!(err.code(), ottcms_models::ErrorCode::InvalidState);
    }

    #[test]
    fn frame_count_is_bounded() {
        let request = ExtractFramesRequest {
            video_key: None,
            frame_count: Some(500),
        };
        assert!(check(&request).is_err());
        assert!(check(&ExtractFramesRequest::default()).is_ok());
    }
}
