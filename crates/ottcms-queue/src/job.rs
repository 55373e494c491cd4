//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ottcms_models::{GenerationTrack, JobId, PosterProjectId, PromptId};

/// Idempotency key shared by every job on one track of a project.
pub fn track_key(track: GenerationTrack, project_id: &PosterProjectId) -> String {
    match track {
        GenerationTrack::Frames => format!("frames:{}", project_id),
        GenerationTrack::Poster => format!("poster:{}", project_id),
    }
}

/// Job to hand a video to the frame-extraction service.
///
/// The service reports back through the frames callback; the job itself
/// only covers submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractFramesJob {
    /// Unique job ID
    pub job_id: JobId,
    pub project_id: PosterProjectId,
    /// Storage key of the source video
    pub video_key: String,
    /// Number of frames to extract
    pub frame_count: u32,
    pub created_at: DateTime<Utc>,
}

impl ExtractFramesJob {
    pub fn new(project_id: PosterProjectId, video_key: impl Into<String>, frame_count: u32) -> Self {
        Self {
            job_id: JobId::new(),
            project_id,
            video_key: video_key.into(),
            frame_count,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        track_key(GenerationTrack::Frames, &self.project_id)
    }
}

/// Job to render posters for one prompt of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratePosterJob {
    /// Unique job ID
    pub job_id: JobId,
    pub project_id: PosterProjectId,
    pub prompt_id: PromptId,
    pub created_at: DateTime<Utc>,
}

impl GeneratePosterJob {
    pub fn new(project_id: PosterProjectId, prompt_id: PromptId) -> Self {
        Self {
            job_id: JobId::new(),
            project_id,
            prompt_id,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        track_key(GenerationTrack::Poster, &self.project_id)
    }
}

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    ExtractFrames(ExtractFramesJob),
    GeneratePoster(GeneratePosterJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::ExtractFrames(j) => &j.job_id,
            QueueJob::GeneratePoster(j) => &j.job_id,
        }
    }

    pub fn project_id(&self) -> &PosterProjectId {
        match self {
            QueueJob::ExtractFrames(j) => &j.project_id,
            QueueJob::GeneratePoster(j) => &j.project_id,
        }
    }

    /// Project status track this job drives.
    pub fn track(&self) -> GenerationTrack {
        match self {
            QueueJob::ExtractFrames(_) => GenerationTrack::Frames,
            QueueJob::GeneratePoster(_) => GenerationTrack::Poster,
        }
    }

    /// Short name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            QueueJob::ExtractFrames(_) => "extract_frames",
            QueueJob::GeneratePoster(_) => "generate_poster",
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::ExtractFrames(j) => j.idempotency_key(),
            QueueJob::GeneratePoster(j) => j.idempotency_key(),
        }
    }
}
