//! Poster projects, extracted frames and generation prompts.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error_code::{DomainError, DomainResult};
use crate::ids::{MediaId, PosterProjectId, PromptId};
use crate::transcoding::ContentType;

/// State of one background generation track (frames or poster).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Generating,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Idle => "idle",
            GenerationStatus::Generating => "generating",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }

    /// Every path to a terminal state goes through `Generating`.
    pub fn can_transition_to(&self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (Idle | Completed | Failed, Generating) | (Generating, Completed | Failed)
        )
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which generation track an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationTrack {
    Frames,
    Poster,
}

impl GenerationTrack {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationTrack::Frames => "frames",
            GenerationTrack::Poster => "poster",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct PosterStatus {
    pub frames: GenerationStatus,
    pub poster: GenerationStatus,
}

impl PosterStatus {
    pub fn get(&self, track: GenerationTrack) -> GenerationStatus {
        match track {
            GenerationTrack::Frames => self.frames,
            GenerationTrack::Poster => self.poster,
        }
    }

    fn slot(&mut self, track: GenerationTrack) -> &mut GenerationStatus {
        match track {
            GenerationTrack::Frames => &mut self.frames,
            GenerationTrack::Poster => &mut self.poster,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedFrame {
    pub key: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PosterProject {
    pub id: PosterProjectId,
    pub content_id: String,
    pub content_type: ContentType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_media_id: Option<MediaId>,
    #[serde(default)]
    pub frames: Vec<ExtractedFrame>,
    #[serde(default)]
    pub status: PosterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PosterProject {
    pub fn new(content_id: impl Into<String>, content_type: ContentType, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PosterProjectId::new(),
            content_id: content_id.into(),
            content_type,
            title: title.into(),
            source_media_id: None,
            frames: Vec::new(),
            status: PosterStatus::default(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Enter `generating` on a track, rejecting concurrent runs.
    pub fn start(&mut self, track: GenerationTrack) -> DomainResult<()> {
        let current = self.status.get(track);
        if current == GenerationStatus::Generating {
            return Err(DomainError::already_generating(format!(
                "{} generation already running for project {}",
                track.as_str(),
                self.id
            )));
        }
        self.set(track, GenerationStatus::Generating)
    }

    pub fn complete(&mut self, track: GenerationTrack) -> DomainResult<()> {
        self.set(track, GenerationStatus::Completed)?;
        self.last_error = None;
        Ok(())
    }

    pub fn fail(&mut self, track: GenerationTrack, error: impl Into<String>) -> DomainResult<()> {
        self.set(track, GenerationStatus::Failed)?;
        self.last_error = Some(error.into());
        Ok(())
    }

    fn set(&mut self, track: GenerationTrack, next: GenerationStatus) -> DomainResult<()> {
        let slot = self.status.slot(track);
        if !slot.can_transition_to(next) {
            return Err(DomainError::invalid_state(format!(
                "{} status cannot move from {} to {}",
                track.as_str(),
                slot,
                next
            )));
        }
        *slot = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Result reported by the frame-extraction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FramesCallback {
    Completed { frames: Vec<ExtractedFrame> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Prompt {
    pub id: PromptId,
    pub project_id: PosterProjectId,
    pub version: u32,
    pub user_input: String,
    #[serde(default)]
    pub frame_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub rendered_prompt: String,
    pub output_prefix: String,
    #[serde(default)]
    pub output_keys: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Prompt {
    /// Build the next prompt version for a project.
    ///
    /// `latest_version` is the highest existing version, if any.
    pub fn next(
        project: &PosterProject,
        latest_version: Option<u32>,
        user_input: impl Into<String>,
        frame_keys: Vec<String>,
        style: Option<String>,
    ) -> Self {
        let id = PromptId::new();
        let user_input = user_input.into();
        let rendered_prompt = render_poster_prompt(&project.title, &user_input, style.as_deref());
        Self {
            output_prefix: poster_prefix(project.id.as_str(), id.as_str()),
            id,
            project_id: project.id.clone(),
            version: latest_version.unwrap_or(0) + 1,
            user_input,
            frame_keys,
            style,
            rendered_prompt,
            output_keys: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Storage key for the n-th generated image (1-based).
    pub fn output_key(&self, n: usize) -> String {
        format!("{}{}.png", self.output_prefix, n)
    }
}

pub fn poster_prefix(project_id: &str, prompt_id: &str) -> String {
    format!("posters/{project_id}/{prompt_id}/")
}

const POSTER_TEMPLATE: &str = "Design a vertical streaming-platform poster for \"{title}\". \
Use the attached frames as visual reference for characters and setting. \
Keep faces recognisable, leave space at the top for the title treatment and avoid \
adding any text other than the title. {style}Creative direction: {input}";

pub fn render_poster_prompt(title: &str, user_input: &str, style: Option<&str>) -> String {
    let style = match style.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => format!("Visual style: {s}. "),
        None => String::new(),
    };
    POSTER_TEMPLATE
        .replace("{title}", title.trim())
        .replace("{style}", &style)
        .replace("{input}", user_input.trim())
}
