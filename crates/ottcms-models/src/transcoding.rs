//! Transcoding task records and output path templates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error_code::{DomainError, DomainResult};

/// Kind of content a raw media file is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Episode,
    Movie,
    Reel,
    ShowPeripheral,
    EpisodeTeaser,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Episode => "episode",
            ContentType::Movie => "movie",
            ContentType::Reel => "reel",
            ContentType::ShowPeripheral => "show_peripheral",
            ContentType::EpisodeTeaser => "episode_teaser",
        }
    }

    /// Whether output paths for this type are nested under a show.
    pub fn requires_show(&self) -> bool {
        matches!(
            self,
            ContentType::Episode | ContentType::ShowPeripheral | ContentType::EpisodeTeaser
        )
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference from a raw media file to the content entity it belongs to.
///
/// Stored snake_case inside media documents; request bodies may send the
/// camelCase names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContentRef {
    #[serde(alias = "contentType")]
    pub content_type: ContentType,
    #[serde(alias = "contentId")]
    pub content_id: String,
    #[serde(default, alias = "showId", skip_serializing_if = "Option::is_none")]
    pub show_id: Option<String>,
}

impl ContentRef {
    pub fn new(content_type: ContentType, content_id: impl Into<String>) -> Self {
        Self {
            content_type,
            content_id: content_id.into(),
            show_id: None,
        }
    }

    pub fn with_show(mut self, show_id: impl Into<String>) -> Self {
        self.show_id = Some(show_id.into());
        self
    }

    /// Output directory for one codec rendition of this content.
    ///
    /// `base` is the configured output root; a trailing slash is tolerated.
    pub fn output_path(&self, base: &str, task_type: TaskType) -> DomainResult<String> {
        let base = base.trim_end_matches('/');
        let codec = task_type.as_str();
        let content_id = self.content_id.as_str();
        if content_id.is_empty() {
            return Err(DomainError::invalid_state("content id is required"));
        }

        let show_id = if self.content_type.requires_show() {
            match self.show_id.as_deref() {
                Some(id) if !id.is_empty() => id,
                _ => {
                    return Err(DomainError::invalid_state(format!(
                        "{} content requires a show id",
                        self.content_type
                    )))
                }
            }
        } else {
            ""
        };

        let path = match self.content_type {
            ContentType::Episode => {
                format!("{base}/shows/{show_id}/episodes/{content_id}/{codec}/")
            }
            ContentType::Movie => format!("{base}/movies/{content_id}/{codec}/"),
            ContentType::Reel => format!("{base}/reels/{content_id}/{codec}/"),
            ContentType::ShowPeripheral => {
                format!("{base}/shows/{show_id}/peripherals/{content_id}/{codec}/")
            }
            ContentType::EpisodeTeaser => {
                format!("{base}/shows/{show_id}/episodes/{content_id}/teaser/{codec}/")
            }
        };
        Ok(path)
    }
}

/// Which system executes a transcoding task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeEngine {
    HlsProvider,
    MediaConvert,
}

/// Output rendition produced by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    H264,
    H265,
    Mp4,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::H264 => "h264",
            TaskType::H265 => "h265",
            TaskType::Mp4 => "mp4",
        }
    }

    pub fn engine(&self) -> TranscodeEngine {
        match self {
            TaskType::H264 | TaskType::H265 => TranscodeEngine::HlsProvider,
            TaskType::Mp4 => TranscodeEngine::MediaConvert,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Submitted,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Submitted => "submitted",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One submitted transcoding job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscodingTask {
    pub engine: TranscodeEngine,
    pub task_type: TaskType,
    /// Identifier assigned by the engine; absent when submission failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    pub output_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscodingTask {
    pub fn submitted(task_type: TaskType, external_id: impl Into<String>, output_path: impl Into<String>) -> Self {
        Self {
            engine: task_type.engine(),
            task_type,
            external_id: Some(external_id.into()),
            status: TaskStatus::Submitted,
            output_path: output_path.into(),
            error: None,
        }
    }

    pub fn failed(task_type: TaskType, output_path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            engine: task_type.engine(),
            task_type,
            external_id: None,
            status: TaskStatus::Failed,
            output_path: output_path.into(),
            error: Some(error.into()),
        }
    }
}

/// Aggregate outcome of the HLS renditions, ignoring MP4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HlsOutcome {
    Pending,
    Completed,
    Failed,
}

/// Summarize HLS task progress. An empty HLS set is still pending.
pub fn hls_outcome(tasks: &[TranscodingTask]) -> HlsOutcome {
    let hls: Vec<_> = tasks
        .iter()
        .filter(|t| t.engine == TranscodeEngine::HlsProvider)
        .collect();
    if hls.iter().any(|t| t.status == TaskStatus::Failed) {
        HlsOutcome::Failed
    } else if !hls.is_empty() && hls.iter().all(|t| t.status == TaskStatus::Completed) {
        HlsOutcome::Completed
    } else {
        HlsOutcome::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_ref_accepts_both_casings_and_stores_snake_case() {
        let camel: ContentRef = serde_json::from_value(serde_json::json!({
            "contentType": "episode", "contentId": "ep1", "showId": "show9"
        }))
        .unwrap();
        let snake: ContentRef = serde_json::from_value(serde_json::json!({
            "content_type": "episode", "content_id": "ep1", "show_id": "show9"
        }))
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(serde_json::to_value(&camel).unwrap()["content_id"], "ep1");
    }

    #[test]
    fn episode_paths_nest_under_show() {
        let c = ContentRef::new(ContentType::Episode, "ep1").with_show("show9");
        assert_eq!(
            c.output_path("s3://out/", TaskType::H264).unwrap(),
            "s3://out/shows/show9/episodes/ep1/h264/"
        );
        let teaser = ContentRef::new(ContentType::EpisodeTeaser, "ep1").with_show("show9");
        assert_eq!(
            teaser.output_path("s3://out", TaskType::H265).unwrap(),
            "s3://out/shows/show9/episodes/ep1/teaser/h265/"
        );
        let peripheral = ContentRef::new(ContentType::ShowPeripheral, "trailer").with_show("show9");
        assert_eq!(
            peripheral.output_path("s3://out", TaskType::Mp4).unwrap(),
            "s3://out/shows/show9/peripherals/trailer/mp4/"
        );
    }

    #[test]
    fn movies_and_reels_have_flat_paths() {
        let movie = ContentRef::new(ContentType::Movie, "m1");
        assert_eq!(movie.output_path("base", TaskType::Mp4).unwrap(), "base/movies/m1/mp4/");
        let reel = ContentRef::new(ContentType::Reel, "r1");
        assert_eq!(reel.output_path("base", TaskType::H264).unwrap(), "base/reels/r1/h264/");
    }

    #[test]
    fn show_scoped_types_require_show_id() {
        let c = ContentRef::new(ContentType::Episode, "ep1");
        let err = c.output_path("base", TaskType::H264).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::InvalidState);
    }

    #[test]
    fn mp4_does_not_affect_hls_outcome() {
        let mut h264 = TranscodingTask::submitted(TaskType::H264, "a", "p");
        let mut h265 = TranscodingTask::submitted(TaskType::H265, "b", "p");
        let mp4 = TranscodingTask::failed(TaskType::Mp4, "p", "boom");
        assert_eq!(hls_outcome(&[h264.clone(), h265.clone(), mp4.clone()]), HlsOutcome::Pending);

        h264.status = TaskStatus::Completed;
        h265.status = TaskStatus::Completed;
        assert_eq!(hls_outcome(&[h264.clone(), h265.clone(), mp4]), HlsOutcome::Completed);

        h265.status = TaskStatus::Failed;
        assert_eq!(hls_outcome(&[h264, h265]), HlsOutcome::Failed);
    }
}
