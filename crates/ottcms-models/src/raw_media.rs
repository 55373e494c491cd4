//! Raw media documents and their lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error_code::{DomainError, DomainResult};
use crate::ids::MediaId;
use crate::transcoding::{ContentRef, TranscodingTask};

/// Lifecycle status of an uploaded source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RawMediaStatus {
    #[default]
    Created,
    Uploading,
    UploadCompleted,
    UploadFailed,
    TranscodingStarted,
    TranscodingCompleted,
    TranscodingFailed,
    FrameGenerationStarted,
    FrameGenerationCompleted,
    FrameGenerationFailed,
}

impl RawMediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawMediaStatus::Created => "created",
            RawMediaStatus::Uploading => "uploading",
            RawMediaStatus::UploadCompleted => "upload_completed",
            RawMediaStatus::UploadFailed => "upload_failed",
            RawMediaStatus::TranscodingStarted => "transcoding_started",
            RawMediaStatus::TranscodingCompleted => "transcoding_completed",
            RawMediaStatus::TranscodingFailed => "transcoding_failed",
            RawMediaStatus::FrameGenerationStarted => "frame_generation_started",
            RawMediaStatus::FrameGenerationCompleted => "frame_generation_completed",
            RawMediaStatus::FrameGenerationFailed => "frame_generation_failed",
        }
    }

    /// Parse from the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        let status = match s {
            "created" => RawMediaStatus::Created,
            "uploading" => RawMediaStatus::Uploading,
            "upload_completed" => RawMediaStatus::UploadCompleted,
            "upload_failed" => RawMediaStatus::UploadFailed,
            "transcoding_started" => RawMediaStatus::TranscodingStarted,
            "transcoding_completed" => RawMediaStatus::TranscodingCompleted,
            "transcoding_failed" => RawMediaStatus::TranscodingFailed,
            "frame_generation_started" => RawMediaStatus::FrameGenerationStarted,
            "frame_generation_completed" => RawMediaStatus::FrameGenerationCompleted,
            "frame_generation_failed" => RawMediaStatus::FrameGenerationFailed,
            _ => return None,
        };
        Some(status)
    }

    /// Whether the media is safely stored and can be processed further.
    pub fn is_uploaded(&self) -> bool {
        !matches!(
            self,
            RawMediaStatus::Created | RawMediaStatus::Uploading | RawMediaStatus::UploadFailed
        )
    }

    /// Allowed lifecycle moves. `force` unlocks re-transcoding of
    /// already transcoded media.
    pub fn can_transition_to(&self, next: RawMediaStatus, force: bool) -> bool {
        use RawMediaStatus::*;
        match (self, next) {
            (Created, Uploading) => true,
            (Uploading, Uploading | UploadCompleted | UploadFailed) => true,
            (UploadFailed, Uploading) => true,
            (UploadCompleted, TranscodingStarted | FrameGenerationStarted) => true,
            (TranscodingStarted, TranscodingCompleted | TranscodingFailed) => true,
            (TranscodingFailed, TranscodingStarted) => true,
            (TranscodingCompleted, TranscodingStarted) => force,
            (TranscodingCompleted, FrameGenerationStarted) => true,
            (FrameGenerationStarted, FrameGenerationCompleted | FrameGenerationFailed) => true,
            (FrameGenerationFailed | FrameGenerationCompleted, FrameGenerationStarted) => true,
            // Frame extraction reads the stored source and never blocks a transcode.
            (FrameGenerationStarted | FrameGenerationCompleted | FrameGenerationFailed, TranscodingStarted) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RawMediaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    #[default]
    Upload,
    Drive,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusChange {
    pub status: RawMediaStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// An uploaded source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawMedia {
    pub id: MediaId,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub storage_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipart_upload_id: Option<String>,
    /// Part count planned at upload creation.
    #[serde(default)]
    pub part_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentRef>,
    #[serde(default)]
    pub source: MediaSource,
    pub status: RawMediaStatus,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    #[serde(default)]
    pub transcoding_task: Vec<TranscodingTask>,
    #[serde(default)]
    pub upload_progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RawMedia {
    pub fn new(
        id: MediaId,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        storage_key: impl Into<String>,
        source: MediaSource,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            storage_key: storage_key.into(),
            multipart_upload_id: None,
            part_count: 0,
            content: None,
            source,
            status: RawMediaStatus::Created,
            status_history: vec![StatusChange {
                status: RawMediaStatus::Created,
                at: now,
                note: None,
            }],
            transcoding_task: Vec::new(),
            upload_progress: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status change, appending to the history.
    pub fn transition(&mut self, next: RawMediaStatus, force: bool, note: Option<String>) -> DomainResult<()> {
        if !self.status.can_transition_to(next, force) {
            return Err(DomainError::invalid_state(format!(
                "media {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        let now = Utc::now();
        self.status = next;
        self.status_history.push(StatusChange { status: next, at: now, note });
        self.updated_at = now;
        Ok(())
    }

    /// Apply a status change only when the lifecycle allows it.
    /// Returns whether the status moved.
    pub fn try_transition(&mut self, next: RawMediaStatus, note: Option<String>) -> bool {
        self.transition(next, false, note).is_ok()
    }

    /// Record client-reported progress. Returns the stored value.
    pub fn record_progress(&mut self, progress: i64) -> DomainResult<u8> {
        if self.status != RawMediaStatus::Uploading {
            return Err(DomainError::invalid_state(format!(
                "media {} is {}, not uploading",
                self.id, self.status
            )));
        }
        let clamped = progress.clamp(0, 100) as u8;
        if clamped > self.upload_progress {
            self.upload_progress = clamped;
            self.updated_at = Utc::now();
        }
        Ok(self.upload_progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media() -> RawMedia {
        RawMedia::new(MediaId::from("m1"), "a.mp4", "video/mp4", 10, "raw-media/m1/a.mp4", MediaSource::Upload)
    }

    #[test]
    fn upload_lifecycle_appends_history() {
        let mut m = media();
        m.transition(RawMediaStatus::Uploading, false, None).unwrap();
        m.transition(RawMediaStatus::UploadCompleted, false, None).unwrap();
        assert_eq!(m.status, RawMediaStatus::UploadCompleted);
        let history: Vec<_> = m.status_history.iter().map(|h| h.status).collect();
        assert_eq!(
            history,
            vec![RawMediaStatus::Created, RawMediaStatus::Uploading, RawMediaStatus::UploadCompleted]
        );
    }

    #[test]
    fn completed_transcode_needs_force() {
        let s = RawMediaStatus::TranscodingCompleted;
        assert!(!s.can_transition_to(RawMediaStatus::TranscodingStarted, false));
        assert!(s.can_transition_to(RawMediaStatus::TranscodingStarted, true));
        assert!(RawMediaStatus::TranscodingFailed.can_transition_to(RawMediaStatus::TranscodingStarted, false));
    }

    #[test]
    fn terminal_success_does_not_regress() {
        assert!(!RawMediaStatus::UploadCompleted.can_transition_to(RawMediaStatus::Uploading, true));
        assert!(!RawMediaStatus::TranscodingCompleted.can_transition_to(RawMediaStatus::UploadCompleted, true));
        let mut m = media();
        let err = m.transition(RawMediaStatus::TranscodingStarted, false, None).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::InvalidState);
        assert_eq!(m.status_history.len(), 1);
    }

    #[test]
    fn try_transition_skips_disallowed_moves() {
        let mut m = media();
        assert!(!m.try_transition(RawMediaStatus::FrameGenerationStarted, None));
        m.transition(RawMediaStatus::Uploading, false, None).unwrap();
        m.transition(RawMediaStatus::UploadCompleted, false, None).unwrap();
        assert!(m.try_transition(RawMediaStatus::FrameGenerationStarted, None));
        assert_eq!(m.status, RawMediaStatus::FrameGenerationStarted);
    }

    #[test]
    fn frames_then_transcode_is_allowed() {
        let mut m = media();
        m.transition(RawMediaStatus::Uploading, false, None).unwrap();
        m.transition(RawMediaStatus::UploadCompleted, false, None).unwrap();
        m.transition(RawMediaStatus::FrameGenerationStarted, false, None).unwrap();
        m.transition(RawMediaStatus::FrameGenerationCompleted, false, None).unwrap();
        m.transition(RawMediaStatus::TranscodingStarted, false, None).unwrap();
        assert_eq!(m.status, RawMediaStatus::TranscodingStarted);

        for s in [RawMediaStatus::FrameGenerationStarted, RawMediaStatus::FrameGenerationFailed] {
            assert!(s.can_transition_to(RawMediaStatus::TranscodingStarted, false));
        }
    }

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let mut m = media();
        assert!(m.record_progress(10).is_err());
        m.transition(RawMediaStatus::Uploading, false, None).unwrap();
        assert_eq!(m.record_progress(40).unwrap(), 40);
        assert_eq!(m.record_progress(20).unwrap(), 40);
        assert_eq!(m.record_progress(250).unwrap(), 100);
        assert_eq!(m.record_progress(-5).unwrap(), 100);
    }

    #[test]
    fn status_string_round_trip() {
        for s in [RawMediaStatus::UploadFailed, RawMediaStatus::FrameGenerationCompleted] {
            assert_eq!(RawMediaStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(RawMediaStatus::parse("bogus"), None);
    }
}
