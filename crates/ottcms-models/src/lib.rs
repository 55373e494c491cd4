//! Shared data models for the OTT CMS backend.
//!
//! This crate provides Serde-serializable types and the pure business rules
//! that sit on top of them:
//! - Raw media and its upload/transcoding lifecycle
//! - Multipart part planning
//! - Transcoding tasks and output path templates
//! - Shows, episodes, poster projects and prompts
//! - Plans and paywalls with their publish gates
//! - Google Drive link parsing
//! - The pagination envelope and error-code registry

pub mod content;
pub mod drive_link;
pub mod error_code;
pub mod ids;
pub mod pagination;
pub mod paywall;
pub mod plan;
pub mod poster;
pub mod raw_media;
pub mod transcoding;
pub mod upload;

// Re-export common types
pub use content::{slugify, Episode, Show};
pub use drive_link::{dedupe_by_key, parse_drive_link, DriveLink};
pub use error_code::{DomainError, DomainResult, ErrorCode};
pub use ids::{is_valid_id, EpisodeId, JobId, MediaId, PaywallId, PlanId, PosterProjectId, PromptId, ShowId};
pub use pagination::{PageParams, Paginated, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use paywall::{MediaKind, Paywall, PaywallContent, Section};
pub use plan::{Plan, PlanTerms, PublishStatus};
pub use poster::{
    ExtractedFrame, FramesCallback, GenerationStatus, GenerationTrack, PosterProject, PosterStatus, Prompt,
};
pub use raw_media::{MediaSource, RawMedia, RawMediaStatus, StatusChange};
pub use transcoding::{
    hls_outcome, ContentRef, ContentType, HlsOutcome, TaskStatus, TaskType, TranscodeEngine, TranscodingTask,
};
pub use upload::{
    plan_parts, raw_media_key, sanitize_file_name, validate_completed_parts, CompletedPart, PartPlan, PartSizing,
};
