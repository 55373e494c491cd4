//! Business logic services.

pub mod content;
pub mod drive;
pub mod monetization;
pub mod poster;
pub mod transcoding;
pub mod upload;

pub use content::ContentService;
pub use drive::DriveService;
pub use monetization::MonetizationService;
pub use poster::PosterService;
pub use transcoding::TranscodingService;
pub use upload::UploadService;

use crate::error::{ApiError, ApiResult};

/// Items processed concurrently per batch in bulk operations.
pub const BULK_BATCH_SIZE: usize = 10;

/// Unwrap a repository lookup or report the entity as missing.
pub(crate) fn found<T>(value: Option<T>, what: &str, id: impl std::fmt::Display) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::not_found(what, id))
}
