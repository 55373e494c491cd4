//! Clients for the external services the CMS orchestrates.
//!
//! - [`HlsTranscoder`]: HLS rendition jobs on the transcoding provider
//! - [`MediaConvertClient`]: MP4 renditions on AWS MediaConvert
//! - [`FrameExtractorClient`]: asynchronous frame extraction with callbacks
//! - [`ImageGenClient`]: Gemini poster image generation
//! - [`DriveClient`]: Google Drive metadata, crawling and downloads

pub mod drive;
pub mod error;
pub mod frames;
pub mod image_gen;
pub mod mediaconvert;
pub mod transcoder;

pub use drive::{DriveClient, DriveConfig, DriveDownload, DriveFile};
pub use error::{ProviderError, ProviderResult};
pub use frames::{ExtractionRequest, FrameExtractorClient, FrameExtractorConfig};
pub use image_gen::{ImageData, ImageGenClient, ImageGenConfig};
pub use mediaconvert::{MediaConvertClient, MediaConvertConfig};
pub use transcoder::{HlsTranscoder, JobState, TranscodeConfig};
