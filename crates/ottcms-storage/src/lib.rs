//! S3-compatible object storage client.
//!
//! This crate provides:
//! - Multipart uploads (create, presigned part URLs, server-side parts, complete, abort)
//! - Byte upload/download for frames and generated posters
//! - Presigned GET URLs for external processors
//! - Connectivity checks for readiness probes

pub mod client;
pub mod error;
pub mod multipart;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use multipart::{MultipartUpload, PresignedPart, UploadedPart};
