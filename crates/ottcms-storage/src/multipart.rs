//! Multipart upload operations.
//!
//! Clients upload parts directly with presigned `UploadPart` URLs; the API
//! completes the upload with the ETags they report. Server-side ingestion
//! (Drive imports) pushes parts through [`S3Client::upload_part`].

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use tracing::{debug, info, warn};

use crate::client::S3Client;
use crate::error::{StorageError, StorageResult};

/// A started multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUpload {
    pub key: String,
    pub upload_id: String,
}

/// Presigned URL for one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedPart {
    pub part_number: u32,
    pub url: String,
}

/// An uploaded part and the ETag storage returned for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: u32,
    pub etag: String,
}

impl S3Client {
    /// Start a multipart upload.
    pub async fn create_multipart_upload(&self, key: &str, content_type: &str) -> StorageResult<MultipartUpload> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::multipart("create", e))?;

        let upload_id = response
            .upload_id()
            .ok_or_else(|| StorageError::multipart("create", "upload id missing from response"))?
            .to_string();

        info!(key, upload_id = %upload_id, "Started multipart upload");
        Ok(MultipartUpload {
            key: key.to_string(),
            upload_id,
        })
    }

    /// Presign one `UploadPart` request.
    pub async fn presign_upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: u32,
        expires_in: Duration,
    ) -> StorageResult<PresignedPart> {
        let presign_config =
            PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .part_number(part_number as i32)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(PresignedPart {
            part_number,
            url: presigned.uri().to_string(),
        })
    }

    /// Presign parts `1..=part_count`.
    pub async fn presign_upload_parts(
        &self,
        upload: &MultipartUpload,
        part_count: u32,
        expires_in: Duration,
    ) -> StorageResult<Vec<PresignedPart>> {
        let mut parts = Vec::with_capacity(part_count as usize);
        for part_number in 1..=part_count {
            parts.push(self.presign_upload_part(upload, part_number, expires_in).await?);
        }
        Ok(parts)
    }

    /// Upload a part from server-held bytes.
    pub async fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: u32,
        data: Vec<u8>,
    ) -> StorageResult<UploadedPart> {
        debug!(key = %upload.key, part_number, bytes = data.len(), "Uploading part");

        let response = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .part_number(part_number as i32)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::multipart("upload_part", e))?;

        let etag = response
            .e_tag()
            .ok_or_else(|| StorageError::multipart("upload_part", format!("missing ETag for part {part_number}")))?
            .to_string();

        Ok(UploadedPart { part_number, etag })
    }

    /// Assemble the uploaded parts. `parts` must be sorted by part number.
    pub async fn complete_multipart_upload(
        &self,
        upload: &MultipartUpload,
        parts: &[UploadedPart],
    ) -> StorageResult<()> {
        let completed_parts: Vec<CompletedPart> = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.part_number as i32)
                    .e_tag(&part.etag)
                    .build()
            })
            .collect();

        let completed_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .multipart_upload(completed_upload)
            .send()
            .await
            .map_err(|e| StorageError::multipart("complete", e))?;

        info!(key = %upload.key, parts = parts.len(), "Completed multipart upload");
        Ok(())
    }

    /// Abort an upload and release its stored parts.
    pub async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .send()
            .await
            .map_err(|e| {
                warn!(key = %upload.key, error = %e, "Abort multipart upload failed");
                StorageError::multipart("abort", e)
            })?;

        info!(key = %upload.key, "Aborted multipart upload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::offline_client;

    #[tokio::test]
    async fn presigned_part_urls_carry_upload_and_part() {
        let client = offline_client().await;
        let upload = MultipartUpload {
            key: "raw-media/m1/movie.mp4".to_string(),
            upload_id: "upload-abc".to_string(),
        };

        let parts = client
            .presign_upload_parts(&upload, 3, Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(parts.len(), 3);

        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.part_number, i as u32 + 1);
            let url = url::Url::parse(&part.url).unwrap();
            assert_eq!(url.path(), "/media/raw-media/m1/movie.mp4");
            let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            assert!(query.contains(&("uploadId".to_string(), "upload-abc".to_string())));
            assert!(query.contains(&("partNumber".to_string(), (i + 1).to_string())));
            assert!(query.contains(&("X-Amz-Expires".to_string(), "3600".to_string())));
        }
    }

    #[tokio::test]
    async fn presign_rejects_excessive_expiry() {
        let client = offline_client().await;
        let upload = MultipartUpload {
            key: "k".to_string(),
            upload_id: "u".to_string(),
        };
        // SigV4 presigned URLs are limited to seven days.
        let result = client
            .presign_upload_part(&upload, 1, Duration::from_secs(8 * 24 * 3600))
            .await;
        assert!(matches!(result, Err(StorageError::PresignFailed(_))));
    }
}
