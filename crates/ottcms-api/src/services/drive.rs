//! Google Drive ingestion.
//!
//! Links are resolved to video files, then each file is streamed from
//! Drive into a storage multipart upload server-side.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ottcms_firestore::RawMediaRepository;
use ottcms_models::{
    parse_drive_link, plan_parts, raw_media_key, ContentRef, DomainError, DriveLink, MediaId, MediaSource,
    PartSizing, RawMedia, RawMediaStatus,
};
use ottcms_providers::{DriveClient, DriveFile};
use ottcms_storage::{MultipartUpload, S3Client, UploadedPart};

use crate::error::ApiResult;
use crate::services::upload::check_content;
use crate::services::BULK_BATCH_SIZE;

pub const MAX_LINKS: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub links: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub links: Vec<String>,
    /// Attached to every imported media.
    #[serde(default)]
    pub content: Option<ContentRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub file_id: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<MediaId>,
    pub status: RawMediaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub items: Vec<ImportResult>,
}

/// Parse every link, failing on the first invalid one.
pub fn parse_links(links: &[String]) -> ApiResult<Vec<DriveLink>> {
    if links.is_empty() {
        return Err(DomainError::new(ottcms_models::ErrorCode::InvalidDriveLink, "no links given").into());
    }
    if links.len() > MAX_LINKS {
        return Err(DomainError::new(
            ottcms_models::ErrorCode::InvalidDriveLink,
            format!("at most {MAX_LINKS} links per request"),
        )
        .into());
    }
    links
        .iter()
        .map(|l| parse_drive_link(l).map_err(Into::into))
        .collect()
}

/// Regroups arbitrary download chunks into fixed-size parts.
#[derive(Debug)]
pub struct PartBuffer {
    part_size: usize,
    buf: Vec<u8>,
}

impl PartBuffer {
    pub fn new(part_size: u64) -> Self {
        let part_size = usize::try_from(part_size).unwrap_or(usize::MAX).max(1);
        Self {
            part_size,
            buf: Vec::with_capacity(part_size.min(16 * 1024 * 1024)),
        }
    }

    /// Append a chunk and return every part it filled.
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut full = Vec::new();
        while !chunk.is_empty() {
            let take = (self.part_size - self.buf.len()).min(chunk.len());
            self.buf.extend_from_slice(&chunk[..take]);
            chunk = &chunk[take..];
            if self.buf.len() == self.part_size {
                full.push(std::mem::take(&mut self.buf));
            }
        }
        full
    }

    /// The trailing partial part, if any.
    pub fn finish(self) -> Option<Vec<u8>> {
        (!self.buf.is_empty()).then_some(self.buf)
    }
}

#[derive(Clone)]
pub struct DriveService {
    drive: DriveClient,
    media: RawMediaRepository,
    storage: Arc<S3Client>,
    sizing: PartSizing,
}

impl DriveService {
    pub fn new(drive: DriveClient, media: RawMediaRepository, storage: Arc<S3Client>, sizing: PartSizing) -> Self {
        Self {
            drive,
            media,
            storage,
            sizing,
        }
    }

    pub async fn resolve(&self, links: &[String]) -> ApiResult<Vec<DriveFile>> {
        let links = parse_links(links)?;
        Ok(self.drive.resolve(&links).await?)
    }

    /// Import every resolved file; failures are reported per item.
    pub async fn bulk_import(&self, request: ImportRequest) -> ApiResult<ImportResponse> {
        if let Some(content) = &request.content {
            check_content(content)?;
        }
        let files = self.resolve(&request.links).await?;

        let mut items = Vec::with_capacity(files.len());
        for batch in files.chunks(BULK_BATCH_SIZE) {
            let outcomes = join_all(batch.iter().map(|file| self.import_one(file, request.content.clone()))).await;
            items.extend(outcomes);
        }

        let completed = items
            .iter()
            .filter(|i| i.status == RawMediaStatus::UploadCompleted)
            .count();
        let response = ImportResponse {
            total: items.len(),
            completed,
            failed: items.len() - completed,
            items,
        };
        info!(
            total = response.total,
            completed = response.completed,
            failed = response.failed,
            "Drive import finished"
        );
        Ok(response)
    }

    async fn import_one(&self, file: &DriveFile, content: Option<ContentRef>) -> ImportResult {
        let mut result = ImportResult {
            file_id: file.id.clone(),
            file_name: file.name.clone(),
            media_id: None,
            status: RawMediaStatus::UploadFailed,
            error: None,
        };

        let Some(size) = file.size_bytes else {
            result.error = Some("Drive did not report a file size".to_string());
            return result;
        };
        let plan = match plan_parts(size, &self.sizing) {
            Ok(plan) => plan,
            Err(e) => {
                result.error = Some(e.detail);
                return result;
            }
        };

        let media_id = MediaId::new();
        let key = raw_media_key(media_id.as_str(), &file.name);
        let mut media = RawMedia::new(media_id.clone(), &file.name, &file.mime_type, size, key, MediaSource::Drive);
        media.part_count = plan.part_count;
        media.content = content;
        result.media_id = Some(media_id);

        if let Err(e) = media.transition(RawMediaStatus::Uploading, false, None) {
            result.error = Some(e.detail);
            return result;
        }
        if let Err(e) = self.media.create(&media).await {
            result.error = Some(e.to_string());
            return result;
        }

        let outcome = self
            .transfer(&mut media, &file.id, plan.part_size)
            .await
            .map_err(|e| e.to_string());
        match &outcome {
            Ok(()) => info!(media_id = %media.id, drive_file = %file.id, "Imported Drive file"),
            Err(message) => warn!(media_id = %media.id, drive_file = %file.id, error = %message, "Drive import failed"),
        }
        result.error = settle_import(&mut media, outcome);
        if let Err(e) = self.media.save(&media).await {
            warn!(media_id = %media.id, error = %e, "Failed to persist imported media");
            result.error.get_or_insert_with(|| e.to_string());
            result.status = RawMediaStatus::UploadFailed;
            return result;
        }

        result.status = media.status;
        result
    }

    /// Stream the Drive download into a multipart upload, aborting on failure.
    async fn transfer(&self, media: &mut RawMedia, file_id: &str, part_size: u64) -> ApiResult<()> {
        let upload = self
            .storage
            .create_multipart_upload(&media.storage_key, &media.mime_type)
            .await?;
        media.multipart_upload_id = Some(upload.upload_id.clone());

        match self.stream_parts(&upload, file_id, part_size).await {
            Ok(parts) => {
                if let Err(e) = self.storage.complete_multipart_upload(&upload, &parts).await {
                    self.abort_quietly(&upload).await;
                    return Err(e.into());
                }
                Ok(())
            }
            Err(e) => {
                self.abort_quietly(&upload).await;
                Err(e)
            }
        }
    }

    async fn stream_parts(&self, upload: &MultipartUpload, file_id: &str, part_size: u64) -> ApiResult<Vec<UploadedPart>> {
        let mut download = self.drive.download(file_id).await?;
        let mut buffer = PartBuffer::new(part_size);
        let mut parts = Vec::new();

        while let Some(chunk) = download.next_chunk().await? {
            for part in buffer.push(&chunk) {
                let number = parts.len() as u32 + 1;
                parts.push(self.storage.upload_part(upload, number, part).await?);
            }
        }
        if let Some(rest) = buffer.finish() {
            let number = parts.len() as u32 + 1;
            parts.push(self.storage.upload_part(upload, number, rest).await?);
        }
        if parts.is_empty() {
            return Err(DomainError::invalid_upload("Drive download was empty").into());
        }
        Ok(parts)
    }

    async fn abort_quietly(&self, upload: &MultipartUpload) {
        if let Err(e) = self.storage.abort_multipart_upload(upload).await {
            warn!(key = %upload.key, error = %e, "Failed to abort multipart upload");
        }
    }
}

/// Move an importing media to its terminal upload status. Returns the error
/// to report for the item, including a refused transition.
fn settle_import(media: &mut RawMedia, outcome: Result<(), String>) -> Option<String> {
    match outcome {
        Ok(()) => {
            media.upload_progress = 100;
            media
                .transition(RawMediaStatus::UploadCompleted, false, None)
                .err()
                .map(|e| e.detail)
        }
        Err(message) => {
            media.error_message = Some(message.clone());
            match media.transition(RawMediaStatus::UploadFailed, false, Some(message.clone())) {
                Ok(()) => Some(message),
                Err(e) => Some(format!("{message}; {}", e.detail)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ottcms_models::ErrorCode;

    #[test]
    fn part_buffer_regroups_chunks() {
        let mut buffer = PartBuffer::new(4);
        assert!(buffer.push(b"ab").is_empty());
        let parts = buffer.push(b"cdefghij");
        assert_eq!(parts, vec![b"abcd".to_vec(), b"efgh".to_vec()]);
        assert_eq!(buffer.finish(), Some(b"ij".to_vec()));
    }

    #[test]
    fn part_buffer_exact_fit_leaves_nothing() {
        let mut buffer = PartBuffer::new(3);
        assert_eq!(buffer.push(b"abcdef").len(), 2);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn links_are_validated_up_front() {
        let good = "https://drive.google.com/file/d/1AbCdEfGhIjKlMnOp_-xyz/view".to_string();
        assert_eq!(parse_links(&[good.clone()]).unwrap().len(), 1);

        let err = parse_links(&[good, "https://example.com/video.mp4".into()]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDriveLink);
        assert_eq!(parse_links(&[]).unwrap_err().code(), ErrorCode::InvalidDriveLink);
    }

    fn importing_media() -> RawMedia {
        let mut media = RawMedia::new(MediaId::from("m1"), "a.mp4", "video/mp4", 10, "raw-media/m1/a.mp4", MediaSource::Drive);
        media.transition(RawMediaStatus::Uploading, false, None).unwrap();
        media
    }

    #[test]
    fn settled_import_reaches_terminal_status() {
        let mut media = importing_media();
        assert_eq!(settle_import(&mut media, Ok(())), None);
        assert_eq!(media.status, RawMediaStatus::UploadCompleted);
        assert_eq!(media.upload_progress, 100);

        let mut media = importing_media();
        assert_eq!(settle_import(&mut media, Err("drive 500".into())), Some("drive 500".into()));
        assert_eq!(media.status, RawMediaStatus::UploadFailed);
        assert_eq!(media.error_message.as_deref(), Some("drive 500"));
    }

    #[test]
    fn refused_transition_is_reported_on_the_item() {
        let mut media = importing_media();
        media.transition(RawMediaStatus::UploadCompleted, false, None).unwrap();
        media.transition(RawMediaStatus::TranscodingStarted, false, None).unwrap();

        let error = settle_import(&mut media, Ok(())).unwrap();
        assert!(error.contains("upload_completed"), "{error}");
        assert_eq!(media.status, RawMediaStatus::TranscodingStarted);

        let error = settle_import(&mut media, Err("stalled".into())).unwrap();
        assert!(error.starts_with("stalled; "), "{error}");
    }

    #[test]
    fn import_response_is_camel_case() {
        let item = ImportResult {
            file_id: "f1".into(),
            file_name: "a.mp4".into(),
            media_id: Some(MediaId::from("m1")),
            status: RawMediaStatus::UploadCompleted,
            error: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["fileId"], "f1");
        assert_eq!(json["mediaId"], "m1");
        assert_eq!(json["status"], "upload_completed");
        assert!(json.get("error").is_none());
    }
}
