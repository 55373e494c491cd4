//! Multipart upload lifecycle for raw media.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ottcms_firestore::RawMediaRepository;
use ottcms_models::{
    plan_parts, raw_media_key, validate_completed_parts, CompletedPart, ContentRef, DomainError, MediaId,
    MediaSource, PageParams, Paginated, PartPlan, PartSizing, RawMedia, RawMediaStatus,
};
use ottcms_storage::{MultipartUpload, PresignedPart, S3Client, UploadedPart};

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::security::sanitize_title;
use crate::services::found;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadRequest {
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    #[serde(default)]
    pub content: Option<ContentRef>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadPartUrl {
    pub part_number: u32,
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadResponse {
    pub media_id: MediaId,
    pub upload_id: String,
    pub key: String,
    pub part_size: u64,
    pub part_count: u32,
    pub parts: Vec<UploadPartUrl>,
    pub complete_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub media_id: MediaId,
    pub progress: u8,
}

/// Pair presigned URLs with their planned sizes.
pub fn part_urls(plan: &PartPlan, presigned: Vec<PresignedPart>) -> Vec<UploadPartUrl> {
    presigned
        .into_iter()
        .map(|p| UploadPartUrl {
            size: plan.size_of(p.part_number),
            part_number: p.part_number,
            url: p.url,
        })
        .collect()
}

/// Reject content references the dispatcher could never resolve.
pub(crate) fn check_content(content: &ContentRef) -> ApiResult<()> {
    if content.content_id.trim().is_empty() {
        return Err(DomainError::invalid_state("content_id must not be empty").into());
    }
    if content.content_type.requires_show() && content.show_id.as_deref().map_or(true, str::is_empty) {
        return Err(DomainError::invalid_state(format!(
            "content type {} requires a show_id",
            content.content_type
        ))
        .into());
    }
    Ok(())
}

#[derive(Clone)]
pub struct UploadService {
    media: RawMediaRepository,
    storage: Arc<S3Client>,
    config: ApiConfig,
}

impl UploadService {
    pub fn new(media: RawMediaRepository, storage: Arc<S3Client>, config: ApiConfig) -> Self {
        Self { media, storage, config }
    }

    fn sizing(&self) -> &PartSizing {
        &self.config.part_sizing
    }

    fn expiry(&self) -> Duration {
        self.config.presign_expiry
    }

    /// Start a multipart upload and hand out one presigned URL per part.
    pub async fn create_multipart_upload(&self, request: CreateUploadRequest) -> ApiResult<CreateUploadResponse> {
        let file_name = sanitize_title(&request.file_name);
        if file_name.is_empty() {
            return Err(DomainError::invalid_upload("file_name must not be empty").into());
        }
        let mime_type = request.mime_type.trim().to_string();
        if mime_type.is_empty() {
            return Err(DomainError::invalid_upload("mime_type must not be empty").into());
        }
        if let Some(content) = &request.content {
            check_content(content)?;
        }

        let plan = plan_parts(request.file_size, self.sizing())?;
        let media_id = MediaId::new();
        let key = raw_media_key(media_id.as_str(), &file_name);

        let upload = self.storage.create_multipart_upload(&key, &mime_type).await?;
        let presigned = match self
            .storage
            .presign_upload_parts(&upload, plan.part_count, self.expiry())
            .await
        {
            Ok(parts) => parts,
            Err(e) => {
                self.abort_quietly(&upload).await;
                return Err(e.into());
            }
        };

        let mut media = RawMedia::new(
            media_id.clone(),
            file_name,
            mime_type,
            request.file_size,
            key.clone(),
            MediaSource::Upload,
        );
        media.multipart_upload_id = Some(upload.upload_id.clone());
        media.part_count = plan.part_count;
        media.content = request.content;
        media.transition(RawMediaStatus::Uploading, false, None)?;

        if let Err(e) = self.media.create(&media).await {
            self.abort_quietly(&upload).await;
            return Err(e.into());
        }

        info!(
            media_id = %media_id,
            size_bytes = request.file_size,
            part_size = plan.part_size,
            part_count = plan.part_count,
            "Created multipart upload"
        );

        Ok(CreateUploadResponse {
            complete_url: self.config.complete_url(media_id.as_str()),
            media_id,
            upload_id: upload.upload_id,
            key,
            part_size: plan.part_size,
            part_count: plan.part_count,
            parts: part_urls(&plan, presigned),
        })
    }

    /// Record client-reported progress; never moves backwards.
    pub async fn record_progress(&self, media_id: &MediaId, progress: i64) -> ApiResult<ProgressResponse> {
        let mut media = found(self.media.get(media_id).await?, "media", media_id)?;
        let before = media.upload_progress;
        let stored = media.record_progress(progress)?;
        if stored != before {
            self.media.update_progress(media_id, stored).await?;
        }
        Ok(ProgressResponse {
            media_id: media.id,
            progress: stored,
        })
    }

    /// Assemble the uploaded parts in storage.
    pub async fn complete_upload(&self, media_id: &MediaId, parts: Vec<CompletedPart>) -> ApiResult<RawMedia> {
        let mut media = found(self.media.get(media_id).await?, "media", media_id)?;
        if media.status != RawMediaStatus::Uploading {
            return Err(DomainError::invalid_state(format!(
                "media {} is {}, not uploading",
                media.id, media.status
            ))
            .into());
        }
        let parts = validate_completed_parts(parts, media.part_count)?;
        let upload = self.upload_of(&media)?;
        let parts: Vec<UploadedPart> = parts
            .into_iter()
            .map(|p| UploadedPart {
                part_number: p.part_number,
                etag: p.etag,
            })
            .collect();

        match self.storage.complete_multipart_upload(&upload, &parts).await {
            Ok(()) => {
                media.transition(RawMediaStatus::UploadCompleted, false, None)?;
                media.upload_progress = 100;
                media.error_message = None;
                self.media.save(&media).await?;
                info!(media_id = %media.id, parts = parts.len(), "Upload completed");
                Ok(media)
            }
            Err(e) => {
                warn!(media_id = %media.id, error = %e, "Completing multipart upload failed");
                media.transition(RawMediaStatus::UploadFailed, false, Some(e.to_string()))?;
                media.error_message = Some(e.to_string());
                self.media.save(&media).await?;
                Err(e.into())
            }
        }
    }

    /// Abandon an upload. The storage abort is best effort.
    pub async fn fail_upload(&self, media_id: &MediaId, reason: Option<String>) -> ApiResult<RawMedia> {
        let mut media = found(self.media.get(media_id).await?, "media", media_id)?;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "upload aborted by client".to_string());

        media.transition(RawMediaStatus::UploadFailed, false, Some(reason.clone()))?;
        if let Ok(upload) = self.upload_of(&media) {
            self.abort_quietly(&upload).await;
        }
        media.error_message = Some(reason);
        self.media.save(&media).await?;
        info!(media_id = %media.id, "Upload marked failed");
        Ok(media)
    }

    pub async fn get_media(&self, media_id: &MediaId) -> ApiResult<RawMedia> {
        found(self.media.get(media_id).await?, "media", media_id)
    }

    pub async fn list_media(
        &self,
        status: Option<&str>,
        params: &PageParams,
    ) -> ApiResult<Paginated<RawMedia>> {
        let status = match status {
            Some(s) => Some(
                RawMediaStatus::parse(s)
                    .ok_or_else(|| DomainError::invalid_state(format!("unknown media status {s}")))?,
            ),
            None => None,
        };
        Ok(self.media.list(status, params).await?)
    }

    fn upload_of(&self, media: &RawMedia) -> ApiResult<MultipartUpload> {
        let upload_id = media
            .multipart_upload_id
            .clone()
            .ok_or_else(|| DomainError::invalid_state(format!("media {} has no multipart upload", media.id)))?;
        Ok(MultipartUpload {
            key: media.storage_key.clone(),
            upload_id,
        })
    }

    async fn abort_quietly(&self, upload: &MultipartUpload) {
        if let Err(e) = self.storage.abort_multipart_upload(upload).await {
            warn!(key = %upload.key, error = %e, "Failed to abort multipart upload");
        }
    }
}
