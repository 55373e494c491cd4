//! Transcoding dispatch and status tracking.
//!
//! H.264 and H.265 HLS renditions go to the HLS provider as a pair; the MP4
//! rendition goes to MediaConvert on its own. Only the HLS pair drives the
//! raw media status.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ottcms_firestore::{EpisodeRepository, FirestoreClient, RawMediaRepository, ShowRepository};
use ottcms_models::{
    hls_outcome, ContentRef, ContentType, DomainError, Episode, EpisodeId, HlsOutcome, MediaId, RawMedia,
    RawMediaStatus, Show, ShowId, TaskStatus, TaskType, TranscodeEngine, TranscodingTask,
};
use ottcms_providers::{HlsTranscoder, JobState, MediaConvertClient, ProviderResult};
use ottcms_storage::S3Client;

use crate::error::ApiResult;
use crate::services::upload::check_content;
use crate::services::{found, BULK_BATCH_SIZE};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    /// Overrides the content reference stored on the media.
    #[serde(default)]
    pub content: Option<ContentRef>,
    /// Re-transcode media that already completed.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub media_id: MediaId,
    pub status: RawMediaStatus,
    pub tasks: Vec<TranscodingTask>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDispatchItem {
    pub media_id: MediaId,
    #[serde(default)]
    pub content: Option<ContentRef>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDispatchResult {
    pub media_id: MediaId,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TranscodingTask>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Replace tasks of the same rendition, keeping the others.
pub fn merge_tasks(existing: &mut Vec<TranscodingTask>, fresh: Vec<TranscodingTask>) {
    for task in fresh {
        match existing.iter_mut().find(|t| t.task_type == task.task_type) {
            Some(slot) => *slot = task,
            None => existing.push(task),
        }
    }
}

/// Catalog entity that mirrors the renditions of a media file.
enum ContentTarget {
    Episode { repo: EpisodeRepository, episode: Episode },
    Teaser { repo: EpisodeRepository, episode: Episode },
    Peripheral { repo: ShowRepository, show: Show },
    Standalone,
}

#[derive(Clone)]
pub struct TranscodingService {
    media: RawMediaRepository,
    shows: ShowRepository,
    firestore: FirestoreClient,
    storage: Arc<S3Client>,
    hls: HlsTranscoder,
    media_convert: MediaConvertClient,
    output_base: String,
    presign_expiry: Duration,
}

impl TranscodingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        media: RawMediaRepository,
        firestore: FirestoreClient,
        storage: Arc<S3Client>,
        hls: HlsTranscoder,
        media_convert: MediaConvertClient,
        output_base: String,
        presign_expiry: Duration,
    ) -> Self {
        Self {
            media,
            shows: ShowRepository::new(firestore.clone()),
            firestore,
            storage,
            hls,
            media_convert,
            output_base,
            presign_expiry,
        }
    }

    /// Submit the HLS pair and the MP4 rendition for a media file.
    pub async fn dispatch(&self, media_id: &MediaId, request: DispatchRequest) -> ApiResult<DispatchResponse> {
        let mut media = found(self.media.get(media_id).await?, "media", media_id)?;
        let content = request
            .content
            .or_else(|| media.content.clone())
            .ok_or_else(|| DomainError::invalid_state(format!("media {} has no content reference", media.id)))?;
        check_content(&content)?;

        if !media.status.can_transition_to(RawMediaStatus::TranscodingStarted, request.force) {
            return Err(DomainError::invalid_state(format!(
                "media {} is {}, cannot start transcoding",
                media.id, media.status
            ))
            .into());
        }

        let h264_path = content.output_path(&self.output_base, TaskType::H264)?;
        let h265_path = content.output_path(&self.output_base, TaskType::H265)?;
        let mp4_path = content.output_path(&self.output_base, TaskType::Mp4)?;
        let target = self.load_target(&content).await?;

        let source_url = self.storage.presign_get(&media.storage_key, self.presign_expiry).await?;
        let source_uri = self.storage.s3_uri(&media.storage_key);

        let hls = async {
            tokio::try_join!(
                self.hls.submit(TaskType::H264, &source_url, &h264_path),
                self.hls.submit(TaskType::H265, &source_url, &h265_path),
            )
        };
        let mp4 = self.media_convert.submit_mp4(&source_uri, &mp4_path);
        let (hls, mp4) = tokio::join!(hls, mp4);

        let mp4_task = match mp4 {
            Ok(job_id) => TranscodingTask::submitted(TaskType::Mp4, job_id, &mp4_path),
            Err(e) => {
                warn!(media_id = %media.id, error = %e, "MP4 submission failed");
                TranscodingTask::failed(TaskType::Mp4, &mp4_path, e.to_string())
            }
        };

        let hls_result = match hls {
            Ok((h264_id, h265_id)) => {
                media.transition(RawMediaStatus::TranscodingStarted, request.force, None)?;
                media.error_message = None;
                merge_tasks(
                    &mut media.transcoding_task,
                    vec![
                        TranscodingTask::submitted(TaskType::H264, h264_id, &h264_path),
                        TranscodingTask::submitted(TaskType::H265, h265_id, &h265_path),
                    ],
                );
                Ok(())
            }
            Err(e) => Err(e),
        };
        merge_tasks(&mut media.transcoding_task, vec![mp4_task]);
        media.content = Some(content);
        media.updated_at = chrono::Utc::now();
        self.media.save(&media).await?;

        // The MP4 task is recorded even when the HLS pair was rejected.
        hls_result?;

        self.attach(target, &media).await?;
        info!(media_id = %media.id, tasks = media.transcoding_task.len(), "Dispatched transcoding");

        Ok(DispatchResponse {
            media_id: media.id,
            status: media.status,
            tasks: media.transcoding_task,
        })
    }

    /// Poll engines for non-terminal tasks and fold the results into the media.
    pub async fn refresh_status(&self, media_id: &MediaId) -> ApiResult<DispatchResponse> {
        let mut media = found(self.media.get(media_id).await?, "media", media_id)?;

        let polls = media
            .transcoding_task
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.status.is_terminal())
            .filter_map(|(i, t)| t.external_id.clone().map(|id| (i, t.engine, id)))
            .map(|(i, engine, id)| async move { (i, self.poll(engine, &id).await) });
        let results = join_all(polls).await;

        let mut changed = false;
        for (index, result) in results {
            let task = &mut media.transcoding_task[index];
            match result {
                Ok(state) if state.status != task.status => {
                    task.status = state.status;
                    task.error = state.error;
                    changed = true;
                }
                Ok(_) => {}
                Err(e) => warn!(media_id = %media.id, task_type = %task.task_type, error = %e, "Status poll failed"),
            }
        }

        if media.status == RawMediaStatus::TranscodingStarted {
            match hls_outcome(&media.transcoding_task) {
                HlsOutcome::Completed => {
                    media.transition(RawMediaStatus::TranscodingCompleted, false, None)?;
                    changed = true;
                }
                HlsOutcome::Failed => {
                    let error = media
                        .transcoding_task
                        .iter()
                        .filter(|t| t.engine == TranscodeEngine::HlsProvider && t.status == TaskStatus::Failed)
                        .find_map(|t| t.error.clone())
                        .unwrap_or_else(|| "HLS rendition failed".to_string());
                    media.transition(RawMediaStatus::TranscodingFailed, false, Some(error.clone()))?;
                    media.error_message = Some(error);
                    changed = true;
                }
                HlsOutcome::Pending => {}
            }
        }

        if changed {
            media.updated_at = chrono::Utc::now();
            self.media.save(&media).await?;
            if let Some(content) = media.content.clone() {
                let synced = match self.load_target(&content).await {
                    Ok(target) => self.attach(target, &media).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = synced {
                    warn!(media_id = %media.id, error = %e, "Failed to sync tasks to content");
                }
            }
        }

        Ok(DispatchResponse {
            media_id: media.id,
            status: media.status,
            tasks: media.transcoding_task,
        })
    }

    /// Dispatch many media files, batch by batch. Failures stay per item.
    pub async fn bulk_dispatch(&self, items: Vec<BulkDispatchItem>) -> Vec<BulkDispatchResult> {
        let mut results = Vec::with_capacity(items.len());
        for batch in items.chunks(BULK_BATCH_SIZE) {
            let outcomes = join_all(batch.iter().map(|item| async move {
                let request = DispatchRequest {
                    content: item.content.clone(),
                    force: item.force,
                };
                (item.media_id.clone(), self.dispatch(&item.media_id, request).await)
            }))
            .await;

            results.extend(outcomes.into_iter().map(|(media_id, outcome)| match outcome {
                Ok(response) => BulkDispatchResult {
                    media_id,
                    ok: true,
                    tasks: Some(response.tasks),
                    error: None,
                },
                Err(e) => BulkDispatchResult {
                    media_id,
                    ok: false,
                    tasks: None,
                    error: Some(e.to_string()),
                },
            }));
        }
        info!(
            total = results.len(),
            failed = results.iter().filter(|r| !r.ok).count(),
            "Bulk transcoding dispatch finished"
        );
        results
    }

    async fn poll(&self, engine: TranscodeEngine, external_id: &str) -> ProviderResult<JobState> {
        match engine {
            TranscodeEngine::HlsProvider => self.hls.status(external_id).await,
            TranscodeEngine::MediaConvert => self.media_convert.status(external_id).await,
        }
    }

    async fn load_target(&self, content: &ContentRef) -> ApiResult<ContentTarget> {
        let show_id = content.show_id.as_deref().map(ShowId::from);
        match (content.content_type, show_id) {
            (ContentType::Episode | ContentType::EpisodeTeaser, Some(show_id)) => {
                let repo = EpisodeRepository::new(self.firestore.clone(), &show_id);
                let episode_id = EpisodeId::from(content.content_id.as_str());
                let episode = found(repo.get(&episode_id).await?, "episode", &episode_id)?;
                Ok(if content.content_type == ContentType::Episode {
                    ContentTarget::Episode { repo, episode }
                } else {
                    ContentTarget::Teaser { repo, episode }
                })
            }
            (ContentType::ShowPeripheral, Some(show_id)) => {
                let show = found(self.shows.get(&show_id).await?, "show", &show_id)?;
                Ok(ContentTarget::Peripheral {
                    repo: self.shows.clone(),
                    show,
                })
            }
            _ => Ok(ContentTarget::Standalone),
        }
    }

    async fn attach(&self, target: ContentTarget, media: &RawMedia) -> ApiResult<()> {
        let now = chrono::Utc::now();
        match target {
            ContentTarget::Episode { repo, mut episode } => {
                episode.raw_media_id = Some(media.id.clone());
                episode.transcoding_tasks = media.transcoding_task.clone();
                episode.updated_at = now;
                repo.save(&episode).await?;
            }
            ContentTarget::Teaser { repo, mut episode } => {
                episode.teaser_tasks = media.transcoding_task.clone();
                episode.updated_at = now;
                repo.save(&episode).await?;
            }
            ContentTarget::Peripheral { repo, mut show } => {
                merge_tasks(&mut show.peripheral_tasks, media.transcoding_task.clone());
                show.updated_at = now;
                repo.save(&show).await?;
            }
            ContentTarget::Standalone => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_replaces_same_rendition() {
        let mut tasks = vec![
            TranscodingTask::failed(TaskType::H264, "out/h264/", "boom"),
            TranscodingTask::submitted(TaskType::Mp4, "mc-1", "out/mp4/"),
        ];
        merge_tasks(
            &mut tasks,
            vec![
                TranscodingTask::submitted(TaskType::H264, "hls-2", "out/h264/"),
                TranscodingTask::submitted(TaskType::H265, "hls-3", "out/h265/"),
            ],
        );
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].external_id.as_deref(), Some("hls-2"));
        assert_eq!(tasks[0].status, TaskStatus::Submitted);
        assert_eq!(tasks[1].task_type, TaskType::Mp4);
        assert_eq!(tasks[2].task_type, TaskType::H265);
    }

    #[test]
    fn bulk_result_omits_empty_fields() {
        let result = BulkDispatchResult {
            media_id: MediaId::from("m1"),
            ok: false,
            tasks: None,
            error: Some("NOT_FOUND: media m1 not found".into()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["mediaId"], "m1");
        assert!(json.get("tasks").is_none());
    }
}
