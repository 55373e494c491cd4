//! Raw media repository.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use ottcms_models::{MediaId, PageParams, Paginated, RawMedia, RawMediaStatus};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::repository::Collection;
use crate::types::{ToFirestoreValue, Value};

pub const RAW_MEDIA_COLLECTION: &str = "raw_media";

/// Repository for `raw_media` documents.
#[derive(Clone)]
pub struct RawMediaRepository {
    media: Collection<RawMedia>,
}

impl RawMediaRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            media: Collection::new(client, RAW_MEDIA_COLLECTION),
        }
    }

    pub async fn get(&self, id: &MediaId) -> FirestoreResult<Option<RawMedia>> {
        self.media.get(id.as_str()).await
    }

    pub async fn create(&self, media: &RawMedia) -> FirestoreResult<()> {
        self.media.create(media.id.as_str(), media).await?;
        info!(media_id = %media.id, status = %media.status, "Created raw media record");
        Ok(())
    }

    /// Persist the whole document, including status history and tasks.
    pub async fn save(&self, media: &RawMedia) -> FirestoreResult<()> {
        self.media.save(media.id.as_str(), media).await
    }

    /// Write only the upload progress.
    pub async fn update_progress(&self, id: &MediaId, progress: u8) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("upload_progress".to_string(), progress.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.media.update_fields(id.as_str(), fields).await
    }

    pub async fn list(
        &self,
        status: Option<RawMediaStatus>,
        params: &PageParams,
    ) -> FirestoreResult<Paginated<RawMedia>> {
        let filters = status
            .map(|s| vec![("status", Value::StringValue(s.as_str().to_string()))])
            .unwrap_or_default();
        self.media.page(filters, params).await
    }
}
