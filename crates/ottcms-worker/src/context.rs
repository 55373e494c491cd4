//! Clients shared by every job.

use ottcms_firestore::{FirestoreClient, PosterProjectRepository, RawMediaRepository};
use ottcms_models::{PosterProject, PosterProjectId};
use ottcms_providers::{FrameExtractorClient, ImageGenClient};
use ottcms_storage::S3Client;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

pub struct WorkerContext {
    pub config: WorkerConfig,
    pub storage: S3Client,
    pub projects: PosterProjectRepository,
    pub media: RawMediaRepository,
    pub extractor: FrameExtractorClient,
    pub image_gen: ImageGenClient,
}

impl WorkerContext {
    pub async fn from_env(config: WorkerConfig) -> WorkerResult<Self> {
        let storage = S3Client::from_env().await?;
        let firestore = FirestoreClient::from_env().await?;
        Ok(Self {
            config,
            storage,
            projects: PosterProjectRepository::new(firestore.clone()),
            media: RawMediaRepository::new(firestore),
            extractor: FrameExtractorClient::from_env()?,
            image_gen: ImageGenClient::from_env()?,
        })
    }

    pub async fn load_project(&self, id: &PosterProjectId) -> WorkerResult<PosterProject> {
        self.projects
            .get(id)
            .await?
            .ok_or_else(|| WorkerError::job_failed(format!("poster project {} not found", id)))
    }
}
