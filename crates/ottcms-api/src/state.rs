//! Application state.

use std::sync::Arc;

use ottcms_firestore::{
    FirestoreClient, PaywallRepository, PlanRepository, PosterProjectRepository, RawMediaRepository,
};
use ottcms_providers::{DriveClient, HlsTranscoder, MediaConvertClient};
use ottcms_queue::JobQueue;
use ottcms_storage::S3Client;

use crate::auth::AdminAuth;
use crate::config::ApiConfig;
use crate::services::{
    ContentService, DriveService, MonetizationService, PosterService, TranscodingService, UploadService,
};

/// External clients the services are built from.
pub struct Clients {
    pub storage: S3Client,
    pub firestore: FirestoreClient,
    pub queue: JobQueue,
    pub hls: HlsTranscoder,
    pub media_convert: MediaConvertClient,
    pub drive: DriveClient,
}

impl Clients {
    /// Connect every client from environment variables.
    pub async fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            storage: S3Client::from_env().await?,
            firestore: FirestoreClient::from_env().await?,
            queue: JobQueue::from_env()?,
            hls: HlsTranscoder::from_env()?,
            media_convert: MediaConvertClient::from_env().await?,
            drive: DriveClient::from_env().await?,
        })
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub auth: Arc<AdminAuth>,
    pub storage: Arc<S3Client>,
    pub firestore: FirestoreClient,
    pub queue: Arc<JobQueue>,
    pub uploads: UploadService,
    pub transcoding: TranscodingService,
    pub content: ContentService,
    pub monetization: MonetizationService,
    pub posters: PosterService,
    pub drive: DriveService,
}

impl AppState {
    /// Create application state from the environment.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let clients = Clients::from_env().await?;
        Ok(Self::with_clients(config, clients))
    }

    /// Wire services over already constructed clients.
    pub fn with_clients(config: ApiConfig, clients: Clients) -> Self {
        let storage = Arc::new(clients.storage);
        let queue = Arc::new(clients.queue);
        let firestore = clients.firestore;
        let media = RawMediaRepository::new(firestore.clone());

        let uploads = UploadService::new(media.clone(), Arc::clone(&storage), config.clone());
        let transcoding = TranscodingService::new(
            media.clone(),
            firestore.clone(),
            Arc::clone(&storage),
            clients.hls,
            clients.media_convert,
            config.output_base.clone(),
            config.presign_expiry,
        );
        let content = ContentService::new(firestore.clone());
        let monetization = MonetizationService::new(
            PlanRepository::new(firestore.clone()),
            PaywallRepository::new(firestore.clone()),
        );
        let posters = PosterService::new(
            PosterProjectRepository::new(firestore.clone()),
            media.clone(),
            Arc::clone(&queue),
        );
        let drive = DriveService::new(clients.drive, media, Arc::clone(&storage), config.part_sizing);

        Self {
            auth: Arc::new(AdminAuth::new(&config.admin_jwt_secret)),
            config,
            storage,
            firestore,
            queue,
            uploads,
            transcoding,
            content,
            monetization,
            posters,
            drive,
        }
    }
}
