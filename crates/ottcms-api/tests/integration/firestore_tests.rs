//! Firestore integration tests.

use ottcms_firestore::{FirestoreClient, RawMediaRepository};
use ottcms_models::{MediaId, MediaSource, PageParams, RawMedia, RawMediaStatus};

async fn media_repo() -> RawMediaRepository {
    dotenvy::dotenv().ok();
    let client = FirestoreClient::from_env().await.expect("Failed to create Firestore client");
    RawMediaRepository::new(client)
}

#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_raw_media_lifecycle() {
    let repo = media_repo().await;
    let id = MediaId::new();
    let mut media = RawMedia::new(
        id.clone(),
        "pilot.mp4",
        "video/mp4",
        5 * 1024 * 1024,
        format!("raw/{}/pilot.mp4", id),
        MediaSource::Upload,
    );
    media
        .transition(RawMediaStatus::Uploading, false, None)
        .expect("created -> uploading");
    repo.create(&media).await.expect("Failed to create media");

    repo.update_progress(&id, 40).await.expect("Failed to update progress");
    let stored = repo.get(&id).await.expect("Failed to get media").expect("media missing");
    assert_eq!(stored.upload_progress, 40);
    assert_eq!(stored.status, RawMediaStatus::Uploading);

    media
        .transition(RawMediaStatus::UploadCompleted, false, None)
        .expect("uploading -> upload_completed");
    repo.save(&media).await.expect("Failed to save media");

    let stored = repo.get(&id).await.expect("Failed to get media").expect("media missing");
    assert_eq!(stored.status, RawMediaStatus::UploadCompleted);
    assert_eq!(stored.status_history.len(), 3);
}

#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_missing_media_is_none() {
    let repo = media_repo().await;
    let missing = repo.get(&MediaId::new()).await.expect("Failed to query media");
    assert!(missing.is_none());
}

#[tokio::test]
#[ignore = "requires Firestore credentials"]
async fn test_list_media_by_status() {
    let repo = media_repo().await;
    let page = repo
        .list(Some(RawMediaStatus::UploadCompleted), &PageParams::default())
        .await
        .expect("Failed to list media");
    assert!(page.data.iter().all(|m| m.status == RawMediaStatus::UploadCompleted));
}
