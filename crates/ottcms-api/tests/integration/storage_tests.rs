//! S3 storage integration tests.

use std::time::Duration;

use ottcms_storage::S3Client;

async fn storage() -> S3Client {
    dotenvy::dotenv().ok();
    S3Client::from_env().await.expect("Failed to create S3 client")
}

#[tokio::test]
#[ignore = "requires S3 credentials"]
async fn test_object_roundtrip_and_presign() {
    let storage = storage().await;
    let key = format!("integration/{}.txt", uuid::Uuid::new_v4());

    storage
        .upload_bytes(b"hello".to_vec(), &key, "text/plain")
        .await
        .expect("Failed to upload");
    assert!(storage.exists(&key).await.expect("Failed to check object"));

    let url = storage
        .presign_get(&key, Duration::from_secs(60))
        .await
        .expect("Failed to presign");
    assert!(url.contains(&key));

    storage.delete_object(&key).await.expect("Failed to delete");
    assert!(!storage.exists(&key).await.expect("Failed to check object"));
}

#[tokio::test]
#[ignore = "requires S3 credentials"]
async fn test_multipart_presign_and_abort() {
    let storage = storage().await;
    let key = format!("integration/{}.mp4", uuid::Uuid::new_v4());

    let upload = storage
        .create_multipart_upload(&key, "video/mp4")
        .await
        .expect("Failed to start multipart upload");
    assert!(!upload.upload_id.is_empty());

    let parts = storage
        .presign_upload_parts(&upload, 3, Duration::from_secs(300))
        .await
        .expect("Failed to presign parts");
    assert_eq!(parts.len(), 3);
    assert_eq!(parts.iter().map(|p| p.part_number).collect::<Vec<_>>(), vec![1, 2, 3]);

    storage
        .abort_multipart_upload(&upload)
        .await
        .expect("Failed to abort upload");
}
