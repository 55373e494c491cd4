//! Redis/Queue integration tests.

use ottcms_models::{GenerationTrack, PosterProjectId};
use ottcms_queue::{ExtractFramesJob, JobQueue, QueueError, QueueJob};

async fn queue() -> JobQueue {
    dotenvy::dotenv().ok();
    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");
    queue
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_connection() {
    let queue = queue().await;
    queue.ping().await.expect("Failed to ping Redis");
    let len = queue.len().await.expect("Failed to get queue length");
    println!("Queue length: {}", len);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_enqueue_consume_ack() {
    let queue = queue().await;
    let project_id = PosterProjectId::new();
    let job = ExtractFramesJob::new(project_id.clone(), "raw/test/source.mp4", 12);
    let job_id = job.job_id.clone();

    queue.enqueue_extract_frames(job).await.expect("Failed to enqueue");

    let jobs = queue.consume("test-consumer", 1000, 10).await.expect("Failed to consume");
    let (msg_id, consumed) = jobs
        .iter()
        .find(|(_, j)| j.job_id() == &job_id)
        .expect("enqueued job was not consumed");
    assert_eq!(consumed.project_id(), &project_id);
    assert_eq!(consumed.track(), GenerationTrack::Frames);

    queue.ack(msg_id).await.expect("Failed to ack");
    queue
        .release_track(GenerationTrack::Frames, &project_id)
        .await
        .expect("Failed to release track");
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_duplicate_track_is_rejected_until_released() {
    let queue = queue().await;
    let project_id = PosterProjectId::new();

    queue
        .enqueue_extract_frames(ExtractFramesJob::new(project_id.clone(), "raw/a.mp4", 12))
        .await
        .expect("Failed to enqueue");

    let second = queue
        .enqueue_extract_frames(ExtractFramesJob::new(project_id.clone(), "raw/a.mp4", 12))
        .await;
    assert!(matches!(second, Err(QueueError::DuplicateJob(_))));

    queue
        .release_track(GenerationTrack::Frames, &project_id)
        .await
        .expect("Failed to release track");
    queue
        .enqueue_extract_frames(ExtractFramesJob::new(project_id.clone(), "raw/a.mp4", 12))
        .await
        .expect("Enqueue after release should succeed");

    queue
        .release_track(GenerationTrack::Frames, &project_id)
        .await
        .expect("Failed to release track");
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_dlq() {
    let queue = queue().await;
    let project_id = PosterProjectId::new();
    let job = ExtractFramesJob::new(project_id, "raw/dlq.mp4", 4);
    let job_id = job.job_id.clone();

    queue.enqueue_extract_frames(job).await.expect("Failed to enqueue");
    let dlq_before = queue.dlq_len().await.expect("Failed to get DLQ length");

    let jobs = queue.consume("test-dlq-consumer", 1000, 10).await.expect("Failed to consume");
    let (msg_id, consumed) = jobs
        .into_iter()
        .find(|(_, j)| j.job_id() == &job_id)
        .expect("enqueued job was not consumed");

    queue
        .dlq(&msg_id, &consumed, "frame service unavailable")
        .await
        .expect("Failed to move to DLQ");
    queue.clear_dedup(&consumed).await.expect("Failed to clear dedup");

    let dlq_after = queue.dlq_len().await.expect("Failed to get DLQ length");
    assert!(dlq_after > dlq_before);
    assert!(matches!(consumed, QueueJob::ExtractFrames(_)));
}
