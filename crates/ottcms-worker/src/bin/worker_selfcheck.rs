//! Checks that a worker deployment can reach its dependencies.

use ottcms_queue::JobQueue;
use ottcms_worker::WorkerConfig;

/// Each entry is satisfied by any one of its variables.
const REQUIRED_ENV: &[&[&str]] = &[
    &["REDIS_URL"],
    &["S3_BUCKET"],
    &["GCP_PROJECT_ID", "FIREBASE_PROJECT_ID"],
    &["FRAME_EXTRACTOR_URL"],
    &["FRAME_EXTRACTOR_API_KEY"],
    &["GEMINI_API_KEY"],
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with public_base_url={}",
        config.public_base_url
    );
    config
        .validate()
        .map_err(|missing| anyhow::anyhow!("missing required env var {}", missing))?;
    ensure_env_present(REQUIRED_ENV)?;

    let queue = JobQueue::from_env()?;
    queue.ping().await?;
    println!("worker-selfcheck: redis reachable, queue length {}", queue.len().await?);

    println!("worker-selfcheck: ok");
    Ok(())
}

fn ensure_env_present(required: &[&[&str]]) -> anyhow::Result<()> {
    for alternatives in required {
        if !alternatives.iter().any(|var| std::env::var(var).is_ok()) {
            return Err(anyhow::anyhow!("missing required env var {}", alternatives.join(" or ")));
        }
    }
    Ok(())
}
