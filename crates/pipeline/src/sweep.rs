//! Background eviction of expired jobs.
//!
//! Job records are in-memory only; without eviction the registry grows
//! for the life of the process. The sweeper periodically drops finished
//! jobs that have been idle past the registry's TTL. Running jobs are
//! never touched.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::registry::JobRegistry;

/// Spawn the sweeper task.
///
/// Runs until `cancel` fires; the returned handle lets the caller await
/// the task during shutdown.
pub fn start_sweeper(
    registry: Arc<JobRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would sweep an empty registry.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Job sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = registry.sweep().await;
                    if evicted > 0 {
                        tracing::info!(evicted, "Swept expired jobs");
                    }
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use pyrowatch_core::types::JobId;

    use crate::registry::RunOutcome;

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_after_ttl() {
        let registry = Arc::new(JobRegistry::new(Duration::from_secs(60)));
        let job_id = JobId::new_v4();
        let ctx = registry.register(job_id, PathBuf::from("old.mp4")).await;
        registry
            .finish(job_id, ctx.epoch, RunOutcome::Completed)
            .await;

        let cancel = CancellationToken::new();
        let handle = start_sweeper(
            Arc::clone(&registry),
            Duration::from_secs(30),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert!(registry.status(job_id).await.is_err());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let registry = Arc::new(JobRegistry::new(Duration::from_secs(60)));
        let cancel = CancellationToken::new();
        let handle = start_sweeper(registry, Duration::from_secs(3600), cancel.clone());

        cancel.cancel();
        handle.await.unwrap();
    }
}
