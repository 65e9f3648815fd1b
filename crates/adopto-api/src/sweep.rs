use std::collections::HashSet;
use std::io;
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::state::{AppState, run_blocking};
use crate::uploads::UploadStore;

/// Shortest period between passes. `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Background task that removes orphaned uploads.
///
/// Runs every `period` (at least one second), deletes files in the uploads
/// directory that no feedback row references and that are older than
/// `grace`, and prunes idempotency keys that fell out of the replay window.
pub async fn run_sweep_loop(state: AppState, period: Duration, grace: Duration) {
    let mut interval = tokio::time::interval(period.max(MIN_INTERVAL));

    loop {
        interval.tick().await;

        match sweep_orphans(&state, grace).await {
            Ok(count) => {
                if count > 0 {
                    info!("Sweep: removed {} orphaned uploads", count);
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }

        match run_blocking(&state, "prune submission keys", |db| db.prune_submission_keys()).await {
            Ok(n) if n > 0 => info!("Sweep: pruned {} expired submission keys", n),
            Ok(_) => {}
            Err(e) => warn!("Sweep error: {:?}", e),
        }
    }
}

/// Delete unreferenced uploads last modified more than `grace` ago.
/// Younger files may belong to a request that has not inserted its row yet.
///
/// A file that cannot be inspected or deleted is logged and skipped.
pub async fn sweep_orphans(state: &AppState, grace: Duration) -> anyhow::Result<usize> {
    let referenced: HashSet<String> = run_blocking(state, "list referenced uploads", |db| {
        db.referenced_images()
    })
    .await
    .map_err(|e| anyhow::anyhow!("{:?}", e))?
    .into_iter()
    .filter_map(|path| path.rsplit('/').next().map(str::to_string))
    .collect();

    let now = SystemTime::now();
    let mut removed = 0;

    for name in state.uploads.list_files().await? {
        if referenced.contains(&name) {
            continue;
        }

        match remove_if_stale(&state.uploads, &name, now, grace).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => warn!("Sweep: skipping {}: {}", name, e),
        }
    }

    Ok(removed)
}

/// Delete `name` if it is older than `grace`. A file that vanished since the
/// directory listing counts as already removed and returns `Ok(false)`.
async fn remove_if_stale(
    uploads: &UploadStore,
    name: &str,
    now: SystemTime,
    grace: Duration,
) -> anyhow::Result<bool> {
    let modified = match tokio::fs::metadata(uploads.file_path(name)).await {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if now.duration_since(modified).unwrap_or_default() < grace {
        return Ok(false);
    }

    uploads.delete_file(name).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use adopto_db::Database;
    use adopto_types::api::FeedbackForm;

    use crate::state::AppStateInner;

    #[tokio::test]
    async fn test_only_unreferenced_files_are_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = UploadStore::new(tmp.path().to_path_buf(), 1024).await.unwrap();
        std::fs::write(uploads.file_path("kept.png"), b"kept").unwrap();
        std::fs::write(uploads.file_path("orphan.png"), b"orphan").unwrap();

        let db = Database::open_in_memory().unwrap();
        let form = FeedbackForm {
            name: "Ada".into(),
            feedback: "Great".into(),
            ..Default::default()
        };
        db.insert_feedback(&form, Some("uploads/kept.png")).unwrap();

        let state = Arc::new(AppStateInner {
            db,
            uploads,
            reject_extra_files: false,
        });

        // Fresh files are inside the grace period.
        assert_eq!(sweep_orphans(&state, Duration::from_secs(3600)).await.unwrap(), 0);

        assert_eq!(sweep_orphans(&state, Duration::ZERO).await.unwrap(), 1);
        let mut left = state.uploads.list_files().await.unwrap();
        left.sort();
        assert_eq!(left, vec!["kept.png".to_string()]);
    }

    #[tokio::test]
    async fn test_vanished_file_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let uploads = UploadStore::new(tmp.path().to_path_buf(), 1024).await.unwrap();

        let removed = remove_if_stale(&uploads, "gone.png", SystemTime::now(), Duration::ZERO)
            .await
            .unwrap();
        assert!(!removed);
    }

    #[tokio::test]
    async fn test_zero_period_does_not_panic() {
        let tmp = tempfile::tempdir().unwrap();
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            uploads: UploadStore::new(tmp.path().to_path_buf(), 1024).await.unwrap(),
            reject_extra_files: false,
        });

        let handle = tokio::spawn(run_sweep_loop(state, Duration::ZERO, Duration::ZERO));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
