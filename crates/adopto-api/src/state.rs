use std::sync::Arc;

use tracing::error;

use adopto_db::Database;

use crate::error::ApiError;
use crate::uploads::UploadStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub uploads: UploadStore,
    /// Reject (400) instead of ignoring file parts other than the image field.
    pub reject_extra_files: bool,
}

/// Run a blocking DB closure off the async runtime. Failures become a 500
/// carrying `context` as the client message.
pub async fn run_blocking<F, T>(state: &AppState, context: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.clone();
    tokio::task::spawn_blocking(move || f(&db.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::database(context, anyhow::anyhow!("blocking task failed: {}", e))
        })?
        .map_err(|e| ApiError::database(context, e))
}
