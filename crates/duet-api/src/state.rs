use std::sync::Arc;

use duet_db::Database;
use duet_gateway::Relay;

use crate::error::{ApiError, ApiResult};
use crate::media::MediaStore;
use crate::outbound::Outbound;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub relay: Relay,
    pub media: MediaStore,
    pub outbound: Outbound,
}

/// Run a store operation on the blocking pool so rusqlite never stalls the
/// async runtime (keeps the relay responsive while store I/O is pending).
pub async fn with_db<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
        .map_err(ApiError::Internal)
}
