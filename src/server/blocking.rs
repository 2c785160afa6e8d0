use tokio_util::sync::CancellationToken;

use super::response::ApiError;
use crate::error::Result;

/// Runs a store operation on the blocking pool.
///
/// The operation receives a token that is cancelled when the calling request future is
/// dropped, e.g. because the client disconnected.
pub async fn run_blocking<T, F>(operation: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let _guard = cancel.drop_guard();

    let result = tokio::task::spawn_blocking(move || operation(&token))
        .await
        .map_err(|e| ApiError::internal(format!("store task failed: {e}")))?;
    Ok(result?)
}
