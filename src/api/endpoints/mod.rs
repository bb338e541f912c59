//! API endpoint handlers.
//!
//! Each module covers one step of the screening flow. Handlers stay thin:
//! they call into `CoreState` and map its errors.

pub mod analysis;
pub mod health;
pub mod passport;
pub mod report;
pub mod scan;
pub mod session;

use std::sync::Arc;

use crate::api::error::ApiError;
use crate::core_state::{CoreError, CoreState};

/// Run `work` on the blocking pool and map its error.
pub(crate) async fn run_blocking<T, F>(core: Arc<CoreState>, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&CoreState) -> Result<T, CoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&core))
        .await
        .map_err(|e| ApiError::Internal(format!("Task join error: {e}")))?
        .map_err(ApiError::from)
}
