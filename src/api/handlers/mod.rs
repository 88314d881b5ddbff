//! Route handlers, one module per resource

pub mod admin;
pub mod assignments;
pub mod auth;
pub mod classes;
pub mod dashboard;
pub mod decks;
pub mod progress;
pub mod users;

use crate::api::error::{ApiError, ApiResult};

/// Trim an optional free-text field; blank becomes `None`.
pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Turn a validation helper's `Result<T, String>` into an API result.
pub(crate) fn validated<T>(result: Result<T, String>) -> ApiResult<T> {
    result.map_err(ApiError::BadRequest)
}

/// Run CPU-heavy work (password hashing) on the blocking pool so it does
/// not hold up the async workers.
pub(crate) async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blocking_runs_off_the_async_thread() {
        let caller = std::thread::current().id();
        let worker = blocking(|| Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(worker, caller);
    }

    #[tokio::test]
    async fn test_blocking_passes_errors_through() {
        let result: ApiResult<()> = blocking(|| Err(ApiError::BadRequest("weak".into()))).await;
        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "weak"));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text(Some("  hi ".into())), Some("hi".to_string()));
        assert_eq!(clean_text(Some("   ".into())), None);
    }
}
