//! Cancellation (spec.md §5: "every operation must accept a cancellation
//! token that aborts at the next suspension point"). Threaded only at this
//! façade, not through every trait method one layer down — each public
//! [`crate::engine::Engine`] method wraps its own suspension points with
//! [`guard`].

use mindstore_core::errors::MindstoreResult;
use mindstore_core::MindstoreError;
use tokio_util::sync::CancellationToken;

/// Races `fut` against cancellation. A token already cancelled, or one
/// that fires before `fut` resolves, short-circuits to
/// [`MindstoreError::Cancelled`] — the caller's partial writes are left as
/// spec.md §5 permits; recovery is a backfill, not a rollback here.
pub async fn guard<T>(
    token: &CancellationToken,
    fut: impl std::future::Future<Output = MindstoreResult<T>>,
) -> MindstoreResult<T> {
    if token.is_cancelled() {
        return Err(MindstoreError::Cancelled);
    }
    tokio::select! {
        _ = token.cancelled() => Err(MindstoreError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn already_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let result = guard(&token, async { Ok(1) }).await;
        assert!(matches!(result, Err(MindstoreError::Cancelled)));
    }

    #[tokio::test]
    async fn uncancelled_token_passes_through_result() {
        let token = CancellationToken::new();
        let result: MindstoreResult<i32> = guard(&token, async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn cancellation_during_await_wins_the_race() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            child.cancel();
        });
        let result: MindstoreResult<i32> = guard(&token, async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(1)
        })
        .await;
        assert!(matches!(result, Err(MindstoreError::Cancelled)));
    }
}
