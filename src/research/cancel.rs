//! Cooperative cancellation at suspension points.
//!
//! The model adapter never checks the token itself. Every research stage wraps
//! its suspending calls in [`run_cancellable`], which checks before the call,
//! races the call against the token and checks again afterwards.

use crate::types::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn ensure_active(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}

pub async fn run_cancellable<T, F>(token: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ensure_active(token)?;
    let result = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(AppError::Cancelled),
        result = call => result,
    };
    ensure_active(token)?;
    result
}

/// Sleep for `duration` unless cancelled first. A zero duration only checks.
pub async fn pause(token: &CancellationToken, duration: Duration) -> Result<()> {
    if duration.is_zero() {
        return ensure_active(token);
    }
    run_cancellable(token, async {
        tokio::time::sleep(duration).await;
        Ok(())
    })
    .await
}
