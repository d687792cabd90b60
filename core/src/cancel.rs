//! Cooperative cancellation for in-flight requests.
//!
//! A `CancelToken` is cloned into every call made on behalf of one UI
//! context. Cancelling it makes pending and future calls with that token
//! return `ApiError::Cancelled`.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Runs `fut` unless the token fires first.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        if self.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ApiError::Cancelled),
            result = fut => result,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
