//! Process-wide single-flight loader for a widget's backing API
//!
//! Every widget creation awaits the same load. Concurrent callers share the
//! in-flight attempt. A successful result is kept for the life of the process;
//! a failed one is not, so the next caller tries again.

use crate::utils::error::Result;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct ApiLoader<T> {
    cell: OnceCell<Arc<T>>,
    attempts: AtomicUsize,
}

impl<T> ApiLoader<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Return the loaded API, running `load` only if nobody has succeeded yet
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let api = self
            .cell
            .get_or_try_init(move || async move {
                self.attempts.fetch_add(1, Ordering::Relaxed);
                load().await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(api))
    }

    /// Already-loaded API, if any
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    /// Number of load attempts started so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl<T> Default for ApiLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}
