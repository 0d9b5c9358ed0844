use std::sync::Arc;

use diffview::ReconcileError;

/// Errors produced by [`crate::BatchingCache`].
///
/// Cloneable: every waiter on a page receives the same error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// A page size of zero was requested.
    #[error("page size must be at least 1")]
    InvalidPageSize,

    /// The cache was created outside a tokio runtime and no handle was supplied.
    #[error("no tokio runtime available to run page fetches")]
    NoRuntime,

    /// The page fetcher failed. The fetcher's error is carried unchanged.
    #[error("fetching the page starting at row {start_row} failed: {source}")]
    Fetch {
        start_row: usize,
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// The fetch worker exited without publishing a result (e.g. the fetcher panicked).
    #[error("fetch worker for the page starting at row {start_row} exited without a result")]
    Worker { start_row: usize },
}

/// Errors produced by [`crate::DataModel`] and [`crate::ViewSource`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError<E> {
    /// The data source failed; its error is passed through untouched.
    #[error("data source error: {0}")]
    Source(#[source] E),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// A requery or commit was issued from a thread other than the one that created the model.
    #[error("data model used outside its owner thread")]
    ForeignContext,

    /// The requery interceptor went away before completing the criteria change.
    #[error("criteria change was dropped before completion")]
    Interrupted,

    /// A blocking data source call did not run to completion.
    #[error("blocking data source call failed: {0}")]
    Worker(String),
}
