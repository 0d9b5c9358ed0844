use diffview::{RowKey, RowMeta};
use tokio::sync::{mpsc, oneshot};

use crate::SourceError;

/// An ordered, filterable, paginated store of rows.
///
/// Every method except [`criteria`](Self::criteria), [`with_criteria`](Self::with_criteria) and
/// [`row_meta_of`](Self::row_meta_of) is blocking I/O: callers in this crate run them on tokio's
/// blocking pool.
pub trait DataSource: Send + Sync + 'static {
    type Key: RowKey + Send + Sync + 'static;
    type Model: Clone + Send + Sync + 'static;
    type Criteria: Clone + Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Number of rows under the current criteria.
    fn count(&self) -> Result<usize, Self::Error>;

    /// Up to `take` rows starting at position `skip`, in order.
    fn page(&self, skip: usize, take: usize) -> Result<Vec<Self::Model>, Self::Error>;

    /// Identity, version and position of exactly the requested identities under the current
    /// criteria. Identities that no longer match are omitted.
    fn row_meta(&self, keys: &[Self::Key]) -> Result<Vec<RowMeta<Self::Key>>, Self::Error>;

    /// Up to `take` identities starting at position `skip`, in order.
    fn ids(&self, skip: usize, take: usize) -> Result<Vec<Self::Key>, Self::Error>;

    fn criteria(&self) -> &Self::Criteria;

    /// A sibling source over the same storage with different criteria. `self` stays queryable
    /// and unchanged.
    fn with_criteria(&self, criteria: Self::Criteria) -> Self
    where
        Self: Sized;

    /// Projects a loaded row onto its identity and version.
    fn row_meta_of(&self, model: &Self::Model, position: usize) -> RowMeta<Self::Key>;
}

/// Completion signal for a [`CriteriaChange`].
///
/// Dropping it without calling [`complete`](Self::complete) or [`fail`](Self::fail) fails the
/// pending requery with [`SourceError::Interrupted`].
#[derive(Debug)]
pub struct Completion<E>(oneshot::Sender<Result<(), SourceError<E>>>);

impl<E> Completion<E> {
    pub fn complete(self) {
        // The requester may have given up waiting; nothing to report then.
        let _ = self.0.send(Ok(()));
    }

    /// Fails the pending requery with `err`.
    ///
    /// Hands `err` back when the requester is no longer waiting.
    pub fn fail(self, err: SourceError<E>) -> Result<(), SourceError<E>> {
        match self.0.send(Err(err)) {
            Ok(()) => Ok(()),
            Err(returned) => returned,
        }
    }
}

/// A criteria change handed to a [`RequeryInterceptor`].
#[derive(Debug)]
pub struct CriteriaChange<C, E> {
    criteria: C,
    completion: Completion<E>,
}

pub(crate) type ChangeResult<E> = oneshot::Receiver<Result<(), SourceError<E>>>;

impl<C, E> CriteriaChange<C, E> {
    pub(crate) fn new(criteria: C) -> (Self, ChangeResult<E>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                criteria,
                completion: Completion(tx),
            },
            rx,
        )
    }

    pub fn criteria(&self) -> &C {
        &self.criteria
    }

    pub fn into_parts(self) -> (C, Completion<E>) {
        (self.criteria, self.completion)
    }

    /// Completes the change without applying it.
    pub fn complete(self) {
        self.completion.complete();
    }
}

/// Receives criteria changes that need asynchronous work before they take effect.
///
/// Injected into a [`crate::DataModel`] at construction. The receiving side is expected to
/// apply the criteria (typically with [`crate::ViewSource::apply_change`]) and then complete
/// or fail the change.
pub trait RequeryInterceptor<C, E>: Send {
    /// Hands the change over, or gives it back if it cannot be delivered.
    fn intercept(&self, change: CriteriaChange<C, E>) -> Result<(), CriteriaChange<C, E>>;
}

impl<C: Send, E: Send> RequeryInterceptor<C, E> for mpsc::UnboundedSender<CriteriaChange<C, E>> {
    fn intercept(&self, change: CriteriaChange<C, E>) -> Result<(), CriteriaChange<C, E>> {
        self.send(change).map_err(|err| err.0)
    }
}
