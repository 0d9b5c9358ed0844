use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use diffview::RowMeta;
use tokio::sync::{Mutex, watch};

use crate::{CriteriaChange, DataSource, RequeryInterceptor, SourceError};

type Result<T, S> = core::result::Result<T, SourceError<<S as DataSource>::Error>>;

async fn blocking<S, R, F>(source: &Arc<S>, f: F) -> Result<R, S>
where
    S: DataSource,
    R: Send + 'static,
    F: FnOnce(&S) -> core::result::Result<R, S::Error> + Send + 'static,
{
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || f(source.as_ref()))
        .await
        .map_err(|err| SourceError::Worker(err.to_string()))?
        .map_err(SourceError::Source)
}

/// An isolated view of a [`DataModel`]'s storage under different criteria.
///
/// Queries run against the snapshot's criteria while the model keeps serving the old ones.
/// Publish it with [`DataModel::commit`].
pub struct ModelSnapshot<S> {
    source: Arc<S>,
    count: Cell<Option<usize>>,
}

impl<S: DataSource> ModelSnapshot<S> {
    pub fn criteria(&self) -> &S::Criteria {
        self.source.criteria()
    }

    /// Row count under the snapshot's criteria, cached after the first call.
    pub async fn count(&self) -> Result<usize, S> {
        if let Some(count) = self.count.get() {
            return Ok(count);
        }
        let count = blocking(&self.source, |s| s.count()).await?;
        self.count.set(Some(count));
        Ok(count)
    }

    pub async fn page(&self, skip: usize, take: usize) -> Result<Vec<S::Model>, S> {
        blocking(&self.source, move |s| s.page(skip, take)).await
    }

    pub async fn ids(&self, skip: usize, take: usize) -> Result<Vec<S::Key>, S> {
        blocking(&self.source, move |s| s.ids(skip, take)).await
    }

    pub async fn row_meta(&self, keys: Vec<S::Key>) -> Result<Vec<RowMeta<S::Key>>, S> {
        blocking(&self.source, move |s| s.row_meta(&keys)).await
    }
}

/// Owns the live data source, its criteria and the requery protocol.
///
/// A model is bound to the thread that created it: [`requery_with_criteria`] and [`commit`]
/// fail with [`SourceError::ForeignContext`] anywhere else. Blocking source calls are moved to
/// tokio's blocking pool and awaited on the owner thread.
///
/// Overlapping requeries run one at a time in submission order.
///
/// [`requery_with_criteria`]: Self::requery_with_criteria
/// [`commit`]: Self::commit
pub struct DataModel<S: DataSource> {
    source: RefCell<Arc<S>>,
    count: Cell<Option<usize>>,
    count_tx: watch::Sender<usize>,
    interceptor: Option<Box<dyn RequeryInterceptor<S::Criteria, S::Error>>>,
    owner: ThreadId,
    // Fair, so waiting requeries are admitted in submission order.
    requery_gate: Mutex<()>,
}

impl<S: DataSource> DataModel<S> {
    /// A model that applies criteria changes synchronously.
    pub fn new(source: S) -> Self {
        Self::build(source, None)
    }

    /// A model that routes every criteria change through `interceptor`.
    pub fn with_interceptor(
        source: S,
        interceptor: impl RequeryInterceptor<S::Criteria, S::Error> + 'static,
    ) -> Self {
        Self::build(source, Some(Box::new(interceptor)))
    }

    fn build(
        source: S,
        interceptor: Option<Box<dyn RequeryInterceptor<S::Criteria, S::Error>>>,
    ) -> Self {
        let (count_tx, _) = watch::channel(0);
        Self {
            source: RefCell::new(Arc::new(source)),
            count: Cell::new(None),
            count_tx,
            interceptor,
            owner: thread::current().id(),
            requery_gate: Mutex::new(()),
        }
    }

    pub(crate) fn ensure_owner(&self) -> Result<(), S> {
        if thread::current().id() != self.owner {
            vwarn!("DataModel: used outside its owner thread");
            return Err(SourceError::ForeignContext);
        }
        Ok(())
    }

    /// The live source. Cheap to clone into blocking closures.
    pub fn source(&self) -> Arc<S> {
        self.source.borrow().clone()
    }

    pub fn criteria(&self) -> S::Criteria {
        self.source.borrow().criteria().clone()
    }

    /// Notified with the new row count whenever it changes.
    pub fn subscribe_count(&self) -> watch::Receiver<usize> {
        self.count_tx.subscribe()
    }

    /// The cached row count, recomputed after a criteria change.
    pub async fn count(&self) -> Result<usize, S> {
        if let Some(count) = self.count.get() {
            return Ok(count);
        }
        let count = blocking(&self.source(), |s| s.count()).await?;
        self.set_count(Some(count));
        Ok(count)
    }

    pub async fn page(&self, skip: usize, take: usize) -> Result<Vec<S::Model>, S> {
        blocking(&self.source(), move |s| s.page(skip, take)).await
    }

    pub async fn ids(&self, skip: usize, take: usize) -> Result<Vec<S::Key>, S> {
        blocking(&self.source(), move |s| s.ids(skip, take)).await
    }

    pub async fn row_meta(&self, keys: Vec<S::Key>) -> Result<Vec<RowMeta<S::Key>>, S> {
        blocking(&self.source(), move |s| s.row_meta(&keys)).await
    }

    fn set_count(&self, count: Option<usize>) {
        self.count.set(count);
        if let Some(count) = count {
            let changed = self.count_tx.send_if_modified(|current| {
                if *current == count {
                    return false;
                }
                *current = count;
                true
            });
            if changed {
                vdebug!(count, "DataModel: row count changed");
            }
        }
    }

    /// An isolated snapshot of the same storage under `criteria`.
    pub fn snapshot(&self, criteria: S::Criteria) -> ModelSnapshot<S> {
        ModelSnapshot {
            source: Arc::new(self.source.borrow().with_criteria(criteria)),
            count: Cell::new(None),
        }
    }

    /// Publishes a snapshot's criteria onto the model.
    pub fn commit(&self, snapshot: ModelSnapshot<S>) -> Result<(), S> {
        self.ensure_owner()?;
        let ModelSnapshot { source, count } = snapshot;
        *self.source.borrow_mut() = source;
        self.set_count(count.get());
        Ok(())
    }

    fn apply_criteria(&self, criteria: S::Criteria) {
        let source = self.source.borrow().with_criteria(criteria);
        *self.source.borrow_mut() = Arc::new(source);
        self.count.set(None);
    }

    /// Re-runs the current criteria.
    pub async fn requery(&self) -> Result<(), S> {
        self.requery_with_criteria(|_| {}).await
    }

    /// Applies `mutator` to a copy of the current criteria and makes the result effective.
    ///
    /// With an interceptor the change is handed over and this waits for its completion, returning
    /// the error it was failed with; otherwise the criteria are applied at once and the row count is recomputed.
    ///
    /// When another requery is in flight this one waits its turn. `mutator` sees the criteria
    /// in effect when the turn starts.
    pub async fn requery_with_criteria(
        &self,
        mutator: impl FnOnce(&mut S::Criteria),
    ) -> Result<(), S> {
        self.ensure_owner()?;
        let _turn = self.requery_gate.lock().await;

        let mut criteria = self.criteria();
        mutator(&mut criteria);

        let Some(interceptor) = &self.interceptor else {
            self.apply_criteria(criteria);
            self.count().await?;
            return Ok(());
        };

        let (change, done) = CriteriaChange::new(criteria);
        if interceptor.intercept(change).is_err() {
            vwarn!("DataModel: requery interceptor is gone");
            return Err(SourceError::Interrupted);
        }
        match done.await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Interrupted),
        }
    }
}
