use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::CacheError;

/// Resolves to the row (`Ok(None)` when the row lies past the end of its page).
pub type RowFuture<T> = BoxFuture<'static, Result<Option<T>, CacheError>>;

type PageResult<T> = Result<Arc<Vec<T>>, CacheError>;

struct Page<T> {
    start_row: usize,
    end_row: usize,
    // `None` until the fetch worker publishes.
    state: watch::Receiver<Option<PageResult<T>>>,
}

impl<T> Page<T> {
    fn item(&self, row: usize) -> Option<T>
    where
        T: Clone,
    {
        if row >= self.end_row {
            return None;
        }
        match &*self.state.borrow() {
            Some(Ok(items)) => items.get(row - self.start_row).cloned(),
            _ => None,
        }
    }
}

/// A paged row cache that turns row-granular reads into whole-page fetches.
///
/// The first [`get`](Self::get) for any row of a page starts exactly one fetch on tokio's
/// blocking pool. Every later request for that page, concurrent or not, waits on the same
/// result until the page is evicted with [`remove_page_for_row`](Self::remove_page_for_row).
pub struct BatchingCache<T> {
    page_size: usize,
    handle: Handle,
    pages: Mutex<HashMap<usize, Arc<Page<T>>>>,
}

impl<T> BatchingCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a cache bound to the current tokio runtime.
    pub fn new(page_size: usize) -> Result<Self, CacheError> {
        if page_size == 0 {
            return Err(CacheError::InvalidPageSize);
        }
        let handle = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        Self::with_handle(page_size, handle)
    }

    pub fn with_handle(page_size: usize, handle: Handle) -> Result<Self, CacheError> {
        if page_size == 0 {
            return Err(CacheError::InvalidPageSize);
        }
        Ok(Self {
            page_size,
            handle,
            pages: Mutex::new(HashMap::new()),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages currently held (resolved or in flight).
    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.lock().is_empty()
    }

    /// An empty cache with the same page size and runtime.
    pub(crate) fn emptied(&self) -> Self {
        Self {
            page_size: self.page_size,
            handle: self.handle.clone(),
            pages: Mutex::new(HashMap::new()),
        }
    }

    fn page_start(&self, row: usize) -> usize {
        row / self.page_size * self.page_size
    }

    /// Returns the row at `row`, fetching its page with `fetch_page(start_row, page_size)` if no
    /// page is cached.
    ///
    /// `fetch_page` is only invoked when this call creates the page. Fetch errors are shared by
    /// every waiter on the page and stay cached until it is evicted.
    pub fn get<F, E>(&self, row: usize, fetch_page: F) -> RowFuture<T>
    where
        F: FnOnce(usize, usize) -> Result<Vec<T>, E> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let page = self.get_or_create(row, fetch_page);
        let start_row = page.start_row;
        let mut state = page.state.clone();
        Box::pin(async move {
            if state.wait_for(Option::is_some).await.is_err() {
                return Err(CacheError::Worker { start_row });
            }
            let published = state.borrow().clone();
            match published {
                Some(Ok(items)) => Ok(items.get(row - start_row).cloned()),
                Some(Err(err)) => Err(err),
                None => Err(CacheError::Worker { start_row }),
            }
        })
    }

    fn get_or_create<F, E>(&self, row: usize, fetch_page: F) -> Arc<Page<T>>
    where
        F: FnOnce(usize, usize) -> Result<Vec<T>, E> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let start_row = self.page_start(row);
        let mut pages = self.pages.lock();
        if let Some(page) = pages.get(&start_row) {
            return Arc::clone(page);
        }

        let (tx, rx) = watch::channel(None);
        let page_size = self.page_size;
        vtrace!(start_row, page_size, "BatchingCache: fetching page");
        // Dropping `tx` without publishing (fetcher panic) surfaces as `CacheError::Worker`.
        self.handle.spawn_blocking(move || {
            let result = match fetch_page(start_row, page_size) {
                Ok(items) => Ok(Arc::new(items)),
                Err(err) => {
                    vwarn!(start_row, error = %err, "BatchingCache: page fetch failed");
                    Err(CacheError::Fetch {
                        start_row,
                        source: Arc::new(err),
                    })
                }
            };
            tx.send_replace(Some(result));
        });

        let page = Arc::new(Page {
            start_row,
            end_row: start_row.saturating_add(page_size),
            state: rx,
        });
        pages.insert(start_row, Arc::clone(&page));
        page
    }

    /// Returns the row if its page is cached and resolved, without waiting or fetching.
    pub fn try_get(&self, row: usize) -> Option<T> {
        let page = self.pages.lock().get(&self.page_start(row)).cloned()?;
        page.item(row)
    }

    /// Evicts the page owning `row` so the next [`get`](Self::get) refetches it.
    ///
    /// Waiters already holding a future for the evicted page still receive its result.
    pub fn remove_page_for_row(&self, row: usize) -> bool {
        let removed = self.pages.lock().remove(&self.page_start(row)).is_some();
        if removed {
            vtrace!(row, "BatchingCache: page evicted");
        }
        removed
    }
}
