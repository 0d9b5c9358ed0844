use std::collections::HashSet;
use std::rc::Rc;

use diffview::{ReconcileError, ViewInstructions, VisibleRows};

use crate::{
    BatchingCache, CacheError, CriteriaChange, DataModel, DataSource, RowFuture, SourceError,
    ViewOptions, Viewport,
};

/// Drives a renderer from a [`DataModel`]: keeps the materialized rows, serves row content
/// through a [`BatchingCache`] and turns criteria changes into [`ViewInstructions`].
///
/// This type does not hold any UI objects. Adapters drive it by calling:
/// - `refresh` (or `apply_change` for intercepted requeries) when the criteria change
/// - `load_row`, or `fetch_row` + `accept_row`, when the renderer needs a row's content
/// - `evict` when a row is known to be stale
///
/// Every structural change replaces the row cache and bumps [`generation`](Self::generation);
/// rows fetched under an older generation are rejected by `accept_row`.
pub struct ViewSource<S: DataSource> {
    model: Rc<DataModel<S>>,
    rows: VisibleRows<S::Key>,
    cache: BatchingCache<S::Model>,
    generation: u64,
    options: ViewOptions,
}

impl<S: DataSource> ViewSource<S> {
    /// Must be called inside a tokio runtime (the row cache binds to it).
    pub fn new(model: Rc<DataModel<S>>, options: ViewOptions) -> Result<Self, CacheError> {
        let cache = BatchingCache::new(options.page_size)?;
        Ok(Self {
            model,
            rows: VisibleRows::new(),
            cache,
            generation: 0,
            options,
        })
    }

    pub fn model(&self) -> &Rc<DataModel<S>> {
        &self.model
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn visible_rows(&self) -> &VisibleRows<S::Key> {
        &self.rows
    }

    pub fn cache(&self) -> &BatchingCache<S::Model> {
        &self.cache
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Switches the model to `criteria` and reconciles the materialized rows.
    ///
    /// The rows considered are those in `viewport` under the new criteria, those currently
    /// materialized and `retain_ids`. Rows outside `viewport` are dropped from the
    /// materialized set unless retained.
    ///
    /// The returned instructions are consistent with the old and new row counts. On error the
    /// model, the materialized rows and the cache are left as they were.
    pub async fn refresh(
        &mut self,
        criteria: S::Criteria,
        viewport: Viewport,
        retain_ids: impl IntoIterator<Item = S::Key>,
    ) -> Result<ViewInstructions, SourceError<S::Error>> {
        self.model.ensure_owner()?;
        // The fields are public, so an inverted viewport can get here.
        let viewport = Viewport::new(viewport.top_row, viewport.bottom_row);

        let before = self.model.count().await?;
        let snapshot = self.model.snapshot(criteria);
        let after = snapshot.count().await?;

        let viewport_ids = if viewport.top_row < after {
            snapshot.ids(viewport.top_row, viewport.row_count()).await?
        } else {
            Vec::new()
        };

        let retain: Vec<S::Key> = retain_ids.into_iter().collect();
        let mut seen = HashSet::new();
        let wanted: Vec<S::Key> = viewport_ids
            .into_iter()
            .chain(self.rows.row_ids().cloned())
            .chain(retain.iter().cloned())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let mut after_rows = snapshot.row_meta(wanted).await?;
        after_rows.retain(|meta| {
            let in_range = meta.position < after;
            if !in_range {
                vwarn!(
                    position = meta.position,
                    row_count = after,
                    "ViewSource: row reported past the end of the list"
                );
            }
            in_range
        });
        after_rows.sort_by_key(|meta| meta.position);
        let warn = self.options.warn_on_duplicate_positions;
        after_rows.dedup_by(|later, earlier| {
            let duplicate = later.position == earlier.position;
            if duplicate && warn {
                vwarn!(
                    position = later.position,
                    "ViewSource: two identities reported at one position"
                );
            }
            duplicate
        });

        let instructions = {
            let mut tx = self.rows.snapshot(before, after, retain);
            tx.reconcile(after_rows)?;
            tx.commit(viewport.top_row, viewport.bottom_row)?
        };
        self.model.commit(snapshot)?;

        if instructions.has_changes() {
            self.cache = self.cache.emptied();
            self.generation += 1;
        } else {
            for &position in instructions.positions_needing_refresh() {
                self.cache.remove_page_for_row(position);
            }
        }
        vdebug!(
            before,
            after,
            net_change = instructions.net_change(),
            generation = self.generation,
            "ViewSource::refresh"
        );
        Ok(instructions)
    }

    /// Applies an intercepted criteria change and completes it.
    ///
    /// A failed refresh fails the change instead, so the waiting requery returns the error and
    /// this returns `Ok(None)`. The error comes back here only when the requester has stopped
    /// waiting.
    pub async fn apply_change(
        &mut self,
        change: CriteriaChange<S::Criteria, S::Error>,
        viewport: Viewport,
        retain_ids: impl IntoIterator<Item = S::Key>,
    ) -> Result<Option<ViewInstructions>, SourceError<S::Error>> {
        let (criteria, completion) = change.into_parts();
        match self.refresh(criteria, viewport, retain_ids).await {
            Ok(instructions) => {
                completion.complete();
                Ok(Some(instructions))
            }
            Err(err) => {
                vwarn!(error = %err, "ViewSource: intercepted requery failed");
                completion.fail(err).map(|()| None)
            }
        }
    }

    /// Starts (or joins) the fetch of `row`'s page. Pass the returned generation to
    /// [`accept_row`](Self::accept_row) once the row arrives.
    pub fn fetch_row(&self, row: usize) -> (u64, RowFuture<S::Model>) {
        let source = self.model.source();
        let future = self
            .cache
            .get(row, move |skip, take| source.page(skip, take));
        (self.generation, future)
    }

    /// Materializes a loaded row, unless it was fetched before the last structural change.
    ///
    /// Returns whether the row was accepted.
    pub fn accept_row(
        &mut self,
        generation: u64,
        row: usize,
        model: &S::Model,
    ) -> Result<bool, ReconcileError> {
        if generation != self.generation {
            vtrace!(
                row,
                generation,
                current = self.generation,
                "ViewSource: stale row ignored"
            );
            return Ok(false);
        }
        let meta = self.model.source().row_meta_of(model, row);
        self.rows.set(meta)?;
        Ok(true)
    }

    /// Fetches `row` and materializes it.
    pub async fn load_row(
        &mut self,
        row: usize,
    ) -> Result<Option<S::Model>, SourceError<S::Error>> {
        let (generation, future) = self.fetch_row(row);
        let item = future.await?;
        if let Some(model) = &item {
            self.accept_row(generation, row, model)?;
        }
        Ok(item)
    }

    /// Marks a materialized row stale: its cached page is dropped and the next refresh reports
    /// it for re-rendering.
    pub fn evict(&mut self, id: &S::Key) -> bool {
        if let Some(meta) = self.rows.row_for_id(id) {
            self.cache.remove_page_for_row(meta.position);
        }
        self.rows.evict(id)
    }
}
