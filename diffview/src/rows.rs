use alloc::collections::{BTreeMap, BTreeSet};
use core::fmt;

use crate::key::RowKey;
use crate::{ReconcileError, RowMeta, Transaction};

/// The rows currently materialized by a renderer, keyed by position.
///
/// Entries always satisfy `rows[p].position == p`: positions are stamped by
/// [`VisibleRows::insert_at`], never by callers mutating an entry in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibleRows<K> {
    rows: BTreeMap<usize, RowMeta<K>>,
}

impl<K> Default for VisibleRows<K> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<K: RowKey> VisibleRows<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row: usize) -> Option<&RowMeta<K>> {
        self.rows.get(&row)
    }

    pub fn try_get_id_at_row(&self, row: usize) -> Option<&K> {
        self.rows.get(&row).map(|meta| &meta.key)
    }

    pub fn contains_row(&self, row: usize) -> bool {
        self.rows.contains_key(&row)
    }

    /// Stores `row` at `position`, stamping its position field.
    ///
    /// Returns the entry previously stored there, if any.
    pub fn insert_at(&mut self, position: usize, mut row: RowMeta<K>) -> Option<RowMeta<K>> {
        row.position = position;
        self.rows.insert(position, row)
    }

    /// Inserts `row` at `row.position`, or updates the stored version when the same identity is
    /// already there.
    ///
    /// Fails if a different identity occupies the position.
    pub fn set(&mut self, row: RowMeta<K>) -> Result<(), ReconcileError> {
        if let Some(existing) = self.rows.get_mut(&row.position) {
            if existing.key != row.key {
                vwarn!(position = row.position, "VisibleRows::set: identity conflict");
                return Err(ReconcileError::PositionOccupied {
                    position: row.position,
                });
            }
            existing.version = row.version;
            return Ok(());
        }
        let position = row.position;
        self.insert_at(position, row);
        Ok(())
    }

    pub fn is_id_visible(&self, id: &K) -> bool {
        self.rows.values().any(|meta| meta.key == *id)
    }

    pub fn row_for_id(&self, id: &K) -> Option<&RowMeta<K>> {
        self.rows.values().find(|meta| meta.key == *id)
    }

    /// Marks a row as stale by resetting its version to 0, so the next refresh reports it as
    /// changed and its content is reloaded.
    ///
    /// Returns `false` if the identity is not materialized.
    pub fn evict(&mut self, id: &K) -> bool {
        match self.rows.values_mut().find(|meta| meta.key == *id) {
            Some(meta) => {
                meta.version = 0;
                true
            }
            None => false,
        }
    }

    /// Drops every entry whose position is not in `keep_positions`.
    pub fn remove_stale_rows(&mut self, keep_positions: impl IntoIterator<Item = usize>) {
        let keep: BTreeSet<usize> = keep_positions.into_iter().collect();
        self.rows.retain(|position, _| keep.contains(position));
        vtrace!(kept = self.rows.len(), "VisibleRows::remove_stale_rows");
    }

    /// Lowest materialized position.
    pub fn top_row(&self) -> Option<usize> {
        self.rows.first_key_value().map(|(&position, _)| position)
    }

    /// Highest materialized position.
    pub fn bottom_row(&self) -> Option<usize> {
        self.rows.last_key_value().map(|(&position, _)| position)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Identities in position order. The iterator is `Clone`, so it can be restarted.
    pub fn row_ids(&self) -> impl Iterator<Item = &K> + Clone + '_ {
        self.rows.values().map(|meta| &meta.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowMeta<K>> + Clone + '_ {
        self.rows.values()
    }

    /// Begins a reconciliation against this set of rows.
    ///
    /// `retain_ids` are identities that survive pruning even when they end up outside the
    /// viewport passed to [`Transaction::commit`] (e.g. selected rows).
    pub fn snapshot(
        &mut self,
        row_count_before: usize,
        row_count_after: usize,
        retain_ids: impl IntoIterator<Item = K>,
    ) -> Transaction<'_, K> {
        vdebug!(row_count_before, row_count_after, "VisibleRows::snapshot");
        Transaction::new(self, row_count_before, row_count_after, retain_ids)
    }

    /// Formats the materialized identities as a comma separated list, in position order.
    pub fn ids_display(&self) -> IdsDisplay<'_, K>
    where
        K: fmt::Display,
    {
        IdsDisplay { rows: self }
    }

    pub(crate) fn get_mut(&mut self, row: usize) -> Option<&mut RowMeta<K>> {
        self.rows.get_mut(&row)
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&usize, &mut RowMeta<K>) -> bool) {
        self.rows.retain(f);
    }
}

/// See [`VisibleRows::ids_display`].
pub struct IdsDisplay<'a, K> {
    rows: &'a VisibleRows<K>,
}

impl<K: fmt::Display> fmt::Display for IdsDisplay<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, meta) in self.rows.rows.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", meta.key)?;
        }
        Ok(())
    }
}
