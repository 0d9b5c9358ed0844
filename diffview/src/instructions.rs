use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use crate::{ReconcileError, Visibility};

/// The outcome of a reconciliation: what the renderer must do, by position.
///
/// Delete and move sources are positions in the list *before* the change; insert targets and
/// move destinations are positions *after* it. The two spaces are validated independently:
/// - an insert target may be inserted at most once and never coincide with a move destination;
/// - a delete source may be deleted at most once and never coincide with a move source.
///
/// Apply the structural instructions before re-rendering the rows listed in
/// [`ViewInstructions::positions_needing_refresh`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewInstructions {
    inserted_visible: BTreeSet<usize>,
    inserted_invisible: BTreeSet<usize>,
    deleted_visible: BTreeSet<usize>,
    deleted_invisible: BTreeSet<usize>,
    moved: BTreeMap<usize, usize>,
    refresh: Vec<usize>,
}

impl ViewInstructions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inserted_visible(&self) -> impl Iterator<Item = usize> + '_ {
        self.inserted_visible.iter().copied()
    }

    pub fn inserted_invisible(&self) -> impl Iterator<Item = usize> + '_ {
        self.inserted_invisible.iter().copied()
    }

    pub fn deleted_visible(&self) -> impl Iterator<Item = usize> + '_ {
        self.deleted_visible.iter().copied()
    }

    pub fn deleted_invisible(&self) -> impl Iterator<Item = usize> + '_ {
        self.deleted_invisible.iter().copied()
    }

    /// Every insert target regardless of visibility, ascending.
    pub fn inserted(&self) -> Vec<usize> {
        self.inserted_visible
            .union(&self.inserted_invisible)
            .copied()
            .collect()
    }

    /// Every delete source regardless of visibility, ascending.
    pub fn deleted(&self) -> Vec<usize> {
        self.deleted_visible
            .union(&self.deleted_invisible)
            .copied()
            .collect()
    }

    /// Moves as `(from, to)` pairs, ordered by source.
    pub fn moved(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.moved.iter().map(|(&from, &to)| (from, to))
    }

    /// Rows whose content changed (by version) and must be re-rendered after the structural
    /// instructions have been applied.
    pub fn positions_needing_refresh(&self) -> &[usize] {
        &self.refresh
    }

    /// Returns `true` if there is any structural instruction (refreshes do not count).
    pub fn has_changes(&self) -> bool {
        !self.inserted_visible.is_empty()
            || !self.inserted_invisible.is_empty()
            || !self.deleted_visible.is_empty()
            || !self.deleted_invisible.is_empty()
            || !self.moved.is_empty()
    }

    pub fn can_insert_at(&self, position: usize) -> bool {
        !(self.inserted_visible.contains(&position)
            || self.inserted_invisible.contains(&position)
            || self.moved.values().any(|&to| to == position))
    }

    pub fn can_delete_from(&self, position: usize) -> bool {
        !(self.deleted_visible.contains(&position)
            || self.deleted_invisible.contains(&position)
            || self.moved.contains_key(&position))
    }

    pub fn insert(&mut self, position: usize, visibility: Visibility) -> Result<(), ReconcileError> {
        if !self.can_insert_at(position) {
            return Err(ReconcileError::InsertConflict { position });
        }
        match visibility {
            Visibility::Visible => self.inserted_visible.insert(position),
            Visibility::Invisible => self.inserted_invisible.insert(position),
        };
        Ok(())
    }

    pub fn delete(&mut self, position: usize, visibility: Visibility) -> Result<(), ReconcileError> {
        if !self.can_delete_from(position) {
            return Err(ReconcileError::DeleteConflict { position });
        }
        match visibility {
            Visibility::Visible => self.deleted_visible.insert(position),
            Visibility::Invisible => self.deleted_invisible.insert(position),
        };
        Ok(())
    }

    pub fn delete_many(
        &mut self,
        positions: impl IntoIterator<Item = usize>,
        visibility: Visibility,
    ) -> Result<(), ReconcileError> {
        for position in positions {
            self.delete(position, visibility)?;
        }
        Ok(())
    }

    pub fn move_row(&mut self, from: usize, to: usize) -> Result<(), ReconcileError> {
        if self.moved.contains_key(&from) {
            return Err(ReconcileError::MoveSourceTaken { from, to });
        }
        if self.moved.values().any(|&dest| dest == to) {
            return Err(ReconcileError::MoveTargetTaken { from, to });
        }
        if !self.can_delete_from(from) {
            return Err(ReconcileError::DeleteConflict { position: from });
        }
        if !self.can_insert_at(to) {
            return Err(ReconcileError::InsertConflict { position: to });
        }
        self.moved.insert(from, to);
        Ok(())
    }

    pub(crate) fn push_refresh(&mut self, position: usize) {
        self.refresh.push(position);
    }

    /// Inserts minus deletes, over both visibilities.
    ///
    /// After a successful commit this equals `row_count_after - row_count_before`.
    pub fn net_change(&self) -> isize {
        let inserted = self.inserted_visible.len() + self.inserted_invisible.len();
        let deleted = self.deleted_visible.len() + self.deleted_invisible.len();
        inserted as isize - deleted as isize
    }
}
