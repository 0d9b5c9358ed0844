use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use crate::key::{KeyMap, KeySet, RowKey};
use crate::{ReconcileError, RowMeta, ViewInstructions, VisibleRows, Visibility};

/// A pending reconciliation between the rows currently materialized in a [`VisibleRows`] and
/// the same identities re-queried under new criteria.
///
/// Usage:
/// 1. classify every row, either one by one (`held`, `moved`, `removed`, `appeared`,
///    `refresh`) or with [`Transaction::reconcile`];
/// 2. call [`Transaction::commit`] with the new viewport bounds.
///
/// Nothing touches the borrowed rows until `commit` succeeds: all work happens on a scratch
/// copy that replaces the backing store at the very end.
pub struct Transaction<'a, K> {
    rows: &'a mut VisibleRows<K>,
    row_count_before: usize,
    row_count_after: usize,
    retain: KeySet<K>,

    held: Vec<usize>,
    moved: BTreeMap<usize, usize>,
    move_targets: BTreeSet<usize>,
    removed: BTreeSet<usize>,
    appeared: Vec<RowMeta<K>>,
    appeared_at: BTreeSet<usize>,
    refresh: BTreeMap<usize, i64>,
}

impl<'a, K: RowKey> Transaction<'a, K> {
    pub(crate) fn new(
        rows: &'a mut VisibleRows<K>,
        row_count_before: usize,
        row_count_after: usize,
        retain_ids: impl IntoIterator<Item = K>,
    ) -> Self {
        Self {
            rows,
            row_count_before,
            row_count_after,
            retain: retain_ids.into_iter().collect(),
            held: Vec::new(),
            moved: BTreeMap::new(),
            move_targets: BTreeSet::new(),
            removed: BTreeSet::new(),
            appeared: Vec::new(),
            appeared_at: BTreeSet::new(),
            refresh: BTreeMap::new(),
        }
    }

    pub fn row_count_before(&self) -> usize {
        self.row_count_before
    }

    pub fn row_count_after(&self) -> usize {
        self.row_count_after
    }

    /// A row that was not materialized before and now is.
    pub fn appeared(&mut self, row: RowMeta<K>) -> Result<(), ReconcileError> {
        if !self.appeared_at.insert(row.position) {
            return Err(ReconcileError::DuplicateAppeared {
                position: row.position,
            });
        }
        self.appeared.push(row);
        Ok(())
    }

    /// A materialized row that no longer exists under the new criteria.
    pub fn removed(&mut self, position: usize) -> Result<(), ReconcileError> {
        if !self.removed.insert(position) {
            return Err(ReconcileError::DuplicateRemoved { position });
        }
        Ok(())
    }

    /// A materialized row whose position changed.
    pub fn moved(&mut self, from: usize, to: usize) -> Result<(), ReconcileError> {
        if self.move_targets.contains(&to) {
            return Err(ReconcileError::MoveTargetTaken { from, to });
        }
        if self.moved.contains_key(&from) {
            return Err(ReconcileError::MoveSourceTaken { from, to });
        }
        self.moved.insert(from, to);
        self.move_targets.insert(to);
        Ok(())
    }

    /// A materialized row that stays where it was.
    pub fn held(&mut self, position: usize) {
        self.held.push(position);
    }

    /// A row whose version changed; `position` is its position after the change.
    pub fn refresh(&mut self, position: usize, version: i64) {
        self.refresh.insert(position, version);
    }

    /// Classifies every row by joining the materialized rows (before) with `after_rows` on
    /// identity:
    /// - before only: removed
    /// - after only: appeared (in `after_rows` order)
    /// - both, same position: held; different position: moved
    /// - both, different version: additionally refreshed at the after position
    ///
    /// `after_rows` should cover every identity currently materialized, the identities in the
    /// new viewport and any retained identities, with positions computed under the new
    /// criteria.
    pub fn reconcile(
        &mut self,
        after_rows: impl IntoIterator<Item = RowMeta<K>>,
    ) -> Result<(), ReconcileError> {
        let after: Vec<RowMeta<K>> = after_rows.into_iter().collect();
        let mut by_key: KeyMap<K, usize> = KeyMap::new();
        for (i, row) in after.iter().enumerate() {
            if by_key.insert(row.key.clone(), i).is_some() {
                vwarn!(
                    position = row.position,
                    "Transaction::reconcile: identity returned twice, keeping the last"
                );
            }
        }

        let before: Vec<(K, i64, usize)> = self
            .rows
            .iter()
            .map(|meta| (meta.key.clone(), meta.version, meta.position))
            .collect();

        let mut matched: KeySet<K> = KeySet::new();
        for (key, version, position) in before {
            let Some(&i) = by_key.get(&key) else {
                self.removed(position)?;
                continue;
            };
            let (to, new_version) = (after[i].position, after[i].version);
            if to == position {
                self.held(position);
            } else {
                self.moved(position, to)?;
            }
            if new_version != version {
                self.refresh(to, new_version);
            }
            matched.insert(key);
        }

        for row in after {
            if !matched.contains(&row.key) {
                self.appeared(row)?;
            }
        }
        Ok(())
    }

    /// Computes the view instructions and installs the new materialized rows.
    ///
    /// `top_row..=bottom_row` is the viewport after the change. Rows outside it are dropped
    /// unless their identity was retained.
    ///
    /// Guarantees `net_change() == row_count_after - row_count_before` on success. On error the
    /// materialized rows are left untouched.
    pub fn commit(
        self,
        top_row: usize,
        bottom_row: usize,
    ) -> Result<ViewInstructions, ReconcileError> {
        let Self {
            rows,
            row_count_before,
            row_count_after,
            retain,
            held,
            moved,
            removed,
            appeared,
            appeared_at,
            refresh,
            ..
        } = self;

        let expected = row_count_after as isize - row_count_before as isize;
        let mut out = ViewInstructions::new();
        let mut next = VisibleRows::new();
        // Net count of moves from the viewport (or below) to above `top_row`.
        let mut top_deficit = 0isize;

        for position in held {
            let Some(meta) = rows.get(position) else {
                return Err(ReconcileError::HeldRowMissing { position });
            };
            next.insert_at(position, meta.clone());
        }

        for (&from, &to) in &moved {
            if to >= row_count_after {
                return Err(ReconcileError::MoveOutOfBounds {
                    from,
                    to,
                    row_count: row_count_after,
                });
            }
            out.move_row(from, to)?;

            if from >= top_row && to < top_row {
                top_deficit += 1;
            }
            if to >= top_row && from < top_row {
                top_deficit -= 1;
            }

            if let Some(meta) = rows.get(from) {
                next.insert_at(to, meta.clone());
            }
        }

        out.delete_many(removed.iter().copied(), Visibility::Visible)?;

        for row in appeared {
            let position = row.position;
            if position >= row_count_after {
                return Err(ReconcileError::AppearedOutOfBounds {
                    position,
                    row_count: row_count_after,
                });
            }

            if out.net_change() < expected {
                out.insert(position, Visibility::Visible)?;
            } else {
                // Net change already matches: an invisible donor delete pays for an invisible
                // insert instead of a move from an unrelated row.
                let donor = if top_deficit > 0 {
                    top_deficit -= 1;
                    let donor = first_free(
                        0..row_count_before,
                        |p| !appeared_at.contains(&p),
                        |p| out.can_delete_from(p),
                    );
                    if let Some(d) = donor {
                        if d >= top_row {
                            vwarn!(
                                donor = d,
                                top_row,
                                "Transaction::commit: expected a donor above the top row"
                            );
                        }
                    }
                    donor
                } else {
                    first_free(
                        (0..row_count_before).rev(),
                        |p| !appeared_at.contains(&p),
                        |p| out.can_delete_from(p),
                    )
                };
                let donor = donor.ok_or(ReconcileError::NoDonorRow { position })?;
                vtrace!(donor, position, "Transaction::commit: donor pair");
                out.delete(donor, Visibility::Invisible)?;
                out.insert(position, Visibility::Invisible)?;
            }

            next.insert_at(position, row);
        }

        // Balance against the true delta, always working from the end of the list.
        let mut preferred = (0..row_count_after).rev();
        let mut fallback = (0..row_count_after).rev();
        while out.net_change() < expected {
            let position = preferred
                .by_ref()
                .find(|&p| !next.contains_row(p) && out.can_insert_at(p))
                .or_else(|| fallback.by_ref().find(|&p| out.can_insert_at(p)))
                .ok_or(ReconcileError::CountUnbalanced {
                    net_change: out.net_change(),
                    expected,
                })?;
            out.insert(position, Visibility::Invisible)?;
        }

        let mut preferred = (0..row_count_before).rev();
        let mut fallback = (0..row_count_before).rev();
        while out.net_change() > expected {
            let position = preferred
                .by_ref()
                .find(|&p| !next.contains_row(p) && out.can_delete_from(p))
                .or_else(|| fallback.by_ref().find(|&p| out.can_delete_from(p)))
                .ok_or(ReconcileError::CountUnbalanced {
                    net_change: out.net_change(),
                    expected,
                })?;
            out.delete(position, Visibility::Invisible)?;
        }

        for (position, version) in refresh {
            if let Some(meta) = next.get_mut(position) {
                meta.version = version;
            }
            out.push_refresh(position);
        }

        next.retain(|&position, meta| {
            (top_row..=bottom_row).contains(&position) || retain.contains(&meta.key)
        });

        vdebug!(
            net_change = out.net_change(),
            materialized = next.len(),
            "Transaction::commit"
        );
        *rows = next;
        Ok(out)
    }
}

/// First candidate accepted by both predicates, else the first accepted by `allowed` alone.
fn first_free<I>(
    candidates: I,
    preferred: impl Fn(usize) -> bool,
    allowed: impl Fn(usize) -> bool,
) -> Option<usize>
where
    I: Iterator<Item = usize> + Clone,
{
    candidates
        .clone()
        .find(|&p| preferred(p) && allowed(p))
        .or_else(|| candidates.clone().find(|&p| allowed(p)))
}
