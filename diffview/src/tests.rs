use crate::*;

use alloc::vec::Vec;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        debug_assert!(start < end_exclusive);
        let span = (end_exclusive - start) as u64;
        start + ((self.next_u64() >> 33) % span) as usize
    }

    fn gen_bool(&mut self) -> bool {
        (self.next_u64() >> 40) & 1 == 1
    }
}

fn rows_of(ids: &[&'static str]) -> VisibleRows<&'static str> {
    let mut rows = VisibleRows::new();
    for (p, id) in ids.iter().enumerate() {
        rows.insert_at(p, RowMeta::new(*id, 1, 0));
    }
    rows
}

fn ids_in(rows: &VisibleRows<&'static str>) -> Vec<(usize, &'static str)> {
    rows.iter().map(|m| (m.position, m.key)).collect()
}

#[test]
fn instructions_reject_conflicting_positions() {
    let mut ins = ViewInstructions::new();
    ins.insert(3, Visibility::Visible).unwrap();
    assert_eq!(
        ins.insert(3, Visibility::Invisible),
        Err(ReconcileError::InsertConflict { position: 3 })
    );

    ins.move_row(1, 4).unwrap();
    assert_eq!(
        ins.insert(4, Visibility::Visible),
        Err(ReconcileError::InsertConflict { position: 4 })
    );
    assert_eq!(
        ins.delete(1, Visibility::Invisible),
        Err(ReconcileError::DeleteConflict { position: 1 })
    );
    assert_eq!(
        ins.move_row(1, 5),
        Err(ReconcileError::MoveSourceTaken { from: 1, to: 5 })
    );
    assert_eq!(
        ins.move_row(2, 4),
        Err(ReconcileError::MoveTargetTaken { from: 2, to: 4 })
    );

    // Delete sources and insert targets live in different index spaces.
    ins.delete(3, Visibility::Visible).unwrap();
    assert!(!ins.can_delete_from(3));
    assert_eq!(ins.net_change(), 0);
    assert!(ins.has_changes());
}

#[test]
fn instructions_report_sets_in_order() {
    let mut ins = ViewInstructions::new();
    ins.insert(7, Visibility::Invisible).unwrap();
    ins.insert(2, Visibility::Visible).unwrap();
    ins.delete_many([9, 4], Visibility::Visible).unwrap();
    ins.delete(0, Visibility::Invisible).unwrap();

    assert_eq!(ins.inserted(), [2, 7]);
    assert_eq!(ins.deleted(), [0, 4, 9]);
    assert_eq!(ins.inserted_visible().collect::<Vec<_>>(), [2]);
    assert_eq!(ins.deleted_invisible().collect::<Vec<_>>(), [0]);
    assert_eq!(ins.net_change(), -1);
    assert!(ins.positions_needing_refresh().is_empty());
    assert!(!ViewInstructions::new().has_changes());
}

#[test]
fn visible_rows_stamp_positions() {
    let mut rows = VisibleRows::new();
    rows.insert_at(4, RowMeta::new("a", 1, 99));
    assert_eq!(rows.get(4).map(|m| m.position), Some(4));
    assert_eq!(rows.try_get_id_at_row(4), Some(&"a"));
    assert_eq!(rows.try_get_id_at_row(5), None);
}

#[test]
fn visible_rows_set_conflicts_and_updates() {
    let mut rows = VisibleRows::new();
    rows.set(RowMeta::new("a", 1, 2)).unwrap();
    rows.set(RowMeta::new("a", 5, 2)).unwrap();
    assert_eq!(rows.get(2).map(|m| m.version), Some(5));

    assert_eq!(
        rows.set(RowMeta::new("b", 1, 2)),
        Err(ReconcileError::PositionOccupied { position: 2 })
    );
    assert_eq!(rows.try_get_id_at_row(2), Some(&"a"));
    assert_eq!(rows.len(), 1);
}

#[test]
fn visible_rows_bounds_and_queries() {
    let mut rows = VisibleRows::<&str>::new();
    assert!(rows.is_empty());
    assert_eq!(rows.top_row(), None);
    assert_eq!(rows.bottom_row(), None);

    rows.insert_at(8, RowMeta::new("c", 1, 0));
    rows.insert_at(3, RowMeta::new("a", 1, 0));
    rows.insert_at(5, RowMeta::new("b", 1, 0));
    assert_eq!(rows.top_row(), Some(3));
    assert_eq!(rows.bottom_row(), Some(8));
    assert!(rows.is_id_visible(&"b"));
    assert!(!rows.is_id_visible(&"z"));
    assert_eq!(rows.row_for_id(&"c").map(|m| m.position), Some(8));

    let ids = rows.row_ids();
    let first: Vec<_> = ids.clone().copied().collect();
    let second: Vec<_> = ids.copied().collect();
    assert_eq!(first, ["a", "b", "c"]);
    assert_eq!(first, second);
    assert_eq!(rows.ids_display().to_string(), "a, b, c");

    rows.remove_stale_rows([5, 8, 100]);
    assert_eq!(ids_in(&rows), [(5, "b"), (8, "c")]);
}

#[test]
fn evict_resets_version() {
    let mut rows = rows_of(&["a", "b"]);
    assert!(rows.evict(&"b"));
    assert!(!rows.evict(&"z"));
    assert_eq!(rows.get(1).map(|m| m.version), Some(0));
    assert_eq!(rows.get(0).map(|m| m.version), Some(1));
}

#[test]
fn registration_rejects_duplicates() {
    let mut rows = rows_of(&["a", "b", "c"]);
    let mut tx = rows.snapshot(3, 3, []);

    tx.appeared(RowMeta::new("x", 1, 1)).unwrap();
    assert_eq!(
        tx.appeared(RowMeta::new("y", 1, 1)),
        Err(ReconcileError::DuplicateAppeared { position: 1 })
    );

    tx.removed(2).unwrap();
    assert_eq!(
        tx.removed(2),
        Err(ReconcileError::DuplicateRemoved { position: 2 })
    );

    tx.moved(0, 2).unwrap();
    assert_eq!(
        tx.moved(1, 2),
        Err(ReconcileError::MoveTargetTaken { from: 1, to: 2 })
    );
    assert_eq!(
        tx.moved(0, 1),
        Err(ReconcileError::MoveSourceTaken { from: 0, to: 1 })
    );
}

#[test]
fn swap_with_replacement_pairs_donor() {
    // Before: A B C (only A and B materialized). After: B A D, same row count.
    let mut rows = rows_of(&["A", "B"]);
    let mut tx = rows.snapshot(3, 3, []);
    tx.moved(0, 1).unwrap();
    tx.moved(1, 0).unwrap();
    tx.appeared(RowMeta::new("D", 1, 2)).unwrap();
    let ins = tx.commit(0, 2).unwrap();

    assert_eq!(ins.moved().collect::<Vec<_>>(), [(0, 1), (1, 0)]);
    assert_eq!(ins.deleted_invisible().collect::<Vec<_>>(), [2]);
    assert_eq!(ins.inserted_invisible().collect::<Vec<_>>(), [2]);
    assert_eq!(ins.inserted_visible().count(), 0);
    assert_eq!(ins.net_change(), 0);
    assert_eq!(ids_in(&rows), [(0, "B"), (1, "A"), (2, "D")]);
}

#[test]
fn swap_with_replacement_through_reconcile() {
    // C was materialized, so the join reports it removed rather than needing a donor.
    let mut rows = rows_of(&["A", "B", "C"]);
    let mut tx = rows.snapshot(3, 3, []);
    tx.reconcile([
        RowMeta::new("B", 1, 0),
        RowMeta::new("A", 1, 1),
        RowMeta::new("D", 1, 2),
    ])
    .unwrap();
    let ins = tx.commit(0, 2).unwrap();

    assert_eq!(ins.moved().collect::<Vec<_>>(), [(0, 1), (1, 0)]);
    assert_eq!(ins.deleted(), [2]);
    assert_eq!(ins.inserted(), [2]);
    assert_eq!(ins.net_change(), 0);
    assert_eq!(ids_in(&rows), [(0, "B"), (1, "A"), (2, "D")]);
}

#[test]
fn append_is_a_single_visible_insert() {
    let mut rows = rows_of(&["a", "b", "c", "d", "e"]);
    let mut tx = rows.snapshot(5, 6, []);
    for p in 0..5 {
        tx.held(p);
    }
    tx.appeared(RowMeta::new("f", 1, 5)).unwrap();
    let ins = tx.commit(0, 5).unwrap();

    assert_eq!(ins.inserted_visible().collect::<Vec<_>>(), [5]);
    assert_eq!(ins.inserted_invisible().count(), 0);
    assert_eq!(ins.deleted().len(), 0);
    assert_eq!(ins.net_change(), 1);
    assert_eq!(rows.try_get_id_at_row(5), Some(&"f"));
}

#[test]
fn donor_comes_from_above_after_move_to_top() {
    // Ten rows, 5..=9 materialized. Row 9 moves to the front, everything else shifts down.
    let mut rows = VisibleRows::new();
    for p in 5..10u64 {
        rows.insert_at(p as usize, RowMeta::new(p, 1, 0));
    }
    let after: Vec<u64> = [9, 0, 1, 2, 3, 4, 5, 6, 7, 8].to_vec();
    let mut wanted: Vec<RowMeta<u64>> = Vec::new();
    for (p, &id) in after.iter().enumerate() {
        if (5..10).contains(&p) || (5..10).contains(&id) {
            wanted.push(RowMeta::new(id, 1, p));
        }
    }

    let mut tx = rows.snapshot(10, 10, []);
    tx.reconcile(wanted).unwrap();
    let ins = tx.commit(5, 9).unwrap();

    assert_eq!(ins.moved().count(), 5);
    assert_eq!(ins.deleted_invisible().collect::<Vec<_>>(), [0]);
    assert_eq!(ins.inserted_invisible().collect::<Vec<_>>(), [5]);
    assert_eq!(ins.net_change(), 0);
    let ids: Vec<u64> = rows.row_ids().copied().collect();
    assert_eq!(ids, [4, 5, 6, 7, 8]);
}

#[test]
fn shrink_balances_with_invisible_deletes() {
    // 10 rows, viewport 0..=2 unchanged, two rows vanished further down.
    let mut rows = rows_of(&["a", "b", "c"]);
    let mut tx = rows.snapshot(10, 8, []);
    tx.reconcile([
        RowMeta::new("a", 1, 0),
        RowMeta::new("b", 1, 1),
        RowMeta::new("c", 1, 2),
    ])
    .unwrap();
    let ins = tx.commit(0, 2).unwrap();

    assert_eq!(ins.deleted_invisible().collect::<Vec<_>>(), [8, 9]);
    assert_eq!(ins.net_change(), -2);
    assert!(ins.moved().next().is_none());
}

#[test]
fn growth_balances_with_invisible_inserts() {
    let mut rows = rows_of(&["a", "b"]);
    let mut tx = rows.snapshot(2, 5, []);
    tx.reconcile([RowMeta::new("a", 1, 0), RowMeta::new("b", 1, 1)])
        .unwrap();
    let ins = tx.commit(0, 1).unwrap();

    assert_eq!(ins.inserted_invisible().collect::<Vec<_>>(), [2, 3, 4]);
    assert_eq!(ins.net_change(), 3);
}

#[test]
fn version_change_requests_refresh_at_new_position() {
    let mut rows = rows_of(&["a", "b", "c"]);
    let mut tx = rows.snapshot(3, 3, []);
    tx.reconcile([
        RowMeta::new("a", 1, 0),
        RowMeta::new("c", 4, 1),
        RowMeta::new("b", 2, 2),
    ])
    .unwrap();
    let ins = tx.commit(0, 2).unwrap();

    assert_eq!(ins.positions_needing_refresh(), [1, 2]);
    assert_eq!(rows.get(1).map(|m| (m.key, m.version)), Some(("c", 4)));
    assert_eq!(rows.get(2).map(|m| (m.key, m.version)), Some(("b", 2)));
}

#[test]
fn evicted_row_is_refreshed_on_next_commit() {
    let mut rows = rows_of(&["a", "b"]);
    rows.evict(&"a");
    let mut tx = rows.snapshot(2, 2, []);
    tx.reconcile([RowMeta::new("a", 1, 0), RowMeta::new("b", 1, 1)])
        .unwrap();
    let ins = tx.commit(0, 1).unwrap();

    assert!(!ins.has_changes());
    assert_eq!(ins.positions_needing_refresh(), [0]);
    assert_eq!(rows.get(0).map(|m| m.version), Some(1));
}

#[test]
fn commit_prunes_outside_viewport_but_keeps_retained() {
    let mut rows = rows_of(&["a", "b", "c", "d"]);
    let mut tx = rows.snapshot(4, 4, ["a"]);
    for p in 0..4 {
        tx.held(p);
    }
    tx.commit(2, 3).unwrap();

    assert_eq!(ids_in(&rows), [(0, "a"), (2, "c"), (3, "d")]);
}

#[test]
fn failed_commit_leaves_rows_untouched() {
    let mut rows = rows_of(&["a", "b", "c"]);
    let snapshot = rows.clone();

    let mut tx = rows.snapshot(3, 3, []);
    tx.held(0);
    tx.moved(1, 3).unwrap();
    assert_eq!(
        tx.commit(0, 2),
        Err(ReconcileError::MoveOutOfBounds {
            from: 1,
            to: 3,
            row_count: 3
        })
    );
    assert_eq!(rows, snapshot);

    let mut tx = rows.snapshot(3, 3, []);
    tx.appeared(RowMeta::new("z", 1, 7)).unwrap();
    assert_eq!(
        tx.commit(0, 2),
        Err(ReconcileError::AppearedOutOfBounds {
            position: 7,
            row_count: 3
        })
    );
    assert_eq!(rows, snapshot);

    let mut tx = rows.snapshot(3, 3, []);
    tx.held(9);
    assert_eq!(
        tx.commit(0, 2),
        Err(ReconcileError::HeldRowMissing { position: 9 })
    );
    assert_eq!(rows, snapshot);
}

struct Case {
    before: Vec<u64>,
    after: Vec<u64>,
}

fn random_case(rng: &mut Lcg) -> Case {
    let n = rng.gen_range_usize(0, 40);
    let before: Vec<u64> = (0..n as u64).collect();
    let mut after = before.clone();

    let removals = rng.gen_range_usize(0, 6).min(after.len());
    for _ in 0..removals {
        let i = rng.gen_range_usize(0, after.len());
        after.remove(i);
    }
    let inserts = rng.gen_range_usize(0, 6);
    for k in 0..inserts {
        let i = rng.gen_range_usize(0, after.len() + 1);
        after.insert(i, 1000 + k as u64);
    }
    if !after.is_empty() {
        for _ in 0..rng.gen_range_usize(0, 6) {
            let from = rng.gen_range_usize(0, after.len());
            let id = after.remove(from);
            let to = rng.gen_range_usize(0, after.len() + 1);
            after.insert(to, id);
        }
    }
    Case { before, after }
}

fn version_of(id: u64) -> i64 {
    if id % 3 == 0 { 2 } else { 1 }
}

#[test]
fn randomized_commits_keep_counts_and_viewport_consistent() {
    let mut rng = Lcg::new(0x5eed_d1ff);
    for _ in 0..500 {
        let Case { before, after } = random_case(&mut rng);

        let mut rows = VisibleRows::new();
        if !before.is_empty() {
            let top = rng.gen_range_usize(0, before.len());
            let len = rng.gen_range_usize(1, 12);
            for p in top..(top + len).min(before.len()) {
                rows.insert_at(p, RowMeta::new(before[p], 1, p));
            }
        }

        let retain: Vec<u64> = match rows.iter().next() {
            Some(meta) if rng.gen_bool() => [meta.key].to_vec(),
            _ => Vec::new(),
        };

        let top_row = rng.gen_range_usize(0, after.len().max(1));
        let bottom_row = top_row + rng.gen_range_usize(0, 12);

        let mut wanted: HashSet<u64> = rows.row_ids().copied().collect();
        wanted.extend(retain.iter().copied());
        for p in top_row..=bottom_row.min(after.len().saturating_sub(1)) {
            if let Some(&id) = after.get(p) {
                wanted.insert(id);
            }
        }
        let mut after_rows: Vec<RowMeta<u64>> = after
            .iter()
            .enumerate()
            .filter(|(_, id)| wanted.contains(id))
            .map(|(p, &id)| RowMeta::new(id, version_of(id), p))
            .collect();
        after_rows.sort_by_key(|m| m.position);

        let mut tx = rows.snapshot(before.len(), after.len(), retain.iter().copied());
        tx.reconcile(after_rows).unwrap();
        let ins = tx.commit(top_row, bottom_row).unwrap();

        assert_eq!(
            ins.net_change(),
            after.len() as isize - before.len() as isize
        );

        let inserted = ins.inserted();
        let deleted = ins.deleted();
        assert!(inserted.iter().all(|&p| p < after.len()));
        assert!(deleted.iter().all(|&p| p < before.len()));
        for (from, to) in ins.moved() {
            assert!(from < before.len() && to < after.len());
            assert!(!inserted.contains(&to));
            assert!(!deleted.contains(&from));
        }

        for p in top_row..=bottom_row {
            if p < after.len() {
                assert_eq!(rows.try_get_id_at_row(p), Some(&after[p]));
            }
        }
        for meta in rows.iter() {
            assert_eq!(after.get(meta.position), Some(&meta.key));
            assert_eq!(meta.version, version_of(meta.key));
            assert!(
                (top_row..=bottom_row).contains(&meta.position) || retain.contains(&meta.key)
            );
        }
        for id in &retain {
            if after.contains(id) {
                assert!(rows.is_id_visible(id));
            }
        }
    }
}
