// Example: rows leaving the viewport are pruned unless retained (e.g. a selection).
use diffview::{RowMeta, VisibleRows};

fn main() {
    let mut rows = VisibleRows::new();
    for position in 0..10u32 {
        rows.insert_at(position as usize, RowMeta::new(position, 1, position as usize));
    }

    // One row was inserted at the top: everything shifts down by one.
    let after: Vec<RowMeta<u32>> = (0..10u32)
        .map(|id| RowMeta::new(id, 1, id as usize + 1))
        .chain([RowMeta::new(100, 1, 0)])
        .collect();

    // Keep row 2 materialized (it is selected) even though the viewport moves to 5..=9.
    let mut tx = rows.snapshot(10, 11, [2]);
    tx.reconcile(after).expect("rows are consistent");
    let ins = tx.commit(5, 9).expect("commit succeeds");

    println!(
        "moves={} inserted_visible={:?} inserted_invisible={:?}",
        ins.moved().count(),
        ins.inserted_visible().collect::<Vec<_>>(),
        ins.inserted_invisible().collect::<Vec<_>>()
    );
    println!("materialized: [{}]", rows.ids_display());
    println!("top_row={:?} bottom_row={:?}", rows.top_row(), rows.bottom_row());
}
