// Example: a swap plus a replacement keeps the renderer's row count intact.
use diffview::{RowMeta, VisibleRows};

fn main() {
    // Rows A, B, C are on screen.
    let mut rows = VisibleRows::new();
    for (position, id) in ["A", "B", "C"].into_iter().enumerate() {
        rows.insert_at(position, RowMeta::new(id, 1, position));
    }
    println!("before: [{}]", rows.ids_display());

    // The new ordering is B, A, D (C was filtered out, D matched instead).
    let mut tx = rows.snapshot(3, 3, []);
    tx.reconcile([
        RowMeta::new("B", 1, 0),
        RowMeta::new("A", 1, 1),
        RowMeta::new("D", 1, 2),
    ])
    .expect("rows are consistent");
    let ins = tx.commit(0, 2).expect("commit succeeds");

    println!("moves: {:?}", ins.moved().collect::<Vec<_>>());
    println!("deleted: {:?} inserted: {:?}", ins.deleted(), ins.inserted());
    println!("net change: {}", ins.net_change());
    println!("after: [{}]", rows.ids_display());
}
