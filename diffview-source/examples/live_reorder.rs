// Example: a view over an in-memory table, re-sorted through an intercepted requery.
use std::convert::Infallible;
use std::rc::Rc;
use std::sync::Arc;

use diffview::RowMeta;
use diffview_source::{CriteriaChange, DataModel, DataSource, ViewOptions, ViewSource, Viewport};
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
struct Track {
    id: u32,
    title: String,
    plays: u32,
}

#[derive(Clone, Debug, Default)]
struct Sort {
    by_plays: bool,
}

struct Library {
    tracks: Arc<Vec<Track>>,
    sort: Sort,
}

impl Library {
    fn ordered(&self) -> Vec<Track> {
        let mut tracks = self.tracks.as_ref().clone();
        if self.sort.by_plays {
            tracks.sort_by(|a, b| b.plays.cmp(&a.plays).then(a.id.cmp(&b.id)));
        }
        tracks
    }
}

impl DataSource for Library {
    type Key = u32;
    type Model = Track;
    type Criteria = Sort;
    type Error = Infallible;

    fn count(&self) -> Result<usize, Infallible> {
        Ok(self.tracks.len())
    }

    fn page(&self, skip: usize, take: usize) -> Result<Vec<Track>, Infallible> {
        Ok(self.ordered().into_iter().skip(skip).take(take).collect())
    }

    fn row_meta(&self, keys: &[u32]) -> Result<Vec<RowMeta<u32>>, Infallible> {
        Ok(self
            .ordered()
            .iter()
            .enumerate()
            .filter(|(_, t)| keys.contains(&t.id))
            .map(|(position, t)| RowMeta::new(t.id, 1, position))
            .collect())
    }

    fn ids(&self, skip: usize, take: usize) -> Result<Vec<u32>, Infallible> {
        Ok(self
            .ordered()
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|t| t.id)
            .collect())
    }

    fn criteria(&self) -> &Sort {
        &self.sort
    }

    fn with_criteria(&self, sort: Sort) -> Self {
        Self {
            tracks: Arc::clone(&self.tracks),
            sort,
        }
    }

    fn row_meta_of(&self, track: &Track, position: usize) -> RowMeta<u32> {
        RowMeta::new(track.id, 1, position)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let tracks = (0..50u32)
        .map(|id| Track {
            id,
            title: format!("track {id:02}"),
            plays: (id * 37) % 101,
        })
        .collect();
    let library = Library {
        tracks: Arc::new(tracks),
        sort: Sort::default(),
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<CriteriaChange<Sort, Infallible>>();
    let model = Rc::new(DataModel::with_interceptor(library, tx));
    let mut view = ViewSource::new(Rc::clone(&model), ViewOptions::new().with_page_size(8))
        .expect("inside a runtime");
    let viewport = Viewport::from_len(0, 6);

    view.refresh(Sort::default(), viewport, [])
        .await
        .expect("initial refresh");
    println!("on screen: [{}]", view.visible_rows().ids_display());

    // The adapter owns the receiving side: it applies each change to the view and completes
    // (or fails) it.
    let adapter = async {
        let change = rx.recv().await.expect("model is alive");
        view.apply_change(change, viewport, []).await
    };
    let (requery, applied) = tokio::join!(
        model.requery_with_criteria(|sort| sort.by_plays = true),
        adapter
    );
    requery.expect("requery completes");
    let ins = applied
        .expect("refresh succeeds")
        .expect("requester was waiting");

    println!(
        "moves={} deleted={:?} inserted={:?} net={}",
        ins.moved().count(),
        ins.deleted(),
        ins.inserted(),
        ins.net_change()
    );
    for row in viewport.top_row..=viewport.bottom_row {
        if let Some(track) = view.load_row(row).await.expect("row loads") {
            println!("{row:>2}: {} ({} plays)", track.title, track.plays);
        }
    }
}
