//! Data plumbing for the `diffview` crate.
//!
//! `diffview` decides how materialized rows move when the data behind a view changes. This
//! crate supplies the asynchronous side an adapter needs around it:
//!
//! - [`BatchingCache`]: row-granular reads served by whole-page fetches, one fetch per page
//! - [`DataSource`] / [`DataModel`]: the store contract plus criteria, snapshots and requery
//! - [`ViewSource`]: the refresh driver that joins the model, the materialized rows and the
//!   cache into [`diffview::ViewInstructions`]
//!
//! Blocking store calls run on tokio's blocking pool. `DataModel` and `ViewSource` belong to
//! the thread that created them (a current-thread runtime or a `LocalSet`); the cache is
//! `Send + Sync`.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod cache;
mod error;
mod model;
mod options;
mod source;
mod view;


pub use cache::{BatchingCache, RowFuture};
pub use error::{CacheError, SourceError};
pub use model::{DataModel, ModelSnapshot};
pub use options::{ViewOptions, Viewport};
pub use source::{Completion, CriteriaChange, DataSource, RequeryInterceptor};
pub use view::ViewSource;
