//! Headless row reconciliation for virtualized views.
//!
//! For the asynchronous side (paged row cache, data source contract, requery orchestration),
//! see the `diffview-source` crate.
//!
//! A virtualized view only materializes the rows on screen, while the data behind it lives in an
//! external store that can be re-filtered, re-sorted and mutated between refreshes. This crate
//! answers one question: given the rows that were materialized before a change and the same
//! identities re-positioned after it, which insert/delete/move instructions keep the renderer's
//! rows (and row count) consistent without animating rows from unrelated places?
//!
//! It is UI-agnostic. A TUI/GUI layer is expected to:
//! - record which rows it materialized ([`VisibleRows`])
//! - re-query positions for those rows under new criteria
//! - apply the resulting [`ViewInstructions`] to its list widget
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod error;
mod instructions;
mod key;
mod rows;
mod transaction;
mod types;

#[cfg(test)]
mod tests;

pub use error::ReconcileError;
pub use instructions::ViewInstructions;
pub use key::RowKey;
pub use rows::{IdsDisplay, VisibleRows};
pub use transaction::Transaction;
pub use types::{RowMeta, Visibility};
