//! Error types for row bookkeeping and reconciliation.

/// Errors raised when callers and the reconciler disagree about row state.
///
/// Every variant is a programming error: the operation that produced it is aborted and no
/// committed state is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// Two appeared rows claim the same position.
    #[error("appeared {position}: already have a row at this position")]
    DuplicateAppeared {
        /// Target position.
        position: usize,
    },

    /// The same position was removed twice.
    #[error("removed {position}: row already removed")]
    DuplicateRemoved {
        /// Source position.
        position: usize,
    },

    /// A second move targets the same destination.
    #[error("move {from}->{to}: destination already targeted by a move")]
    MoveTargetTaken {
        /// Source position.
        from: usize,
        /// Destination position.
        to: usize,
    },

    /// A second move starts at the same source.
    #[error("move {from}->{to}: source already moved")]
    MoveSourceTaken {
        /// Source position.
        from: usize,
        /// Destination position.
        to: usize,
    },

    /// A move lands beyond the new row count.
    #[error("move {from}->{to}: destination beyond row count {row_count}")]
    MoveOutOfBounds {
        /// Source position.
        from: usize,
        /// Destination position.
        to: usize,
        /// Row count after the change.
        row_count: usize,
    },

    /// An appeared row lands beyond the new row count.
    #[error("appeared {position}: beyond row count {row_count}")]
    AppearedOutOfBounds {
        /// Target position.
        position: usize,
        /// Row count after the change.
        row_count: usize,
    },

    /// A held position is not materialized in the visible rows.
    #[error("held {position}: row is not materialized")]
    HeldRowMissing {
        /// Held position.
        position: usize,
    },

    /// An insert would reuse a position already inserted at or moved to.
    #[error("insert {position}: position already targeted")]
    InsertConflict {
        /// Target position.
        position: usize,
    },

    /// A delete would reuse a position already deleted or moved from.
    #[error("delete {position}: position already deleted or moved")]
    DeleteConflict {
        /// Source position.
        position: usize,
    },

    /// No free position remains to pair with an appeared row.
    #[error("appeared {position}: no donor row left to delete")]
    NoDonorRow {
        /// Target position of the appeared row.
        position: usize,
    },

    /// The instruction set cannot be balanced against the row count delta.
    #[error("net change {net_change} cannot reach expected {expected}")]
    CountUnbalanced {
        /// Net change reached so far.
        net_change: isize,
        /// `row_count_after - row_count_before`.
        expected: isize,
    },

    /// A different identity already occupies the position.
    #[error("row {position} is already occupied by another identity")]
    PositionOccupied {
        /// Contested position.
        position: usize,
    },
}
