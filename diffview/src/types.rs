/// Identity, version and position of one row.
///
/// This is the unit the reconciler reasons about: `key` says *which* logical row, `version` says
/// whether its content changed, and `position` says where it sits in the ordered result set.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowMeta<K> {
    pub key: K,
    pub version: i64,
    /// Zero-based index in the ordered, filtered result set.
    pub position: usize,
}

impl<K> RowMeta<K> {
    pub fn new(key: K, version: i64, position: usize) -> Self {
        Self {
            key,
            version,
            position,
        }
    }
}

/// Whether an insert/delete instruction should be animated.
///
/// Invisible instructions only exist to keep the renderer's row count in step with the data
/// source (for example a donor delete paired with an insert elsewhere).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Visibility {
    Visible,
    Invisible,
}
