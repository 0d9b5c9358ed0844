/// Configuration for [`crate::ViewSource`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewOptions {
    /// Rows per page fetched by the row cache. Must be at least 1.
    pub page_size: usize,

    /// Log a warning when the data source reports two identities at the same position.
    ///
    /// The later identity is dropped from the refresh either way.
    pub warn_on_duplicate_positions: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            page_size: 20,
            warn_on_duplicate_positions: true,
        }
    }
}

impl ViewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_warn_on_duplicate_positions(mut self, warn: bool) -> Self {
        self.warn_on_duplicate_positions = warn;
        self
    }
}

/// The rows a renderer currently shows, `top_row..=bottom_row`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    pub top_row: usize,
    pub bottom_row: usize,
}

impl Viewport {
    /// `bottom_row` is clamped to at least `top_row`.
    pub fn new(top_row: usize, bottom_row: usize) -> Self {
        Self {
            top_row,
            bottom_row: bottom_row.max(top_row),
        }
    }

    /// A viewport of `len` rows (at least one) starting at `top_row`.
    pub fn from_len(top_row: usize, len: usize) -> Self {
        Self::new(top_row, top_row.saturating_add(len.saturating_sub(1)))
    }

    /// Number of rows covered. An inverted viewport covers `top_row` only.
    pub fn row_count(&self) -> usize {
        self.bottom_row
            .saturating_sub(self.top_row)
            .saturating_add(1)
    }

    pub fn contains(&self, row: usize) -> bool {
        (self.top_row..=self.bottom_row).contains(&row)
    }
}
