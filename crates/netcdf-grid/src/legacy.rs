//! Hand-off to a codec for the legacy single-vector layout.
//!
//! Old-style grids store the samples as one `z(xysize)` vector with the
//! ranges in separate `x_range`/`y_range`/`z_range` variables. They are
//! recognized by the `xysize` dimension and handed over as a whole.

use crate::error::GridResult;
use crate::store::{BackendResult, Container};
use crate::types::{GridHeader, Padding, ReadSummary, Region};

/// Dimension whose presence marks the legacy layout.
pub const LEGACY_MARKER_DIM: &str = "xysize";

/// Reader for grids in the legacy layout.
pub trait LegacyCodec {
    /// Read the header of a legacy grid.
    ///
    /// The returned header must use [`crate::Layout::Legacy`].
    fn read_header(&self, path: &str) -> GridResult<GridHeader>;

    /// Read a window of a legacy grid, with the same buffer contract as
    /// [`crate::reader::read_grid`].
    fn read_grid(
        &self,
        path: &str,
        header: &mut GridHeader,
        grid: &mut [f32],
        region: &Region,
        pad: Padding,
        complex: bool,
    ) -> GridResult<ReadSummary>;
}

/// Whether an open container uses the legacy layout.
pub fn is_legacy<C: Container>(container: &C) -> BackendResult<bool> {
    Ok(container.dimension_len(LEGACY_MARKER_DIM)?.is_some())
}
