//! Windowed grid reader.
//!
//! Copies a window of the stored grid into a caller-allocated, padded
//! buffer. The buffer always holds the northernmost row first; stored rows
//! are placed according to the file's y direction.

use tracing::{debug, trace};

use crate::error::{FileContext, GridIoError, GridResult, InFile, StructuralFormatError};
use crate::header::locate;
use crate::legacy::LegacyCodec;
use crate::planner::WindowPlanner;
use crate::store::{AttrScope, Container, GridStore, OpenMode};
use crate::types::{AxisOrder, GridHeader, Layout, Padding, RangeTracker, ReadSummary, Region};

/// Reads windows of grids from a store.
pub struct GridReader<'a, S: GridStore> {
    store: &'a S,
    planner: &'a dyn WindowPlanner,
    legacy: Option<&'a dyn LegacyCodec>,
}

impl<'a, S: GridStore> GridReader<'a, S> {
    pub fn new(
        store: &'a S,
        planner: &'a dyn WindowPlanner,
        legacy: Option<&'a dyn LegacyCodec>,
    ) -> Self {
        Self {
            store,
            planner,
            legacy,
        }
    }

    /// Read `region` of the grid at `path` into `grid`.
    ///
    /// `header` must come from a header read of the same file. On return it
    /// describes the window: `nx`/`ny` are the window size, the extents are
    /// the requested window and `z_min`/`z_max` the realized range (left at
    /// `+inf`/`-inf` when every sample is missing).
    pub fn read(
        &self,
        path: &str,
        header: &mut GridHeader,
        grid: &mut [f32],
        region: &Region,
        pad: Padding,
        complex: bool,
    ) -> GridResult<ReadSummary> {
        let ctx = FileContext::new(path)?;

        if header.format.layout == Layout::Legacy {
            return match self.legacy {
                Some(codec) => codec.read_grid(path, header, grid, region, pad, complex),
                None => Err(ctx.structure(StructuralFormatError::LegacyUnsupported)),
            };
        }

        let plan = self.planner.plan(header, region)?;

        let stride = if complex { 2 } else { 1 };
        let needed = pad.buffer_len(plan.width, plan.height, complex);
        if grid.len() < needed {
            return Err(GridIoError::BufferTooSmall {
                needed,
                actual: grid.len(),
            });
        }
        let width_out = pad.padded_width(plan.width) * stride;
        let first_out = pad.west * stride;

        let container = self.store.open(path, OpenMode::Read).in_file(&ctx)?;
        let vars = locate(&container, &ctx)?;
        if vars.nx != header.nx || vars.ny != header.ny {
            return Err(GridIoError::InvalidHeader(format!(
                "header is {}x{} but {} holds a {}x{} grid",
                header.nx, header.ny, path, vars.nx, vars.ny
            )));
        }

        let z = AttrScope::Variable(vars.z);
        let sentinel = match container.attribute(z, "_FillValue").in_file(&ctx)? {
            Some(v) => v.as_f64(),
            None => container
                .attribute(z, "missing_value")
                .in_file(&ctx)?
                .and_then(|v| v.as_f64()),
        }
        .filter(|v| !v.is_nan());

        debug!(
            file = path,
            width = plan.width,
            height = plan.height,
            first_row = plan.first_row,
            last_row = plan.last_row,
            ?sentinel,
            "reading grid window"
        );

        let mut range = RangeTracker::new();
        let mut missing = 0;

        for (n, row) in (plan.first_row..=plan.last_row).enumerate() {
            let data_row = match header.y_order {
                AxisOrder::Descending => n,
                AxisOrder::Ascending => plan.height - 1 - n,
            };
            let base = (data_row + pad.north) * width_out + first_out;

            let samples = container
                .read_f32(vars.z, &[row, 0], &[1, vars.nx])
                .in_file(&ctx)?;
            trace!(row, data_row, "read row");

            for (i, &col) in plan.columns.iter().enumerate() {
                let mut v = samples.get(col).copied().ok_or_else(|| {
                    GridIoError::Window(format!("column {} outside the {} stored columns", col, vars.nx))
                })?;
                if sentinel.is_some_and(|s| v as f64 == s) {
                    v = f32::NAN;
                }
                if v.is_nan() {
                    missing += 1;
                } else {
                    range.update(v as f64);
                }
                grid[base + i * stride] = v;
            }
        }

        container.close().in_file(&ctx)?;

        header.nx = plan.width;
        header.ny = plan.height;
        header.x_min = plan.region.west;
        header.x_max = plan.region.east;
        header.y_min = plan.region.south;
        header.y_max = plan.region.north;
        (header.z_min, header.z_max) = range.bounds();

        Ok(ReadSummary {
            z_range: range.range(),
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::RegularPlanner;
    use crate::scalar::{ScalarKind, ScalarType};
    use crate::store::{AttrValue, MemoryStore};
    use crate::types::{GridFormat, Registration};

    /// A 3 x 2 float grid stored with the given y samples.
    fn store_grid(y: [f32; 2]) -> (MemoryStore, GridHeader) {
        let store = MemoryStore::new();
        let mut c = store.create("g.nc").unwrap();
        let yd = c.define_dimension("y", 2).unwrap();
        let xd = c.define_dimension("x", 3).unwrap();
        let xv = c.define_variable("x", ScalarType::Float, &[xd]).unwrap();
        let yv = c.define_variable("y", ScalarType::Float, &[yd]).unwrap();
        let z = c.define_variable("z", ScalarType::Float, &[yd, xd]).unwrap();
        c.put_attribute(AttrScope::Variable(z), "missing_value", AttrValue::Floats(vec![-9.0]))
            .unwrap();
        c.write_f32(xv, &[0], &[3], &[0.0, 1.0, 2.0]).unwrap();
        c.write_f32(yv, &[0], &[2], &y).unwrap();
        c.write_f32(z, &[0, 0], &[2, 3], &[1.0, 2.0, 3.0, 4.0, -9.0, 6.0])
            .unwrap();
        drop(c);

        let mut header = GridHeader::new(
            3,
            2,
            Region::new(0.0, 2.0, 0.0, 1.0),
            Registration::Gridline,
            GridFormat::coards(ScalarKind::Float),
        );
        header.y_order = AxisOrder::from_samples(y[0] as f64, y[1] as f64);
        (store, header)
    }

    #[test]
    fn test_ascending_rows_flip_into_memory() {
        let (store, mut header) = store_grid([0.0, 1.0]);
        let planner = RegularPlanner::default();
        let mut grid = vec![0.0; 6];
        let summary = GridReader::new(&store, &planner, None)
            .read("g.nc", &mut header, &mut grid, &Region::full(), Padding::none(), false)
            .unwrap();

        // first stored row is the south row and lands at the bottom
        assert_eq!(&grid[3..], &[1.0, 2.0, 3.0]);
        assert_eq!(grid[0], 4.0);
        assert!(grid[1].is_nan());
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.z_range, Some((1.0, 6.0)));
        assert_eq!((header.z_min, header.z_max), (1.0, 6.0));
    }

    #[test]
    fn test_descending_rows_keep_order() {
        let (store, mut header) = store_grid([1.0, 0.0]);
        let planner = RegularPlanner::default();
        let mut grid = vec![0.0; 6];
        GridReader::new(&store, &planner, None)
            .read("g.nc", &mut header, &mut grid, &Region::full(), Padding::none(), false)
            .unwrap();
        assert_eq!(&grid[..3], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_complex_interleave() {
        let (store, mut header) = store_grid([1.0, 0.0]);
        let planner = RegularPlanner::default();
        let mut grid = vec![7.0; 12];
        GridReader::new(&store, &planner, None)
            .read("g.nc", &mut header, &mut grid, &Region::full(), Padding::none(), true)
            .unwrap();
        assert_eq!(&grid[..6], &[1.0, 7.0, 2.0, 7.0, 3.0, 7.0]);
    }

    #[test]
    fn test_buffer_too_small() {
        let (store, mut header) = store_grid([0.0, 1.0]);
        let planner = RegularPlanner::default();
        let mut grid = vec![0.0; 5];
        let err = GridReader::new(&store, &planner, None)
            .read("g.nc", &mut header, &mut grid, &Region::full(), Padding::none(), false)
            .unwrap_err();
        assert!(matches!(err, GridIoError::BufferTooSmall { needed: 6, actual: 5 }));
    }

    #[test]
    fn test_legacy_without_codec() {
        let (store, mut header) = store_grid([0.0, 1.0]);
        header.format = GridFormat::legacy(ScalarKind::Float);
        let planner = RegularPlanner::default();
        let mut grid = vec![0.0; 6];
        let err = GridReader::new(&store, &planner, None)
            .read("g.nc", &mut header, &mut grid, &Region::full(), Padding::none(), false)
            .unwrap_err();
        assert!(matches!(
            err,
            GridIoError::Structure {
                source: StructuralFormatError::LegacyUnsupported,
                ..
            }
        ));
    }
}
