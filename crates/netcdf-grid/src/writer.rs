//! Windowed grid writer.
//!
//! Writes a window of a padded in-memory grid to a new container. Memory
//! holds the northernmost row first; the container is always written with
//! the southernmost row first so every produced file has an ascending y axis.

use tracing::{debug, trace, warn};

use crate::config::GridIoConfig;
use crate::error::{FileContext, GridIoError, GridResult, InFile};
use crate::header::define_grid;
use crate::planner::WindowPlanner;
use crate::store::{AttrScope, Container, GridStore};
use crate::types::{AxisOrder, GridHeader, Padding, RangeTracker, Region, WriteSummary};

/// Writes windows of in-memory grids to a store.
pub struct GridWriter<'a, S: GridStore> {
    store: &'a S,
    planner: &'a dyn WindowPlanner,
    config: &'a GridIoConfig,
}

impl<'a, S: GridStore> GridWriter<'a, S> {
    pub fn new(store: &'a S, planner: &'a dyn WindowPlanner, config: &'a GridIoConfig) -> Self {
        Self {
            store,
            planner,
            config,
        }
    }

    /// Write `region` of `grid` to a new container at `path`.
    ///
    /// `header` describes the whole in-memory grid and is updated to the
    /// written window. NaN samples are stored as the fill value; for integer
    /// formats so are samples the type cannot hold.
    pub fn write(
        &self,
        path: &str,
        header: &mut GridHeader,
        grid: &[f32],
        region: &Region,
        pad: Padding,
        complex: bool,
    ) -> GridResult<WriteSummary> {
        let ctx = FileContext::new(path)?;
        header.validate()?;

        let stride = if complex { 2 } else { 1 };
        let needed = pad.buffer_len(header.nx, header.ny, complex);
        if grid.len() < needed {
            return Err(GridIoError::BufferTooSmall {
                needed,
                actual: grid.len(),
            });
        }

        // memory rows run north to south
        let mut in_memory = header.clone();
        in_memory.y_order = AxisOrder::Descending;
        let plan = self.planner.plan(&in_memory, region)?;
        let width_in = pad.padded_width(header.nx);

        let scalar = header.format.scalar;
        let fill = self.config.fill_for(scalar);

        header.x_min = plan.region.west;
        header.x_max = plan.region.east;
        header.y_min = plan.region.south;
        header.y_max = plan.region.north;
        header.nx = plan.width;
        header.ny = plan.height;

        let mut container = self.store.create(path).in_file(&ctx)?;
        let vars = define_grid(&mut container, &ctx, self.config, header)?;

        debug!(
            file = path,
            nx = header.nx,
            ny = header.ny,
            format = %header.format,
            "writing grid"
        );

        let mut range = RangeTracker::new();
        let mut out_of_range = 0usize;

        let source = |row: usize, i: usize| -> f32 {
            let mem_row = plan.last_row - row;
            grid[((mem_row + pad.north) * width_in + pad.west + plan.columns[i]) * stride]
        };

        match scalar.rejection_bounds() {
            None => {
                let mut out = vec![0f32; plan.width];
                for row in 0..plan.height {
                    for (i, slot) in out.iter_mut().enumerate() {
                        let v = source(row, i);
                        *slot = if v.is_nan() {
                            if fill.is_nan() {
                                v
                            } else {
                                fill as f32
                            }
                        } else {
                            range.update(v as f64);
                            v
                        };
                    }
                    container
                        .write_f32(vars.z, &[row, 0], &[1, plan.width], &out)
                        .in_file(&ctx)?;
                    trace!(row, "wrote row");
                }
            }
            Some((lo, hi)) => {
                let fill = fill.round_ties_even() as i32;
                let mut out = vec![0i32; plan.width];
                for row in 0..plan.height {
                    for (i, slot) in out.iter_mut().enumerate() {
                        let v = source(row, i) as f64;
                        *slot = if v.is_nan() {
                            fill
                        } else if v <= lo || v >= hi {
                            out_of_range += 1;
                            fill
                        } else {
                            let rounded = v.round_ties_even();
                            range.update(rounded);
                            rounded as i32
                        };
                    }
                    container
                        .write_i32(vars.z, &[row, 0], &[1, plan.width], &out)
                        .in_file(&ctx)?;
                    trace!(row, "wrote row");
                }
            }
        }

        if out_of_range > 0 {
            warn!(
                file = path,
                count = out_of_range,
                "out-of-range grid values converted to _FillValue"
            );
        }

        let z_range = range.range();
        match z_range {
            Some((lo, hi)) => {
                container
                    .put_attribute(AttrScope::Variable(vars.z), "actual_range", [lo, hi].into())
                    .in_file(&ctx)?;
            }
            None => warn!(file = path, "no valid values in grid"),
        }
        (header.z_min, header.z_max) = range.bounds();

        container.close().in_file(&ctx)?;

        Ok(WriteSummary {
            z_range,
            out_of_range,
            empty: z_range.is_none(),
        })
    }
}
