//! Mapping a geographic window onto stored rows and columns.

use crate::error::{GridIoError, GridResult};
use crate::types::{AxisOrder, GridHeader, Region};

/// Rows and columns covering a requested window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPlan {
    /// Stored column for each output column.
    pub columns: Vec<usize>,
    /// Output columns.
    pub width: usize,
    /// Output rows.
    pub height: usize,
    pub first_col: usize,
    pub last_col: usize,
    /// First stored row (inclusive), in on-disk row order.
    pub first_row: usize,
    /// Last stored row (inclusive), in on-disk row order.
    pub last_row: usize,
    /// The window the plan covers. Equals the grid extent for a full request.
    pub region: Region,
}

/// Turns a requested window into a [`WindowPlan`].
pub trait WindowPlanner {
    fn plan(&self, header: &GridHeader, region: &Region) -> GridResult<WindowPlan>;
}

/// Planner for regularly spaced grids, with longitude wrap for windows that
/// extend past the stored x range.
#[derive(Debug, Clone, Copy)]
pub struct RegularPlanner {
    /// Fraction of a cell an edge may miss a node by and still snap onto it.
    pub tolerance: f64,
}

impl Default for RegularPlanner {
    fn default() -> Self {
        Self { tolerance: 0.1 }
    }
}

impl RegularPlanner {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    fn full(&self, header: &GridHeader) -> WindowPlan {
        WindowPlan {
            columns: (0..header.nx).collect(),
            width: header.nx,
            height: header.ny,
            first_col: 0,
            last_col: header.nx.saturating_sub(1),
            first_row: 0,
            last_row: header.ny.saturating_sub(1),
            region: header.region(),
        }
    }

    /// Stored columns for a window that crosses the x range, wrapping by 360.
    fn wrapped_columns(&self, header: &GridHeader, west: f64, width: usize) -> GridResult<Vec<usize>> {
        let half = 0.5 * header.node_offset.as_i32() as f64;
        let slack = self.tolerance * header.x_inc;

        (0..width)
            .map(|i| {
                let mut x = west + (i as f64 + half) * header.x_inc;
                if header.x_min - x > slack {
                    x += 360.0;
                } else if x - header.x_max > slack {
                    x -= 360.0;
                }
                let col = ((x - header.x_min) / header.x_inc + self.tolerance).floor();
                to_index(col, header.nx).ok_or_else(|| {
                    GridIoError::Window(format!(
                        "longitude {} does not fall inside [{}, {}] after wrapping",
                        x, header.x_min, header.x_max
                    ))
                })
            })
            .collect()
    }
}

impl WindowPlanner for RegularPlanner {
    fn plan(&self, header: &GridHeader, region: &Region) -> GridResult<WindowPlan> {
        if header.is_empty() {
            return Err(GridIoError::Window("grid has no rows or columns".to_string()));
        }
        if region.is_full() {
            return Ok(self.full(header));
        }

        if region.south < header.y_min || region.north > header.y_max {
            return Err(GridIoError::Window(format!(
                "rows {}/{} lie beyond the grid domain {}/{}",
                region.south, region.north, header.y_min, header.y_max
            )));
        }
        if (region.east <= region.west && header.node_offset.as_i32() == 1)
            || region.east < region.west
            || region.north < region.south
        {
            return Err(GridIoError::Window(format!(
                "empty window {}/{}/{}/{}",
                region.west, region.east, region.south, region.north
            )));
        }

        let periodic = region.west < header.x_min || region.east > header.x_max;
        let one = 1 - header.node_offset.as_i32() as i64;
        let tol = self.tolerance;

        let width = ((region.width() / header.x_inc).round_ties_even() as i64 + one).max(0) as usize;
        let height = ((region.height() / header.y_inc).round_ties_even() as i64 + one).max(0) as usize;

        let first_col = ((region.west - header.x_min) / header.x_inc + tol).floor() as i64;
        let last_col = ((region.east - header.x_min) / header.x_inc - tol).ceil() as i64 - 1 + one;
        let top_first = ((header.y_max - region.north) / header.y_inc + tol).floor() as i64;
        let top_last = ((header.y_max - region.south) / header.y_inc - tol).ceil() as i64 - 1 + one;

        let ny = header.ny as i64;
        let (first_row, last_row) = match header.y_order {
            AxisOrder::Descending => (top_first, top_last),
            AxisOrder::Ascending => (ny - 1 - top_last, ny - 1 - top_first),
        };
        if first_row < 0 || last_row >= ny || first_row > last_row {
            return Err(GridIoError::Window(format!(
                "rows {}..={} fall outside the {} stored rows",
                first_row, last_row, ny
            )));
        }
        if (last_row - first_row + 1) as usize != height {
            return Err(GridIoError::Window(format!(
                "window {}/{} does not fall on grid rows",
                region.south, region.north
            )));
        }
        let rows = (first_row as usize, last_row as usize);

        let columns = if periodic {
            self.wrapped_columns(header, region.west, width)?
        } else {
            let nx = header.nx as i64;
            if first_col < 0 || first_col + width as i64 > nx {
                return Err(GridIoError::Window(format!(
                    "columns {}..{} fall outside the {} stored columns",
                    first_col,
                    first_col + width as i64,
                    nx
                )));
            }
            (0..width).map(|i| first_col as usize + i).collect()
        };

        tracing::trace!(width, height, first_row = rows.0, last_row = rows.1, periodic, "planned window");

        Ok(WindowPlan {
            columns,
            width,
            height,
            first_col: first_col.max(0) as usize,
            last_col: last_col.max(0) as usize,
            first_row: rows.0,
            last_row: rows.1,
            region: *region,
        })
    }
}

fn to_index(v: f64, len: usize) -> Option<usize> {
    (v >= 0.0 && v < len as f64).then_some(v as usize)
}
