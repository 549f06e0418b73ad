//! Common test fixtures for grid I/O tests.
//!
//! This module provides pre-defined grids and windows that represent common
//! scenarios: gridline and pixel registration, global longitude ranges and
//! windows that do or do not line up with grid nodes.

/// Common windows as `(west, east, south, north)`.
pub mod region {
    /// Interior window of [`super::grid::SIMPLE_6X4`] on grid nodes.
    pub const SIMPLE_INTERIOR: (f64, f64, f64, f64) = (1.0, 3.0, 1.0, 2.0);

    /// Window straddling the Greenwich meridian of a 0..359 grid.
    pub const ACROSS_GREENWICH: (f64, f64, f64, f64) = (-10.0, 10.0, -10.0, 10.0);

    /// South edge below [`super::grid::SIMPLE_6X4`].
    pub const BELOW_SIMPLE: (f64, f64, f64, f64) = (0.0, 5.0, -1.0, 3.0);
}

/// Common grid specifications for testing.
pub mod grid {
    /// 6 x 4 gridline grid on unit spacing
    pub const SIMPLE_6X4: GridSpec = GridSpec {
        nx: 6,
        ny: 4,
        west: 0.0,
        east: 5.0,
        south: 0.0,
        north: 3.0,
        pixel: false,
    };

    /// 10 x 5 pixel grid on unit cells
    pub const PIXEL_10X5: GridSpec = GridSpec {
        nx: 10,
        ny: 5,
        west: 0.0,
        east: 10.0,
        south: 0.0,
        north: 5.0,
        pixel: true,
    };

    /// Global 1 degree gridline grid, longitudes 0..359
    pub const GLOBAL_1DEG: GridSpec = GridSpec {
        nx: 360,
        ny: 181,
        west: 0.0,
        east: 359.0,
        south: -90.0,
        north: 90.0,
        pixel: false,
    };

    /// Grid specification for testing.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub nx: usize,
        pub ny: usize,
        pub west: f64,
        pub east: f64,
        pub south: f64,
        pub north: f64,
        pub pixel: bool,
    }

    impl GridSpec {
        /// Returns the node spacing as (x_inc, y_inc).
        pub fn increments(&self) -> (f64, f64) {
            let off = if self.pixel { 1.0 } else { 0.0 };
            let dx = (self.east - self.west) / (self.nx as f64 + off - 1.0);
            let dy = (self.north - self.south) / (self.ny as f64 + off - 1.0);
            (dx, dy)
        }

        /// Returns the extent as (west, east, south, north).
        pub fn region(&self) -> (f64, f64, f64, f64) {
            (self.west, self.east, self.south, self.north)
        }
    }
}

/// Header metadata used by round-trip tests.
pub mod meta {
    pub const TITLE: &str = "synthetic relief";
    pub const COMMAND: &str = "grdmath -R0/5/0/3 -I1 X Y MUL = relief.nc";
    pub const REMARK: &str = "generated for tests";
    pub const Z_UNITS: &str = "meters";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increments() {
        let (dx, dy) = grid::SIMPLE_6X4.increments();
        assert_eq!((dx, dy), (1.0, 1.0));

        let (dx, dy) = grid::PIXEL_10X5.increments();
        assert_eq!((dx, dy), (1.0, 1.0));

        let (dx, _) = grid::GLOBAL_1DEG.increments();
        assert!((dx - 1.0).abs() < 1e-12);
    }
}
