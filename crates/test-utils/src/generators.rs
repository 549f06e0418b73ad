//! Test data generators for creating synthetic grids.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite. All grids are row-major with the
//! northernmost row first, matching the in-memory layout of the grid codec.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Arguments
///
/// * `width` - Number of columns
/// * `height` - Number of rows
///
/// # Returns
///
/// A `Vec<f32>` in row-major order (row 0 first, then row 1, etc.)
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a bathymetry-like grid with values between `-depth` and `height`.
///
/// Values fall off from a peak in the north-west corner, so every row and
/// column is distinct.
pub fn create_relief_grid(width: usize, height: usize, depth: f32, peak: f32) -> Vec<f32> {
    let span = (width + height).saturating_sub(2).max(1) as f32;
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let t = (row + col) as f32 / span;
            data.push(peak - t * (peak + depth));
        }
    }
    data
}

/// Creates a grid filled with a constant value.
///
/// Useful for testing edge cases and simple scenarios.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid with NaN values at specified positions.
///
/// Useful for testing missing data handling.
///
/// # Arguments
///
/// * `width` - Number of columns
/// * `height` - Number of rows
/// * `nan_positions` - List of (col, row) positions that should be NaN
///
/// # Returns
///
/// A `Vec<f32>` with NaN at specified positions, zeros elsewhere.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![0.0f32; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// Index of logical cell (col, row) inside a padded buffer.
///
/// `pad` is `[west, east, south, north]`; with `complex` the real part of
/// each cell sits at an even slot.
pub fn padded_index(width: usize, pad: [usize; 4], complex: bool, col: usize, row: usize) -> usize {
    let stride = if complex { 2 } else { 1 };
    let padded_width = width + pad[0] + pad[1];
    ((row + pad[3]) * padded_width + pad[0] + col) * stride
}

/// Copies a logical grid into a padded buffer pre-filled with `border`.
pub fn pad_grid(
    grid: &[f32],
    width: usize,
    height: usize,
    pad: [usize; 4],
    complex: bool,
    border: f32,
) -> Vec<f32> {
    let stride = if complex { 2 } else { 1 };
    let len = (width + pad[0] + pad[1]) * (height + pad[2] + pad[3]) * stride;
    let mut out = vec![border; len];
    for row in 0..height {
        for col in 0..width {
            out[padded_index(width, pad, complex, col, row)] = grid[row * width + col];
        }
    }
    out
}

/// Extracts the logical grid from a padded buffer.
pub fn unpad_grid(
    buffer: &[f32],
    width: usize,
    height: usize,
    pad: [usize; 4],
    complex: bool,
) -> Vec<f32> {
    let mut out = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            out.push(buffer[padded_index(width, pad, complex, col, row)]);
        }
    }
    out
}
