//! COARDS netCDF grid I/O with windowing and padding.
//!
//! This crate moves gridded data between netCDF containers laid out as two
//! axis variables plus one 2-D data variable, and flat in-memory sample
//! buffers. It handles:
//!
//! - **Header round-tripping**: units, scaling, registration, title and
//!   command history, with fallbacks for files written by other tools
//! - **Windowed reads and writes**: sub-regions, padding on all four sides
//!   and complex (interleaved) buffers
//! - **Missing values**: `_FillValue`/`missing_value` become NaN on read, NaN
//!   becomes the fill value on write, integer overflow is clamped to fill
//! - **Axis direction**: files with north-first or south-first rows load
//!   into the same north-first memory layout
//!
//! # Architecture
//!
//! ```text
//! GridIo::read_header(path)
//!      │
//!      ├─► xysize dimension? ─► LegacyCodec
//!      │
//!      └─► locate z(y, x), reconcile axes ─► GridHeader
//!
//! GridIo::read_grid(path, header, buffer, region, pad)
//!      │
//!      ├─► WindowPlanner: region ─► rows, column remap
//!      │
//!      └─► row slabs ─► NaN translation ─► padded buffer
//! ```
//!
//! Storage goes through the [`GridStore`] trait: [`NativeStore`] for real
//! netCDF files (feature `native`) and [`MemoryStore`] for tests and
//! scratch data.
//!
//! # Example
//!
//! ```ignore
//! use netcdf_grid::{GridIo, Padding, Region};
//!
//! let io = GridIo::native();
//! let mut header = io.read_header("topo.nc")?;
//!
//! let pad = Padding::uniform(2);
//! let mut grid = vec![0.0f32; pad.buffer_len(header.nx, header.ny, false)];
//! let summary = io.read_grid("topo.nc", &mut header, &mut grid, &Region::full(), pad, false)?;
//! println!("z range {:?}", summary.z_range);
//! ```

pub mod config;
pub mod error;
pub mod header;
pub mod legacy;
pub mod planner;
pub mod reader;
pub mod scalar;
pub mod store;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use config::GridIoConfig;
pub use error::{BackendError, FileContext, GridIoError, GridResult, StructuralFormatError};
pub use legacy::{LegacyCodec, LEGACY_MARKER_DIM};
pub use planner::{RegularPlanner, WindowPlan, WindowPlanner};
pub use reader::GridReader;
pub use scalar::{ScalarKind, ScalarType};
pub use store::{GridStore, MemoryStore};
#[cfg(feature = "native")]
pub use store::NativeStore;
pub use types::{
    AxisOrder, GridFormat, GridHeader, Layout, Padding, ReadSummary, Region, Registration,
    WriteSummary,
};
pub use writer::GridWriter;

/// Grid I/O bound to one store and configuration.
pub struct GridIo<S: GridStore> {
    store: S,
    config: GridIoConfig,
    legacy: Option<Box<dyn LegacyCodec>>,
    planner: Box<dyn WindowPlanner>,
}

impl<S: GridStore> GridIo<S> {
    /// Grid I/O with default configuration and no legacy codec.
    pub fn new(store: S) -> Self {
        let config = GridIoConfig::default();
        Self {
            store,
            planner: Box::new(RegularPlanner::new(config.snap_tolerance)),
            config,
            legacy: None,
        }
    }

    /// Grid I/O with an explicit configuration.
    pub fn with_config(store: S, config: GridIoConfig) -> GridResult<Self> {
        config.validate().map_err(GridIoError::Config)?;
        Ok(Self {
            store,
            planner: Box::new(RegularPlanner::new(config.snap_tolerance)),
            config,
            legacy: None,
        })
    }

    /// Hand grids in the legacy layout to `codec`.
    pub fn with_legacy(mut self, codec: impl LegacyCodec + 'static) -> Self {
        self.legacy = Some(Box::new(codec));
        self
    }

    /// Replace the window planner.
    pub fn with_planner(mut self, planner: impl WindowPlanner + 'static) -> Self {
        self.planner = Box::new(planner);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &GridIoConfig {
        &self.config
    }

    /// Read the header of the grid at `path`.
    pub fn read_header(&self, path: &str) -> GridResult<GridHeader> {
        header::read_header(&self.store, self.legacy.as_deref(), path)
    }

    /// Rewrite the header attributes of an existing grid.
    pub fn update_header(&self, path: &str, header: &mut GridHeader) -> GridResult<()> {
        header::update_header(&self.store, &self.config, path, header)
    }

    /// Create a grid at `path` holding only the header.
    pub fn write_header(&self, path: &str, header: &mut GridHeader) -> GridResult<()> {
        header::write_header(&self.store, &self.config, path, header)
    }

    /// Read `region` of the grid at `path` into a padded buffer.
    ///
    /// See [`GridReader::read`].
    pub fn read_grid(
        &self,
        path: &str,
        header: &mut GridHeader,
        grid: &mut [f32],
        region: &Region,
        pad: Padding,
        complex: bool,
    ) -> GridResult<ReadSummary> {
        GridReader::new(&self.store, self.planner.as_ref(), self.legacy.as_deref())
            .read(path, header, grid, region, pad, complex)
    }

    /// Write `region` of a padded buffer to a new grid at `path`.
    ///
    /// See [`GridWriter::write`].
    pub fn write_grid(
        &self,
        path: &str,
        header: &mut GridHeader,
        grid: &[f32],
        region: &Region,
        pad: Padding,
        complex: bool,
    ) -> GridResult<WriteSummary> {
        GridWriter::new(&self.store, self.planner.as_ref(), &self.config)
            .write(path, header, grid, region, pad, complex)
    }
}

#[cfg(feature = "native")]
impl GridIo<NativeStore> {
    /// Grid I/O on netCDF files, configured from the environment.
    pub fn native() -> Self {
        let config = GridIoConfig::from_env();
        match config.validate() {
            Ok(()) => Self {
                store: NativeStore::new(),
                planner: Box::new(RegularPlanner::new(config.snap_tolerance)),
                config,
                legacy: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "ignoring invalid grid I/O configuration from environment");
                Self::new(NativeStore::new())
            }
        }
    }
}

impl<S: GridStore + Default> Default for GridIo<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}
