//! Error types for grid I/O operations.

use thiserror::Error;

use crate::scalar::ScalarType;

/// Result type for grid I/O operations.
pub type GridResult<T> = Result<T, GridIoError>;

/// Error types for reading and writing netCDF grids.
#[derive(Error, Debug)]
pub enum GridIoError {
    /// A storage backend call failed.
    #[error("{message} [{file}]")]
    Backend { file: String, message: String },

    /// The container does not have the expected grid layout.
    #[error("{source} [{file}]")]
    Structure {
        file: String,
        #[source]
        source: StructuralFormatError,
    },

    /// Pipe-style pseudo files cannot be addressed by slab.
    #[error("netCDF-based I/O does not support piping [{file}]")]
    PipeNotSupported { file: String },

    /// The requested window cannot be mapped onto the grid.
    #[error("invalid window: {0}")]
    Window(String),

    /// The caller-supplied sample buffer is smaller than the padded grid.
    #[error("grid buffer holds {actual} samples but {needed} are required")]
    BufferTooSmall { needed: usize, actual: usize },

    /// Header values that cannot describe a grid.
    #[error("invalid grid header: {0}")]
    InvalidHeader(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Ways a container can fail to look like a grid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralFormatError {
    /// No variable with two dimensions exists.
    #[error("could not find a 2-dimensional variable")]
    NoDataVariable,

    /// One of the data variable's dimensions has no 1-D coordinate variable.
    #[error("could not find the {axis} variable")]
    MissingAxisVariable { axis: char },

    /// The data variable is stored with a type that has no grid format.
    #[error("unsupported storage type {0:?} for grid data")]
    UnsupportedScalarType(ScalarType),

    /// The container uses the legacy layout and no legacy codec is available.
    #[error("legacy grid layout detected but no legacy codec is configured")]
    LegacyUnsupported,
}

/// Failure reported by a storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[cfg(feature = "native")]
impl From<netcdf::Error> for BackendError {
    fn from(err: netcdf::Error) -> Self {
        Self(err.to_string())
    }
}

/// The file a group of backend calls is working on.
///
/// Every public operation builds one of these and uses it to tag errors,
/// so diagnostics always name the file without any shared state.
#[derive(Debug, Clone)]
pub struct FileContext {
    path: String,
}

impl FileContext {
    /// Name used for pipe-style pseudo files.
    pub const PIPE: &'static str = "=";

    /// Build a context, rejecting pipe-style names.
    pub fn new(path: &str) -> GridResult<Self> {
        if path == Self::PIPE {
            return Err(GridIoError::PipeNotSupported {
                file: path.to_string(),
            });
        }
        Ok(Self {
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn backend(&self, err: BackendError) -> GridIoError {
        GridIoError::Backend {
            file: self.path.clone(),
            message: err.0,
        }
    }

    pub fn structure(&self, source: StructuralFormatError) -> GridIoError {
        GridIoError::Structure {
            file: self.path.clone(),
            source,
        }
    }
}

/// Attach a [`FileContext`] to backend results.
pub trait InFile<T> {
    fn in_file(self, ctx: &FileContext) -> GridResult<T>;
}

impl<T> InFile<T> for Result<T, BackendError> {
    fn in_file(self, ctx: &FileContext) -> GridResult<T> {
        self.map_err(|e| ctx.backend(e))
    }
}
