//! Mapping between grid precision tags and backend storage types.

use num_traits::Bounded;
use serde::{Deserialize, Serialize};

use crate::error::StructuralFormatError;

/// Storage type of a variable as reported by the backend.
///
/// Mirrors the netCDF external types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
    UByte,
    UShort,
    UInt,
    Int64,
    UInt64,
    String,
    /// User-defined types (compound, enum, opaque, vlen).
    Other,
}

/// Precision a grid is stored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScalarKind {
    /// Signed 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Short,
    /// Signed 32-bit integer.
    Int,
    /// 32-bit float.
    #[default]
    Float,
    /// 64-bit float.
    Double,
}

impl ScalarKind {
    /// Backend type used to store samples of this precision.
    pub fn storage_type(self) -> ScalarType {
        match self {
            Self::Byte => ScalarType::Byte,
            Self::Short => ScalarType::Short,
            Self::Int => ScalarType::Int,
            Self::Float => ScalarType::Float,
            Self::Double => ScalarType::Double,
        }
    }

    /// Precision tag for a stored variable type.
    ///
    /// Char data is one byte wide and is read as `Byte`.
    pub fn from_storage(ty: ScalarType) -> Result<Self, StructuralFormatError> {
        match ty {
            ScalarType::Byte | ScalarType::Char => Ok(Self::Byte),
            ScalarType::Short => Ok(Self::Short),
            ScalarType::Int => Ok(Self::Int),
            ScalarType::Float => Ok(Self::Float),
            ScalarType::Double => Ok(Self::Double),
            other => Err(StructuralFormatError::UnsupportedScalarType(other)),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Int)
    }

    /// Representable range of an integer precision.
    pub fn integer_range(self) -> Option<(f64, f64)> {
        match self {
            Self::Byte => Some(range_of::<i8>()),
            Self::Short => Some(range_of::<i16>()),
            Self::Int => Some(range_of::<i32>()),
            Self::Float | Self::Double => None,
        }
    }

    /// Exclusive bounds a sample must fall strictly inside to be stored.
    ///
    /// Anything at or beyond `min - 0.5` / `max + 0.5` would round outside
    /// the type.
    pub fn rejection_bounds(self) -> Option<(f64, f64)> {
        self.integer_range().map(|(lo, hi)| (lo - 0.5, hi + 0.5))
    }

    /// Fill value used when none is configured.
    pub fn default_fill(self) -> f64 {
        match self.integer_range() {
            Some((lo, _)) => lo,
            None => f64::NAN,
        }
    }

    /// One-letter code used in grid format codes.
    pub fn code(self) -> char {
        match self {
            Self::Byte => 'b',
            Self::Short => 's',
            Self::Int => 'i',
            Self::Float => 'f',
            Self::Double => 'd',
        }
    }

    pub fn from_code(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'b' => Some(Self::Byte),
            's' => Some(Self::Short),
            'i' => Some(Self::Int),
            'f' => Some(Self::Float),
            'd' => Some(Self::Double),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
        };
        write!(f, "{}", name)
    }
}

fn range_of<T: Bounded + Into<f64>>() -> (f64, f64) {
    (T::min_value().into(), T::max_value().into())
}
