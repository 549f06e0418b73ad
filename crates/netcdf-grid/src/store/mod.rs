//! Array-storage backend interface.
//!
//! The codec only talks to containers through [`Container`]: named
//! dimensions, typed variables addressed by [`VarId`], attributes scoped to
//! a variable or to the whole container, and rectangular slabs of samples.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`]: containers kept in memory, keyed by path
//! - [`NativeStore`]: netCDF files through libnetcdf (feature `native`)

pub mod memory;
#[cfg(feature = "native")]
pub mod native;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::scalar::ScalarType;

pub use memory::MemoryStore;
#[cfg(feature = "native")]
pub use native::NativeStore;

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Identifier of a variable within one open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub usize);

/// Identifier of a dimension within one open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimId(pub usize);

/// How an existing container is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// Where an attribute lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrScope {
    Global,
    Variable(VarId),
}

/// Attribute payload. Numeric scalars are one-element vectors.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Bytes(Vec<i8>),
    Shorts(Vec<i16>),
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Doubles(Vec<f64>),
}

impl AttrValue {
    /// A single number stored with the given storage type.
    ///
    /// Used for `_FillValue`, which must match the type of its variable.
    /// Integer values are rounded to nearest.
    pub fn typed(ty: ScalarType, value: f64) -> Self {
        match ty {
            ScalarType::Byte | ScalarType::Char => {
                Self::Bytes(vec![value.round_ties_even() as i8])
            }
            ScalarType::Short => Self::Shorts(vec![value.round_ties_even() as i16]),
            ScalarType::Int => Self::Ints(vec![value.round_ties_even() as i32]),
            ScalarType::Float => Self::Floats(vec![value as f32]),
            _ => Self::Doubles(vec![value]),
        }
    }

    /// Numeric contents widened to `f64`; `None` for text.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Self::Text(_) => None,
            Self::Bytes(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Self::Shorts(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Self::Ints(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Self::Floats(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Self::Doubles(v) => Some(v.clone()),
        }
    }

    /// First numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        self.to_f64_vec()?.first().copied()
    }

    /// First two numeric values, e.g. an `actual_range`.
    pub fn as_f64_pair(&self) -> Option<[f64; 2]> {
        match self.to_f64_vec()?.as_slice() {
            [a, b, ..] => Some([*a, *b]),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Ints(v) => v.first().copied(),
            Self::Shorts(v) => v.first().map(|&x| x as i32),
            Self::Bytes(v) => v.first().map(|&x| x as i32),
            other => other.as_f64().map(|x| x as i32),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Doubles(vec![v])
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Ints(vec![v])
    }
}

impl From<[f64; 2]> for AttrValue {
    fn from(v: [f64; 2]) -> Self {
        Self::Doubles(v.to_vec())
    }
}

/// A dimension of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimInfo {
    pub name: String,
    pub len: usize,
}

/// A variable as seen by [`Container::variables`].
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub id: VarId,
    pub name: String,
    pub ty: ScalarType,
    pub dims: Vec<DimInfo>,
}

/// Opens and creates containers.
pub trait GridStore {
    type Container: Container;

    /// Open an existing container.
    fn open(&self, path: &str, mode: OpenMode) -> BackendResult<Self::Container>;

    /// Create a container, replacing any existing one at `path`.
    fn create(&self, path: &str) -> BackendResult<Self::Container>;
}

/// An open container.
///
/// Dropping the container releases it; [`Container::close`] does the same
/// but reports failures.
pub trait Container {
    /// Length of a named dimension, `None` if it does not exist.
    fn dimension_len(&self, name: &str) -> BackendResult<Option<usize>>;

    /// All variables in definition order.
    fn variables(&self) -> BackendResult<Vec<VarInfo>>;

    fn define_dimension(&mut self, name: &str, len: usize) -> BackendResult<DimId>;

    /// Define a variable over previously defined dimensions (slowest first).
    fn define_variable(
        &mut self,
        name: &str,
        ty: ScalarType,
        dims: &[DimId],
    ) -> BackendResult<VarId>;

    fn attribute(&self, scope: AttrScope, name: &str) -> BackendResult<Option<AttrValue>>;

    fn put_attribute(&mut self, scope: AttrScope, name: &str, value: AttrValue)
        -> BackendResult<()>;

    /// Leave definition mode before data is written.
    fn end_define(&mut self) -> BackendResult<()> {
        Ok(())
    }

    /// Read a slab as `f32`.
    fn read_f32(&self, var: VarId, start: &[usize], count: &[usize]) -> BackendResult<Vec<f32>>;

    /// Read one sample as `f64`.
    fn read_f64_at(&self, var: VarId, index: &[usize]) -> BackendResult<f64>;

    fn write_f32(
        &mut self,
        var: VarId,
        start: &[usize],
        count: &[usize],
        values: &[f32],
    ) -> BackendResult<()>;

    fn write_i32(
        &mut self,
        var: VarId,
        start: &[usize],
        count: &[usize],
        values: &[i32],
    ) -> BackendResult<()>;

    /// Flush and release the container.
    fn close(self) -> BackendResult<()>
    where
        Self: Sized,
    {
        drop(self);
        Ok(())
    }
}

/// Number of samples covered by a slab.
pub(crate) fn slab_len(count: &[usize]) -> usize {
    count.iter().product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_pair() {
        let v = AttrValue::Shorts(vec![-3, 7]);
        assert_eq!(v.as_f64_pair(), Some([-3.0, 7.0]));
        assert_eq!(AttrValue::Doubles(vec![1.0]).as_f64_pair(), None);
        assert_eq!(AttrValue::from("m").as_f64(), None);
    }

    #[test]
    fn test_typed_fill() {
        assert_eq!(
            AttrValue::typed(ScalarType::Short, -32768.0),
            AttrValue::Shorts(vec![-32768])
        );
        match AttrValue::typed(ScalarType::Float, f64::NAN) {
            AttrValue::Floats(v) => assert!(v[0].is_nan()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_as_i32() {
        assert_eq!(AttrValue::Ints(vec![1]).as_i32(), Some(1));
        assert_eq!(AttrValue::Doubles(vec![1.0]).as_i32(), Some(1));
        assert_eq!(AttrValue::Text("1".into()).as_i32(), None);
    }
}
