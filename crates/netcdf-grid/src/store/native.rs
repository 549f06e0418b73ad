//! Native netCDF backend using the netcdf library.
//!
//! The netcdf crate wraps libnetcdf/HDF5 and needs real file paths; every
//! [`NativeContainer`] owns one open file handle and releases it on drop.

use std::ops::Range;
use std::sync::Once;

use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::AttributeValue;
use tracing::debug;

use super::{
    AttrScope, AttrValue, BackendResult, Container, DimId, DimInfo, GridStore, OpenMode, VarId,
    VarInfo,
};
use crate::error::BackendError;
use crate::scalar::ScalarType;

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose diagnostics even when a missing
/// optional attribute is handled gracefully on our side. Safe to call any
/// number of times; only the first call does anything.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable error output.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// netCDF files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeStore;

impl NativeStore {
    pub fn new() -> Self {
        Self
    }
}

impl GridStore for NativeStore {
    type Container = NativeContainer;

    fn open(&self, path: &str, mode: OpenMode) -> BackendResult<NativeContainer> {
        silence_hdf5_errors();
        let handle = match mode {
            OpenMode::Read => Handle::Read(netcdf::open(path)?),
            OpenMode::Write => Handle::Write(netcdf::append(path)?),
        };
        debug!(path, ?mode, "opened netCDF file");
        Ok(NativeContainer::new(handle))
    }

    fn create(&self, path: &str) -> BackendResult<NativeContainer> {
        silence_hdf5_errors();
        let handle = Handle::Write(netcdf::create(path)?);
        debug!(path, "created netCDF file");
        Ok(NativeContainer::new(handle))
    }
}

enum Handle {
    Read(netcdf::File),
    Write(netcdf::FileMut),
}

/// An open netCDF file.
pub struct NativeContainer {
    handle: Handle,
    /// Dimension names by [`DimId`].
    dims: Vec<String>,
    /// Variable names by [`VarId`].
    vars: Vec<String>,
}

impl NativeContainer {
    fn new(handle: Handle) -> Self {
        let mut container = Self {
            handle,
            dims: Vec::new(),
            vars: Vec::new(),
        };
        container.dims = container.file().dimensions().map(|d| d.name()).collect();
        container.vars = container.file().variables().map(|v| v.name()).collect();
        container
    }

    fn file(&self) -> &netcdf::File {
        match &self.handle {
            Handle::Read(f) => f,
            Handle::Write(f) => f,
        }
    }

    fn file_mut(&mut self) -> BackendResult<&mut netcdf::FileMut> {
        match &mut self.handle {
            Handle::Write(f) => Ok(f),
            Handle::Read(_) => Err(BackendError::new("NetCDF: Write to read only")),
        }
    }

    fn var_name(&self, id: VarId) -> BackendResult<&str> {
        self.vars
            .get(id.0)
            .map(String::as_str)
            .ok_or_else(|| BackendError::new("NetCDF: Variable not found"))
    }

    fn variable(&self, id: VarId) -> BackendResult<netcdf::Variable<'_>> {
        let name = self.var_name(id)?;
        self.file()
            .variable(name)
            .ok_or_else(|| BackendError::new(format!("NetCDF: Variable not found: {}", name)))
    }

    fn variable_mut(&mut self, id: VarId) -> BackendResult<netcdf::VariableMut<'_>> {
        let name = self.var_name(id)?.to_string();
        self.file_mut()?
            .variable_mut(&name)
            .ok_or_else(|| BackendError::new(format!("NetCDF: Variable not found: {}", name)))
    }
}

impl Container for NativeContainer {
    fn dimension_len(&self, name: &str) -> BackendResult<Option<usize>> {
        Ok(self.file().dimension(name).map(|d| d.len()))
    }

    fn variables(&self) -> BackendResult<Vec<VarInfo>> {
        let mut out = Vec::with_capacity(self.vars.len());
        for (i, name) in self.vars.iter().enumerate() {
            let var = self
                .file()
                .variable(name)
                .ok_or_else(|| BackendError::new(format!("NetCDF: Variable not found: {}", name)))?;
            out.push(VarInfo {
                id: VarId(i),
                name: name.clone(),
                ty: scalar_type(&var.vartype()),
                dims: var
                    .dimensions()
                    .iter()
                    .map(|d| DimInfo {
                        name: d.name(),
                        len: d.len(),
                    })
                    .collect(),
            });
        }
        Ok(out)
    }

    fn define_dimension(&mut self, name: &str, len: usize) -> BackendResult<DimId> {
        self.file_mut()?.add_dimension(name, len)?;
        self.dims.push(name.to_string());
        Ok(DimId(self.dims.len() - 1))
    }

    fn define_variable(
        &mut self,
        name: &str,
        ty: ScalarType,
        dims: &[DimId],
    ) -> BackendResult<VarId> {
        let dim_names = dims
            .iter()
            .map(|d| {
                self.dims
                    .get(d.0)
                    .cloned()
                    .ok_or_else(|| BackendError::new("NetCDF: Invalid dimension ID or name"))
            })
            .collect::<BackendResult<Vec<_>>>()?;
        let dim_names: Vec<&str> = dim_names.iter().map(String::as_str).collect();

        let file = self.file_mut()?;
        match ty {
            ScalarType::Byte => file.add_variable::<i8>(name, &dim_names).map(drop)?,
            ScalarType::Short => file.add_variable::<i16>(name, &dim_names).map(drop)?,
            ScalarType::Int => file.add_variable::<i32>(name, &dim_names).map(drop)?,
            ScalarType::Float => file.add_variable::<f32>(name, &dim_names).map(drop)?,
            ScalarType::Double => file.add_variable::<f64>(name, &dim_names).map(drop)?,
            other => {
                return Err(BackendError::new(format!(
                    "cannot define variable {} with type {:?}",
                    name, other
                )))
            }
        }
        self.vars.push(name.to_string());
        Ok(VarId(self.vars.len() - 1))
    }

    fn attribute(&self, scope: AttrScope, name: &str) -> BackendResult<Option<AttrValue>> {
        let value = match scope {
            AttrScope::Global => match self.file().attribute(name) {
                Some(attr) => attr.value()?,
                None => return Ok(None),
            },
            AttrScope::Variable(id) => {
                let var = self.variable(id)?;
                if !has_attr(&var, name) {
                    return Ok(None);
                }
                match var.attribute_value(name) {
                    Some(value) => value?,
                    None => return Ok(None),
                }
            }
        };
        Ok(from_nc(value))
    }

    fn put_attribute(
        &mut self,
        scope: AttrScope,
        name: &str,
        value: AttrValue,
    ) -> BackendResult<()> {
        let value = to_nc(value);
        match scope {
            AttrScope::Global => {
                self.file_mut()?.add_attribute(name, value)?;
            }
            AttrScope::Variable(id) => {
                self.variable_mut(id)?.put_attribute(name, value)?;
            }
        }
        Ok(())
    }

    fn read_f32(&self, id: VarId, start: &[usize], count: &[usize]) -> BackendResult<Vec<f32>> {
        let extents = extents(start, count)?;
        Ok(self.variable(id)?.get_values::<f32, _>(extents)?)
    }

    fn read_f64_at(&self, id: VarId, index: &[usize]) -> BackendResult<f64> {
        let ones = vec![1; index.len()];
        let extents = extents(index, &ones)?;
        Ok(self.variable(id)?.get_value::<f64, _>(extents)?)
    }

    fn write_f32(
        &mut self,
        id: VarId,
        start: &[usize],
        count: &[usize],
        values: &[f32],
    ) -> BackendResult<()> {
        let extents = extents(start, count)?;
        self.variable_mut(id)?.put_values(values, extents)?;
        Ok(())
    }

    fn write_i32(
        &mut self,
        id: VarId,
        start: &[usize],
        count: &[usize],
        values: &[i32],
    ) -> BackendResult<()> {
        let extents = extents(start, count)?;
        self.variable_mut(id)?.put_values(values, extents)?;
        Ok(())
    }
}

/// Slab extents for the ranks a grid container uses.
fn extents(start: &[usize], count: &[usize]) -> BackendResult<netcdf::Extents> {
    let ranges: Vec<Range<usize>> = start
        .iter()
        .zip(count)
        .map(|(&s, &c)| s..s + c)
        .collect();
    match ranges.as_slice() {
        [a] => a.clone().try_into().map_err(invalid_extents),
        [a, b] => (a.clone(), b.clone()).try_into().map_err(invalid_extents),
        [a, b, c] => (a.clone(), b.clone(), c.clone())
            .try_into()
            .map_err(invalid_extents),
        _ => Err(BackendError::new(format!(
            "unsupported slab rank {}",
            ranges.len()
        ))),
    }
}

fn invalid_extents<E>(_: E) -> BackendError {
    BackendError::new("invalid slab extents")
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn scalar_type(ty: &NcVariableType) -> ScalarType {
    match ty {
        NcVariableType::Int(IntType::I8) => ScalarType::Byte,
        NcVariableType::Int(IntType::U8) => ScalarType::UByte,
        NcVariableType::Int(IntType::I16) => ScalarType::Short,
        NcVariableType::Int(IntType::U16) => ScalarType::UShort,
        NcVariableType::Int(IntType::I32) => ScalarType::Int,
        NcVariableType::Int(IntType::U32) => ScalarType::UInt,
        NcVariableType::Int(IntType::I64) => ScalarType::Int64,
        NcVariableType::Int(IntType::U64) => ScalarType::UInt64,
        NcVariableType::Float(FloatType::F32) => ScalarType::Float,
        NcVariableType::Float(FloatType::F64) => ScalarType::Double,
        NcVariableType::Char => ScalarType::Char,
        NcVariableType::String => ScalarType::String,
        _ => ScalarType::Other,
    }
}

fn from_nc(value: AttributeValue) -> Option<AttrValue> {
    let widen = |v: Vec<f64>| Some(AttrValue::Doubles(v));
    match value {
        AttributeValue::Str(s) => Some(AttrValue::Text(s)),
        AttributeValue::Strs(v) => Some(AttrValue::Text(v.concat())),
        AttributeValue::Schar(x) => Some(AttrValue::Bytes(vec![x])),
        AttributeValue::Schars(v) => Some(AttrValue::Bytes(v)),
        AttributeValue::Uchar(x) => Some(AttrValue::Shorts(vec![x as i16])),
        AttributeValue::Uchars(v) => Some(AttrValue::Shorts(v.into_iter().map(i16::from).collect())),
        AttributeValue::Short(x) => Some(AttrValue::Shorts(vec![x])),
        AttributeValue::Shorts(v) => Some(AttrValue::Shorts(v)),
        AttributeValue::Ushort(x) => Some(AttrValue::Ints(vec![x as i32])),
        AttributeValue::Ushorts(v) => Some(AttrValue::Ints(v.into_iter().map(i32::from).collect())),
        AttributeValue::Int(x) => Some(AttrValue::Ints(vec![x])),
        AttributeValue::Ints(v) => Some(AttrValue::Ints(v)),
        AttributeValue::Uint(x) => widen(vec![x as f64]),
        AttributeValue::Uints(v) => widen(v.into_iter().map(f64::from).collect()),
        AttributeValue::Longlong(x) => widen(vec![x as f64]),
        AttributeValue::Longlongs(v) => widen(v.into_iter().map(|x| x as f64).collect()),
        AttributeValue::Ulonglong(x) => widen(vec![x as f64]),
        AttributeValue::Ulonglongs(v) => widen(v.into_iter().map(|x| x as f64).collect()),
        AttributeValue::Float(x) => Some(AttrValue::Floats(vec![x])),
        AttributeValue::Floats(v) => Some(AttrValue::Floats(v)),
        AttributeValue::Double(x) => Some(AttrValue::Doubles(vec![x])),
        AttributeValue::Doubles(v) => Some(AttrValue::Doubles(v)),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn to_nc(value: AttrValue) -> AttributeValue {
    match value {
        AttrValue::Text(s) => AttributeValue::Str(s),
        AttrValue::Bytes(v) if v.len() == 1 => AttributeValue::Schar(v[0]),
        AttrValue::Bytes(v) => AttributeValue::Schars(v),
        AttrValue::Shorts(v) if v.len() == 1 => AttributeValue::Short(v[0]),
        AttrValue::Shorts(v) => AttributeValue::Shorts(v),
        AttrValue::Ints(v) if v.len() == 1 => AttributeValue::Int(v[0]),
        AttrValue::Ints(v) => AttributeValue::Ints(v),
        AttrValue::Floats(v) if v.len() == 1 => AttributeValue::Float(v[0]),
        AttrValue::Floats(v) => AttributeValue::Floats(v),
        AttrValue::Doubles(v) if v.len() == 1 => AttributeValue::Double(v[0]),
        AttrValue::Doubles(v) => AttributeValue::Doubles(v),
    }
}
