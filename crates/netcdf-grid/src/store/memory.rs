//! In-memory backend.
//!
//! Containers live in a shared map keyed by path. An opened container works
//! on a private copy which is committed back when a writable container is
//! closed or dropped, so an aborted operation on a read-only container never
//! changes what is stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::trace;

use super::{
    slab_len, AttrScope, AttrValue, BackendResult, Container, DimId, DimInfo, GridStore,
    OpenMode, VarId, VarInfo,
};
use crate::error::BackendError;
use crate::scalar::ScalarType;

#[derive(Debug, Clone, Default)]
struct Dataset {
    dims: Vec<(String, usize)>,
    vars: Vec<Var>,
    globals: Vec<(String, AttrValue)>,
}

#[derive(Debug, Clone)]
struct Var {
    name: String,
    ty: ScalarType,
    dims: Vec<usize>,
    attrs: Vec<(String, AttrValue)>,
    data: Vec<f64>,
}

/// Containers held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    datasets: Arc<Mutex<HashMap<String, Dataset>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a container exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.datasets
            .lock()
            .map(|map| map.contains_key(path))
            .unwrap_or(false)
    }

    /// Remove the container at `path`, returning whether one existed.
    pub fn remove(&self, path: &str) -> bool {
        self.datasets
            .lock()
            .map(|mut map| map.remove(path).is_some())
            .unwrap_or(false)
    }
}

impl GridStore for MemoryStore {
    type Container = MemoryContainer;

    fn open(&self, path: &str, mode: OpenMode) -> BackendResult<MemoryContainer> {
        let map = self.datasets.lock().map_err(|_| poisoned())?;
        let dataset = map
            .get(path)
            .cloned()
            .ok_or_else(|| BackendError::new("No such file or directory"))?;
        trace!(path, ?mode, "opened in-memory container");
        Ok(MemoryContainer {
            store: self.datasets.clone(),
            path: path.to_string(),
            dataset,
            writable: mode == OpenMode::Write,
        })
    }

    fn create(&self, path: &str) -> BackendResult<MemoryContainer> {
        trace!(path, "created in-memory container");
        Ok(MemoryContainer {
            store: self.datasets.clone(),
            path: path.to_string(),
            dataset: Dataset::default(),
            writable: true,
        })
    }
}

/// An open in-memory container.
#[derive(Debug)]
pub struct MemoryContainer {
    store: Arc<Mutex<HashMap<String, Dataset>>>,
    path: String,
    dataset: Dataset,
    writable: bool,
}

impl MemoryContainer {
    fn var(&self, id: VarId) -> BackendResult<&Var> {
        self.dataset
            .vars
            .get(id.0)
            .ok_or_else(|| BackendError::new("NetCDF: Variable not found"))
    }

    fn var_mut(&mut self, id: VarId) -> BackendResult<&mut Var> {
        self.dataset
            .vars
            .get_mut(id.0)
            .ok_or_else(|| BackendError::new("NetCDF: Variable not found"))
    }

    fn require_writable(&self) -> BackendResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(BackendError::new("NetCDF: Write to read only"))
        }
    }

    fn shape(&self, var: &Var) -> Vec<usize> {
        var.dims.iter().map(|&d| self.dataset.dims[d].1).collect()
    }

    /// Flat offsets of every sample in a slab, slowest dimension first.
    fn slab_offsets(
        &self,
        var: &Var,
        start: &[usize],
        count: &[usize],
    ) -> BackendResult<Vec<usize>> {
        let shape = self.shape(var);
        if start.len() != shape.len() || count.len() != shape.len() {
            return Err(BackendError::new("NetCDF: Invalid dimension ID or name"));
        }
        for ((&s, &c), &n) in start.iter().zip(count).zip(&shape) {
            if s + c > n {
                return Err(BackendError::new("NetCDF: Start+count exceeds dimension bound"));
            }
        }

        let mut offsets = Vec::with_capacity(slab_len(count));
        let mut index = start.to_vec();
        if count.iter().any(|&c| c == 0) {
            return Ok(offsets);
        }
        loop {
            let flat = index
                .iter()
                .zip(&shape)
                .fold(0, |acc, (&i, &n)| acc * n + i);
            offsets.push(flat);

            // Advance the fastest-varying index, carrying into slower ones.
            let mut d = shape.len();
            loop {
                if d == 0 {
                    return Ok(offsets);
                }
                d -= 1;
                index[d] += 1;
                if index[d] < start[d] + count[d] {
                    break;
                }
                index[d] = start[d];
            }
        }
    }

    fn store_values(
        &mut self,
        id: VarId,
        start: &[usize],
        count: &[usize],
        values: impl Iterator<Item = f64>,
    ) -> BackendResult<()> {
        self.require_writable()?;
        let var = self.var(id)?;
        let offsets = self.slab_offsets(var, start, count)?;
        let ty = var.ty;
        let var = self.var_mut(id)?;
        for (offset, v) in offsets.into_iter().zip(values) {
            var.data[offset] = convert(ty, v)?;
        }
        Ok(())
    }

    fn attrs(&self, scope: AttrScope) -> BackendResult<&Vec<(String, AttrValue)>> {
        match scope {
            AttrScope::Global => Ok(&self.dataset.globals),
            AttrScope::Variable(id) => Ok(&self.var(id)?.attrs),
        }
    }

    fn attrs_mut(&mut self, scope: AttrScope) -> BackendResult<&mut Vec<(String, AttrValue)>> {
        match scope {
            AttrScope::Global => Ok(&mut self.dataset.globals),
            AttrScope::Variable(id) => Ok(&mut self.var_mut(id)?.attrs),
        }
    }
}

impl Container for MemoryContainer {
    fn dimension_len(&self, name: &str) -> BackendResult<Option<usize>> {
        Ok(self
            .dataset
            .dims
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, len)| *len))
    }

    fn variables(&self) -> BackendResult<Vec<VarInfo>> {
        Ok(self
            .dataset
            .vars
            .iter()
            .enumerate()
            .map(|(i, v)| VarInfo {
                id: VarId(i),
                name: v.name.clone(),
                ty: v.ty,
                dims: v
                    .dims
                    .iter()
                    .map(|&d| DimInfo {
                        name: self.dataset.dims[d].0.clone(),
                        len: self.dataset.dims[d].1,
                    })
                    .collect(),
            })
            .collect())
    }

    fn define_dimension(&mut self, name: &str, len: usize) -> BackendResult<DimId> {
        self.require_writable()?;
        if self.dataset.dims.iter().any(|(n, _)| n == name) {
            return Err(BackendError::new("NetCDF: String match to name in use"));
        }
        self.dataset.dims.push((name.to_string(), len));
        Ok(DimId(self.dataset.dims.len() - 1))
    }

    fn define_variable(
        &mut self,
        name: &str,
        ty: ScalarType,
        dims: &[DimId],
    ) -> BackendResult<VarId> {
        self.require_writable()?;
        if self.dataset.vars.iter().any(|v| v.name == name) {
            return Err(BackendError::new("NetCDF: String match to name in use"));
        }
        if dims.iter().any(|d| d.0 >= self.dataset.dims.len()) {
            return Err(BackendError::new("NetCDF: Invalid dimension ID or name"));
        }
        let len = dims.iter().map(|d| self.dataset.dims[d.0].1).product();
        self.dataset.vars.push(Var {
            name: name.to_string(),
            ty,
            dims: dims.iter().map(|d| d.0).collect(),
            attrs: Vec::new(),
            data: vec![0.0; len],
        });
        Ok(VarId(self.dataset.vars.len() - 1))
    }

    fn attribute(&self, scope: AttrScope, name: &str) -> BackendResult<Option<AttrValue>> {
        Ok(self
            .attrs(scope)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone()))
    }

    fn put_attribute(
        &mut self,
        scope: AttrScope,
        name: &str,
        value: AttrValue,
    ) -> BackendResult<()> {
        self.require_writable()?;
        let attrs = self.attrs_mut(scope)?;
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => attrs.push((name.to_string(), value)),
        }
        Ok(())
    }

    fn read_f32(&self, id: VarId, start: &[usize], count: &[usize]) -> BackendResult<Vec<f32>> {
        let var = self.var(id)?;
        let offsets = self.slab_offsets(var, start, count)?;
        Ok(offsets.into_iter().map(|o| var.data[o] as f32).collect())
    }

    fn read_f64_at(&self, id: VarId, index: &[usize]) -> BackendResult<f64> {
        let var = self.var(id)?;
        let ones = vec![1; index.len()];
        let offsets = self.slab_offsets(var, index, &ones)?;
        Ok(var.data[offsets[0]])
    }

    fn write_f32(
        &mut self,
        id: VarId,
        start: &[usize],
        count: &[usize],
        values: &[f32],
    ) -> BackendResult<()> {
        check_len(count, values.len())?;
        self.store_values(id, start, count, values.iter().map(|&v| v as f64))
    }

    fn write_i32(
        &mut self,
        id: VarId,
        start: &[usize],
        count: &[usize],
        values: &[i32],
    ) -> BackendResult<()> {
        check_len(count, values.len())?;
        self.store_values(id, start, count, values.iter().map(|&v| v as f64))
    }
}

impl Drop for MemoryContainer {
    fn drop(&mut self) {
        if !self.writable {
            return;
        }
        if let Ok(mut map) = self.store.lock() {
            map.insert(self.path.clone(), std::mem::take(&mut self.dataset));
        }
    }
}

fn check_len(count: &[usize], len: usize) -> BackendResult<()> {
    if slab_len(count) > len {
        return Err(BackendError::new("NetCDF: Start+count exceeds dimension bound"));
    }
    Ok(())
}

/// Quantize a value to the variable's storage type.
fn convert(ty: ScalarType, v: f64) -> BackendResult<f64> {
    let range = |lo: f64, hi: f64| {
        if v.is_nan() || v < lo || v > hi {
            Err(BackendError::new("NetCDF: Numeric conversion not representable"))
        } else {
            Ok(v.trunc())
        }
    };
    match ty {
        ScalarType::Byte | ScalarType::Char => range(i8::MIN as f64, i8::MAX as f64),
        ScalarType::Short => range(i16::MIN as f64, i16::MAX as f64),
        ScalarType::Int => range(i32::MIN as f64, i32::MAX as f64),
        ScalarType::Float => Ok(v as f32 as f64),
        _ => Ok(v),
    }
}

fn poisoned() -> BackendError {
    BackendError::new("in-memory store lock poisoned")
}
