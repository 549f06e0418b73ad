//! Grid header codec.
//!
//! Reads, rewrites and creates the metadata of a COARDS-style grid: two 1-D
//! axis variables `x` and `y` and a 2-D data variable `z(y, x)`. Extents and
//! axis direction are reconciled from `actual_range` attributes or, when
//! those are missing, from the first and last stored coordinates.

use tracing::{debug, warn};

use crate::config::GridIoConfig;
use crate::error::{FileContext, GridIoError, GridResult, InFile, StructuralFormatError};
use crate::legacy::{is_legacy, LegacyCodec};
use crate::scalar::{ScalarKind, ScalarType};
use crate::store::{
    AttrScope, AttrValue, BackendResult, Container, GridStore, OpenMode, VarId,
};
use crate::types::{AxisOrder, GridFormat, GridHeader, Registration};

/// Bytes of the packed `source` attribute holding the command line.
pub const COMMAND_LEN: usize = 320;
/// Bytes of the packed `source` attribute holding the remark.
pub const REMARK_LEN: usize = 160;

const DEFAULT_X_UNIT: &str = "user_x_unit";
const DEFAULT_Y_UNIT: &str = "user_y_unit";
const DEFAULT_Z_UNIT: &str = "user_z_unit";

/// Variables making up a grid in an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GridVars {
    pub x: VarId,
    pub y: VarId,
    pub z: VarId,
    pub z_type: ScalarType,
    pub nx: usize,
    pub ny: usize,
}

/// Read the header of the grid at `path`.
///
/// Grids in the legacy layout are handed to `legacy`; without one they are
/// rejected with [`StructuralFormatError::LegacyUnsupported`].
pub fn read_header<S: GridStore>(
    store: &S,
    legacy: Option<&dyn LegacyCodec>,
    path: &str,
) -> GridResult<GridHeader> {
    let ctx = FileContext::new(path)?;
    let container = store.open(path, OpenMode::Read).in_file(&ctx)?;

    if is_legacy(&container).in_file(&ctx)? {
        drop(container);
        debug!(file = path, "legacy grid layout detected");
        return match legacy {
            Some(codec) => codec.read_header(path),
            None => Err(ctx.structure(StructuralFormatError::LegacyUnsupported)),
        };
    }

    let vars = locate(&container, &ctx)?;
    let header = read_attributes(&container, &vars, &ctx)?;
    container.close().in_file(&ctx)?;

    debug!(
        file = path,
        nx = header.nx,
        ny = header.ny,
        format = %header.format,
        "read grid header"
    );
    Ok(header)
}

/// Rewrite the header attributes of an existing grid.
///
/// The schema and all stored samples, axis coordinates included, are left
/// alone: `nx`/`ny` must match the stored grid.
pub fn update_header<S: GridStore>(
    store: &S,
    config: &GridIoConfig,
    path: &str,
    header: &mut GridHeader,
) -> GridResult<()> {
    let ctx = FileContext::new(path)?;
    let mut container = store.open(path, OpenMode::Write).in_file(&ctx)?;
    let vars = locate(&container, &ctx)?;

    if vars.nx != header.nx || vars.ny != header.ny {
        return Err(GridIoError::InvalidHeader(format!(
            "header is {}x{} but {} holds a {}x{} grid",
            header.nx, header.ny, path, vars.nx, vars.ny
        )));
    }

    // stored rows keep their direction; only attributes change
    let ends = probe_ends(&container, vars.y, vars.ny).in_file(&ctx)?;
    header.y_order = AxisOrder::from_samples(ends[0], ends[1]);
    header.z_id = Some(vars.z);
    put_attributes(&mut container, &vars, header, config, false).in_file(&ctx)?;
    container.close().in_file(&ctx)?;

    debug!(file = path, "updated grid header");
    Ok(())
}

/// Create a grid container at `path` holding only the header.
pub fn write_header<S: GridStore>(
    store: &S,
    config: &GridIoConfig,
    path: &str,
    header: &mut GridHeader,
) -> GridResult<()> {
    let ctx = FileContext::new(path)?;
    header.validate()?;
    let mut container = store.create(path).in_file(&ctx)?;
    define_grid(&mut container, &ctx, config, header)?;
    container.close().in_file(&ctx)?;

    debug!(
        file = path,
        nx = header.nx,
        ny = header.ny,
        format = %header.format,
        "wrote grid header"
    );
    Ok(())
}

/// Define dimensions, variables and attributes in a fresh container, then
/// store the axis samples. The container is left in data mode.
pub(crate) fn define_grid<C: Container>(
    container: &mut C,
    ctx: &FileContext,
    config: &GridIoConfig,
    header: &mut GridHeader,
) -> GridResult<GridVars> {
    let z_type = header.format.scalar.storage_type();

    let x_dim = container.define_dimension("x", header.nx).in_file(ctx)?;
    let y_dim = container.define_dimension("y", header.ny).in_file(ctx)?;
    let x = container
        .define_variable("x", ScalarType::Float, &[x_dim])
        .in_file(ctx)?;
    let y = container
        .define_variable("y", ScalarType::Float, &[y_dim])
        .in_file(ctx)?;
    let z = container
        .define_variable("z", z_type, &[y_dim, x_dim])
        .in_file(ctx)?;

    let vars = GridVars {
        x,
        y,
        z,
        z_type,
        nx: header.nx,
        ny: header.ny,
    };
    header.z_id = Some(z);
    header.y_order = AxisOrder::Ascending;

    put_attributes(container, &vars, header, config, true).in_file(ctx)?;
    container.end_define().in_file(ctx)?;
    put_axis_samples(container, &vars, header).in_file(ctx)?;

    Ok(vars)
}

/// Find the data variable and the axis variables along its dimensions.
pub(crate) fn locate<C: Container>(container: &C, ctx: &FileContext) -> GridResult<GridVars> {
    let variables = container.variables().in_file(ctx)?;

    let z = variables
        .iter()
        .find(|v| v.dims.len() == 2)
        .ok_or_else(|| ctx.structure(StructuralFormatError::NoDataVariable))?;
    let (y_dim, x_dim) = (&z.dims[0], &z.dims[1]);

    let axis = |dim: &str, name: char| -> GridResult<VarId> {
        variables
            .iter()
            .find(|v| v.dims.len() == 1 && v.dims[0].name == dim)
            .map(|v| v.id)
            .ok_or_else(|| ctx.structure(StructuralFormatError::MissingAxisVariable { axis: name }))
    };
    let x = axis(&x_dim.name, 'x')?;
    let y = axis(&y_dim.name, 'y')?;

    if x_dim.len == 0 || y_dim.len == 0 {
        return Err(GridIoError::InvalidHeader(format!(
            "{} holds an empty {}x{} grid",
            ctx.path(),
            x_dim.len,
            y_dim.len
        )));
    }

    Ok(GridVars {
        x,
        y,
        z: z.id,
        z_type: z.ty,
        nx: x_dim.len,
        ny: y_dim.len,
    })
}

fn read_attributes<C: Container>(
    container: &C,
    vars: &GridVars,
    ctx: &FileContext,
) -> GridResult<GridHeader> {
    let scalar = ScalarKind::from_storage(vars.z_type).map_err(|e| {
        warn!(file = ctx.path(), ty = ?vars.z_type, "grid data type has no grid format");
        ctx.structure(e)
    })?;

    let var = AttrScope::Variable;
    let get = |scope: AttrScope, name: &str| container.attribute(scope, name).in_file(ctx);
    let text = |scope: AttrScope, name: &str| -> GridResult<Option<String>> {
        Ok(get(scope, name)?.and_then(|v| v.as_text().map(until_nul)))
    };

    let mut header = GridHeader {
        nx: vars.nx,
        ny: vars.ny,
        format: GridFormat::coards(scalar),
        z_id: Some(vars.z),
        ..Default::default()
    };

    header.x_units = text(var(vars.x), "units")?.unwrap_or_else(|| DEFAULT_X_UNIT.to_string());
    header.y_units = text(var(vars.y), "units")?.unwrap_or_else(|| DEFAULT_Y_UNIT.to_string());
    header.z_units = text(var(vars.z), "units")?.unwrap_or_else(|| DEFAULT_Z_UNIT.to_string());
    header.z_scale_factor = get(var(vars.z), "scale_factor")?
        .and_then(|v| v.as_f64())
        .unwrap_or(1.0);
    header.z_add_offset = get(var(vars.z), "add_offset")?
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    header.node_offset = Registration::from_i32(
        get(AttrScope::Global, "node_offset")?
            .and_then(|v| v.as_i32())
            .unwrap_or(0),
    );

    header.title = match text(AttrScope::Global, "title")? {
        Some(t) => t,
        None => text(var(vars.z), "long_name")?.unwrap_or_default(),
    };

    match text(AttrScope::Global, "remark")? {
        Some(remark) => {
            header.command = text(AttrScope::Global, "source")?.unwrap_or_default();
            header.remark = remark;
        }
        None => {
            let packed = match get(AttrScope::Global, "source")? {
                Some(AttrValue::Text(s)) => s,
                _ => match get(AttrScope::Global, "history")? {
                    Some(AttrValue::Text(s)) => s,
                    _ => String::new(),
                },
            };
            let (command, remark) = unpack_source(&packed);
            header.command = command;
            header.remark = remark;
        }
    }

    // x extents
    let (x_min, x_max) = match get(var(vars.x), "actual_range")?.and_then(|v| v.as_f64_pair()) {
        Some([a, b]) => (a.min(b), a.max(b)),
        None => {
            let [a, b] = probe_ends(container, vars.x, vars.nx).in_file(ctx)?;
            header.node_offset = Registration::Gridline;
            (a.min(b), a.max(b))
        }
    };
    header.x_min = x_min;
    header.x_max = x_max;

    // y extents and direction
    let ends = probe_ends(container, vars.y, vars.ny).in_file(ctx)?;
    header.y_order = AxisOrder::from_samples(ends[0], ends[1]);
    let pair = match get(var(vars.y), "actual_range")?.and_then(|v| v.as_f64_pair()) {
        Some([a, b]) => [a.min(b), a.max(b)],
        None => {
            header.node_offset = Registration::Gridline;
            let (lo, hi) = header.y_order.min_max_index();
            [ends[lo], ends[hi]]
        }
    };
    header.y_min = pair[0];
    header.y_max = pair[1];

    header.set_increments();

    let z_range = match get(var(vars.z), "actual_range")?.and_then(|v| v.as_f64_pair()) {
        Some(r) => Some(r),
        None => get(var(vars.z), "valid_range")?.and_then(|v| v.as_f64_pair()),
    };
    let [z_min, z_max] = z_range.unwrap_or([f64::NEG_INFINITY, f64::INFINITY]);
    header.z_min = z_min;
    header.z_max = z_max;

    Ok(header)
}

/// First and last sample of a 1-D axis variable.
fn probe_ends<C: Container>(
    container: &C,
    var: VarId,
    len: usize,
) -> BackendResult<[f64; 2]> {
    let first = container.read_f64_at(var, &[0])?;
    let last = container.read_f64_at(var, &[len.saturating_sub(1)])?;
    Ok([first, last])
}

fn put_attributes<C: Container>(
    container: &mut C,
    vars: &GridVars,
    header: &GridHeader,
    config: &GridIoConfig,
    with_fill: bool,
) -> BackendResult<()> {
    let (x, y, z) = (
        AttrScope::Variable(vars.x),
        AttrScope::Variable(vars.y),
        AttrScope::Variable(vars.z),
    );

    container.put_attribute(x, "units", header.x_units.as_str().into())?;
    container.put_attribute(y, "units", header.y_units.as_str().into())?;
    container.put_attribute(z, "units", header.z_units.as_str().into())?;
    container.put_attribute(z, "scale_factor", header.z_scale_factor.into())?;
    container.put_attribute(z, "add_offset", header.z_add_offset.into())?;
    container.put_attribute(
        AttrScope::Global,
        "node_offset",
        header.node_offset.as_i32().into(),
    )?;

    // _FillValue can only be set before any data exists.
    if with_fill {
        let fill = config.fill_for(header.format.scalar);
        container.put_attribute(z, "_FillValue", AttrValue::typed(vars.z_type, fill))?;
    }

    container.put_attribute(AttrScope::Global, "title", header.title.as_str().into())?;
    container.put_attribute(z, "long_name", header.title.as_str().into())?;

    if config.pack_legacy_source {
        let packed = pack_source(&header.command, &header.remark);
        container.put_attribute(AttrScope::Global, "source", AttrValue::Text(packed))?;
    } else {
        container.put_attribute(AttrScope::Global, "source", header.command.as_str().into())?;
        container.put_attribute(AttrScope::Global, "remark", header.remark.as_str().into())?;
    }

    container.put_attribute(z, "actual_range", [header.z_min, header.z_max].into())?;
    container.put_attribute(x, "actual_range", [header.x_min, header.x_max].into())?;

    let (lo, hi) = header.y_order.min_max_index();
    let mut y_range = [0.0; 2];
    y_range[lo] = header.y_min;
    y_range[hi] = header.y_max;
    container.put_attribute(y, "actual_range", y_range.into())?;

    Ok(())
}

fn put_axis_samples<C: Container>(
    container: &mut C,
    vars: &GridVars,
    header: &GridHeader,
) -> BackendResult<()> {
    let xs: Vec<f32> = (0..header.nx).map(|i| header.x_coord(i) as f32).collect();
    container.write_f32(vars.x, &[0], &[header.nx], &xs)?;

    let sign = header.y_order.sign() as f64;
    let off = 0.5 * header.node_offset.as_i32() as f64;
    let ys: Vec<f32> = (0..header.ny)
        .map(|j| (header.y_min + (j as f64 + off) * header.y_inc * sign) as f32)
        .collect();
    container.write_f32(vars.y, &[0], &[header.ny], &ys)?;
    Ok(())
}

/// Pack command and remark into the fixed-width legacy `source` form.
pub fn pack_source(command: &str, remark: &str) -> String {
    let mut packed = String::with_capacity(COMMAND_LEN + REMARK_LEN);
    for (text, width) in [(command, COMMAND_LEN), (remark, REMARK_LEN)] {
        let text = truncate_bytes(text, width - 1);
        packed.push_str(text);
        packed.extend(std::iter::repeat('\0').take(width - text.len()));
    }
    packed
}

/// Split the legacy packed `source` form into command and remark.
pub fn unpack_source(packed: &str) -> (String, String) {
    let bytes = packed.as_bytes();
    let field = |from: usize, to: usize| -> String {
        let from = from.min(bytes.len());
        let to = to.min(bytes.len());
        let raw = &bytes[from..to];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    };
    (
        field(0, COMMAND_LEN),
        field(COMMAND_LEN, COMMAND_LEN + REMARK_LEN),
    )
}

/// Text up to the first NUL; fixed-width text attributes are NUL padded.
fn until_nul(s: &str) -> String {
    match s.find('\0') {
        Some(i) => s[..i].to_string(),
        None => s.to_string(),
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
