//! Integration test: write grids through `GridIo` and read them back.
//!
//! Runs against the in-memory store so it needs no libnetcdf:
//! 1. Create a test grid with known values
//! 2. Write it with a header
//! 3. Read the header and (windows of) the data back
//! 4. Verify values, padding and value ranges

use netcdf_grid::store::{AttrScope, Container, GridStore, OpenMode};
use netcdf_grid::{
    GridFormat, GridHeader, GridIo, GridIoConfig, GridIoError, MemoryStore, Padding, Region,
    Registration, ScalarKind, ScalarType,
};
use test_utils::{
    assert_approx_eq, create_constant_grid, create_grid_with_nans, create_relief_grid, create_test_grid,
    init_test_logging, pad_grid, padded_index, unpad_grid,
};
use test_utils::{grid, grid::GridSpec, meta, region};

fn header_for(spec: GridSpec, scalar: ScalarKind) -> GridHeader {
    let registration = if spec.pixel {
        Registration::Pixel
    } else {
        Registration::Gridline
    };
    let (w, e, s, n) = spec.region();
    let mut header = GridHeader::new(
        spec.nx,
        spec.ny,
        Region::new(w, e, s, n),
        registration,
        GridFormat::coards(scalar),
    );
    header.title = meta::TITLE.to_string();
    header.command = meta::COMMAND.to_string();
    header.remark = meta::REMARK.to_string();
    header.z_units = meta::Z_UNITS.to_string();
    header
}

fn to_region(r: (f64, f64, f64, f64)) -> Region {
    Region::new(r.0, r.1, r.2, r.3)
}

/// Write `data` as a full grid and return the header read back from the store.
fn write_and_read_header(
    io: &GridIo<MemoryStore>,
    path: &str,
    spec: GridSpec,
    scalar: ScalarKind,
    data: &[f32],
) -> GridHeader {
    let mut header = header_for(spec, scalar);
    io.write_grid(path, &mut header, data, &Region::full(), Padding::none(), false)
        .expect("Failed to write grid");
    io.read_header(path).expect("Failed to read header")
}

fn read_full(io: &GridIo<MemoryStore>, path: &str, header: &mut GridHeader) -> Vec<f32> {
    let mut buffer = vec![0.0f32; header.nx * header.ny];
    io.read_grid(path, header, &mut buffer, &Region::full(), Padding::none(), false)
        .expect("Failed to read grid");
    buffer
}

#[test]
fn test_float_roundtrip_is_exact() {
    init_test_logging();
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let data = create_test_grid(spec.nx, spec.ny);

    let mut header = write_and_read_header(&io, "float.nc", spec, ScalarKind::Float, &data);
    assert_eq!((header.nx, header.ny), (6, 4));
    assert_eq!(header.format, GridFormat::coards(ScalarKind::Float));
    assert_eq!(header.title, meta::TITLE);
    assert_eq!(header.command, meta::COMMAND);
    assert_eq!(header.remark, meta::REMARK);
    assert_eq!(header.z_units, meta::Z_UNITS);
    assert_eq!((header.z_min, header.z_max), (0.0, 5003.0));

    let back = read_full(&io, "float.nc", &mut header);
    assert_eq!(back, data);
    assert_eq!((header.z_min, header.z_max), (0.0, 5003.0));
}

#[test]
fn test_integer_roundtrip_within_half_unit() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let data = create_relief_grid(spec.nx, spec.ny, 120.3, 48.7);

    for scalar in [ScalarKind::Byte, ScalarKind::Short, ScalarKind::Int] {
        let path = format!("relief_{}.nc", scalar);
        let mut header = write_and_read_header(&io, &path, spec, scalar, &data);
        assert_eq!(header.format.scalar, scalar);

        let back = read_full(&io, &path, &mut header);
        for (stored, original) in back.iter().zip(&data) {
            assert_approx_eq!(*stored, *original, 0.5);
        }
    }
}

#[test]
fn test_full_window_equals_unwindowed_read() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let data = create_test_grid(spec.nx, spec.ny);
    let header = write_and_read_header(&io, "full.nc", spec, ScalarKind::Float, &data);

    let mut implicit = header.clone();
    let a = read_full(&io, "full.nc", &mut implicit);

    let mut explicit = header.clone();
    let mut b = vec![0.0f32; 24];
    io.read_grid(
        "full.nc",
        &mut explicit,
        &mut b,
        &to_region(spec.region()),
        Padding::none(),
        false,
    )
    .unwrap();

    assert_eq!(a, b);
    assert_eq!(implicit.region(), explicit.region());
    assert_eq!((implicit.nx, implicit.ny), (explicit.nx, explicit.ny));
}

#[test]
fn test_padding_leaves_border_untouched() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let data = create_test_grid(spec.nx, spec.ny);
    let mut header = write_and_read_header(&io, "pad.nc", spec, ScalarKind::Float, &data);

    let pad = [2, 3, 1, 4];
    let padding = Padding::from_array(pad);
    assert_eq!(padding.buffer_len(6, 4, false), 99);

    let mut buffer = vec![999.0f32; 99];
    io.read_grid(
        "pad.nc",
        &mut header,
        &mut buffer,
        &Region::full(),
        padding,
        false,
    )
    .unwrap();

    assert_eq!(unpad_grid(&buffer, 6, 4, pad, false), data);

    let mut interior = vec![false; 99];
    for row in 0..4 {
        for col in 0..6 {
            interior[padded_index(6, pad, false, col, row)] = true;
        }
    }
    for (i, v) in buffer.iter().enumerate() {
        if !interior[i] {
            assert_eq!(*v, 999.0, "padding cell {} was overwritten", i);
        }
    }
}

#[test]
fn test_padded_write_roundtrip() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let data = create_test_grid(spec.nx, spec.ny);
    let pad = [1, 2, 3, 1];
    let buffer = pad_grid(&data, 6, 4, pad, true, f32::NAN);

    let mut header = header_for(spec, ScalarKind::Float);
    let summary = io
        .write_grid(
            "padw.nc",
            &mut header,
            &buffer,
            &Region::full(),
            Padding::from_array(pad),
            true,
        )
        .unwrap();
    assert_eq!(summary.z_range, Some((0.0, 5003.0)));

    let mut header = io.read_header("padw.nc").unwrap();
    assert_eq!(read_full(&io, "padw.nc", &mut header), data);
}

#[test]
fn test_subregion_read() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let data = create_test_grid(spec.nx, spec.ny);
    let mut header = write_and_read_header(&io, "sub.nc", spec, ScalarKind::Float, &data);

    let mut buffer = vec![0.0f32; 6];
    let summary = io
        .read_grid(
            "sub.nc",
            &mut header,
            &mut buffer,
            &to_region(region::SIMPLE_INTERIOR),
            Padding::none(),
            false,
        )
        .unwrap();

    // rows 1 and 2 from the top, columns 1..=3
    assert_eq!(buffer, vec![1001.0, 2001.0, 3001.0, 1002.0, 2002.0, 3002.0]);
    assert_eq!((header.nx, header.ny), (3, 2));
    assert_eq!(header.region(), Region::new(1.0, 3.0, 1.0, 2.0));
    assert_eq!(summary.z_range, Some((1001.0, 3002.0)));
}

#[test]
fn test_subregion_write() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let data = create_test_grid(spec.nx, spec.ny);

    let mut header = header_for(spec, ScalarKind::Float);
    io.write_grid(
        "cut.nc",
        &mut header,
        &data,
        &to_region(region::SIMPLE_INTERIOR),
        Padding::none(),
        false,
    )
    .unwrap();
    assert_eq!((header.nx, header.ny), (3, 2));

    let mut header = io.read_header("cut.nc").unwrap();
    assert_eq!(header.region(), Region::new(1.0, 3.0, 1.0, 2.0));
    assert_eq!(
        read_full(&io, "cut.nc", &mut header),
        vec![1001.0, 2001.0, 3001.0, 1002.0, 2002.0, 3002.0]
    );
}

#[test]
fn test_window_beyond_domain_rejected() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let data = create_test_grid(spec.nx, spec.ny);
    let mut header = write_and_read_header(&io, "oob.nc", spec, ScalarKind::Float, &data);

    let mut buffer = vec![0.0f32; 64];
    let err = io
        .read_grid(
            "oob.nc",
            &mut header,
            &mut buffer,
            &to_region(region::BELOW_SIMPLE),
            Padding::none(),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, GridIoError::Window(_)));
}

#[test]
fn test_descending_file_loads_like_ascending() {
    let store = MemoryStore::new();
    let data = create_test_grid(3, 3);

    // north row stored first
    let mut c = store.create("desc.nc").unwrap();
    let yd = c.define_dimension("lat", 3).unwrap();
    let xd = c.define_dimension("lon", 3).unwrap();
    let x = c.define_variable("lon", ScalarType::Float, &[xd]).unwrap();
    let y = c.define_variable("lat", ScalarType::Float, &[yd]).unwrap();
    let z = c.define_variable("topo", ScalarType::Float, &[yd, xd]).unwrap();
    c.write_f32(x, &[0], &[3], &[10.0, 11.0, 12.0]).unwrap();
    c.write_f32(y, &[0], &[3], &[2.0, 1.0, 0.0]).unwrap();
    c.write_f32(z, &[0, 0], &[3, 3], &data).unwrap();
    drop(c);

    let io = GridIo::new(store);
    let mut header = io.read_header("desc.nc").unwrap();
    assert_eq!((header.y_min, header.y_max), (0.0, 2.0));
    assert_eq!(read_full(&io, "desc.nc", &mut header), data);

    // same data written back is stored south-first but reads the same
    let mut out = header_for(
        GridSpec {
            nx: 3,
            ny: 3,
            west: 10.0,
            east: 12.0,
            south: 0.0,
            north: 2.0,
            pixel: false,
        },
        ScalarKind::Float,
    );
    io.write_grid("asc.nc", &mut out, &data, &Region::full(), Padding::none(), false)
        .unwrap();
    let mut header = io.read_header("asc.nc").unwrap();
    assert_eq!(read_full(&io, "asc.nc", &mut header), data);

    let c = io.store().open("asc.nc", OpenMode::Read).unwrap();
    let first_row = c.read_f32(netcdf_grid::store::VarId(2), &[0, 0], &[1, 3]).unwrap();
    assert_eq!(first_row, vec![2.0, 1002.0, 2002.0]);
}

#[test]
fn test_complex_read_interleaves() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let data = create_test_grid(spec.nx, spec.ny);
    let mut header = write_and_read_header(&io, "cplx.nc", spec, ScalarKind::Float, &data);

    let mut buffer = vec![-7.0f32; 48];
    io.read_grid(
        "cplx.nc",
        &mut header,
        &mut buffer,
        &Region::full(),
        Padding::none(),
        true,
    )
    .unwrap();

    assert_eq!(unpad_grid(&buffer, 6, 4, [0; 4], true), data);
    assert!(buffer.iter().skip(1).step_by(2).all(|&v| v == -7.0));
}

#[test]
fn test_short_target_range_check() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let mut data = create_constant_grid(spec.nx, spec.ny, 5.0);
    data[0] = 100000.0;
    data[1] = 31000.0;
    data[2] = -40000.0;

    let mut header = header_for(spec, ScalarKind::Short);
    let summary = io
        .write_grid("short.nc", &mut header, &data, &Region::full(), Padding::none(), false)
        .unwrap();
    assert_eq!(summary.out_of_range, 2);
    assert_eq!(summary.z_range, Some((5.0, 31000.0)));

    let mut header = io.read_header("short.nc").unwrap();
    let back = read_full(&io, "short.nc", &mut header);
    assert!(back[0].is_nan());
    assert_eq!(back[1], 31000.0);
    assert!(back[2].is_nan());
    assert_eq!((header.z_min, header.z_max), (5.0, 31000.0));
}

#[test]
fn test_sentinel_becomes_nan() {
    let config = GridIoConfig {
        fill_value: Some(-9999.0),
        ..Default::default()
    };
    let io = GridIo::with_config(MemoryStore::new(), config).unwrap();
    let spec = grid::SIMPLE_6X4;
    let nans = [(0, 0), (3, 2), (5, 3)];
    let mut data = create_grid_with_nans(spec.nx, spec.ny, &nans);
    data[7] = 12.5;

    let mut header = write_and_read_header(&io, "nan.nc", spec, ScalarKind::Float, &data);

    // the fill is on disk
    let c = io.store().open("nan.nc", OpenMode::Read).unwrap();
    let fill = c
        .attribute(AttrScope::Variable(netcdf_grid::store::VarId(2)), "_FillValue")
        .unwrap()
        .and_then(|v| v.as_f64());
    assert_eq!(fill, Some(-9999.0));
    drop(c);

    let mut buffer = vec![0.0f32; 24];
    let summary = io
        .read_grid("nan.nc", &mut header, &mut buffer, &Region::full(), Padding::none(), false)
        .unwrap();

    assert_eq!(summary.missing, 3);
    for &(col, row) in &nans {
        assert!(buffer[row * 6 + col].is_nan());
    }
    assert_eq!(summary.z_range, Some((0.0, 12.5)));
    assert_eq!(header.z_min, 0.0);
}

#[test]
fn test_periodic_window_wraps() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::GLOBAL_1DEG;
    let data = create_test_grid(spec.nx, spec.ny);
    let mut header = write_and_read_header(&io, "global.nc", spec, ScalarKind::Float, &data);

    let mut buffer = vec![0.0f32; 21 * 21];
    io.read_grid(
        "global.nc",
        &mut header,
        &mut buffer,
        &to_region(region::ACROSS_GREENWICH),
        Padding::none(),
        false,
    )
    .unwrap();

    assert_eq!((header.nx, header.ny), (21, 21));
    // top-left is 10W/10N: column 350, row 80 from the top
    assert_eq!(buffer[0], 350080.0);
    assert_eq!(buffer[10], 80.0);
    assert_eq!(buffer[21 * 21 - 1], 10100.0);
}

#[test]
fn test_undersized_buffer_rejected() {
    let io = GridIo::new(MemoryStore::new());
    let spec = grid::SIMPLE_6X4;
    let data = create_test_grid(spec.nx, spec.ny);
    let mut header = write_and_read_header(&io, "small.nc", spec, ScalarKind::Float, &data);

    let mut buffer = vec![0.0f32; 24];
    let err = io
        .read_grid(
            "small.nc",
            &mut header,
            &mut buffer,
            &Region::full(),
            Padding::uniform(1),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, GridIoError::BufferTooSmall { needed: 48, actual: 24 }));

    let mut header = header_for(spec, ScalarKind::Float);
    let err = io
        .write_grid("small_out.nc", &mut header, &data[..20], &Region::full(), Padding::none(), false)
        .unwrap_err();
    assert!(matches!(err, GridIoError::BufferTooSmall { needed: 24, actual: 20 }));
}

#[test]
fn test_missing_file_names_path() {
    let io = GridIo::new(MemoryStore::new());
    let err = io.read_header("nowhere.nc").unwrap_err();
    assert!(matches!(err, GridIoError::Backend { .. }));
    assert!(err.to_string().ends_with("[nowhere.nc]"));
}
