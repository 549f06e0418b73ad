//! Core types shared by the header codec, reader and writer.

use serde::{Deserialize, Serialize};

use crate::error::{GridIoError, GridResult};
use crate::scalar::ScalarKind;
use crate::store::VarId;

/// Grid registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Registration {
    /// Samples sit exactly on the coordinate nodes.
    #[default]
    Gridline,
    /// Samples represent cells centered between nodes.
    Pixel,
}

impl Registration {
    /// The `node_offset` attribute value (0 or 1).
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Gridline => 0,
            Self::Pixel => 1,
        }
    }

    /// Any non-zero offset means pixel registration.
    pub fn from_i32(v: i32) -> Self {
        if v == 0 {
            Self::Gridline
        } else {
            Self::Pixel
        }
    }

    fn as_f64(self) -> f64 {
        self.as_i32() as f64
    }
}

/// Direction of the stored y axis relative to north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AxisOrder {
    /// First stored row is the southernmost.
    #[default]
    Ascending,
    /// First stored row is the northernmost.
    Descending,
}

impl AxisOrder {
    pub fn sign(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }

    /// Order implied by the first and last stored coordinate.
    pub fn from_samples(first: f64, last: f64) -> Self {
        if first > last {
            Self::Descending
        } else {
            Self::Ascending
        }
    }

    /// Indices of (min, max) within a `[first, last]` pair.
    pub fn min_max_index(self) -> (usize, usize) {
        let o = self.sign();
        (((1 - o) / 2) as usize, ((1 + o) / 2) as usize)
    }
}

/// On-disk layout family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Layout {
    /// Two axis variables and one 2-D data variable.
    #[default]
    Coards,
    /// The older single-vector layout marked by an `xysize` dimension.
    Legacy,
}

/// Layout plus sample precision, e.g. `nf` or `cs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridFormat {
    pub layout: Layout,
    pub scalar: ScalarKind,
}

impl GridFormat {
    pub fn coards(scalar: ScalarKind) -> Self {
        Self {
            layout: Layout::Coards,
            scalar,
        }
    }

    pub fn legacy(scalar: ScalarKind) -> Self {
        Self {
            layout: Layout::Legacy,
            scalar,
        }
    }

    /// Two-letter format code.
    pub fn code(&self) -> String {
        let family = match self.layout {
            Layout::Coards => 'n',
            Layout::Legacy => 'c',
        };
        format!("{}{}", family, self.scalar.code())
    }

    /// Parse a two-letter format code (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        let mut chars = code.chars();
        let layout = match chars.next()?.to_ascii_lowercase() {
            'n' => Layout::Coards,
            'c' => Layout::Legacy,
            _ => return None,
        };
        let scalar = ScalarKind::from_code(chars.next()?)?;
        if chars.next().is_some() {
            return None;
        }
        Some(Self { layout, scalar })
    }
}

impl std::fmt::Display for GridFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Description of a grid: dimensions, extents, registration and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridHeader {
    /// Number of columns, excluding padding.
    pub nx: usize,
    /// Number of rows, excluding padding.
    pub ny: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    /// `-inf` when the value range is unknown.
    #[serde(with = "extent")]
    pub z_min: f64,
    /// `+inf` when the value range is unknown.
    #[serde(with = "extent")]
    pub z_max: f64,
    pub x_inc: f64,
    pub y_inc: f64,
    pub node_offset: Registration,
    pub x_units: String,
    pub y_units: String,
    pub z_units: String,
    pub z_scale_factor: f64,
    pub z_add_offset: f64,
    pub title: String,
    pub command: String,
    pub remark: String,
    /// Derived from the stored y coordinates, never persisted.
    #[serde(skip)]
    pub y_order: AxisOrder,
    pub format: GridFormat,
    /// Data variable of the container the header was last resolved against.
    #[serde(skip)]
    pub z_id: Option<VarId>,
}

impl Default for GridHeader {
    fn default() -> Self {
        Self {
            nx: 0,
            ny: 0,
            x_min: 0.0,
            x_max: 0.0,
            y_min: 0.0,
            y_max: 0.0,
            z_min: 0.0,
            z_max: 0.0,
            x_inc: 0.0,
            y_inc: 0.0,
            node_offset: Registration::Gridline,
            x_units: String::new(),
            y_units: String::new(),
            z_units: String::new(),
            z_scale_factor: 1.0,
            z_add_offset: 0.0,
            title: String::new(),
            command: String::new(),
            remark: String::new(),
            y_order: AxisOrder::Ascending,
            format: GridFormat::default(),
            z_id: None,
        }
    }
}

impl GridHeader {
    /// Header for a grid with the given size and extents; increments are derived.
    pub fn new(
        nx: usize,
        ny: usize,
        region: Region,
        node_offset: Registration,
        format: GridFormat,
    ) -> Self {
        let mut header = Self {
            nx,
            ny,
            x_min: region.west,
            x_max: region.east,
            y_min: region.south,
            y_max: region.north,
            node_offset,
            format,
            ..Default::default()
        };
        header.set_increments();
        header
    }

    /// Recompute `x_inc`/`y_inc` from extents, size and registration.
    pub fn set_increments(&mut self) {
        let off = self.node_offset.as_f64();
        self.x_inc = (self.x_max - self.x_min) / (self.nx as f64 + off - 1.0);
        self.y_inc = (self.y_max - self.y_min) / (self.ny as f64 + off - 1.0);
    }

    /// Coordinate of column `i`.
    pub fn x_coord(&self, i: usize) -> f64 {
        self.x_min + (i as f64 + 0.5 * self.node_offset.as_f64()) * self.x_inc
    }

    /// Coordinate of row `j` counted from the south.
    pub fn y_coord(&self, j: usize) -> f64 {
        self.y_min + (j as f64 + 0.5 * self.node_offset.as_f64()) * self.y_inc
    }

    /// Geographic extent of the grid.
    pub fn region(&self) -> Region {
        Region::new(self.x_min, self.x_max, self.y_min, self.y_max)
    }

    pub fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0
    }

    /// Reject headers that cannot be written.
    pub fn validate(&self) -> GridResult<()> {
        if self.is_empty() {
            return Err(GridIoError::InvalidHeader(format!(
                "grid dimensions must be positive, got {}x{}",
                self.nx, self.ny
            )));
        }
        if !(self.x_min.is_finite() && self.x_max.is_finite())
            || !(self.y_min.is_finite() && self.y_max.is_finite())
        {
            return Err(GridIoError::InvalidHeader(
                "grid extents must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> GridResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| GridIoError::InvalidHeader(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(value: &serde_json::Value) -> GridResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| GridIoError::InvalidHeader(e.to_string()))
    }
}

/// JSON has no infinities; non-finite extents travel as strings.
mod extent {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            serializer.serialize_f64(*v)
        } else if v.is_nan() {
            serializer.serialize_str("NaN")
        } else if *v > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) => match s.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("invalid extent {:?}", other))),
            },
        }
    }
}

/// A geographic window. All zeros means the whole grid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl Region {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Self {
        Self {
            west,
            east,
            south,
            north,
        }
    }

    /// Request for the entire grid.
    pub fn full() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.west == 0.0 && self.east == 0.0 && self.south == 0.0 && self.north == 0.0
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }
}

/// Extra rows and columns around the grid in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub west: usize,
    pub east: usize,
    pub south: usize,
    pub north: usize,
}

impl Padding {
    pub fn none() -> Self {
        Self::default()
    }

    /// From `[west, east, south, north]`.
    pub fn from_array(pad: [usize; 4]) -> Self {
        Self {
            west: pad[0],
            east: pad[1],
            south: pad[2],
            north: pad[3],
        }
    }

    /// Uniform padding on all four sides.
    pub fn uniform(n: usize) -> Self {
        Self::from_array([n; 4])
    }

    /// Padded row length in samples (not counting interleave).
    pub fn padded_width(&self, nx: usize) -> usize {
        nx + self.west + self.east
    }

    pub fn padded_height(&self, ny: usize) -> usize {
        ny + self.south + self.north
    }

    /// Samples needed to hold an `nx` x `ny` grid with this padding.
    pub fn buffer_len(&self, nx: usize, ny: usize, complex: bool) -> usize {
        let stride = if complex { 2 } else { 1 };
        self.padded_width(nx) * self.padded_height(ny) * stride
    }
}

/// Outcome of a windowed read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReadSummary {
    /// Realized value range, `None` if every copied sample was missing.
    pub z_range: Option<(f64, f64)>,
    /// Samples that matched the missing-value sentinel or were already NaN.
    pub missing: usize,
}

/// Outcome of a windowed write.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WriteSummary {
    /// Realized value range of the stored samples.
    pub z_range: Option<(f64, f64)>,
    /// Samples outside the integer type's range that were replaced by the fill value.
    pub out_of_range: usize,
    /// No valid sample was written.
    pub empty: bool,
}

/// Running min/max over valid samples.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RangeTracker {
    min: f64,
    max: f64,
}

impl RangeTracker {
    pub(crate) fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub(crate) fn update(&mut self, v: f64) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    /// Raw bounds; `(+inf, -inf)` when nothing was seen.
    pub(crate) fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub(crate) fn range(&self) -> Option<(f64, f64)> {
        (self.min <= self.max).then_some((self.min, self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increments_gridline() {
        let header = GridHeader::new(
            11,
            6,
            Region::new(0.0, 10.0, -5.0, 0.0),
            Registration::Gridline,
            GridFormat::default(),
        );
        assert!((header.x_inc - 1.0).abs() < f64::EPSILON);
        assert!((header.y_inc - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_increments_pixel() {
        let header = GridHeader::new(
            10,
            5,
            Region::new(0.0, 10.0, -5.0, 0.0),
            Registration::Pixel,
            GridFormat::default(),
        );
        assert!((header.x_inc - 1.0).abs() < f64::EPSILON);
        assert!((header.y_inc - 1.0).abs() < f64::EPSILON);
        assert!((header.x_coord(0) - 0.5).abs() < f64::EPSILON);
        assert!((header.y_coord(4) - -0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_axis_order_min_max_index() {
        assert_eq!(AxisOrder::Ascending.min_max_index(), (0, 1));
        assert_eq!(AxisOrder::Descending.min_max_index(), (1, 0));
        assert_eq!(AxisOrder::from_samples(10.0, 0.0), AxisOrder::Descending);
        assert_eq!(AxisOrder::from_samples(0.0, 10.0), AxisOrder::Ascending);
    }

    #[test]
    fn test_format_codes() {
        let f = GridFormat::from_code("ns").unwrap();
        assert_eq!(f, GridFormat::coards(ScalarKind::Short));
        assert_eq!(GridFormat::legacy(ScalarKind::Float).code(), "cf");
        assert!(GridFormat::from_code("nq").is_none());
        assert!(GridFormat::from_code("nff").is_none());
    }

    #[test]
    fn test_padding_buffer_len() {
        let pad = Padding::from_array([2, 3, 1, 4]);
        assert_eq!(pad.padded_width(6), 11);
        assert_eq!(pad.padded_height(4), 9);
        assert_eq!(pad.buffer_len(6, 4, false), 99);
        assert_eq!(pad.buffer_len(6, 4, true), 198);
    }

    #[test]
    fn test_region_full() {
        assert!(Region::full().is_full());
        assert!(!Region::new(0.0, 1.0, 0.0, 0.0).is_full());
    }

    #[test]
    fn test_header_json_roundtrip() {
        let mut header = GridHeader::new(
            4,
            3,
            Region::new(-1.0, 2.0, 0.0, 2.0),
            Registration::Gridline,
            GridFormat::coards(ScalarKind::Int),
        );
        header.title = "bathymetry".to_string();
        header.z_id = Some(VarId(2));

        let back = GridHeader::from_json(&header.to_json().unwrap()).unwrap();
        assert_eq!(back.title, "bathymetry");
        assert_eq!(back.format, header.format);
        assert_eq!(back.z_id, None);
    }

    #[test]
    fn test_header_json_unknown_range() {
        let mut header = GridHeader::new(
            2,
            2,
            Region::new(0.0, 1.0, 0.0, 1.0),
            Registration::Gridline,
            GridFormat::coards(ScalarKind::Float),
        );
        header.z_min = f64::NEG_INFINITY;
        header.z_max = f64::INFINITY;

        let json = header.to_json().unwrap();
        assert_eq!(json["z_min"], "-inf");
        assert_eq!(json["z_max"], "inf");

        let back = GridHeader::from_json(&json).unwrap();
        assert_eq!(back.z_min, f64::NEG_INFINITY);
        assert_eq!(back.z_max, f64::INFINITY);
    }

    #[test]
    fn test_header_json_rejects_bad_extent() {
        let mut json = GridHeader::default().to_json().unwrap();
        json["z_min"] = serde_json::Value::from("lots");
        assert!(matches!(
            GridHeader::from_json(&json),
            Err(GridIoError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(GridHeader::default().validate().is_err());
    }

    #[test]
    fn test_range_tracker() {
        let mut t = RangeTracker::new();
        assert_eq!(t.range(), None);
        t.update(3.0);
        t.update(-1.0);
        assert_eq!(t.range(), Some((-1.0, 3.0)));
    }
}
