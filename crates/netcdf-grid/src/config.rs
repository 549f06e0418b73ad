//! Configuration for grid I/O.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Runtime knobs for reading and writing grids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridIoConfig {
    /// Value written in place of NaN. `None` uses the type minimum for
    /// integer grids and leaves NaN in place for float grids.
    pub fill_value: Option<f64>,

    /// Fraction of a cell a window edge may miss a node by and still snap
    /// onto it.
    pub snap_tolerance: f64,

    /// Write command and remark packed into one fixed-width `source`
    /// attribute, for readers that only understand the old form.
    pub pack_legacy_source: bool,
}

impl Default for GridIoConfig {
    fn default() -> Self {
        Self {
            fill_value: None,
            snap_tolerance: 0.1,
            pack_legacy_source: false,
        }
    }
}

impl GridIoConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRID_FILL_VALUE") {
            if val.eq_ignore_ascii_case("nan") {
                config.fill_value = None;
            } else if let Ok(v) = val.parse() {
                config.fill_value = Some(v);
            }
        }

        if let Ok(val) = std::env::var("GRID_SNAP_TOLERANCE") {
            if let Ok(t) = val.parse() {
                config.snap_tolerance = t;
            }
        }

        if let Ok(val) = std::env::var("GRID_PACK_LEGACY_SOURCE") {
            config.pack_legacy_source = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..0.5).contains(&self.snap_tolerance) {
            return Err("snap_tolerance must be in [0, 0.5)".to_string());
        }

        if let Some(v) = self.fill_value {
            if v.is_infinite() {
                return Err("fill_value must be finite".to_string());
            }
        }

        Ok(())
    }

    /// Fill value for a given precision, NaN meaning "store NaN as is".
    ///
    /// A configured fill the integer type cannot hold falls back to the
    /// type's default fill.
    pub fn fill_for(&self, scalar: crate::scalar::ScalarKind) -> f64 {
        match self.fill_value {
            Some(v) if !v.is_nan() => match scalar.integer_range() {
                Some((lo, hi)) if v.round_ties_even() < lo || v.round_ties_even() > hi => {
                    warn!(
                        fill = v,
                        format = %scalar.code(),
                        "configured fill value does not fit the grid type, using the type default"
                    );
                    scalar.default_fill()
                }
                _ => v,
            },
            _ => scalar.default_fill(),
        }
    }
}
