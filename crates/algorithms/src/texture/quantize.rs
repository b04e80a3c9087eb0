//! Gray-level quantization
//!
//! Maps a raw intensity tile onto `levels` integer gray levels using
//! linearly spaced bin edges, the way `digitize` assigns values to bins.

use phenotex_core::raster::Raster;
use phenotex_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of gray levels
pub const DEFAULT_LEVELS: usize = 64;

/// Tiles whose finite range is narrower than this cannot be quantized
pub const MIN_DYNAMIC_RANGE: f64 = 1e-8;

/// Intensity range the bin edges are laid over
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrayRange {
    /// Rescale the tile's own min/max to 8 bits, then bin over 0..=255
    #[default]
    Rescale8Bit,
    /// Bin raw values over a fixed `[min, max]`
    Fixed { min: f64, max: f64 },
}

/// Parameters for quantization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeParams {
    /// Number of gray levels L (2..=256, default 64)
    pub levels: usize,
    /// Range the L+1 bin edges span
    pub range: GrayRange,
}

impl Default for QuantizeParams {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS,
            range: GrayRange::Rescale8Bit,
        }
    }
}

impl QuantizeParams {
    pub fn validate(&self) -> Result<()> {
        if !(2..=256).contains(&self.levels) {
            return Err(Error::InvalidParameter {
                name: "levels",
                value: self.levels.to_string(),
                reason: "must be in 2..=256".into(),
            });
        }
        if let GrayRange::Fixed { min, max } = self.range
            && !(max > min)
        {
            return Err(Error::InvalidParameter {
                name: "range",
                value: format!("[{}, {}]", min, max),
                reason: "max must exceed min".into(),
            });
        }
        Ok(())
    }
}

/// `levels + 1` edges linearly spaced over `[lo, hi]`
pub fn bin_edges(lo: f64, hi: f64, levels: usize) -> Vec<f64> {
    let step = (hi - lo) / levels as f64;
    (0..=levels).map(|k| lo + step * k as f64).collect()
}

/// Bin index of `value`: `digitize(value, edges) - 1`, clamped into `[0, levels-1]`
#[inline]
pub fn level_of(value: f64, edges: &[f64]) -> u8 {
    let levels = edges.len() - 1;
    let idx = edges.partition_point(|&e| e <= value);
    idx.saturating_sub(1).min(levels - 1) as u8
}

/// Quantize a raw tile into `params.levels` gray levels.
///
/// Fails with [`Error::InsufficientDynamicRange`] when the tile's finite
/// values span less than [`MIN_DYNAMIC_RANGE`]. Non-finite cells map to level 0.
pub fn quantize(raster: &Raster<f64>, params: &QuantizeParams) -> Result<Raster<u8>> {
    params.validate()?;

    let stats = raster.statistics();
    let (vmin, vmax) = match (stats.min, stats.max) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => {
            return Err(Error::InsufficientDynamicRange {
                min: f64::NAN,
                max: f64::NAN,
            })
        }
    };
    if vmax - vmin < MIN_DYNAMIC_RANGE {
        return Err(Error::InsufficientDynamicRange { min: vmin, max: vmax });
    }

    let quantized = match params.range {
        GrayRange::Rescale8Bit => {
            let edges = bin_edges(0.0, 256.0, params.levels);
            let span = vmax - vmin + MIN_DYNAMIC_RANGE;
            raster.map(|v| {
                if !v.is_finite() {
                    return 0;
                }
                // truncating cast, as an 8-bit conversion would
                let v8 = (255.0 * (v - vmin) / span).clamp(0.0, 255.0).floor();
                level_of(v8, &edges)
            })
        }
        GrayRange::Fixed { min, max } => {
            let edges = bin_edges(min, max + 1.0, params.levels);
            raster.map(|v| if v.is_finite() { level_of(v, &edges) } else { 0 })
        }
    };

    Ok(quantized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_of_matches_digitize() {
        let edges = bin_edges(0.0, 256.0, 64);
        assert_eq!(edges.len(), 65);
        assert_eq!(level_of(0.0, &edges), 0);
        assert_eq!(level_of(3.0, &edges), 0);
        assert_eq!(level_of(4.0, &edges), 1);
        assert_eq!(level_of(255.0, &edges), 63);
        // outside the edges clamps into range
        assert_eq!(level_of(-5.0, &edges), 0);
        assert_eq!(level_of(1e6, &edges), 63);
    }

    #[test]
    fn test_quantize_full_range() {
        let raster = Raster::from_fn(16, 16, |r, c| (r * 16 + c) as f64);
        let q = quantize(&raster, &QuantizeParams::default()).unwrap();

        assert_eq!(q.get(0, 0).unwrap(), 0);
        assert_eq!(q.get(15, 15).unwrap(), 63);
        assert!(q.data().iter().all(|&l| l < 64));
    }

    #[test]
    fn test_quantize_is_monotonic() {
        let raw: Vec<f64> = (0..200).map(|i| ((i * 37) % 200) as f64 * 13.7 - 250.0).collect();
        let raster = Raster::from_vec(raw.clone(), 10, 20).unwrap();
        let q = quantize(&raster, &QuantizeParams::default()).unwrap();
        let levels: Vec<u8> = q.data().iter().copied().collect();

        for a in 0..raw.len() {
            for b in 0..raw.len() {
                if raw[a] <= raw[b] {
                    assert!(levels[a] <= levels[b], "raw {} <= {} but {} > {}", raw[a], raw[b], levels[a], levels[b]);
                }
            }
        }
    }

    #[test]
    fn test_flat_tile_is_rejected() {
        let raster = Raster::filled(8, 8, 17.0);
        let err = quantize(&raster, &QuantizeParams::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientDynamicRange { .. }));
    }

    #[test]
    fn test_fixed_range() {
        let raster = Raster::from_fn(1, 4, |_, c| [0.0, 100.0, 200.0, 255.0][c]);
        let params = QuantizeParams {
            levels: 4,
            range: GrayRange::Fixed { min: 0.0, max: 255.0 },
        };
        let q = quantize(&raster, &params).unwrap();
        assert_eq!(q.data().iter().copied().collect::<Vec<_>>(), vec![0, 1, 3, 3]);
    }

    #[test]
    fn test_non_finite_cells_map_to_zero() {
        let mut raster = Raster::from_fn(4, 4, |r, c| (r + c) as f64);
        raster.set(2, 2, f64::NAN).unwrap();
        let q = quantize(&raster, &QuantizeParams::default()).unwrap();
        assert_eq!(q.get(2, 2).unwrap(), 0);
        assert_eq!(q.get(3, 3).unwrap(), 63);
    }

    #[test]
    fn test_invalid_levels() {
        let raster = Raster::from_fn(4, 4, |r, c| (r + c) as f64);
        let params = QuantizeParams { levels: 300, ..Default::default() };
        assert!(matches!(
            quantize(&raster, &params),
            Err(Error::InvalidParameter { name: "levels", .. })
        ));
    }
}
