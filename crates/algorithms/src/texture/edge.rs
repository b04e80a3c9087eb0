//! Border masking for per-pixel feature maps
//!
//! Pixels near the tile border get windows that partly consist of
//! edge-replicated padding. Their values are overwritten with the
//! feature's sentinel so the aggregator skips them.

use ndarray::Array2;
use phenotex_core::raster::Raster;
use phenotex_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::neighborhood::validate_window;

/// Cells flagged after a sentinel → non-sentinel transition
const CONTOUR_LEAD: usize = 11;
/// Cells flagged up to a non-sentinel → sentinel transition
const CONTOUR_TRAIL: usize = 10;

/// How the border band is found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Fixed ring of width `ceil(window / 2)`
    #[default]
    Geometric,
    /// Sentinel-transition sweep along rows, then columns. Output keeps a
    /// one-cell frame, so it is `(rows + 2, cols + 2)`.
    Contour,
}

/// Width of the geometric ring for a window size
pub fn border_width(window: usize) -> usize {
    window.div_ceil(2)
}

/// Mask the border band of `map` with `sentinel`.
pub fn remove_edges(map: &Raster<f64>, sentinel: f64, window: usize, mode: EdgeMode) -> Result<Raster<f64>> {
    validate_window(window)?;
    match mode {
        EdgeMode::Geometric => Ok(geometric_mask(map, sentinel, window)),
        EdgeMode::Contour => contour_mask(map, sentinel),
    }
}

fn geometric_mask(map: &Raster<f64>, sentinel: f64, window: usize) -> Raster<f64> {
    let (rows, cols) = map.shape();
    let b = border_width(window);
    let mut out = map.clone();
    for ((r, c), v) in out.data_mut().indexed_iter_mut() {
        if r < b || c < b || r + b >= rows || c + b >= cols {
            *v = sentinel;
        }
    }
    out
}

fn contour_mask(map: &Raster<f64>, sentinel: f64) -> Result<Raster<f64>> {
    let (rows, cols) = map.shape();
    let src = map.view();

    // zero columns left/right, sentinel rows top/bottom
    let mut framed = Array2::from_shape_fn((rows + 2, cols + 2), |(r, c)| {
        if r == 0 || r == rows + 1 {
            sentinel
        } else if c == 0 || c == cols + 1 {
            0.0
        } else {
            src[(r - 1, c - 1)]
        }
    });

    // row-major sweep, then the same sweep over the transpose
    let mut flat: Vec<f64> = framed.iter().copied().collect();
    sweep_transitions(&mut flat, sentinel);
    framed = Array2::from_shape_vec((rows + 2, cols + 2), flat).map_err(|e| Error::Algorithm(e.to_string()))?;

    let mut flat: Vec<f64> = framed.t().iter().copied().collect();
    sweep_transitions(&mut flat, sentinel);
    let transposed =
        Array2::from_shape_vec((cols + 2, rows + 2), flat).map_err(|e| Error::Algorithm(e.to_string()))?;

    Ok(Raster::from_array(transposed.reversed_axes().as_standard_layout().into_owned()))
}

/// Flag the cells around every sentinel boundary in a 1D sequence.
///
/// Transitions are collected before any cell is rewritten. Indices that
/// fall outside the sequence are skipped.
fn sweep_transitions(data: &mut [f64], sentinel: f64) {
    let n = data.len();
    if n < 2 {
        return;
    }
    let mut rising = Vec::new();
    let mut falling = Vec::new();
    for i in 0..n - 1 {
        let here = data[i] == sentinel;
        let next = data[i + 1] == sentinel;
        if here && !next {
            rising.push(i);
        } else if !here && next {
            falling.push(i);
        }
    }

    for i in rising {
        let end = (i + CONTOUR_LEAD).min(n - 1);
        for v in &mut data[i + 1..=end] {
            *v = sentinel;
        }
    }
    for i in falling {
        let start = i.saturating_sub(CONTOUR_TRAIL);
        for v in &mut data[start..=i] {
            *v = sentinel;
        }
    }
}
