//! Gray-Level Co-occurrence Matrix (GLCM) construction
//!
//! For every pixel, counts how often pairs of gray levels occur at a given
//! (step, angle) offset inside the pixel's window. Counting is symmetric:
//! a pair `(a, b)` increments both `(a, b)` and `(b, a)`. Each (step, angle)
//! plane is normalized to sum to 1; a plane with no pairs stays all zero.
//!
//! The dense `(L, L, steps, angles, rows, cols)` tensor is available for
//! small tiles through [`cooccurrence_tensor`]. The feature pipeline uses
//! [`CoMatrix`] instead, which keeps only the touched cells of one plane.

use ndarray::{Array6, ArrayView2};
use phenotex_core::raster::Raster;
use phenotex_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::neighborhood::PaddedTile;

/// Dense tensors above this many cells are refused
pub const MAX_TENSOR_CELLS: usize = 1 << 28;

/// Parameters for GLCM construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlcmParams {
    /// Pixel distances between the two samples of a pair (default: [1])
    pub steps: Vec<usize>,
    /// Directions in degrees (default: 0, 45, 90, 135)
    pub angles: Vec<f64>,
}

impl Default for GlcmParams {
    fn default() -> Self {
        Self {
            steps: vec![1],
            angles: vec![0.0, 45.0, 90.0, 135.0],
        }
    }
}

impl GlcmParams {
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() || self.angles.is_empty() {
            return Err(Error::InvalidParameter {
                name: "steps/angles",
                value: format!("{:?} / {:?}", self.steps, self.angles),
                reason: "at least one step and one angle are required".into(),
            });
        }
        if self.steps.contains(&0) {
            return Err(Error::InvalidParameter {
                name: "steps",
                value: format!("{:?}", self.steps),
                reason: "steps must be positive".into(),
            });
        }
        if self.angles.iter().any(|a| !a.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "angles",
                value: format!("{:?}", self.angles),
                reason: "angles must be finite".into(),
            });
        }
        Ok(())
    }

    /// Pixel offsets, step-major then angle order
    pub fn offsets(&self) -> Vec<Offset> {
        self.steps
            .iter()
            .flat_map(|&step| self.angles.iter().map(move |&angle| Offset::new(step, angle)))
            .collect()
    }
}

/// Row/column displacement from the first to the second sample of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub dr: isize,
    pub dc: isize,
}

impl Offset {
    /// `(round(sin θ · step), round(cos θ · step))` for θ in degrees
    pub fn new(step: usize, angle_deg: f64) -> Self {
        let theta = angle_deg.to_radians();
        let d = step as f64;
        Self {
            dr: (theta.sin() * d).round() as isize,
            dc: (theta.cos() * d).round() as isize,
        }
    }
}

/// One nonzero cell of a normalized GLCM plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneEntry {
    pub i: usize,
    pub j: usize,
    pub p: f64,
}

/// Nonzero cells of a dense `L × L` plane in row-major order
pub fn plane_entries(plane: ArrayView2<'_, f64>) -> Vec<PlaneEntry> {
    plane
        .indexed_iter()
        .filter(|&(_, &p)| p != 0.0)
        .map(|((i, j), &p)| PlaneEntry { i, j, p })
        .collect()
}

/// Co-occurrence accumulator for a single (step, angle) plane.
///
/// Holds an `L × L` count grid plus the list of touched cells, so
/// clearing and normalizing cost `O(touched)` instead of `O(L²)`.
#[derive(Debug, Clone)]
pub struct CoMatrix {
    levels: usize,
    counts: Vec<u32>,
    touched: Vec<usize>,
    total: u64,
}

impl CoMatrix {
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            counts: vec![0; levels * levels],
            touched: Vec::new(),
            total: 0,
        }
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Total symmetric count (twice the number of pairs)
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn clear(&mut self) {
        for &idx in &self.touched {
            self.counts[idx] = 0;
        }
        self.touched.clear();
        self.total = 0;
    }

    #[inline]
    fn bump(&mut self, idx: usize) {
        if self.counts[idx] == 0 {
            self.touched.push(idx);
        }
        self.counts[idx] += 1;
    }

    /// Count the pair `(a, b)` in both directions
    #[inline]
    pub fn add_pair(&mut self, a: u8, b: u8) {
        let (a, b) = (a as usize, b as usize);
        self.bump(a * self.levels + b);
        self.bump(b * self.levels + a);
        self.total += 2;
    }

    /// Count every pair inside `patch` separated by `offset`.
    ///
    /// Fails if the patch holds a level outside `0..levels`.
    pub fn accumulate(&mut self, patch: ArrayView2<'_, u8>, offset: Offset) -> Result<()> {
        let (h, w) = patch.dim();
        let (h, w) = (h as isize, w as isize);

        let r_lo = 0isize.max(-offset.dr);
        let r_hi = h.min(h - offset.dr);
        let c_lo = 0isize.max(-offset.dc);
        let c_hi = w.min(w - offset.dc);

        for r in r_lo..r_hi {
            for c in c_lo..c_hi {
                let a = patch[(r as usize, c as usize)];
                let b = patch[((r + offset.dr) as usize, (c + offset.dc) as usize)];
                if a as usize >= self.levels || b as usize >= self.levels {
                    return Err(Error::GlcmComputation(format!(
                        "gray level {} out of range for {} levels",
                        a.max(b),
                        self.levels
                    )));
                }
                self.add_pair(a, b);
            }
        }
        Ok(())
    }

    /// Write the normalized nonzero cells into `out`, row-major.
    ///
    /// `out` is left empty when no pair was counted.
    pub fn normalized_entries(&mut self, out: &mut Vec<PlaneEntry>) {
        out.clear();
        if self.total == 0 {
            return;
        }
        self.touched.sort_unstable();
        let total = self.total as f64;
        out.extend(self.touched.iter().map(|&idx| PlaneEntry {
            i: idx / self.levels,
            j: idx % self.levels,
            p: self.counts[idx] as f64 / total,
        }));
    }
}

/// Build the dense normalized co-occurrence tensor.
///
/// Shape is `(levels, levels, steps, angles, rows, cols)`. Refused with
/// [`Error::GlcmComputation`] above [`MAX_TENSOR_CELLS`].
pub fn cooccurrence_tensor(tile: &PaddedTile, levels: usize, params: &GlcmParams) -> Result<Array6<f64>> {
    params.validate()?;
    let (rows, cols) = tile.shape();
    let (n_steps, n_angles) = (params.steps.len(), params.angles.len());

    let cells = [levels, levels, n_steps, n_angles, rows, cols]
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&n| n <= MAX_TENSOR_CELLS)
        .ok_or_else(|| {
            Error::GlcmComputation(format!(
                "dense tensor {}x{}x{}x{}x{}x{} is too large",
                levels, levels, n_steps, n_angles, rows, cols
            ))
        })?;
    tracing::debug!(cells, "allocating dense co-occurrence tensor");

    let mut tensor = Array6::<f64>::zeros((levels, levels, n_steps, n_angles, rows, cols));
    let mut glcm = CoMatrix::new(levels);
    let mut entries = Vec::new();

    for ((r, c), patch) in tile.patches() {
        for (s, &step) in params.steps.iter().enumerate() {
            for (a, &angle) in params.angles.iter().enumerate() {
                glcm.clear();
                glcm.accumulate(patch, Offset::new(step, angle))?;
                glcm.normalized_entries(&mut entries);
                for e in &entries {
                    tensor[[e.i, e.j, s, a, r, c]] = e.p;
                }
            }
        }
    }

    Ok(tensor)
}

/// Convenience wrapper: pad a quantized tile and build its dense tensor
pub fn glcm_tensor(tile: &Raster<u8>, window: usize, levels: usize, params: &GlcmParams) -> Result<Array6<f64>> {
    let padded = PaddedTile::new(tile, window)?;
    cooccurrence_tensor(&padded, levels, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, s};

    #[test]
    fn test_offsets_follow_sin_cos_convention() {
        assert_eq!(Offset::new(1, 0.0), Offset { dr: 0, dc: 1 });
        assert_eq!(Offset::new(1, 45.0), Offset { dr: 1, dc: 1 });
        assert_eq!(Offset::new(1, 90.0), Offset { dr: 1, dc: 0 });
        assert_eq!(Offset::new(1, 135.0), Offset { dr: 1, dc: -1 });
        assert_eq!(Offset::new(2, 90.0), Offset { dr: 2, dc: 0 });
    }

    #[test]
    fn test_offsets_order() {
        let params = GlcmParams {
            steps: vec![1, 2],
            angles: vec![0.0, 90.0],
        };
        let offs = params.offsets();
        assert_eq!(
            offs,
            vec![
                Offset { dr: 0, dc: 1 },
                Offset { dr: 1, dc: 0 },
                Offset { dr: 0, dc: 2 },
                Offset { dr: 2, dc: 0 },
            ]
        );
    }

    #[test]
    fn test_symmetric_counts_horizontal() {
        let patch = array![[0u8, 0, 1, 1], [0, 0, 1, 1], [0, 2, 2, 2], [2, 2, 3, 3]];
        let mut glcm = CoMatrix::new(4);
        glcm.accumulate(patch.view(), Offset::new(1, 0.0)).unwrap();
        assert_eq!(glcm.total(), 24);

        let mut entries = Vec::new();
        glcm.normalized_entries(&mut entries);
        let get = |i: usize, j: usize| {
            entries
                .iter()
                .find(|e| e.i == i && e.j == j)
                .map(|e| e.p * 24.0)
                .unwrap_or(0.0)
        };
        // classic Haralick example, symmetric
        assert_relative_eq!(get(0, 0), 4.0);
        assert_relative_eq!(get(0, 1), 2.0);
        assert_relative_eq!(get(1, 0), 2.0);
        assert_relative_eq!(get(1, 1), 4.0);
        assert_relative_eq!(get(0, 2), 1.0);
        assert_relative_eq!(get(2, 2), 6.0);
        assert_relative_eq!(get(2, 3), 1.0);
        assert_relative_eq!(get(3, 3), 2.0);

        let sum: f64 = entries.iter().map(|e| e.p).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clear_resets_state() {
        let patch = array![[0u8, 1], [1, 0]];
        let mut glcm = CoMatrix::new(2);
        glcm.accumulate(patch.view(), Offset::new(1, 0.0)).unwrap();
        glcm.clear();
        let mut entries = vec![PlaneEntry { i: 9, j: 9, p: 1.0 }];
        glcm.normalized_entries(&mut entries);
        assert!(entries.is_empty());
        assert_eq!(glcm.total(), 0);
    }

    #[test]
    fn test_step_larger_than_window_leaves_zero_plane() {
        let patch = array![[0u8, 1, 2], [1, 2, 0], [2, 0, 1]];
        let mut glcm = CoMatrix::new(3);
        glcm.accumulate(patch.view(), Offset::new(3, 0.0)).unwrap();
        assert_eq!(glcm.total(), 0);
    }

    #[test]
    fn test_level_out_of_range_is_glcm_error() {
        let patch = array![[0u8, 7]];
        let mut glcm = CoMatrix::new(4);
        let err = glcm.accumulate(patch.view(), Offset::new(1, 0.0)).unwrap_err();
        assert!(matches!(err, Error::GlcmComputation(_)));
    }

    #[test]
    fn test_tensor_planes_sum_to_one() {
        let tile = Raster::from_fn(9, 11, |r, c| ((r * 3 + c * 7) % 16) as u8);
        let params = GlcmParams::default();
        let tensor = glcm_tensor(&tile, 5, 16, &params).unwrap();
        assert_eq!(tensor.dim(), (16, 16, 1, 4, 9, 11));

        for a in 0..4 {
            for r in 0..9 {
                for c in 0..11 {
                    let plane = tensor.slice(s![.., .., 0, a, r, c]);
                    assert_relative_eq!(plane.sum(), 1.0, epsilon = 1e-6);
                    // symmetric under level swap
                    assert_eq!(plane, plane.t());
                }
            }
        }
    }

    #[test]
    fn test_oversized_tensor_refused() {
        let tile = Raster::<u8>::new(600, 600);
        let err = glcm_tensor(&tile, 3, 256, &GlcmParams::default()).unwrap_err();
        assert!(matches!(err, Error::GlcmComputation(_)));
    }
}
