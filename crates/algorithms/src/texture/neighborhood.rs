//! Sliding-window neighborhoods over an edge-replicated tile
//!
//! A [`PaddedTile`] replicates the outermost rows and columns by
//! `window / 2` cells, so every original pixel has a full `window × window`
//! patch centered on it. Patches are borrowed views into the padded grid;
//! the dense `(w, w, rows, cols)` tensor is only built on request.

use ndarray::{s, Array2, Array4, ArrayView2};
use phenotex_core::raster::Raster;
use phenotex_core::{Error, Result};

/// Largest padded grid a [`PaddedTile`] will allocate
pub const MAX_PADDED_CELLS: usize = 1 << 28;

/// Check that `window` is a usable odd window size
pub fn validate_window(window: usize) -> Result<()> {
    if window == 0 || window % 2 == 0 {
        return Err(Error::InvalidParameter {
            name: "window",
            value: window.to_string(),
            reason: "window size must be an odd positive integer".into(),
        });
    }
    Ok(())
}

/// Quantized tile padded by edge replication for a given window size
#[derive(Debug, Clone)]
pub struct PaddedTile {
    padded: Array2<u8>,
    rows: usize,
    cols: usize,
    window: usize,
}

impl PaddedTile {
    pub fn new(tile: &Raster<u8>, window: usize) -> Result<Self> {
        validate_window(window)?;
        let (rows, cols) = tile.shape();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let half = window / 2;
        let shape = padded_shape(rows, cols, half).ok_or_else(|| Error::InvalidParameter {
            name: "window",
            value: window.to_string(),
            reason: format!("window is too large for a {}x{} tile", rows, cols),
        })?;

        let src = tile.view();
        let padded = Array2::from_shape_fn(shape, |(r, c)| {
            let sr = r.saturating_sub(half).min(rows - 1);
            let sc = c.saturating_sub(half).min(cols - 1);
            src[(sr, sc)]
        });

        Ok(Self {
            padded,
            rows,
            cols,
            window,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Shape of the original (unpadded) tile
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// The padded grid itself
    pub fn padded(&self) -> ArrayView2<'_, u8> {
        self.padded.view()
    }

    /// `window × window` patch centered on original pixel `(row, col)`
    #[inline]
    pub fn patch(&self, row: usize, col: usize) -> ArrayView2<'_, u8> {
        let w = self.window;
        self.padded.slice(s![row..row + w, col..col + w])
    }

    /// Row-major iterator over `((row, col), patch)`
    pub fn patches(&self) -> impl Iterator<Item = ((usize, usize), ArrayView2<'_, u8>)> + '_ {
        (0..self.rows)
            .flat_map(move |r| (0..self.cols).map(move |c| (r, c)))
            .map(move |(r, c)| ((r, c), self.patch(r, c)))
    }

    /// Materialize the `(window, window, rows, cols)` patch tensor.
    ///
    /// Memory grows with `window² × rows × cols`; prefer [`PaddedTile::patch`]
    /// for anything but small tiles. Refused above [`MAX_PADDED_CELLS`].
    pub fn to_patch_tensor(&self) -> Result<Array4<u8>> {
        let w = self.window;
        [w, w, self.rows, self.cols]
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .filter(|&n| n <= MAX_PADDED_CELLS)
            .ok_or_else(|| Error::InvalidParameter {
                name: "window",
                value: w.to_string(),
                reason: format!("patch tensor for a {}x{} tile is too large", self.rows, self.cols),
            })?;
        Ok(Array4::from_shape_fn((w, w, self.rows, self.cols), |(wr, wc, r, c)| {
            self.padded[(r + wr, c + wc)]
        }))
    }
}

/// `(rows + 2·half, cols + 2·half)`, or `None` on overflow or above
/// [`MAX_PADDED_CELLS`]
fn padded_shape(rows: usize, cols: usize, half: usize) -> Option<(usize, usize)> {
    let border = half.checked_mul(2)?;
    let shape = (rows.checked_add(border)?, cols.checked_add(border)?);
    shape
        .0
        .checked_mul(shape.1)
        .filter(|&n| n <= MAX_PADDED_CELLS)
        .map(|_| shape)
}
