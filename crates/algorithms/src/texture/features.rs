//! Haralick-style reducers over a normalized GLCM plane
//!
//! Each [`GlcmFeature`] turns the nonzero cells of one `L × L` plane into a
//! single value. Zero cells contribute nothing to any of the sums below, so
//! reducing over the sparse entries gives the same value as a dense sweep.

use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayView6, Axis};
use phenotex_core::raster::Raster;
use phenotex_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::glcm::{plane_entries, PlaneEntry};

/// Substitute for `p = 0` inside the entropy logarithm
pub const ENTROPY_EPS: f64 = 1e-5;

/// Added to the correlation denominator
pub const CORRELATION_EPS: f64 = 1e-5;

/// Texture measures derived from a GLCM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GlcmFeature {
    /// GLCM mean, Σ p(i,j)·i
    #[serde(rename = "MEA")]
    Mean,
    /// GLCM variance, Σ p(i,j)·(i − μ)²
    #[serde(rename = "VAR")]
    Variance,
    /// Homogeneity, Σ p(i,j) / (1 + (i−j)²)
    #[serde(rename = "HOM")]
    Homogeneity,
    /// Contrast, Σ p(i,j)·(i−j)²
    #[serde(rename = "CON")]
    Contrast,
    /// Dissimilarity, Σ p(i,j)·|i−j|
    #[serde(rename = "DIS")]
    Dissimilarity,
    /// Entropy, −Σ p(i,j)·ln p(i,j)
    #[serde(rename = "ENT")]
    Entropy,
    /// Correlation of the row and column levels
    #[serde(rename = "COR")]
    Correlation,
    /// Angular second moment (energy), Σ p(i,j)²
    #[serde(rename = "SEM")]
    SecondMoment,
}

impl GlcmFeature {
    /// All features in canonical order
    pub const ALL: [GlcmFeature; 8] = [
        GlcmFeature::Mean,
        GlcmFeature::Variance,
        GlcmFeature::Homogeneity,
        GlcmFeature::Contrast,
        GlcmFeature::Dissimilarity,
        GlcmFeature::Entropy,
        GlcmFeature::Correlation,
        GlcmFeature::SecondMoment,
    ];

    /// Three-letter code used in ledger column names
    pub fn code(self) -> &'static str {
        match self {
            GlcmFeature::Mean => "MEA",
            GlcmFeature::Variance => "VAR",
            GlcmFeature::Homogeneity => "HOM",
            GlcmFeature::Contrast => "CON",
            GlcmFeature::Dissimilarity => "DIS",
            GlcmFeature::Entropy => "ENT",
            GlcmFeature::Correlation => "COR",
            GlcmFeature::SecondMoment => "SEM",
        }
    }

    /// Value written into masked border cells and skipped by aggregation
    pub fn sentinel(self) -> f64 {
        match self {
            GlcmFeature::Homogeneity | GlcmFeature::SecondMoment => 1.0,
            _ => 0.0,
        }
    }

    /// Reduce the nonzero cells of one normalized plane to a scalar
    pub fn reduce(self, plane: &[PlaneEntry]) -> f64 {
        match self {
            GlcmFeature::Mean => row_mean(plane),
            GlcmFeature::Variance => {
                let mu = row_mean(plane);
                plane.iter().map(|e| e.p * (e.i as f64 - mu).powi(2)).sum()
            }
            GlcmFeature::Homogeneity => plane
                .iter()
                .map(|e| e.p / (1.0 + (e.i as f64 - e.j as f64).powi(2)))
                .sum(),
            GlcmFeature::Contrast => plane
                .iter()
                .map(|e| e.p * (e.i as f64 - e.j as f64).powi(2))
                .sum(),
            GlcmFeature::Dissimilarity => plane
                .iter()
                .map(|e| e.p * (e.i as f64 - e.j as f64).abs())
                .sum(),
            GlcmFeature::Entropy => plane
                .iter()
                .map(|e| {
                    let arg = if e.p == 0.0 { ENTROPY_EPS } else { e.p };
                    -e.p * arg.ln()
                })
                .sum(),
            GlcmFeature::Correlation => {
                let mut mu_i = 0.0;
                let mut mu_j = 0.0;
                let mut cross = 0.0;
                for e in plane {
                    mu_i += e.p * e.i as f64;
                    mu_j += e.p * e.j as f64;
                    cross += e.p * e.i as f64 * e.j as f64;
                }
                let mut var_i = 0.0;
                let mut var_j = 0.0;
                for e in plane {
                    var_i += e.p * (e.i as f64 - mu_i).powi(2);
                    var_j += e.p * (e.j as f64 - mu_j).powi(2);
                }
                (cross - mu_i * mu_j) / (var_i.sqrt() * var_j.sqrt() + CORRELATION_EPS)
            }
            GlcmFeature::SecondMoment => plane.iter().map(|e| e.p * e.p).sum(),
        }
    }
}

fn row_mean(plane: &[PlaneEntry]) -> f64 {
    plane.iter().map(|e| e.p * e.i as f64).sum()
}

impl fmt::Display for GlcmFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for GlcmFeature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_ascii_uppercase();
        GlcmFeature::ALL
            .into_iter()
            .find(|f| f.code() == code)
            .ok_or_else(|| Error::InvalidParameter {
                name: "feature",
                value: s.to_string(),
                reason: "expected one of MEA, VAR, HOM, CON, DIS, ENT, COR, SEM".into(),
            })
    }
}

/// Per-pixel feature map from a dense `(L, L, steps, angles, rows, cols)`
/// tensor, averaged over every (step, angle) plane.
pub fn feature_map(tensor: ArrayView6<'_, f64>, feature: GlcmFeature) -> Result<Raster<f64>> {
    let (_, _, n_steps, n_angles, rows, cols) = tensor.dim();
    let n_planes = (n_steps * n_angles) as f64;
    if n_planes == 0.0 {
        return Err(Error::GlcmComputation("tensor has no (step, angle) planes".into()));
    }

    let mut map = Raster::<f64>::new(rows, cols);
    for r in 0..rows {
        let row_slab = tensor.index_axis(Axis(4), r);
        for c in 0..cols {
            let pixel = row_slab.index_axis(Axis(4), c);
            let mut acc = 0.0;
            for s in 0..n_steps {
                for a in 0..n_angles {
                    let plane = pixel.index_axis(Axis(2), s);
                    let plane = plane.index_axis(Axis(2), a);
                    acc += feature.reduce(&plane_entries(plane));
                }
            }
            map.set(r, c, acc / n_planes)?;
        }
    }
    ensure_finite(&map, feature)?;
    Ok(map)
}

/// Fail with [`Error::FeatureComputation`] if the map holds NaN or infinity
pub fn ensure_finite(map: &Raster<f64>, feature: GlcmFeature) -> Result<()> {
    if let Some(((r, c), v)) = map.data().indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(Error::FeatureComputation {
            feature: feature.code().to_string(),
            reason: format!("non-finite value {} at ({}, {})", v, r, c),
        });
    }
    Ok(())
}
