//! End-to-end texture descriptors for one tile and one window size
//!
//! quantize → pad → per-pixel GLCM → reduce → mask borders → sentinel mean

use ndarray::Array2;
use phenotex_core::raster::Raster;
use phenotex_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};

use super::aggregate::sentinel_mean;
use super::edge::{remove_edges, EdgeMode};
use super::features::{ensure_finite, GlcmFeature};
use super::glcm::{CoMatrix, GlcmParams};
use super::neighborhood::{validate_window, PaddedTile};
use super::quantize::{quantize, QuantizeParams};
use crate::maybe_rayon::*;

/// Parameters for the full texture pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureParams {
    /// Odd window size (default: 5)
    pub window: usize,
    /// Features to compute, in output order (default: all eight)
    pub features: Vec<GlcmFeature>,
    pub quantize: QuantizeParams,
    pub glcm: GlcmParams,
    pub edge_mode: EdgeMode,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            window: 5,
            features: GlcmFeature::ALL.to_vec(),
            quantize: QuantizeParams::default(),
            glcm: GlcmParams::default(),
            edge_mode: EdgeMode::default(),
        }
    }
}

impl TextureParams {
    pub fn validate(&self) -> Result<()> {
        validate_window(self.window)?;
        if self.features.is_empty() {
            return Err(Error::InvalidParameter {
                name: "features",
                value: "[]".into(),
                reason: "at least one feature is required".into(),
            });
        }
        self.quantize.validate()?;
        self.glcm.validate()
    }
}

/// Border-masked map of one feature
#[derive(Debug, Clone)]
pub struct FeatureMap {
    pub feature: GlcmFeature,
    pub map: Raster<f64>,
}

/// Scalar descriptors of one tile at one window size
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptors {
    pub window: usize,
    /// `(feature, value)` in the requested feature order
    pub values: Vec<(GlcmFeature, f64)>,
}

impl TextureDescriptors {
    pub fn get(&self, feature: GlcmFeature) -> Option<f64> {
        self.values.iter().find(|(f, _)| *f == feature).map(|&(_, v)| v)
    }
}

/// Per-pixel feature maps of a quantized tile, averaged over every
/// (step, angle) offset.
///
/// Streams one pixel at a time through a sparse [`CoMatrix`], so memory
/// stays at `O(L² + rows × cols × features)`. Rows are processed in
/// parallel with the `parallel` feature. Values match
/// [`feature_map`](super::features::feature_map) over the dense tensor.
pub fn texture_maps(
    tile: &Raster<u8>,
    window: usize,
    levels: usize,
    params: &GlcmParams,
    features: &[GlcmFeature],
) -> Result<Vec<Raster<f64>>> {
    params.validate()?;
    let padded = PaddedTile::new(tile, window)?;
    let (rows, cols) = padded.shape();
    let offsets = params.offsets();
    let n_planes = offsets.len() as f64;
    let n_feat = features.len();

    // each row yields n_feat consecutive runs of `cols` values
    let row_blocks: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .map(|row| -> Result<Vec<f64>> {
            let mut glcm = CoMatrix::new(levels);
            let mut entries = Vec::new();
            let mut block = vec![0.0; n_feat * cols];

            for col in 0..cols {
                let patch = padded.patch(row, col);
                for &offset in &offsets {
                    glcm.clear();
                    glcm.accumulate(patch, offset)?;
                    glcm.normalized_entries(&mut entries);
                    for (k, feature) in features.iter().enumerate() {
                        block[k * cols + col] += feature.reduce(&entries);
                    }
                }
                for k in 0..n_feat {
                    block[k * cols + col] /= n_planes;
                }
            }
            Ok(block)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut maps = Vec::with_capacity(n_feat);
    for (k, &feature) in features.iter().enumerate() {
        let data: Vec<f64> = row_blocks
            .iter()
            .flat_map(|block| block[k * cols..(k + 1) * cols].iter().copied())
            .collect();
        let map = Raster::from_array(
            Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?,
        );
        ensure_finite(&map, feature)?;
        maps.push(map);
    }
    Ok(maps)
}

/// Quantize `raw`, compute every requested feature map and mask its borders
pub fn cleaned_feature_maps(raw: &Raster<f64>, params: &TextureParams) -> Result<Vec<FeatureMap>> {
    params.validate()?;
    let quantized = quantize(raw, &params.quantize)?;
    let maps = texture_maps(
        &quantized,
        params.window,
        params.quantize.levels,
        &params.glcm,
        &params.features,
    )?;

    params
        .features
        .iter()
        .zip(maps)
        .map(|(&feature, map)| {
            let map = remove_edges(&map, feature.sentinel(), params.window, params.edge_mode)?;
            Ok(FeatureMap { feature, map })
        })
        .collect()
}

/// Scalar texture descriptors of one tile.
///
/// The first feature that fails aborts the whole computation.
pub fn texture_descriptors(raw: &Raster<f64>, params: &TextureParams) -> Result<TextureDescriptors> {
    let (rows, cols) = raw.shape();
    tracing::debug!(rows, cols, window = params.window, "computing texture descriptors");

    let values = cleaned_feature_maps(raw, params)?
        .into_iter()
        .map(|fm| Ok((fm.feature, sentinel_mean(&fm.map, fm.feature.sentinel())?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(TextureDescriptors {
        window: params.window,
        values,
    })
}

/// GLCM texture descriptor algorithm
#[derive(Debug, Clone, Default)]
pub struct GlcmTextures;

impl Algorithm for GlcmTextures {
    type Input = Raster<f64>;
    type Output = TextureDescriptors;
    type Params = TextureParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "GLCM Textures"
    }

    fn description(&self) -> &'static str {
        "Window-averaged Haralick descriptors from per-pixel gray-level co-occurrence matrices"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        texture_descriptors(&input, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::features::feature_map;
    use crate::texture::glcm::glcm_tensor;

    fn noisy(rows: usize, cols: usize, levels: u8) -> Raster<u8> {
        Raster::from_fn(rows, cols, |r, c| ((r * 7 + c * 13 + r * c) % levels as usize) as u8)
    }

    #[test]
    fn test_streaming_matches_dense() {
        let tile = noisy(9, 11, 8);
        let params = GlcmParams {
            steps: vec![1, 2],
            angles: vec![0.0, 45.0, 90.0, 135.0],
        };
        let tensor = glcm_tensor(&tile, 5, 8, &params).unwrap();
        let streamed = texture_maps(&tile, 5, 8, &params, &GlcmFeature::ALL).unwrap();

        for (feature, map) in GlcmFeature::ALL.iter().zip(&streamed) {
            let dense = feature_map(tensor.view(), *feature).unwrap();
            assert_eq!(dense.data(), map.data(), "{feature}");
        }
    }

    #[test]
    fn test_uniform_levels_give_degenerate_features() {
        let tile = Raster::filled(12, 12, 3u8);
        let maps = texture_maps(&tile, 5, 8, &GlcmParams::default(), &GlcmFeature::ALL).unwrap();
        let get = |f: GlcmFeature| &maps[GlcmFeature::ALL.iter().position(|&x| x == f).unwrap()];

        assert!(get(GlcmFeature::Contrast).data().iter().all(|&v| v == 0.0));
        assert!(get(GlcmFeature::Dissimilarity).data().iter().all(|&v| v == 0.0));
        assert!(get(GlcmFeature::Entropy).data().iter().all(|&v| v == 0.0));
        assert!(get(GlcmFeature::Homogeneity).data().iter().all(|&v| v == 1.0));
        assert!(get(GlcmFeature::SecondMoment).data().iter().all(|&v| v == 1.0));
        assert!(get(GlcmFeature::Mean).data().iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_feature_order_follows_request() {
        let tile = noisy(6, 6, 4);
        let order = [GlcmFeature::SecondMoment, GlcmFeature::Mean];
        let maps = texture_maps(&tile, 3, 4, &GlcmParams::default(), &order).unwrap();
        let all = texture_maps(&tile, 3, 4, &GlcmParams::default(), &GlcmFeature::ALL).unwrap();
        assert_eq!(maps[0].data(), all[7].data());
        assert_eq!(maps[1].data(), all[0].data());
    }

    #[test]
    fn test_descriptors_on_gradient() {
        let raw = Raster::from_fn(20, 20, |r, c| (r + c) as f64 / 2.0);
        let params = TextureParams {
            window: 5,
            glcm: GlcmParams {
                steps: vec![1],
                angles: vec![0.0],
            },
            ..Default::default()
        };
        let desc = GlcmTextures.execute(raw, params).unwrap();
        assert_eq!(desc.window, 5);
        assert_eq!(desc.values.len(), 8);

        let sem = desc.get(GlcmFeature::SecondMoment).unwrap();
        assert!(sem > 0.0 && sem <= 1.0);
        assert!(desc.get(GlcmFeature::Entropy).unwrap() >= 0.0);
        let cor = desc.get(GlcmFeature::Correlation).unwrap();
        assert!((-1.0..=1.0).contains(&cor));
    }

    #[test]
    fn test_flat_tile_fails_quantization() {
        let raw = Raster::filled(10, 10, 42.0);
        let err = texture_descriptors(&raw, &TextureParams::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientDynamicRange { .. }));
    }

    #[test]
    fn test_tile_smaller_than_border_has_empty_region() {
        let raw = Raster::from_fn(4, 4, |r, c| (r * 4 + c) as f64);
        let params = TextureParams {
            window: 7,
            ..Default::default()
        };
        let err = texture_descriptors(&raw, &params).unwrap_err();
        assert!(matches!(err, Error::EmptyFeatureRegion { .. }));
    }

    #[test]
    fn test_rejects_empty_feature_list() {
        let raw = Raster::from_fn(8, 8, |r, c| (r * 8 + c) as f64);
        let params = TextureParams {
            features: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            texture_descriptors(&raw, &params),
            Err(Error::InvalidParameter { name: "features", .. })
        ));
    }

    #[test]
    fn test_contour_mode_runs() {
        let raw = Raster::from_fn(40, 40, |r, c| ((r * 31 + c * 17) % 97) as f64);
        let params = TextureParams {
            window: 3,
            edge_mode: EdgeMode::Contour,
            features: vec![GlcmFeature::Contrast],
            ..Default::default()
        };
        let maps = cleaned_feature_maps(&raw, &params).unwrap();
        assert_eq!(maps[0].map.shape(), (42, 42));
        assert!(texture_descriptors(&raw, &params).is_ok());
    }
}
