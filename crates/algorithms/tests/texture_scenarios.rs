//! End-to-end texture scenarios on synthetic tiles.
//!
//! Covers the descriptor properties the downstream models rely on:
//! bounded correlation, non-negative entropy, energy in (0, 1], and the
//! degenerate values of a single-level tile.

use approx::assert_relative_eq;
use phenotex_algorithms::texture::{
    quantize, remove_edges, sentinel_mean, texture_descriptors, texture_maps, EdgeMode, GlcmFeature, GlcmParams,
    QuantizeParams, TextureParams,
};
use phenotex_core::raster::Raster;
use phenotex_core::Error;

fn diagonal_ramp(size: usize) -> Raster<f64> {
    Raster::from_fn(size, size, |r, c| (r + c) as f64 / 2.0)
}

fn horizontal_only() -> GlcmParams {
    GlcmParams {
        steps: vec![1],
        angles: vec![0.0],
    }
}

#[test]
fn ramp_descriptors_are_in_range() {
    let params = TextureParams {
        window: 5,
        glcm: horizontal_only(),
        ..Default::default()
    };
    let desc = texture_descriptors(&diagonal_ramp(20), &params).unwrap();

    let cor = desc.get(GlcmFeature::Correlation).unwrap();
    let ent = desc.get(GlcmFeature::Entropy).unwrap();
    let sem = desc.get(GlcmFeature::SecondMoment).unwrap();
    assert!((-1.0..=1.0).contains(&cor), "COR = {cor}");
    assert!(ent >= 0.0, "ENT = {ent}");
    assert!(sem > 0.0 && sem <= 1.0, "SEM = {sem}");

    // a ramp changes along every row, so there is contrast
    assert!(desc.get(GlcmFeature::Contrast).unwrap() > 0.0);
    assert!(desc.get(GlcmFeature::Homogeneity).unwrap() < 1.0);
}

#[test]
fn ramp_descriptors_for_every_window() {
    let raw = diagonal_ramp(32);
    for window in [3, 5, 7, 9] {
        let params = TextureParams {
            window,
            ..Default::default()
        };
        let desc = texture_descriptors(&raw, &params).unwrap();
        assert_eq!(desc.values.len(), 8);
        assert!(desc.values.iter().all(|(_, v)| v.is_finite()), "window {window}");
    }
}

#[test]
fn single_level_tile_is_degenerate() {
    let levels = 64;
    let tile = Raster::filled(16, 16, 21u8);
    let maps = texture_maps(&tile, 5, levels, &GlcmParams::default(), &GlcmFeature::ALL).unwrap();

    for (feature, map) in GlcmFeature::ALL.iter().zip(&maps) {
        let expected = match feature {
            GlcmFeature::Contrast | GlcmFeature::Dissimilarity | GlcmFeature::Entropy => 0.0,
            GlcmFeature::Homogeneity | GlcmFeature::SecondMoment => 1.0,
            GlcmFeature::Mean => 21.0,
            GlcmFeature::Variance | GlcmFeature::Correlation => 0.0,
        };
        for &v in map.data().iter() {
            assert_relative_eq!(v, expected, epsilon = 1e-12);
        }
    }
}

#[test]
fn larger_window_masks_more_border() {
    let quantized = quantize(&diagonal_ramp(24), &QuantizeParams::default()).unwrap();
    let maps = texture_maps(&quantized, 3, 64, &GlcmParams::default(), &[GlcmFeature::Contrast]).unwrap();
    let small = remove_edges(&maps[0], 0.0, 3, EdgeMode::Geometric).unwrap();
    let large = remove_edges(&maps[0], 0.0, 15, EdgeMode::Geometric).unwrap();

    let count = |m: &Raster<f64>| m.data().iter().filter(|&&v| v != 0.0).count();
    assert!(count(&small) > count(&large));
}

#[test]
fn fully_masked_map_has_no_mean() {
    let map = Raster::filled(6, 6, 1.0);
    assert!(matches!(
        sentinel_mean(&map, GlcmFeature::Homogeneity.sentinel()),
        Err(Error::EmptyFeatureRegion { .. })
    ));
}

#[test]
fn constant_tile_is_rejected_before_glcm() {
    let raw = Raster::filled(20, 20, 0.25);
    let err = texture_descriptors(&raw, &TextureParams::default()).unwrap_err();
    assert!(matches!(err, Error::InsufficientDynamicRange { .. }));
}
