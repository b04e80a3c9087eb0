//! GLCM texture descriptors
//!
//! - **quantize**: raw intensities to `L` gray levels
//! - **neighborhood**: edge-replicated windows around every pixel
//! - **glcm**: symmetric, normalized co-occurrence counts per (step, angle)
//! - **features**: the eight Haralick reducers
//! - **edge**: sentinel masking of the padded border band
//! - **aggregate**: sentinel-aware mean
//! - **pipeline**: all of the above for one tile and window size

mod aggregate;
mod edge;
mod features;
mod glcm;
mod neighborhood;
mod pipeline;
mod quantize;

pub use aggregate::sentinel_mean;
pub use edge::{border_width, remove_edges, EdgeMode};
pub use features::{ensure_finite, feature_map, GlcmFeature, CORRELATION_EPS, ENTROPY_EPS};
pub use glcm::{
    cooccurrence_tensor, glcm_tensor, plane_entries, CoMatrix, GlcmParams, Offset, PlaneEntry, MAX_TENSOR_CELLS,
};
pub use neighborhood::{validate_window, PaddedTile, MAX_PADDED_CELLS};
pub use pipeline::{
    cleaned_feature_maps, texture_descriptors, texture_maps, FeatureMap, GlcmTextures, TextureDescriptors,
    TextureParams,
};
pub use quantize::{bin_edges, level_of, quantize, GrayRange, QuantizeParams, DEFAULT_LEVELS, MIN_DYNAMIC_RANGE};
