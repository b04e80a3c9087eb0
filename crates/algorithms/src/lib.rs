//! # phenotex algorithms
//!
//! Texture analysis for phenotyping imagery.
//!
//! ## Available Algorithm Categories
//!
//! - **texture**: gray-level quantization, per-pixel GLCMs, Haralick
//!   descriptors, border masking and sentinel-aware aggregation

pub(crate) mod maybe_rayon;
pub mod texture;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::texture::{
        quantize, remove_edges, sentinel_mean, texture_descriptors, texture_maps, EdgeMode, GlcmFeature,
        GlcmParams, GlcmTextures, GrayRange, QuantizeParams, TextureDescriptors, TextureParams,
    };
    pub use phenotex_core::prelude::*;
}
