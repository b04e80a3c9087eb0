//! # phenotex core
//!
//! Core types, traits and tile I/O shared by the phenotex crates.
//!
//! This crate provides:
//! - `Raster<T>`: generic 2D grid used for raw tiles, quantized tiles and feature maps
//! - `RasterElement`: bound for cell value types
//! - `Error`: the error taxonomy of the texture pipeline
//! - Tile readers for TIFF, PNG and JPEG

pub mod error;
pub mod io;
pub mod raster;

pub use error::{Error, Result};
pub use raster::{Raster, RasterElement, SampleType};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{Raster, RasterElement, SampleType};
    pub use crate::Algorithm;
}

/// Core trait for algorithms in phenotex.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
