//! Band codes inferred from tile paths

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Spectral band a tile belongs to, used to namespace output ledgers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandCode {
    Red,
    Green,
    Blue,
    RedEdge,
    Nir,
    Unknown,
}

impl BandCode {
    pub fn code(self) -> &'static str {
        match self {
            BandCode::Red => "R",
            BandCode::Green => "G",
            BandCode::Blue => "B",
            BandCode::RedEdge => "RE",
            BandCode::Nir => "NIR",
            BandCode::Unknown => "Unknown",
        }
    }

    /// Detect the band from case-sensitive substrings of `path`.
    ///
    /// `RedEdge` is matched before `Red`, which would otherwise shadow it.
    pub fn from_path(path: &Path) -> Self {
        let s = path.to_string_lossy();
        if s.contains("RedEdge") {
            BandCode::RedEdge
        } else if s.contains("Red") {
            BandCode::Red
        } else if s.contains("Green") {
            BandCode::Green
        } else if s.contains("Blue") {
            BandCode::Blue
        } else if s.contains("NIR") {
            BandCode::Nir
        } else {
            BandCode::Unknown
        }
    }
}

impl fmt::Display for BandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
