//! Batch request and its validated plan

use std::fs;
use std::path::{Path, PathBuf};

use phenotex_algorithms::texture::{EdgeMode, GlcmFeature, GlcmParams, QuantizeParams, TextureParams};
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};

fn default_window_sizes() -> Vec<usize> {
    vec![5]
}

fn default_features() -> Vec<String> {
    GlcmFeature::ALL.iter().map(|f| f.code().to_string()).collect()
}

/// What a batch should compute, as handed in by a caller or a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    #[serde(default = "default_window_sizes")]
    pub window_sizes: Vec<usize>,
    /// Feature codes such as `"MEA"` or `"ENT"`
    #[serde(default = "default_features")]
    pub features: Vec<String>,
    #[serde(default)]
    pub quantize: QuantizeParams,
    #[serde(default)]
    pub glcm: GlcmParams,
    #[serde(default)]
    pub edge_mode: EdgeMode,
}

impl BatchRequest {
    /// Request with default windows, features and parameters
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            window_sizes: default_window_sizes(),
            features: default_features(),
            quantize: QuantizeParams::default(),
            glcm: GlcmParams::default(),
            edge_mode: EdgeMode::default(),
        }
    }

    pub fn with_window_sizes(mut self, window_sizes: Vec<usize>) -> Self {
        self.window_sizes = window_sizes;
        self
    }

    pub fn with_features(mut self, features: &[GlcmFeature]) -> Self {
        self.features = features.iter().map(|f| f.code().to_string()).collect();
        self
    }

    /// Load a request from a JSON document
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| BatchError::InvalidRequest(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| BatchError::InvalidRequest(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Check the request and resolve it into a [`BatchPlan`].
    ///
    /// Even, zero and repeated window sizes are dropped, as are unknown or
    /// repeated feature codes. Creates the output root.
    pub fn validate(&self) -> Result<BatchPlan> {
        if !self.input_root.is_dir() {
            return Err(BatchError::InvalidRequest(format!(
                "input root {} is not a directory",
                self.input_root.display()
            )));
        }

        let mut windows = Vec::new();
        for &w in &self.window_sizes {
            if w % 2 == 0 {
                tracing::warn!(window = w, "dropping even window size");
            } else if !windows.contains(&w) {
                windows.push(w);
            }
        }
        if windows.is_empty() {
            return Err(BatchError::InvalidRequest(format!(
                "no odd window size in {:?}",
                self.window_sizes
            )));
        }

        let mut features = Vec::new();
        for code in &self.features {
            match code.parse::<GlcmFeature>() {
                Ok(f) if !features.contains(&f) => features.push(f),
                Ok(_) => {}
                Err(_) => tracing::warn!(feature = %code, "dropping unknown feature code"),
            }
        }
        if features.is_empty() {
            return Err(BatchError::InvalidRequest(format!(
                "no known feature code in {:?}",
                self.features
            )));
        }

        self.quantize
            .validate()
            .and_then(|_| self.glcm.validate())
            .map_err(|e| BatchError::InvalidRequest(e.to_string()))?;

        fs::create_dir_all(&self.output_root).map_err(|e| {
            BatchError::InvalidRequest(format!(
                "cannot create output root {}: {}",
                self.output_root.display(),
                e
            ))
        })?;

        Ok(BatchPlan {
            input_root: self.input_root.clone(),
            output_root: self.output_root.clone(),
            windows,
            features,
            quantize: self.quantize.clone(),
            glcm: self.glcm.clone(),
            edge_mode: self.edge_mode,
        })
    }
}

/// A validated request
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    /// Odd, distinct window sizes in request order
    pub windows: Vec<usize>,
    /// Distinct features in request order
    pub features: Vec<GlcmFeature>,
    pub quantize: QuantizeParams,
    pub glcm: GlcmParams,
    pub edge_mode: EdgeMode,
}

impl BatchPlan {
    /// Pipeline parameters for one window size
    pub fn texture_params(&self, window: usize) -> TextureParams {
        TextureParams {
            window,
            features: self.features.clone(),
            quantize: self.quantize.clone(),
            glcm: self.glcm.clone(),
            edge_mode: self.edge_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_even_and_duplicate_windows() {
        let dir = tempfile::tempdir().unwrap();
        let req = BatchRequest::new(dir.path(), dir.path().join("out")).with_window_sizes(vec![3, 4, 5, 3, 0, 9]);
        let plan = req.validate().unwrap();
        assert_eq!(plan.windows, vec![3, 5, 9]);
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn test_no_odd_window_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let req = BatchRequest::new(dir.path(), dir.path().join("out")).with_window_sizes(vec![2, 4]);
        assert!(matches!(req.validate(), Err(BatchError::InvalidRequest(_))));
    }

    #[test]
    fn test_unknown_features_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = BatchRequest::new(dir.path(), dir.path().join("out"));
        req.features = vec!["ent".into(), "XYZ".into(), "MEA".into(), "ENT".into()];
        let plan = req.validate().unwrap();
        assert_eq!(plan.features, vec![GlcmFeature::Entropy, GlcmFeature::Mean]);

        req.features = vec!["XYZ".into()];
        assert!(matches!(req.validate(), Err(BatchError::InvalidRequest(_))));
    }

    #[test]
    fn test_missing_input_root() {
        let dir = tempfile::tempdir().unwrap();
        let req = BatchRequest::new(dir.path().join("missing"), dir.path().join("out"));
        assert!(matches!(req.validate(), Err(BatchError::InvalidRequest(_))));
    }

    #[test]
    fn test_invalid_levels() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = BatchRequest::new(dir.path(), dir.path().join("out"));
        req.quantize.levels = 1;
        assert!(matches!(req.validate(), Err(BatchError::InvalidRequest(_))));
    }

    #[test]
    fn test_json_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req.json");
        fs::write(
            &path,
            r#"{ "input_root": "in", "output_root": "out", "window_sizes": [3, 7], "edge_mode": "contour" }"#,
        )
        .unwrap();
        let req = BatchRequest::from_json_file(&path).unwrap();
        assert_eq!(req.window_sizes, vec![3, 7]);
        assert_eq!(req.features.len(), 8);
        assert_eq!(req.quantize.levels, 64);
        assert_eq!(req.edge_mode, EdgeMode::Contour);
    }

    #[test]
    fn test_texture_params_for_window() {
        let dir = tempfile::tempdir().unwrap();
        let plan = BatchRequest::new(dir.path(), dir.path().join("out"))
            .with_features(&[GlcmFeature::Contrast])
            .validate()
            .unwrap();
        let params = plan.texture_params(7);
        assert_eq!(params.window, 7);
        assert_eq!(params.features, vec![GlcmFeature::Contrast]);
    }
}
