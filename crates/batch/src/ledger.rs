//! Append-only CSV ledgers of per-item texture descriptors
//!
//! One ledger per (band, window size):
//! `<output_root>/<band>/<w>x<w>/texture_features.csv`.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use phenotex_algorithms::texture::GlcmFeature;

use crate::band::BandCode;
use crate::error::{BatchError, Result};

/// Ledger file name inside each `<band>/<w>x<w>` directory
pub const LEDGER_FILE: &str = "texture_features.csv";

/// One row of a ledger
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub file_name: String,
    pub window: usize,
    pub band: BandCode,
    /// `(feature, value)` in the requested feature order
    pub values: Vec<(GlcmFeature, f64)>,
}

impl FeatureRecord {
    /// Column names: `FileName, WindowSize, <band>_<CODE>...`
    pub fn header(&self) -> Vec<String> {
        let features: Vec<GlcmFeature> = self.values.iter().map(|&(f, _)| f).collect();
        ledger_header(self.band, &features)
    }

    fn fields(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(self.values.len() + 2);
        row.push(self.file_name.clone());
        row.push(self.window.to_string());
        row.extend(self.values.iter().map(|(_, v)| v.to_string()));
        row
    }
}

pub fn ledger_header(band: BandCode, features: &[GlcmFeature]) -> Vec<String> {
    let mut header = vec!["FileName".to_string(), "WindowSize".to_string()];
    header.extend(features.iter().map(|f| format!("{}_{}", band.code(), f.code())));
    header
}

/// Path of the ledger for `band` and `window` under `output_root`
pub fn ledger_path(output_root: &Path, band: BandCode, window: usize) -> PathBuf {
    output_root
        .join(band.code())
        .join(format!("{}x{}", window, window))
        .join(LEDGER_FILE)
}

/// Writer for the ledgers under one output root
#[derive(Debug, Clone)]
pub struct OutputLedger {
    root: PathBuf,
}

impl OutputLedger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append `record` to its ledger, creating the ledger with a header if
    /// needed. Returns the ledger path.
    ///
    /// An existing ledger with a different header is refused, so the column
    /// set of a ledger never changes.
    pub fn append(&self, record: &FeatureRecord) -> Result<PathBuf> {
        let path = ledger_path(&self.root, record.band, record.window);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| BatchError::output_write(&path, e))?;
        }

        let expected = record.header();
        let is_new = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if !is_new {
            let found = read_header(&path)?;
            if found != expected {
                return Err(BatchError::output_write(
                    &path,
                    format!("existing header {:?} does not match {:?}", found, expected),
                ));
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BatchError::output_write(&path, e))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer
                .write_record(&expected)
                .map_err(|e| BatchError::output_write(&path, e))?;
        }
        writer
            .write_record(record.fields())
            .map_err(|e| BatchError::output_write(&path, e))?;
        writer.flush().map_err(|e| BatchError::output_write(&path, e))?;

        Ok(path)
    }
}

fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| BatchError::output_write(path, e))?;
    let header = reader.headers().map_err(|e| BatchError::output_write(path, e))?;
    Ok(header.iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, band: BandCode, features: &[GlcmFeature]) -> FeatureRecord {
        FeatureRecord {
            file_name: name.to_string(),
            window: 5,
            band,
            values: features.iter().map(|&f| (f, 0.5)).collect(),
        }
    }

    #[test]
    fn test_ledger_path_layout() {
        let p = ledger_path(Path::new("/out"), BandCode::RedEdge, 7);
        assert_eq!(p, PathBuf::from("/out/RE/7x7/texture_features.csv"));
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = OutputLedger::new(dir.path());
        let feats = [GlcmFeature::Mean, GlcmFeature::Entropy];

        let path = ledger.append(&record("a.tif", BandCode::Red, &feats)).unwrap();
        ledger.append(&record("b.tif", BandCode::Red, &feats)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["FileName,WindowSize,R_MEA,R_ENT", "a.tif,5,0.5,0.5", "b.tif,5,0.5,0.5"]);
    }

    #[test]
    fn test_header_mismatch_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = OutputLedger::new(dir.path());
        ledger
            .append(&record("a.tif", BandCode::Nir, &[GlcmFeature::Mean]))
            .unwrap();
        let err = ledger
            .append(&record("b.tif", BandCode::Nir, &[GlcmFeature::Contrast]))
            .unwrap_err();
        assert!(matches!(err, BatchError::OutputWrite { .. }));
    }

    #[test]
    fn test_bands_use_separate_ledgers() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = OutputLedger::new(dir.path());
        let a = ledger.append(&record("a.tif", BandCode::Green, &[GlcmFeature::Mean])).unwrap();
        let b = ledger.append(&record("b.tif", BandCode::Blue, &[GlcmFeature::Mean])).unwrap();
        assert_ne!(a, b);
        assert!(a.ends_with("G/5x5/texture_features.csv"));
        assert!(b.ends_with("B/5x5/texture_features.csv"));
    }

    #[test]
    fn test_unwritable_root() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let ledger = OutputLedger::new(&blocker);
        let err = ledger.append(&record("a.tif", BandCode::Red, &[GlcmFeature::Mean])).unwrap_err();
        assert!(matches!(err, BatchError::OutputWrite { .. }));
    }
}
