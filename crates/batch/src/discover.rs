//! Input tile discovery

use std::fs;
use std::path::{Path, PathBuf};

use phenotex_core::io::is_supported_tile;

use crate::error::Result;

/// Tiles found under an input root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    /// Non-empty tiles in enumeration order
    pub files: Vec<PathBuf>,
    /// Zero-byte tiles, excluded from the batch
    pub empty: Vec<PathBuf>,
}

/// Walk `root` depth-first for supported tiles.
///
/// Entries are visited in file-name order; the files of a directory come
/// before its subdirectories. Extensions match case-insensitively.
/// Symlinked directories are not followed.
pub fn discover_tiles(root: &Path) -> Result<Discovery> {
    let mut found = Discovery::default();
    walk(root, &mut found)?;
    Ok(found)
}

fn walk(dir: &Path, found: &mut Discovery) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .and_then(|rd| rd.collect::<std::io::Result<Vec<_>>>())
        .map_err(phenotex_core::Error::from)?;
    entries.sort_by_key(|e| e.file_name());

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type().map_err(phenotex_core::Error::from)?;
        if file_type.is_dir() {
            subdirs.push(path);
            continue;
        }
        if !is_supported_tile(&path) {
            continue;
        }
        let len = fs::metadata(&path).map_err(phenotex_core::Error::from)?.len();
        if len == 0 {
            tracing::warn!(file = %path.display(), "skipping empty file");
            found.empty.push(path);
        } else {
            found.files.push(path);
        }
    }

    for sub in subdirs {
        walk(&sub, found)?;
    }
    Ok(())
}
