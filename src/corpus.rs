//! Reference corpus discovery.
//!
//! A corpus directory holds `<case>` (raw) next to `<case>.<ext>` (encoded
//! with the codec registered under `<ext>`).

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HarnessError, Result};

/// Matched raw and encoded reference files for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub raw: PathBuf,
    pub encoded: PathBuf,
}

/// Every `*.<ext>` file in `dir` together with its raw counterpart, sorted by
/// name. The raw file must exist.
pub fn discover_pairs(dir: &Path, ext: &str) -> Result<Vec<FilePair>> {
    let ext = ext.trim_start_matches('.');
    let mut pairs = Vec::new();
    for encoded in regular_files(dir)? {
        if encoded.extension().and_then(|e| e.to_str()) != Some(ext) {
            continue;
        }
        let raw = encoded.with_extension("");
        if !raw.is_file() {
            return Err(HarnessError::MissingFile(raw));
        }
        pairs.push(FilePair { raw, encoded });
    }
    if pairs.is_empty() {
        return Err(HarnessError::EmptyCorpus {
            dir: dir.to_path_buf(),
            what: format!("no *.{ext} files"),
        });
    }
    Ok(pairs)
}

/// Every regular file in `dir`, whatever its extension, sorted by name.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let files = regular_files(dir)?;
    if files.is_empty() {
        return Err(HarnessError::EmptyCorpus {
            dir: dir.to_path_buf(),
            what: "no regular files".into(),
        });
    }
    Ok(files)
}

fn regular_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
