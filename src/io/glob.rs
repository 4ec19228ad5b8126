//! Source-file enumeration for batch jobs.

use anyhow::{Context, Result};
use glob::glob;
use std::path::PathBuf;

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Sorting keeps task indices deterministic across runs: source position in
/// the returned list is the result-slot index of the file's read task. A
/// pattern matching nothing yields an empty vector, not an error.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob(pattern).with_context(|| format!("bad source pattern `{pattern}`"))?;

    let mut sources = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("walk matches of `{pattern}`"))?;
        // Directories can match the pattern but are never sources.
        if path.is_file() {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}
