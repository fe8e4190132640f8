//! Filesystem discovery of case directories and sample files.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{IoError, IoResult};

/// All paths matching a glob pattern, sorted.
pub fn discover(pattern: &str) -> IoResult<Vec<PathBuf>> {
    let paths = glob::glob(pattern).map_err(|source| IoError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut found = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => found.push(path),
            Err(err) => debug!(error = %err, "skipping unreadable glob entry"),
        }
    }
    found.sort();
    Ok(found)
}

/// Files inside `dir` matching `file_pattern`. `dir` is matched literally.
pub fn discover_in(dir: &Path, file_pattern: &str) -> IoResult<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    discover(&format!("{escaped}/{file_pattern}"))
}

/// Trailing integer of a file stem, e.g. `struct_pos_node12.dat` -> 12.
pub fn node_index(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    stem[digits_start..].parse().ok()
}

/// Sort by trailing node index, falling back to the path for ties and
/// names without an index.
pub fn sort_by_node_index(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| {
        node_index(a)
            .cmp(&node_index(b))
            .then_with(|| a.cmp(b))
    });
}
