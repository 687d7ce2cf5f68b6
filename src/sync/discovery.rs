use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extension of the session log files we mirror
pub const LOG_EXTENSION: &str = "jsonl";

pub(crate) fn is_session_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(LOG_EXTENSION)
}

/// True when `path` sits exactly two levels below `root`, matching the
/// `{root}/{projectDir}/{sessionId}.jsonl` layout.
pub(crate) fn is_within_layout(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .map(|rel| rel.components().count() == 2)
        .unwrap_or(false)
}

/// Enumerate every session log under the source root.
///
/// The scan is two levels deep only: session files live directly inside a
/// project directory, never nested further. A missing source root yields an
/// empty list rather than an error.
pub fn discover_session_files(source_root: &Path) -> Result<Vec<PathBuf>> {
    if !source_root.is_dir() {
        log::warn!(
            "Source root does not exist, nothing to discover: {}",
            source_root.display()
        );
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(source_root)
        .min_depth(2)
        .max_depth(2)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_session_file(e.path()))
        .map(|e| e.into_path())
        .collect();

    // Deterministic order keeps batch boundaries stable between runs
    files.sort();

    Ok(files)
}
