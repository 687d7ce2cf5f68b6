use chrono::{DateTime, Utc};
use std::path::Path;

use crate::metadata::SessionMetadata;

/// Decide whether a source file needs re-syncing.
///
/// A missing sidecar always means sync. A readable sidecar means sync
/// exactly when the source was modified strictly after the recorded
/// `syncedAt` (equal timestamps count as already synced). Any other read
/// or parse trouble fails open toward "sync needed" so an unexpected error
/// can never silently skip a file.
pub fn needs_sync(source_mtime: DateTime<Utc>, sidecar_path: &Path) -> bool {
    if !sidecar_path.exists() {
        return true;
    }

    match SessionMetadata::load(sidecar_path) {
        Ok(prior) => source_mtime > prior.synced_at,
        Err(e) => {
            log::warn!(
                "Could not read prior sidecar {}, forcing sync: {}",
                sidecar_path.display(),
                e
            );
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::ParsedPath;
    use chrono::Duration;
    use std::fs;

    fn write_sidecar(dir: &Path, synced_at: DateTime<Utc>) -> std::path::PathBuf {
        let parsed = ParsedPath::parse("/root/projects/proj/session-1.jsonl").unwrap();
        let meta = SessionMetadata::build(&[], &parsed, synced_at);
        let path = dir.join("session-1.meta.json");
        meta.save(&path).unwrap();
        path
    }

    #[test]
    fn test_missing_sidecar_needs_sync() {
        assert!(needs_sync(Utc::now(), Path::new("/nonexistent/x.meta.json")));
    }

    #[test]
    fn test_equal_mtime_is_already_synced() {
        let dir = tempfile::tempdir().unwrap();
        let synced_at = Utc::now();
        let sidecar = write_sidecar(dir.path(), synced_at);

        assert!(!needs_sync(synced_at, &sidecar));
    }

    #[test]
    fn test_older_mtime_is_already_synced() {
        let dir = tempfile::tempdir().unwrap();
        let synced_at = Utc::now();
        let sidecar = write_sidecar(dir.path(), synced_at);

        assert!(!needs_sync(synced_at - Duration::seconds(30), &sidecar));
    }

    #[test]
    fn test_newer_mtime_needs_sync() {
        let dir = tempfile::tempdir().unwrap();
        let synced_at = Utc::now();
        let sidecar = write_sidecar(dir.path(), synced_at);

        assert!(needs_sync(synced_at + Duration::seconds(1), &sidecar));
    }

    #[test]
    fn test_corrupt_sidecar_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-1.meta.json");
        fs::write(&path, "{ not valid json").unwrap();

        assert!(needs_sync(Utc::now(), &path));
    }
}
