use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::parser::LogEntry;
use crate::paths::ParsedPath;

/// Extension of the sidecar written next to every mirrored log
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Descriptive record for one synced session, persisted as a pretty-printed
/// JSON sidecar colocated with the mirrored log.
///
/// The sidecar is created or overwritten every time a sync executes and is
/// the sole record of when the file was last synced; it is read back by the
/// staleness check on the next attempt, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub session_id: String,

    /// Human-readable project name (decoded, unsanitized)
    pub project_name: String,

    /// Project directory name exactly as it appears under the source root
    pub project_token: String,

    pub message_count: usize,

    pub first_timestamp: DateTime<Utc>,

    pub last_timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// When this sidecar was written; overwritten on every sync
    pub synced_at: DateTime<Utc>,

    /// Absolute source path the record was derived from
    pub source_path: PathBuf,
}

impl SessionMetadata {
    /// Derive metadata from a parsed session.
    ///
    /// Entries without a timestamp still count toward `message_count` but
    /// are excluded from the first/last range; when no entry carries a
    /// timestamp at all, both bounds default to `now`. Branch and version
    /// come from the first entry carrying a non-empty value, in file order.
    pub fn build(entries: &[LogEntry], parsed: &ParsedPath, now: DateTime<Utc>) -> Self {
        let timestamps: Vec<DateTime<Utc>> =
            entries.iter().filter_map(|e| e.timestamp).collect();

        let first_timestamp = timestamps.iter().min().copied().unwrap_or(now);
        let last_timestamp = timestamps.iter().max().copied().unwrap_or(now);

        let git_branch = entries
            .iter()
            .find_map(|e| e.git_branch.as_deref().filter(|b| !b.is_empty()))
            .map(String::from);

        let version = entries
            .iter()
            .find_map(|e| e.version.as_deref().filter(|v| !v.is_empty()))
            .map(String::from);

        SessionMetadata {
            session_id: parsed.session_id.clone(),
            project_name: parsed.display_name.clone(),
            project_token: parsed.encoded_segment.clone(),
            message_count: entries.len(),
            first_timestamp,
            last_timestamp,
            git_branch,
            version,
            synced_at: now,
            source_path: parsed.source_path.clone(),
        }
    }

    /// Sidecar path for a given mirrored log destination
    pub fn sidecar_path(destination: &Path) -> PathBuf {
        let stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        destination.with_file_name(format!("{stem}{SIDECAR_SUFFIX}"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sidecar: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse sidecar: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize session metadata")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write sidecar: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(json: &str) -> LogEntry {
        serde_json::from_str(json).unwrap()
    }

    fn parsed() -> ParsedPath {
        ParsedPath::parse("/root/projects/my%2Fproj/session-1.jsonl").unwrap()
    }

    #[test]
    fn test_build_counts_all_entries() {
        let entries = vec![
            entry(r#"{"type":"user","timestamp":"2025-01-02T00:00:00Z"}"#),
            entry(r#"{"type":"assistant"}"#),
            entry(r#"{"type":"system","timestamp":"2025-01-01T00:00:00Z"}"#),
        ];

        let now = Utc::now();
        let meta = SessionMetadata::build(&entries, &parsed(), now);

        assert_eq!(meta.message_count, 3);
        assert_eq!(
            meta.first_timestamp,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            meta.last_timestamp,
            Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(meta.synced_at, now);
        assert_eq!(meta.project_name, "my - proj");
        assert_eq!(meta.project_token, "my%2Fproj");
        assert_eq!(meta.session_id, "session-1");
    }

    #[test]
    fn test_build_defaults_timestamps_to_now() {
        let entries = vec![entry(r#"{"type":"user"}"#)];
        let now = Utc::now();
        let meta = SessionMetadata::build(&entries, &parsed(), now);

        assert_eq!(meta.first_timestamp, now);
        assert_eq!(meta.last_timestamp, now);
        assert_eq!(meta.message_count, 1);
    }

    #[test]
    fn test_build_takes_first_nonempty_branch_and_version() {
        let entries = vec![
            entry(r#"{"type":"user","gitBranch":""}"#),
            entry(r#"{"type":"assistant","gitBranch":"main","version":"1.0.30"}"#),
            entry(r#"{"type":"user","gitBranch":"feature","version":"1.0.31"}"#),
        ];

        let meta = SessionMetadata::build(&entries, &parsed(), Utc::now());
        assert_eq!(meta.git_branch.as_deref(), Some("main"));
        assert_eq!(meta.version.as_deref(), Some("1.0.30"));
    }

    #[test]
    fn test_build_absent_branch_and_version() {
        let entries = vec![entry(r#"{"type":"user"}"#)];
        let meta = SessionMetadata::build(&entries, &parsed(), Utc::now());
        assert!(meta.git_branch.is_none());
        assert!(meta.version.is_none());
    }

    #[test]
    fn test_sidecar_path() {
        let dest = Path::new("/store/my - proj/session-1.jsonl");
        assert_eq!(
            SessionMetadata::sidecar_path(dest),
            PathBuf::from("/store/my - proj/session-1.meta.json")
        );
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-1.meta.json");

        let meta = SessionMetadata::build(
            &[entry(r#"{"type":"user","timestamp":"2025-01-01T00:00:00Z"}"#)],
            &parsed(),
            Utc::now(),
        );
        meta.save(&path).unwrap();

        let loaded = SessionMetadata::load(&path).unwrap();
        assert_eq!(loaded.session_id, meta.session_id);
        assert_eq!(loaded.message_count, 1);
        assert_eq!(loaded.synced_at, meta.synced_at);

        // Sidecars are pretty-printed, camelCase JSON
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"sessionId\""));
        assert!(raw.contains('\n'));
    }
}
