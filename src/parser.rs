use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Discriminant tag carried by every JSONL entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "system")]
    System,
    #[serde(rename = "tool_use")]
    ToolUse,
    #[serde(rename = "tool_result")]
    ToolResult,
    #[serde(rename = "file-history-snapshot")]
    FileHistorySnapshot,
    /// Forward compatibility with record shapes we don't know yet
    #[serde(other)]
    Unknown,
}

/// One line of a conversation log.
///
/// Entries are read-only once parsed; the engine never re-serializes them
/// (mirroring copies the original bytes), so this type only deserializes.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,

    pub uuid: Option<String>,

    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,

    pub timestamp: Option<DateTime<Utc>>,

    pub message: Option<Value>,

    pub cwd: Option<String>,

    pub version: Option<String>,

    #[serde(rename = "gitBranch")]
    pub git_branch: Option<String>,

    // Open extension map for fields we don't explicitly parse
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A parsed session log: the ordered entries plus parse diagnostics
#[derive(Debug, Clone)]
pub struct SessionLog {
    pub entries: Vec<LogEntry>,
    pub skipped_lines: usize,
    pub source_path: PathBuf,
}

impl SessionLog {
    /// Parse a JSONL file line by line.
    ///
    /// CR, LF, and CRLF all count as line breaks. Blank lines are skipped.
    /// A line that fails to decode is counted and logged with its 1-based
    /// line number, then skipped; it never aborts the parse. An empty or
    /// all-blank file yields an empty entry list.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut skipped_lines = 0;
        let mut line_no = 0usize;

        for raw in reader.lines() {
            let raw = raw
                .with_context(|| format!("Failed to read from {}", path.display()))?;

            // BufRead::lines splits on LF and strips a trailing CR, but a
            // lone CR is still a line break to us
            for piece in raw.split('\r') {
                line_no += 1;

                let line = piece.trim();
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<LogEntry>(line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => {
                        skipped_lines += 1;
                        log::warn!(
                            "Skipping malformed line {} in {}: {}",
                            line_no,
                            path.display(),
                            e
                        );
                    }
                }
            }
        }

        Ok(SessionLog {
            entries,
            skipped_lines,
            source_path: path.to_path_buf(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_entry_kinds() {
        let json = r#"{"type":"user","uuid":"123","sessionId":"abc","timestamp":"2025-01-01T00:00:00Z"}"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, EntryKind::User);
        assert_eq!(entry.uuid.as_deref(), Some("123"));
        assert_eq!(entry.session_id.as_deref(), Some("abc"));

        let json = r#"{"type":"file-history-snapshot","messageId":"x"}"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, EntryKind::FileHistorySnapshot);
        assert!(entry.extra.contains_key("messageId"));
    }

    #[test]
    fn test_unknown_kind_is_tolerated() {
        let json = r#"{"type":"summary","summary":"some text"}"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, EntryKind::Unknown);
    }

    #[test]
    fn test_parse_file_in_order() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, r#"{{"type":"user","uuid":"1","timestamp":"2025-01-01T00:00:00Z"}}"#).unwrap();
        writeln!(f, r#"{{"type":"assistant","uuid":"2","timestamp":"2025-01-01T00:01:00Z"}}"#)
            .unwrap();

        let log = SessionLog::from_file(f.path()).unwrap();
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.skipped_lines, 0);
        assert_eq!(log.entries[0].uuid.as_deref(), Some("1"));
        assert_eq!(log.entries[1].uuid.as_deref(), Some("2"));
    }

    #[test]
    fn test_malformed_lines_are_counted_and_skipped() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, r#"{{"type":"user","uuid":"1"}}"#).unwrap();
        writeln!(f, "this is not json").unwrap();
        writeln!(f, r#"{{"type":"assistant","uuid":"2"}}"#).unwrap();

        let log = SessionLog::from_file(f.path()).unwrap();
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.skipped_lines, 1);
    }

    #[test]
    fn test_blank_and_empty_files() {
        let f = NamedTempFile::new().unwrap();
        let log = SessionLog::from_file(f.path()).unwrap();
        assert!(log.is_empty());
        assert_eq!(log.skipped_lines, 0);

        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "   ").unwrap();
        writeln!(f).unwrap();
        let log = SessionLog::from_file(f.path()).unwrap();
        assert!(log.is_empty());
        assert_eq!(log.skipped_lines, 0);
    }

    #[test]
    fn test_line_terminator_variants() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            "{}\r\n{}\r{}\n",
            r#"{"type":"user","uuid":"1"}"#,
            r#"{"type":"assistant","uuid":"2"}"#,
            r#"{"type":"system","uuid":"3"}"#
        )
        .unwrap();

        let log = SessionLog::from_file(f.path()).unwrap();
        assert_eq!(log.entries.len(), 3);
        assert_eq!(log.entries[2].uuid.as_deref(), Some("3"));
    }

    #[test]
    fn test_reparse_yields_same_sequence() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, r#"{{"type":"user","uuid":"1"}}"#).unwrap();
        writeln!(f, r#"{{"type":"assistant","uuid":"2"}}"#).unwrap();

        let first = SessionLog::from_file(f.path()).unwrap();
        let second = SessionLog::from_file(f.path()).unwrap();
        assert_eq!(first.entries.len(), second.entries.len());
        assert_eq!(
            first.entries.last().unwrap().uuid,
            second.entries.last().unwrap().uuid
        );
    }
}
