use anyhow::{anyhow, Context, Result};
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

/// Fallback display name when a project segment decodes to nothing usable
pub const UNKNOWN_PROJECT: &str = "Unknown Project";

/// Maximum length of a sanitized path segment
const MAX_SEGMENT_LEN: usize = 255;

/// Structural parts of a session log path: `{root}/{encodedSegment}/{sessionId}.jsonl`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    /// Root directory the log tree lives under
    pub root: PathBuf,

    /// Project directory name exactly as it appears on disk
    pub encoded_segment: String,

    /// Human-readable project name derived from the encoded segment
    pub display_name: String,

    /// Filename stem, used as the session identifier
    pub session_id: String,

    /// Full path to the source file
    pub source_path: PathBuf,
}

impl ParsedPath {
    /// Split a session log path into its structural parts.
    ///
    /// The path must have at least a project directory and a filename below
    /// the root; anything shallower is rejected rather than guessed at.
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let session_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Path has no filename: {}", path.display()))?
            .to_string();

        let project_dir = path
            .parent()
            .ok_or_else(|| anyhow!("Path has no project directory: {}", path.display()))?;

        let encoded_segment = project_dir
            .file_name()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "Path has no project directory segment: {}",
                    path.display()
                )
            })?
            .to_string();

        let root = project_dir
            .parent()
            .with_context(|| format!("Path has no root directory: {}", path.display()))?
            .to_path_buf();

        Ok(ParsedPath {
            root,
            display_name: decode_project_name(&encoded_segment),
            encoded_segment,
            session_id,
            source_path: path.to_path_buf(),
        })
    }
}

/// Decode an encoded project directory name into a display name.
///
/// Percent-decodes the segment, strips leading path separators, and turns
/// every run of separators into `" - "`. Malformed percent-encoding is not
/// fatal: the original segment is returned unchanged with a warning.
pub fn decode_project_name(encoded: &str) -> String {
    let decoded = match percent_decode_str(encoded).decode_utf8() {
        Ok(s) => s.into_owned(),
        Err(e) => {
            log::warn!("Could not percent-decode project segment '{encoded}': {e}");
            encoded.to_string()
        }
    };

    let trimmed = decoded.trim_start_matches(['/', '\\']);

    let mut name = String::with_capacity(trimmed.len());
    let mut in_separator_run = false;
    for c in trimmed.chars() {
        if c == '/' || c == '\\' {
            if !in_separator_run {
                name.push_str(" - ");
                in_separator_run = true;
            }
        } else {
            name.push(c);
            in_separator_run = false;
        }
    }

    let name = name.trim();
    if name.is_empty() {
        UNKNOWN_PROJECT.to_string()
    } else {
        name.to_string()
    }
}

/// Make a display name safe to use as a path segment on any major filesystem.
///
/// Replaces `<>:"|?*` with `-`, collapses whitespace runs, trims, and caps
/// the length at 255 characters. Idempotent.
pub fn sanitize_project_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_space = false;

    for c in name.chars() {
        let c = match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '-',
            other => other,
        };

        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }

    let truncated: String = out.trim().chars().take(MAX_SEGMENT_LEN).collect();
    // Truncation can land right after a space; trim again so the result is stable
    truncated.trim_end().to_string()
}
