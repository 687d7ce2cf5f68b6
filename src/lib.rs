//! # claude-code-mirror
//!
//! Mirrors Claude Code conversation history into a user-managed shared store.
//!
//! ## Overview
//!
//! `claude-code-mirror` watches your local Claude Code projects directory
//! (`~/.claude/projects/`) for append-only JSONL session logs and copies each
//! one, byte for byte, into a human-readable directory tree inside a folder
//! you already synchronize between machines (Dropbox, iCloud Drive, Syncthing,
//! anything that moves files). Next to every mirrored log it writes a small
//! JSON sidecar describing the session: entry count, time range, branch and
//! version, and when the copy was made. The sidecar doubles as the sync
//! journal: a file is only re-copied when its modification time is newer than
//! the recorded sync time.
//!
//! ## Key features
//!
//! - **Debounced watching**: rapid appends to the same session coalesce into
//!   a single sync one second after the last write
//! - **Idempotent**: unchanged files are skipped; re-running is always safe
//! - **Readable mirror**: encoded project directory names become display
//!   names (`home%2Fuser%2Fproj` -> `home - user - proj`)
//! - **Fault isolation**: a malformed log line or a failing file never stops
//!   the rest of a batch or the watch loop
//! - **Link setup**: a companion `link` command replaces the canonical
//!   projects directory with a symlink into the shared store
//!
//! ## Architecture
//!
//! Control flow: filesystem change events -> debounce window -> per-file sync
//! -> (parse, metadata derive, staleness check) -> conditional copy + sidecar
//! write -> progress/notification callback to the host.

/// Platform-agnostic configuration directory management plus the persisted
/// sync settings (source root, store root, auto-sync flags, last sync time).
pub mod config;

/// Narrow boundary to whatever hosts the engine: notifications, advisory
/// progress text, and last-sync persistence. The CLI uses a console
/// implementation; tests use a recording one.
pub mod host;

/// Symlink setup for the canonical source root: point it into the shared
/// store, with backup-or-merge-or-abort handling for an existing directory.
pub mod link;

/// Logging configuration and utilities.
///
/// Sets up dual logging to both console (configurable via `RUST_LOG`) and a
/// persistent log file in the config directory, with size-based rotation.
pub mod logger;

/// Derivation of the per-session metadata sidecar: entry count, first/last
/// timestamp, branch and version tags, and the moment of the sync.
pub mod metadata;

/// JSONL session log parsing.
///
/// Parses Claude Code conversation files line by line into structured
/// entries, skipping and counting malformed lines instead of failing.
pub mod parser;

/// Pure path transformations: splitting a session path into its structural
/// parts, decoding encoded project directory names into display names, and
/// sanitizing display names into safe path segments.
pub mod paths;

/// The staleness decision: compare a source file's modification time against
/// the sync time recorded in its destination sidecar.
pub mod staleness;

/// The sync engine: per-file sync with a re-entrancy guard, batched bulk
/// sync with progress reporting, and the debounced filesystem watch loop.
pub mod sync;
