mod discovery;
mod watch;

pub use discovery::discover_session_files;
pub use watch::{start_watching, WatchHandle, DEBOUNCE_WINDOW, WATCHER_RESTART_DELAY};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::host::HostAdapter;
use crate::metadata::SessionMetadata;
use crate::parser::SessionLog;
use crate::paths::{sanitize_project_name, ParsedPath};
use crate::staleness::needs_sync;

/// Number of files synced concurrently within one batch
const SYNC_BATCH_SIZE: usize = 10;

/// What a sync attempt did to the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
    Skipped,
    Error,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncAction::Created => "created",
            SyncAction::Updated => "updated",
            SyncAction::Skipped => "skipped",
            SyncAction::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outcome of a single sync attempt. Consumed immediately by the caller for
/// logging and notification; never persisted.
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub success: bool,
    pub session_id: String,
    pub project: String,
    pub action: SyncAction,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl SyncResult {
    fn skipped(session_id: &str, project: &str, message: &str) -> Self {
        SyncResult {
            success: true,
            session_id: session_id.to_string(),
            project: project.to_string(),
            action: SyncAction::Skipped,
            message: Some(message.to_string()),
            error: None,
        }
    }

    fn failure(session_id: &str, project: &str, error: &anyhow::Error) -> Self {
        SyncResult {
            success: false,
            session_id: session_id.to_string(),
            project: project.to_string(),
            action: SyncAction::Error,
            message: Some("Sync failed".to_string()),
            error: Some(format!("{error:#}")),
        }
    }
}

/// Cumulative outcome of a bulk sync
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<SyncResult>,
}

impl SyncSummary {
    fn record(&mut self, result: SyncResult) {
        match result.action {
            SyncAction::Created | SyncAction::Updated => self.synced += 1,
            SyncAction::Skipped => self.skipped += 1,
            SyncAction::Error => self.failed += 1,
        }
        self.results.push(result);
    }
}

/// Orchestrates per-file syncs, bulk syncs, and the debounced watch loop.
///
/// The per-path in-flight set is the only mutual exclusion primitive: two
/// different source paths may be mid-write at the same time, which is safe
/// because the destination location is a deterministic, collision-free
/// function of the source path.
pub struct SyncEngine {
    pub(crate) source_root: PathBuf,
    store_root: PathBuf,
    pub(crate) host: Arc<dyn HostAdapter>,
    in_flight: Mutex<HashSet<PathBuf>>,
}

impl SyncEngine {
    pub fn new(source_root: PathBuf, store_root: PathBuf, host: Arc<dyn HostAdapter>) -> Self {
        SyncEngine {
            source_root,
            store_root,
            host,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Sync one session log. Never returns an error: every failure is
    /// converted into a `SyncResult` with action `error` so one file can
    /// never halt batch or watch processing of its siblings.
    pub fn sync_session_file(&self, path: &Path) -> SyncResult {
        let parsed = match ParsedPath::parse(path) {
            Ok(p) => p,
            Err(e) => {
                log::error!("Cannot parse session path {}: {e:#}", path.display());
                return SyncResult::failure("unknown", "unknown", &e);
            }
        };

        // Re-entrancy guard, keyed by exact path: a concurrent attempt is
        // rejected immediately rather than queued
        if !self
            .in_flight
            .lock()
            .unwrap()
            .insert(parsed.source_path.clone())
        {
            log::debug!("Sync already in progress for {}", path.display());
            return SyncResult::skipped(
                &parsed.session_id,
                &parsed.display_name,
                "Sync already in progress",
            );
        }

        let outcome = self.sync_parsed(&parsed);

        self.in_flight.lock().unwrap().remove(&parsed.source_path);

        match outcome {
            Ok(result) => result,
            Err(e) => {
                log::error!("Sync failed for {}: {e:#}", path.display());
                SyncResult::failure(&parsed.session_id, &parsed.display_name, &e)
            }
        }
    }

    fn sync_parsed(&self, parsed: &ParsedPath) -> Result<SyncResult> {
        let session = SessionLog::from_file(&parsed.source_path)?;
        if session.is_empty() {
            return Ok(SyncResult::skipped(
                &parsed.session_id,
                &parsed.display_name,
                "Empty JSONL file",
            ));
        }

        let source_mtime: DateTime<Utc> = fs::metadata(&parsed.source_path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", parsed.source_path.display()))?
            .into();

        let dest_dir = self
            .store_root
            .join(sanitize_project_name(&parsed.display_name));
        let dest_file = dest_dir.join(format!("{}.jsonl", parsed.session_id));
        let sidecar = SessionMetadata::sidecar_path(&dest_file);

        if !needs_sync(source_mtime, &sidecar) {
            return Ok(SyncResult::skipped(
                &parsed.session_id,
                &parsed.display_name,
                "Already up to date",
            ));
        }

        let now = Utc::now();
        let meta = SessionMetadata::build(&session.entries, parsed, now);

        fs::create_dir_all(&dest_dir)
            .with_context(|| format!("Failed to create {}", dest_dir.display()))?;

        // Destination existence decides created vs updated, checked before
        // the copy so an overwrite reports as an update
        let existed = dest_file.exists();

        // Byte-for-byte copy of the original file, malformed lines included;
        // the parsed entries are only used for the sidecar
        fs::copy(&parsed.source_path, &dest_file).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                parsed.source_path.display(),
                dest_file.display()
            )
        })?;

        meta.save(&sidecar)?;

        if let Err(e) = self.host.persist_last_sync(now) {
            log::warn!("Could not persist last-sync timestamp: {e:#}");
        }

        let action = if existed {
            SyncAction::Updated
        } else {
            SyncAction::Created
        };

        Ok(SyncResult {
            success: true,
            session_id: parsed.session_id.clone(),
            project: parsed.display_name.clone(),
            action,
            message: Some(format!("Synced {} entries", meta.message_count)),
            error: None,
        })
    }

    /// Sync every existing session file under the source root.
    ///
    /// Files are processed in fixed-size batches: concurrent within a batch,
    /// strictly sequential across batches, with cumulative progress reported
    /// through the host after each batch.
    pub async fn sync_all_existing(self: &Arc<Self>) -> Result<SyncSummary> {
        let files = discover_session_files(&self.source_root)?;
        let total = files.len();

        let mut summary = SyncSummary::default();
        if total == 0 {
            self.host.notify("No session files found to sync");
            return Ok(summary);
        }

        let mut done = 0usize;
        for batch in files.chunks(SYNC_BATCH_SIZE) {
            let tasks: Vec<_> = batch
                .iter()
                .map(|path| {
                    let engine = Arc::clone(self);
                    let path = path.clone();
                    tokio::task::spawn_blocking(move || engine.sync_session_file(&path))
                })
                .collect();

            for joined in futures::future::join_all(tasks).await {
                match joined {
                    Ok(result) => summary.record(result),
                    Err(e) => {
                        log::error!("Sync task panicked: {e}");
                        summary.failed += 1;
                    }
                }
            }

            done += batch.len();
            self.host.report_progress(&format!("Syncing... {done}/{total}"));
        }

        self.host.notify(&format!(
            "Sync complete: {} synced, {} skipped, {} failed",
            summary.synced, summary.skipped, summary.failed
        ));

        Ok(summary)
    }
}
