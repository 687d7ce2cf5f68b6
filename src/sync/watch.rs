use anyhow::Result;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::discovery::{is_session_file, is_within_layout};
use super::{SyncAction, SyncEngine};

/// Delay after the last observed change before a file is synced, long enough
/// for a multi-line append to finish before we read
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Delay before re-creating the subscription after a watcher error
pub const WATCHER_RESTART_DELAY: Duration = Duration::from_secs(5);

type TimerMap = Arc<Mutex<HashMap<PathBuf, JoinHandle<()>>>>;

/// Handle for an active watch subscription.
///
/// Stopping aborts the event loop and every outstanding debounce timer and
/// releases the underlying filesystem watch. A sync that is already past its
/// debounce runs in a detached task and completes regardless.
pub struct WatchHandle {
    loop_task: JoinHandle<()>,
    timers: TimerMap,
}

impl WatchHandle {
    pub fn stop(self) {
        self.loop_task.abort();
        for (_, timer) in self.timers.lock().unwrap().drain() {
            timer.abort();
        }
    }
}

/// Subscribe to create/modify events under the engine's source root and
/// sync each changed session file after a debounce window.
///
/// Pre-existing files produce no events at subscription time; the startup
/// bulk sync covers those. Watcher errors never bring the loop down: the
/// subscription is torn down and re-created after a fixed delay, forever.
pub fn start_watching(engine: Arc<SyncEngine>) -> WatchHandle {
    let timers: TimerMap = Arc::new(Mutex::new(HashMap::new()));
    let loop_timers = Arc::clone(&timers);

    let loop_task = tokio::spawn(async move {
        loop {
            match run_subscription(&engine, &loop_timers).await {
                Ok(()) => {
                    // Event channel closed without an error; treat it the
                    // same as a watcher failure and resubscribe
                    log::warn!("Watch subscription ended unexpectedly, restarting");
                }
                Err(e) => {
                    log::error!("Filesystem watcher failed: {e:#}");
                }
            }
            tokio::time::sleep(WATCHER_RESTART_DELAY).await;
            log::info!("Re-creating watch subscription on {}", engine.source_root.display());
        }
    });

    WatchHandle { loop_task, timers }
}

async fn run_subscription(engine: &Arc<SyncEngine>, timers: &TimerMap) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        let _ = tx.send(res);
    })?;
    watcher.watch(&engine.source_root, RecursiveMode::Recursive)?;

    log::info!("Watching {} for session changes", engine.source_root.display());

    while let Some(res) = rx.recv().await {
        match res {
            Ok(event) => handle_event(engine, timers, &event),
            // A watcher-level error invalidates the subscription; bubble up
            // so the outer loop rebuilds it
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn handle_event(engine: &Arc<SyncEngine>, timers: &TimerMap, event: &Event) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }

    for path in &event.paths {
        if is_session_file(path) && is_within_layout(&engine.source_root, path) {
            schedule_sync(engine, timers, path.clone());
        }
    }
}

/// Arm (or re-arm) the debounce timer for one path. A new event for the same
/// path cancels the outstanding timer, so the sync fires one debounce window
/// after the last event. On expiry the sync itself runs in a detached
/// blocking task, outside the timer's cancellation scope.
fn schedule_sync(engine: &Arc<SyncEngine>, timers: &TimerMap, path: PathBuf) {
    let mut guard = timers.lock().unwrap();

    if let Some(previous) = guard.remove(&path) {
        previous.abort();
    }

    let engine = Arc::clone(engine);
    let timers = Arc::clone(timers);
    let key = path.clone();

    let timer = tokio::spawn(async move {
        tokio::time::sleep(DEBOUNCE_WINDOW).await;
        timers.lock().unwrap().remove(&key);

        tokio::task::spawn_blocking(move || {
            let result = engine.sync_session_file(&key);
            match result.action {
                SyncAction::Created | SyncAction::Updated => {
                    engine.host.notify(&format!(
                        "Synced session {} ({})",
                        result.session_id, result.project
                    ));
                }
                SyncAction::Skipped => {
                    log::debug!(
                        "Watch sync skipped for {}: {}",
                        result.session_id,
                        result.message.as_deref().unwrap_or("")
                    );
                }
                SyncAction::Error => {
                    engine.host.notify(&format!(
                        "Sync failed for session {} (details in the log)",
                        result.session_id
                    ));
                }
            }
        });
    });

    guard.insert(path, timer);
}
