use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::config::SyncConfig;

/// Narrow boundary between the sync engine and whatever is hosting it.
///
/// The engine only ever needs a place to surface notifications, a sink for
/// advisory progress text, and somewhere to persist the last-sync moment.
/// Progress text is purely observational and never consulted for control
/// decisions.
pub trait HostAdapter: Send + Sync {
    /// Fire-and-forget user-visible notification
    fn notify(&self, message: &str);

    /// Advisory status text, e.g. "Syncing... 45/123"
    fn report_progress(&self, label: &str);

    /// Record the moment of the last successful sync
    fn persist_last_sync(&self, when: DateTime<Utc>) -> Result<()>;
}

/// Host adapter for running from a terminal: colored output on stdout,
/// last-sync persistence through the config file.
pub struct ConsoleHost;

impl HostAdapter for ConsoleHost {
    fn notify(&self, message: &str) {
        println!("{} {}", "claude-code-mirror:".cyan().bold(), message);
    }

    fn report_progress(&self, label: &str) {
        println!("  {}", label.dimmed());
    }

    fn persist_last_sync(&self, when: DateTime<Utc>) -> Result<()> {
        let mut config = SyncConfig::load()?;
        config.last_sync = Some(when);
        config.save()
    }
}

/// Test support: an adapter that records every call instead of acting on it.
/// Compiled unconditionally so integration tests can use it too.
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every call for assertions; persistence is kept in memory
    #[derive(Default)]
    pub struct RecordingHost {
        pub notifications: Mutex<Vec<String>>,
        pub progress: Mutex<Vec<String>>,
        pub last_sync: Mutex<Option<DateTime<Utc>>>,
    }

    impl HostAdapter for RecordingHost {
        fn notify(&self, message: &str) {
            self.notifications.lock().unwrap().push(message.to_string());
        }

        fn report_progress(&self, label: &str) {
            self.progress.lock().unwrap().push(label.to_string());
        }

        fn persist_last_sync(&self, when: DateTime<Utc>) -> Result<()> {
            *self.last_sync.lock().unwrap() = Some(when);
            Ok(())
        }
    }
}
