use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use claude_code_mirror::config::SyncConfig;
use claude_code_mirror::host::ConsoleHost;
use claude_code_mirror::link::{link_source_root, LinkOutcome, LinkStrategy};
use claude_code_mirror::logger;
use claude_code_mirror::sync::{discover_session_files, start_watching, SyncEngine};

#[derive(Parser)]
#[command(name = "claude-code-mirror")]
#[command(about = "Mirror Claude Code conversation history into a cloud-synced shared store", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync all existing session logs, or one file with --file
    Sync {
        /// Sync only this session file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Watch the source root and sync session logs as they change
    Watch,

    /// Show configuration and mirror status
    Status,

    /// Configure mirror settings
    Config {
        /// Directory where Claude Code writes session logs
        #[arg(long)]
        source: Option<PathBuf>,

        /// Shared store directory to mirror into
        #[arg(long)]
        store: Option<PathBuf>,

        /// Sync files as they change while watching
        #[arg(long)]
        auto_sync: Option<bool>,

        /// Run a full sync before watching
        #[arg(long)]
        sync_on_start: Option<bool>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    /// Replace the source root with a symlink to a directory in the store
    Link {
        /// Directory the source root should point at
        target: PathBuf,

        /// Move an existing source root aside before linking
        #[arg(long, conflicts_with = "merge")]
        backup: bool,

        /// Fold an existing source root into the target before linking
        #[arg(long)]
        merge: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger()?;
    logger::rotate_log_if_needed()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { file } => run_sync(file).await,
        Commands::Watch => run_watch().await,
        Commands::Status => show_status(),
        Commands::Config {
            source,
            store,
            auto_sync,
            sync_on_start,
            show,
        } => update_config(source, store, auto_sync, sync_on_start, show),
        Commands::Link {
            target,
            backup,
            merge,
        } => run_link(target, backup, merge),
    }
}

/// Build the engine from saved settings; None when no store is configured
fn build_engine() -> Result<Option<Arc<SyncEngine>>> {
    let config = SyncConfig::load()?;

    let Some(store_root) = config.store_root else {
        println!(
            "{} No shared store configured. Run {} first.",
            "Note:".yellow(),
            "claude-code-mirror config --store <dir>".bold()
        );
        return Ok(None);
    };

    Ok(Some(Arc::new(SyncEngine::new(
        config.source_root,
        store_root,
        Arc::new(ConsoleHost),
    ))))
}

async fn run_sync(file: Option<PathBuf>) -> Result<()> {
    let Some(engine) = build_engine()? else {
        return Ok(());
    };

    match file {
        Some(path) => {
            let result = engine.sync_session_file(&path);
            println!(
                "  {} {} ({}): {}",
                result.action,
                result.session_id,
                result.project,
                result.message.as_deref().unwrap_or("")
            );
            Ok(())
        }
        None => {
            println!("{}", "Syncing Claude Code sessions...".cyan().bold());
            engine.sync_all_existing().await?;
            Ok(())
        }
    }
}

async fn run_watch() -> Result<()> {
    let config = SyncConfig::load()?;
    let Some(engine) = build_engine()? else {
        return Ok(());
    };

    if config.sync_on_start {
        println!("{}", "Initial sync...".cyan().bold());
        engine.sync_all_existing().await?;
    }

    if !config.auto_sync {
        println!(
            "{} auto-sync is disabled; not watching. Enable with {}.",
            "Note:".yellow(),
            "claude-code-mirror config --auto-sync true".bold()
        );
        return Ok(());
    }

    println!(
        "{} {}",
        "Watching".cyan().bold(),
        engine.source_root().display()
    );
    let handle = start_watching(Arc::clone(&engine));

    tokio::signal::ctrl_c().await?;
    println!("\n{}", "Stopping watcher...".cyan());
    handle.stop();

    Ok(())
}

fn show_status() -> Result<()> {
    let config = SyncConfig::load()?;

    println!("{}", "Claude Code Mirror Status".bold().cyan());
    println!();
    println!("  Source root:   {}", config.source_root.display());
    match &config.store_root {
        Some(store) => println!("  Shared store:  {}", store.display()),
        None => println!("  Shared store:  {}", "not configured".yellow()),
    }
    println!("  Auto-sync:     {}", config.auto_sync);
    println!("  Sync on start: {}", config.sync_on_start);
    match &config.last_sync {
        Some(t) => println!("  Last sync:     {}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Last sync:     {}", "never".dimmed()),
    }

    let sessions = discover_session_files(&config.source_root)?;
    println!("  Sessions:      {}", sessions.len());

    Ok(())
}

fn update_config(
    source: Option<PathBuf>,
    store: Option<PathBuf>,
    auto_sync: Option<bool>,
    sync_on_start: Option<bool>,
    show: bool,
) -> Result<()> {
    if show {
        return show_status();
    }

    let mut config = SyncConfig::load()?;
    let mut changed = false;

    if let Some(source) = source {
        config.source_root = source;
        changed = true;
    }
    if let Some(store) = store {
        config.store_root = Some(store);
        changed = true;
    }
    if let Some(auto_sync) = auto_sync {
        config.auto_sync = auto_sync;
        changed = true;
    }
    if let Some(sync_on_start) = sync_on_start {
        config.sync_on_start = sync_on_start;
        changed = true;
    }

    if changed {
        config.save()?;
        println!("{} Configuration saved", "✓".green());
    } else {
        println!("Nothing to change; see --help for available settings");
    }

    Ok(())
}

fn run_link(target: PathBuf, backup: bool, merge: bool) -> Result<()> {
    let config = SyncConfig::load()?;

    let strategy = if backup {
        LinkStrategy::Backup
    } else if merge {
        LinkStrategy::Merge
    } else {
        LinkStrategy::Abort
    };

    let outcome = link_source_root(&config.source_root, &target, strategy)?;
    match outcome {
        LinkOutcome::AlreadyLinked => {
            println!(
                "{} {} already points at {}",
                "✓".green(),
                config.source_root.display(),
                target.display()
            );
        }
        LinkOutcome::Linked => {
            println!(
                "{} Linked {} -> {}",
                "✓".green(),
                config.source_root.display(),
                target.display()
            );
        }
        LinkOutcome::LinkedAfterBackup(backup_path) => {
            println!(
                "{} Linked {} -> {} (previous contents moved to {})",
                "✓".green(),
                config.source_root.display(),
                target.display(),
                backup_path.display()
            );
        }
        LinkOutcome::LinkedAfterMerge => {
            println!(
                "{} Linked {} -> {} (existing files merged into the target)",
                "✓".green(),
                config.source_root.display(),
                target.display()
            );
        }
    }

    Ok(())
}
