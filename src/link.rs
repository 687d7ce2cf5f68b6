use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// What to do when the source root is already a real directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrategy {
    /// Refuse and leave everything untouched
    Abort,
    /// Rename the existing directory aside before linking
    Backup,
    /// Move its contents into the target (target wins on collisions),
    /// then link
    Merge,
}

/// How the link operation concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A correct link was already in place; nothing was changed
    AlreadyLinked,
    Linked,
    LinkedAfterBackup(PathBuf),
    LinkedAfterMerge,
}

/// Replace the canonical source root with a symbolic link to `target`.
///
/// The target directory must exist. An existing link that already points at
/// the target is detected and left alone; a link pointing elsewhere is
/// replaced. A real directory at the source root is handled per the chosen
/// strategy: backed up aside, merged into the target, or refused.
pub fn link_source_root(
    source_root: &Path,
    target: &Path,
    strategy: LinkStrategy,
) -> Result<LinkOutcome> {
    if !target.is_dir() {
        bail!("Link target does not exist: {}", target.display());
    }
    let canonical_target = target
        .canonicalize()
        .with_context(|| format!("Failed to resolve link target: {}", target.display()))?;

    match fs::symlink_metadata(source_root) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let current = fs::read_link(source_root)
                .with_context(|| format!("Failed to read link: {}", source_root.display()))?;
            let resolved = source_root
                .canonicalize()
                .unwrap_or_else(|_| current.clone());

            if resolved == canonical_target {
                return Ok(LinkOutcome::AlreadyLinked);
            }

            log::info!(
                "Replacing link {} -> {} with -> {}",
                source_root.display(),
                current.display(),
                canonical_target.display()
            );
            remove_symlink(source_root)?;
            create_dir_symlink(&canonical_target, source_root)?;
            Ok(LinkOutcome::Linked)
        }
        Ok(meta) if meta.is_dir() => match strategy {
            LinkStrategy::Abort => Err(anyhow!(
                "{} already exists; re-run with --backup to move it aside \
                 or --merge to fold it into the target",
                source_root.display()
            )),
            LinkStrategy::Backup => {
                let backup = backup_path(source_root);
                fs::rename(source_root, &backup).with_context(|| {
                    format!(
                        "Failed to back up {} to {}",
                        source_root.display(),
                        backup.display()
                    )
                })?;
                create_dir_symlink(&canonical_target, source_root)?;
                Ok(LinkOutcome::LinkedAfterBackup(backup))
            }
            LinkStrategy::Merge => {
                merge_into(source_root, &canonical_target)?;
                fs::remove_dir_all(source_root).with_context(|| {
                    format!("Failed to remove merged directory: {}", source_root.display())
                })?;
                create_dir_symlink(&canonical_target, source_root)?;
                Ok(LinkOutcome::LinkedAfterMerge)
            }
        },
        Ok(_) => bail!(
            "{} exists and is neither a directory nor a link",
            source_root.display()
        ),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = source_root.parent() {
                fs::create_dir_all(parent)?;
            }
            create_dir_symlink(&canonical_target, source_root)?;
            Ok(LinkOutcome::Linked)
        }
        Err(e) => Err(e)
            .with_context(|| format!("Failed to inspect {}", source_root.display())),
    }
}

fn backup_path(source_root: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let name = source_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    source_root.with_file_name(format!("{name}.backup-{stamp}"))
}

/// Move everything under `src` into `dst`, keeping the target's copy when a
/// file exists on both sides.
fn merge_into(src: &Path, dst: &Path) -> Result<()> {
    for entry in fs::read_dir(src)
        .with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&to)?;
            merge_into(&from, &to)?;
        } else if !to.exists() {
            fs::rename(&from, &to).or_else(|_| {
                // Rename fails across filesystems; fall back to copy
                fs::copy(&from, &to).map(|_| ())
            })
            .with_context(|| {
                format!("Failed to move {} to {}", from.display(), to.display())
            })?;
        } else {
            log::debug!("Keeping existing {} during merge", to.display());
        }
    }
    Ok(())
}

#[cfg(unix)]
fn create_dir_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).with_context(|| {
        format!("Failed to link {} -> {}", link.display(), target.display())
    })
}

#[cfg(windows)]
fn create_dir_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(target, link).with_context(|| {
        format!("Failed to link {} -> {}", link.display(), target.display())
    })
}

#[cfg(unix)]
fn remove_symlink(link: &Path) -> Result<()> {
    fs::remove_file(link)
        .with_context(|| format!("Failed to remove link: {}", link.display()))
}

#[cfg(windows)]
fn remove_symlink(link: &Path) -> Result<()> {
    // Directory symlinks on Windows are removed as directories
    fs::remove_dir(link)
        .with_context(|| format!("Failed to remove link: {}", link.display()))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_refuses_missing_target() {
        let dir = TempDir::new().unwrap();
        let result = link_source_root(
            &dir.path().join("root"),
            Path::new("/no/such/target"),
            LinkStrategy::Abort,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_links_missing_root() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("store");
        fs::create_dir_all(&target).unwrap();
        let root = dir.path().join("projects");

        let outcome = link_source_root(&root, &target, LinkStrategy::Abort).unwrap();
        assert_eq!(outcome, LinkOutcome::Linked);
        assert!(fs::symlink_metadata(&root).unwrap().file_type().is_symlink());
        assert_eq!(root.canonicalize().unwrap(), target.canonicalize().unwrap());
    }

    #[test]
    fn test_correct_existing_link_is_noop() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("store");
        fs::create_dir_all(&target).unwrap();
        let root = dir.path().join("projects");

        link_source_root(&root, &target, LinkStrategy::Abort).unwrap();
        let outcome = link_source_root(&root, &target, LinkStrategy::Abort).unwrap();
        assert_eq!(outcome, LinkOutcome::AlreadyLinked);
    }

    #[test]
    fn test_wrong_link_is_replaced() {
        let dir = TempDir::new().unwrap();
        let old_target = dir.path().join("old");
        let new_target = dir.path().join("new");
        fs::create_dir_all(&old_target).unwrap();
        fs::create_dir_all(&new_target).unwrap();
        let root = dir.path().join("projects");

        link_source_root(&root, &old_target, LinkStrategy::Abort).unwrap();
        let outcome = link_source_root(&root, &new_target, LinkStrategy::Abort).unwrap();
        assert_eq!(outcome, LinkOutcome::Linked);
        assert_eq!(
            root.canonicalize().unwrap(),
            new_target.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_existing_directory_aborts_by_default() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("store");
        fs::create_dir_all(&target).unwrap();
        let root = dir.path().join("projects");
        fs::create_dir_all(&root).unwrap();

        assert!(link_source_root(&root, &target, LinkStrategy::Abort).is_err());
        assert!(root.is_dir());
    }

    #[test]
    fn test_backup_strategy_moves_directory_aside() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("store");
        fs::create_dir_all(&target).unwrap();
        let root = dir.path().join("projects");
        fs::create_dir_all(root.join("proj")).unwrap();
        fs::write(root.join("proj").join("s.jsonl"), "{}").unwrap();

        let outcome = link_source_root(&root, &target, LinkStrategy::Backup).unwrap();
        match outcome {
            LinkOutcome::LinkedAfterBackup(backup) => {
                assert!(backup.join("proj").join("s.jsonl").exists());
            }
            other => panic!("expected LinkedAfterBackup, got {other:?}"),
        }
        assert!(fs::symlink_metadata(&root).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_merge_strategy_keeps_target_copies() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("store");
        fs::create_dir_all(target.join("proj")).unwrap();
        fs::write(target.join("proj").join("both.jsonl"), "target copy").unwrap();

        let root = dir.path().join("projects");
        fs::create_dir_all(root.join("proj")).unwrap();
        fs::write(root.join("proj").join("both.jsonl"), "source copy").unwrap();
        fs::write(root.join("proj").join("only-local.jsonl"), "local").unwrap();

        let outcome = link_source_root(&root, &target, LinkStrategy::Merge).unwrap();
        assert_eq!(outcome, LinkOutcome::LinkedAfterMerge);

        assert_eq!(
            fs::read_to_string(target.join("proj").join("both.jsonl")).unwrap(),
            "target copy"
        );
        assert!(target.join("proj").join("only-local.jsonl").exists());
        assert!(fs::symlink_metadata(&root).unwrap().file_type().is_symlink());
    }
}
