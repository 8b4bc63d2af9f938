//! Activation engine
//!
//! Enables an instance by placing symlinks in the game's mod directory. Every
//! link the manager creates carries the reserved `ronmgr_` prefix, and only
//! symlinks with that prefix are ever removed, so files the user put there by
//! hand are left alone.

mod conflicts;

pub use conflicts::{base_name, detect_conflicts, Conflict, AI_KEYWORDS};

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::game::SYMLINK_PREFIX;
use crate::logging::{log_action, log_link, log_warning};
use crate::models::Instance;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("Game directory not found")]
    GameDirectoryUnavailable,
}

/// A per-link failure. Activation carries on past these.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Mod file not found: {0}")]
    MissingSource(String),
    #[error("Symlink already exists: {0}")]
    LinkExists(String),
    #[error("Failed to create symlink {name}: {cause}")]
    LinkFailed { name: String, cause: io::Error },
    #[error("Failed to remove symlink {name}: {cause}")]
    RemoveFailed { name: String, cause: io::Error },
}

// ============================================================================
// Types
// ============================================================================

/// A symlink in the game mod directory owned by this manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedLink {
    pub name: String,
    pub target: PathBuf,
}

#[derive(Debug, Default)]
pub struct ActivationReport {
    /// Number of symlinks created
    pub created: usize,
    pub errors: Vec<LinkError>,
}

impl ActivationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One step of the rebuild, worked out before anything on disk changes
#[derive(Debug)]
enum PlannedLink {
    Create { name: String, source: PathBuf },
    Skip(LinkError),
}

// ============================================================================
// Linker
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ModLinker {
    game_dir: Option<PathBuf>,
}

impl ModLinker {
    /// Linker targeting a resolved mod directory, or none if resolution failed
    pub fn new(game_dir: Option<PathBuf>) -> Self {
        Self { game_dir }
    }

    pub fn game_dir(&self) -> Option<&Path> {
        self.game_dir.as_deref()
    }

    pub fn is_game_dir_valid(&self) -> bool {
        self.game_dir.as_deref().is_some_and(Path::is_dir)
    }

    fn target_dir(&self) -> Result<&Path, ActivationError> {
        self.game_dir
            .as_deref()
            .filter(|dir| dir.is_dir())
            .ok_or(ActivationError::GameDirectoryUnavailable)
    }

    /// Managed symlinks currently in the game directory, sorted by name
    pub fn managed_links(&self) -> Vec<ManagedLink> {
        match self.target_dir() {
            Ok(dir) => scan_managed_links(dir),
            Err(_) => Vec::new(),
        }
    }

    /// Replace whatever is linked with the enabled mods of `instance`.
    ///
    /// Failures for individual mods are collected in the report; a partial
    /// activation is left in place.
    pub fn activate(&self, instance: &Instance) -> Result<ActivationReport, ActivationError> {
        let dir = self.target_dir()?;
        let report = reconcile(dir, instance, |path: &Path| fs::remove_file(path));

        log_action(&format!(
            "Activated instance '{}': {} mod(s) enabled, {} error(s)",
            instance.name,
            report.created,
            report.errors.len()
        ));

        Ok(report)
    }

    /// Remove every managed symlink. Returns how many were removed.
    pub fn deactivate(&self) -> Result<usize, ActivationError> {
        let dir = self.target_dir()?;
        let (removed, errors) = clear_managed_links(dir, |path: &Path| fs::remove_file(path));
        for error in &errors {
            log_warning(&error.to_string());
        }
        log_action(&format!("Deactivated all mods: removed {} symlink(s)", removed));
        Ok(removed)
    }

    /// Filenames of the instance's mods whose package is gone, enabled or not
    pub fn verify_mods(&self, instance: &Instance) -> Vec<String> {
        verify_mods(instance)
    }
}

/// Filenames of the instance's mods whose package is gone, enabled or not
pub fn verify_mods(instance: &Instance) -> Vec<String> {
    instance
        .mods
        .iter()
        .filter(|m| !m.source_exists())
        .map(|m| m.filename.clone())
        .collect()
}

/// Plan the links, clear the managed ones, then create the plan back to back.
fn reconcile<R>(dir: &Path, instance: &Instance, remove: R) -> ActivationReport
where
    R: FnMut(&Path) -> io::Result<()>,
{
    let plan = plan_links(instance);

    let mut report = ActivationReport::default();
    let (_, remove_errors) = clear_managed_links(dir, remove);
    for error in &remove_errors {
        log_warning(&error.to_string());
    }
    report.errors.extend(remove_errors);

    for step in plan {
        match step {
            PlannedLink::Skip(error) => {
                log_warning(&error.to_string());
                report.errors.push(error);
            }
            PlannedLink::Create { name, source } => {
                let link_path = dir.join(&name);
                match symlink(&source, &link_path) {
                    Ok(()) => {
                        log_link(&format!("{} -> {}", name, source.display()));
                        report.created += 1;
                    }
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        log_warning(&format!("Symlink already exists: {}", name));
                        report.errors.push(LinkError::LinkExists(name));
                    }
                    Err(cause) => {
                        log_warning(&format!("Failed to create symlink {}: {}", name, cause));
                        report.errors.push(LinkError::LinkFailed { name, cause });
                    }
                }
            }
        }
    }

    report
}

fn plan_links(instance: &Instance) -> Vec<PlannedLink> {
    instance
        .enabled_mods()
        .map(|entry| {
            let source = Path::new(&entry.path);
            if !source.exists() {
                return PlannedLink::Skip(LinkError::MissingSource(entry.filename.clone()));
            }
            PlannedLink::Create {
                name: entry.link_name(),
                source: std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf()),
            }
        })
        .collect()
}

fn is_managed_name(name: &str) -> bool {
    name.starts_with(SYMLINK_PREFIX)
}

fn scan_managed_links(dir: &Path) -> Vec<ManagedLink> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut links: Vec<ManagedLink> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_symlink()))
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            if !is_managed_name(&name) {
                return None;
            }
            let target = fs::read_link(entry.path()).unwrap_or_default();
            Some(ManagedLink { name, target })
        })
        .collect();

    links.sort_by(|a, b| a.name.cmp(&b.name));
    links
}

fn clear_managed_links<R>(dir: &Path, mut remove: R) -> (usize, Vec<LinkError>)
where
    R: FnMut(&Path) -> io::Result<()>,
{
    let mut removed = 0;
    let mut errors = Vec::new();

    for link in scan_managed_links(dir) {
        match remove(&dir.join(&link.name)) {
            Ok(()) => removed += 1,
            Err(cause) => errors.push(LinkError::RemoveFailed {
                name: link.name,
                cause,
            }),
        }
    }

    (removed, errors)
}
