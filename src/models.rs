//! Mod, instance and application state records
//!
//! These are plain serde records. Documents missing optional fields still load
//! (`enabled` defaults to true, `created` to empty), documents missing
//! identity fields fail to deserialize and are treated as unreadable by the
//! store.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::game;

// ============================================================================
// Mod
// ============================================================================

/// One packaged modification file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mod {
    /// Filename without extension
    pub name: String,
    /// Filename with extension, the identity key
    pub filename: String,
    /// Absolute path to the stored package
    pub path: String,
    /// File size in bytes
    pub size: u64,
    /// Whether the mod is enabled in the owning instance
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Mod {
    /// Build a record describing a package file on disk.
    ///
    /// Returns `None` if the file has no usable name or cannot be stat'ed.
    pub fn from_file(path: &Path) -> Option<Self> {
        let filename = path.file_name()?.to_str()?.to_string();
        let name = path.file_stem()?.to_str()?.to_string();
        let size = fs::metadata(path).ok()?.len();
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        Some(Self {
            name,
            filename,
            path: absolute.to_string_lossy().to_string(),
            size,
            enabled: true,
        })
    }

    /// Whether the backing package file still exists
    pub fn source_exists(&self) -> bool {
        Path::new(&self.path).exists()
    }

    /// Name of the managed symlink for this mod
    pub fn link_name(&self) -> String {
        format!("{}{}", game::SYMLINK_PREFIX, self.filename)
    }
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Instance
// ============================================================================

/// A named profile: an ordered set of mods with per-instance enable flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub mods: Vec<Mod>,
    /// ISO timestamp
    #[serde(default)]
    pub created: String,
}

impl Instance {
    /// Create an empty instance stamped with the current local time.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mods: Vec::new(),
            created: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        }
    }

    /// Add a mod unless one with the same filename is already present.
    ///
    /// Returns false when the filename was already present.
    pub fn add_mod(&mut self, entry: Mod) -> bool {
        if self.contains(&entry.filename) {
            return false;
        }
        self.mods.push(entry);
        true
    }

    /// Remove a mod by filename. Returns true if something was removed.
    pub fn remove_mod(&mut self, filename: &str) -> bool {
        let before = self.mods.len();
        self.mods.retain(|m| m.filename != filename);
        self.mods.len() != before
    }

    /// Set the enabled flag of a mod. Returns false if the filename is unknown.
    pub fn set_enabled(&mut self, filename: &str, enabled: bool) -> bool {
        match self.mods.iter_mut().find(|m| m.filename == filename) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.mods.iter().any(|m| m.filename == filename)
    }

    /// Enabled mods in stored order
    pub fn enabled_mods(&self) -> impl Iterator<Item = &Mod> {
        self.mods.iter().filter(|m| m.enabled)
    }
}

// ============================================================================
// App State
// ============================================================================

/// Process-wide persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    /// Name of the active instance
    #[serde(default)]
    pub active_instance: Option<String>,
    /// Steam installation root that last resolved the game
    #[serde(default)]
    pub steam_path: Option<String>,
}

impl AppState {
    pub fn is_active(&self, name: &str) -> bool {
        self.active_instance.as_deref() == Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(filename: &str) -> Mod {
        Mod {
            name: filename.trim_end_matches(".pak").to_string(),
            filename: filename.to_string(),
            path: format!("/library/{}", filename),
            size: 10,
            enabled: true,
        }
    }

    #[test]
    fn add_mod_is_idempotent_on_filename() {
        let mut instance = Instance::new("Main");
        assert!(instance.add_mod(sample("a.pak")));
        assert!(!instance.add_mod(sample("a.pak")));
        assert_eq!(instance.mods.len(), 1);

        let mut renamed = sample("a.pak");
        renamed.name = "Something else".to_string();
        assert!(!instance.add_mod(renamed));
        assert_eq!(instance.mods.len(), 1);
    }

    #[test]
    fn remove_and_toggle() {
        let mut instance = Instance::new("Main");
        instance.add_mod(sample("a.pak"));
        instance.add_mod(sample("b.pak"));

        assert!(instance.set_enabled("b.pak", false));
        assert!(!instance.set_enabled("missing.pak", false));
        let enabled: Vec<_> = instance.enabled_mods().map(|m| m.filename.as_str()).collect();
        assert_eq!(enabled, vec!["a.pak"]);

        assert!(instance.remove_mod("a.pak"));
        assert!(!instance.remove_mod("a.pak"));
        assert_eq!(instance.mods.len(), 1);
    }

    #[test]
    fn new_instance_has_timestamp() {
        let instance = Instance::new("Stamped");
        assert!(instance.mods.is_empty());
        assert!(instance.created.contains('T'));
    }

    #[test]
    fn missing_optional_fields_default() {
        let raw = r#"{"name":"Old","mods":[{"name":"a","filename":"a.pak","path":"/x/a.pak","size":1}]}"#;
        let instance: Instance = serde_json::from_str(raw).unwrap();
        assert_eq!(instance.created, "");
        assert!(instance.mods[0].enabled);

        let state: AppState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, AppState::default());
    }

    #[test]
    fn missing_identity_field_fails_closed() {
        let raw = r#"{"mods":[]}"#;
        assert!(serde_json::from_str::<Instance>(raw).is_err());
    }

    #[test]
    fn link_name_uses_reserved_prefix() {
        assert_eq!(sample("x.pak").link_name(), "ronmgr_x.pak");
    }
}
