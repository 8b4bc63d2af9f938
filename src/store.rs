//! On-disk storage for the library, instances and app state
//!
//! Layout under the data root:
//!
//! ```text
//! <root>/mods/<file>.pak
//! <root>/instances/<name>/instance.json
//! <root>/state.json
//! ```

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::game;
use crate::logging::{log_import, log_info, log_warning};
use crate::models::{AppState, Instance, Mod};

const INSTANCE_FILE: &str = "instance.json";
const STATE_FILE: &str = "state.json";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot delete the active instance '{0}'. Please deactivate it first.")]
    InstanceActive(String),
    #[error("Invalid instance name: '{0}'")]
    InvalidName(String),
    #[error("Instance '{0}' already exists")]
    InstanceExists(String),
    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to delete {path}: {source}")]
    Delete { path: PathBuf, source: io::Error },
}

// ============================================================================
// Data Store
// ============================================================================

#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
    mods_dir: PathBuf,
    instances_dir: PathBuf,
    state_file: PathBuf,
}

impl DataStore {
    /// Open (and create if needed) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        let store = Self {
            mods_dir: root.join("mods"),
            instances_dir: root.join("instances"),
            state_file: root.join(STATE_FILE),
            root,
        };

        fs::create_dir_all(&store.root)?;
        fs::create_dir_all(&store.mods_dir)?;
        fs::create_dir_all(&store.instances_dir)?;

        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Flat directory holding every imported package
    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ------------------------------------------------------------------------
    // App state
    // ------------------------------------------------------------------------

    /// Load the app state. Missing or unreadable documents yield the default.
    pub fn load_state(&self) -> AppState {
        let content = match fs::read_to_string(&self.state_file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return AppState::default(),
            Err(e) => {
                log_warning(&format!("Error loading state: {}", e));
                return AppState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                log_warning(&format!(
                    "Error loading state ({}), starting with an empty state: {}",
                    self.state_file.display(),
                    e
                ));
                AppState::default()
            }
        }
    }

    pub fn save_state(&self, state: &AppState) -> Result<(), StoreError> {
        write_json(&self.state_file, state)
    }

    // ------------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------------

    fn instance_file(&self, name: &str) -> PathBuf {
        self.instances_dir.join(name).join(INSTANCE_FILE)
    }

    /// Names of all instances with an instance document, sorted.
    pub fn list_instances(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.instances_dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir() && entry.path().join(INSTANCE_FILE).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();

        names.sort();
        names
    }

    pub fn instance_exists(&self, name: &str) -> bool {
        validate_instance_name(name).is_ok() && self.instance_file(name).is_file()
    }

    /// Load an instance by name. Missing or malformed documents yield `None`.
    pub fn load_instance(&self, name: &str) -> Option<Instance> {
        if validate_instance_name(name).is_err() {
            return None;
        }

        let path = self.instance_file(name);
        let content = fs::read_to_string(&path).ok()?;

        match serde_json::from_str(&content) {
            Ok(instance) => Some(instance),
            Err(e) => {
                log_warning(&format!("Error loading instance {}: {}", name, e));
                None
            }
        }
    }

    pub fn save_instance(&self, instance: &Instance) -> Result<(), StoreError> {
        validate_instance_name(&instance.name)?;

        let dir = self.instances_dir.join(&instance.name);
        fs::create_dir_all(&dir).map_err(|source| StoreError::Write {
            path: dir.clone(),
            source,
        })?;

        write_json(&dir.join(INSTANCE_FILE), instance)
    }

    /// Create and persist a new, empty instance.
    pub fn create_instance(&self, name: &str) -> Result<Instance, StoreError> {
        validate_instance_name(name)?;
        if self.instance_exists(name) {
            return Err(StoreError::InstanceExists(name.to_string()));
        }

        let instance = Instance::new(name);
        self.save_instance(&instance)?;
        log_info(&format!("Created instance: {}", name));
        Ok(instance)
    }

    /// Delete an instance. The active instance cannot be deleted.
    pub fn delete_instance(&self, name: &str, active: Option<&str>) -> Result<(), StoreError> {
        validate_instance_name(name)?;
        if active == Some(name) {
            return Err(StoreError::InstanceActive(name.to_string()));
        }

        let dir = self.instances_dir.join(name);
        if !dir.exists() {
            return Ok(());
        }

        fs::remove_dir_all(&dir).map_err(|source| StoreError::Delete { path: dir, source })?;
        log_info(&format!("Deleted instance: {}", name));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------------

    /// Copy a package file into the library.
    ///
    /// Returns `None` if the source is missing, is not a package, or a file of
    /// the same name is already in the library.
    pub fn import_package(&self, source: &Path) -> Option<Mod> {
        if !source.is_file() || !game::is_package_file(source) {
            return None;
        }

        // Library records need UTF-8 names, reject before anything is copied
        let Some(filename) = source.file_name().and_then(|name| name.to_str()) else {
            log_warning(&format!("Skipping package with a non UTF-8 name: {}", source.display()));
            return None;
        };

        let dest = self.mods_dir.join(filename);
        if dest.exists() {
            return None;
        }

        if let Err(e) = fs::copy(source, &dest) {
            log_warning(&format!("Failed to copy {} into library: {}", source.display(), e));
            // Don't leave a truncated copy behind to be mistaken for a duplicate later
            let _ = fs::remove_file(&dest);
            return None;
        }

        let Some(entry) = Mod::from_file(&dest) else {
            let _ = fs::remove_file(&dest);
            return None;
        };
        log_import(&format!("Imported {} ({} bytes)", entry.filename, entry.size));
        Some(entry)
    }

    /// All packages in the library, sorted case-insensitively by display name.
    pub fn list_library_mods(&self) -> Vec<Mod> {
        let Ok(entries) = fs::read_dir(&self.mods_dir) else {
            return Vec::new();
        };

        let mut mods: Vec<Mod> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && game::is_package_file(path))
            .filter_map(|path| Mod::from_file(&path))
            .collect();

        mods.sort_by_key(|m| m.name.to_lowercase());
        mods
    }

    pub fn find_library_mod(&self, filename: &str) -> Option<Mod> {
        let path = self.mods_dir.join(filename);
        if filename.contains('/') || !path.is_file() || !game::is_package_file(&path) {
            return None;
        }
        Mod::from_file(&path)
    }
}

/// Instance names become directory names, so they must be a single path component.
pub fn validate_instance_name(name: &str) -> Result<(), StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed != name || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Whole-file rewrite through a temp file and rename.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let raw = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let temp = path.with_extension("json.tmp");
    fs::write(&temp, raw)
        .and_then(|_| fs::rename(&temp, path))
        .map_err(|source| {
            let _ = fs::remove_file(&temp);
            StoreError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (DataStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = DataStore::open(temp_dir.path().join("data")).unwrap();
        (store, temp_dir)
    }

    fn write_pak(dir: &Path, filename: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(filename);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn open_creates_regions() {
        let (store, _temp) = create_store();
        assert!(store.mods_dir().is_dir());
        assert!(store.root().join("instances").is_dir());
    }

    #[test]
    fn state_round_trip_and_defaults() {
        let (store, _temp) = create_store();
        assert_eq!(store.load_state(), AppState::default());

        let state = AppState {
            active_instance: Some("Main".to_string()),
            steam_path: Some("/home/user/.steam/steam".to_string()),
        };
        store.save_state(&state).unwrap();
        assert_eq!(store.load_state(), state);
    }

    #[test]
    fn corrupt_state_falls_back_to_default() {
        let (store, _temp) = create_store();
        fs::write(store.root().join(STATE_FILE), "{ not json").unwrap();
        assert_eq!(store.load_state(), AppState::default());
    }

    #[test]
    fn instances_are_listed_sorted_and_require_document() {
        let (store, _temp) = create_store();
        for name in ["beta", "Alpha", "alpha"] {
            store.save_instance(&Instance::new(name)).unwrap();
        }
        fs::create_dir_all(store.root().join("instances/empty-dir")).unwrap();

        assert_eq!(store.list_instances(), vec!["Alpha", "alpha", "beta"]);
    }

    #[test]
    fn malformed_instance_reads_as_missing() {
        let (store, _temp) = create_store();
        let dir = store.root().join("instances/broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(INSTANCE_FILE), "[1, 2").unwrap();

        assert!(store.load_instance("broken").is_none());
        assert!(store.load_instance("never-created").is_none());
    }

    #[test]
    fn instance_save_load_delete() {
        let (store, _temp) = create_store();
        let mut instance = store.create_instance("Main").unwrap();
        instance.add_mod(Mod {
            name: "a".to_string(),
            filename: "a.pak".to_string(),
            path: "/lib/a.pak".to_string(),
            size: 3,
            enabled: false,
        });
        store.save_instance(&instance).unwrap();

        assert_eq!(store.load_instance("Main"), Some(instance));
        assert!(matches!(
            store.create_instance("Main"),
            Err(StoreError::InstanceExists(_))
        ));

        assert!(matches!(
            store.delete_instance("Main", Some("Main")),
            Err(StoreError::InstanceActive(_))
        ));
        assert!(store.instance_exists("Main"));

        store.delete_instance("Main", None).unwrap();
        assert!(!store.instance_exists("Main"));
        store.delete_instance("Main", None).unwrap();
    }

    #[test]
    fn rejects_path_like_names() {
        let (store, _temp) = create_store();
        for name in ["", "..", "a/b", " padded"] {
            assert!(matches!(
                store.create_instance(name),
                Err(StoreError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn import_package_copies_once() {
        let (store, temp) = create_store();
        let source = write_pak(temp.path(), "Cool Mod.pak", b"abcd");

        let imported = store.import_package(&source).unwrap();
        assert_eq!(imported.name, "Cool Mod");
        assert_eq!(imported.filename, "Cool Mod.pak");
        assert_eq!(imported.size, 4);
        assert!(imported.enabled);
        assert!(Path::new(&imported.path).starts_with(store.mods_dir()));

        // Duplicate by filename is not overwritten
        fs::write(&source, b"changed").unwrap();
        assert!(store.import_package(&source).is_none());
        assert_eq!(fs::read(store.mods_dir().join("Cool Mod.pak")).unwrap(), b"abcd");
    }

    #[test]
    fn import_package_rejects_non_packages() {
        let (store, temp) = create_store();
        let readme = write_pak(temp.path(), "readme.txt", b"hi");
        assert!(store.import_package(&readme).is_none());
        assert!(store.import_package(&temp.path().join("missing.pak")).is_none());
    }

    #[test]
    fn non_utf8_package_leaves_library_untouched() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (store, temp) = create_store();
        let source = temp.path().join(OsStr::from_bytes(b"bad\xff.pak"));
        fs::write(&source, b"data").unwrap();

        assert!(store.import_package(&source).is_none());
        assert_eq!(fs::read_dir(store.mods_dir()).unwrap().count(), 0);
        assert!(store.list_library_mods().is_empty());
    }

    #[test]
    fn library_listing_is_case_insensitive() {
        let (store, temp) = create_store();
        for name in ["zeta.pak", "Alpha.pak", "beta.PAK"] {
            let source = write_pak(temp.path(), name, b"x");
            store.import_package(&source).unwrap();
        }
        fs::write(store.mods_dir().join("notes.txt"), "x").unwrap();

        let names: Vec<_> = store.list_library_mods().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Alpha", "beta", "zeta"]);

        assert!(store.find_library_mod("zeta.pak").is_some());
        assert!(store.find_library_mod("notes.txt").is_none());
    }
}
