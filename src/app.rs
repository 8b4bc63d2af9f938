//! Application session: store, app state, game directory and linker together
//!
//! Every front-end workflow goes through [`ModManager`]. The app state is
//! written back after each change so a crash never leaves `state.json` behind
//! what is actually linked.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::activation::{
    detect_conflicts, verify_mods, ActivationError, ActivationReport, Conflict, ManagedLink,
    ModLinker,
};
use crate::importer::{self, ImportReport, SystemExtractor};
use crate::logging::{log_action, log_info, log_warning};
use crate::models::{AppState, Instance, Mod};
use crate::steam::{GameLocator, GamePaths, ResolveError};
use crate::store::{DataStore, StoreError};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Instance '{0}' not found")]
    InstanceNotFound(String),
    #[error("Mod '{filename}' is not part of instance '{instance}'")]
    ModNotFound { instance: String, filename: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Activation(#[from] ActivationError),
}

// ============================================================================
// Session
// ============================================================================

pub struct ModManager {
    store: DataStore,
    state: AppState,
    resolution: Result<GamePaths, ResolveError>,
    linker: ModLinker,
    extractor: SystemExtractor,
}

impl ModManager {
    /// Open a session, resolving the game directory for the current user.
    pub fn open(store: DataStore) -> Self {
        let state = store.load_state();
        let cached_root = state.steam_path.as_deref().map(PathBuf::from);
        let resolution = GameLocator::from_env()
            .with_cached_steam_root(cached_root)
            .resolve();
        Self::from_parts(store, state, resolution)
    }

    /// Open a session with an already computed resolution result.
    pub fn with_resolution(store: DataStore, resolution: Result<GamePaths, ResolveError>) -> Self {
        let state = store.load_state();
        Self::from_parts(store, state, resolution)
    }

    fn from_parts(
        store: DataStore,
        state: AppState,
        resolution: Result<GamePaths, ResolveError>,
    ) -> Self {
        let linker = ModLinker::new(resolution.as_ref().ok().map(|p| p.mods_dir.clone()));

        let mut manager = Self {
            store,
            state,
            resolution,
            linker,
            extractor: SystemExtractor::new(),
        };
        manager.remember_steam_root();
        manager
    }

    fn remember_steam_root(&mut self) {
        let Ok(paths) = &self.resolution else {
            return;
        };
        let root = paths.steam_root.to_string_lossy().to_string();
        if self.state.steam_path.as_deref() == Some(root.as_str()) {
            return;
        }

        self.state.steam_path = Some(root);
        if let Err(e) = self.store.save_state(&self.state) {
            log_warning(&format!("Could not save Steam path: {}", e));
        }
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn linker(&self) -> &ModLinker {
        &self.linker
    }

    pub fn resolution(&self) -> Result<&GamePaths, &ResolveError> {
        self.resolution.as_ref()
    }

    pub fn game_dir(&self) -> Option<&Path> {
        self.linker.game_dir()
    }

    pub fn active_instance(&self) -> Option<&str> {
        self.state.active_instance.as_deref()
    }

    pub fn managed_links(&self) -> Vec<ManagedLink> {
        self.linker.managed_links()
    }

    // ------------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------------

    pub fn list_instances(&self) -> Vec<String> {
        self.store.list_instances()
    }

    pub fn load_instance(&self, name: &str) -> Result<Instance, ManagerError> {
        self.store
            .load_instance(name)
            .ok_or_else(|| ManagerError::InstanceNotFound(name.to_string()))
    }

    pub fn create_instance(&self, name: &str) -> Result<Instance, ManagerError> {
        Ok(self.store.create_instance(name)?)
    }

    /// Delete an instance unless it is the active one.
    pub fn delete_instance(&self, name: &str) -> Result<(), ManagerError> {
        if !self.store.instance_exists(name) {
            return Err(ManagerError::InstanceNotFound(name.to_string()));
        }
        Ok(self.store.delete_instance(name, self.active_instance())?)
    }

    // ------------------------------------------------------------------------
    // Editing an instance
    // ------------------------------------------------------------------------

    /// Import files and add them to an instance, then save it.
    pub fn add_files<P: AsRef<Path>>(
        &self,
        name: &str,
        paths: &[P],
    ) -> Result<ImportReport, ManagerError> {
        let mut instance = self.load_instance(name)?;
        let report = importer::import_files(&self.store, &self.extractor, &mut instance, paths);
        self.store.save_instance(&instance)?;

        log_action(&format!(
            "Added {} mod(s) to instance '{}', {} file(s) failed to import",
            report.added.len(),
            name,
            report.failures.len()
        ));
        Ok(report)
    }

    /// Remove mods by filename. Returns the filenames that were present.
    pub fn remove_mods(&self, name: &str, filenames: &[String]) -> Result<Vec<String>, ManagerError> {
        let mut instance = self.load_instance(name)?;
        let removed: Vec<String> = filenames
            .iter()
            .filter(|filename| instance.remove_mod(filename))
            .cloned()
            .collect();

        self.store.save_instance(&instance)?;
        for filename in &removed {
            log_info(&format!("Removed mod: {}", filename));
        }
        Ok(removed)
    }

    /// Add every library mod the instance lacks. Returns `(added, skipped)`.
    pub fn scan_library(&self, name: &str) -> Result<(usize, usize), ManagerError> {
        let mut instance = self.load_instance(name)?;
        let counts = importer::add_library_mods(&self.store, &mut instance);
        self.store.save_instance(&instance)?;

        log_info(&format!(
            "Added {} mod(s) from library, skipped {} already in instance",
            counts.0, counts.1
        ));
        Ok(counts)
    }

    /// Flip a mod's enabled flag. Links change on the next activation.
    pub fn set_mod_enabled(
        &self,
        name: &str,
        filename: &str,
        enabled: bool,
    ) -> Result<(), ManagerError> {
        let mut instance = self.load_instance(name)?;
        if !instance.set_enabled(filename, enabled) {
            return Err(ManagerError::ModNotFound {
                instance: name.to_string(),
                filename: filename.to_string(),
            });
        }
        self.store.save_instance(&instance)?;

        let status = if enabled { "enabled" } else { "disabled" };
        log_info(&format!("Mod '{}' {}", filename, status));
        Ok(())
    }

    pub fn library_mods(&self) -> Vec<Mod> {
        self.store.list_library_mods()
    }

    // ------------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------------

    /// Link an instance into the game and record it as active.
    pub fn activate_instance(&mut self, name: &str) -> Result<ActivationReport, ManagerError> {
        let instance = self.load_instance(name)?;
        let report = self.linker.activate(&instance)?;

        self.state.active_instance = Some(name.to_string());
        self.store.save_state(&self.state)?;
        Ok(report)
    }

    /// Remove all managed links and clear the active instance.
    pub fn deactivate(&mut self) -> Result<usize, ManagerError> {
        let removed = self.linker.deactivate()?;

        self.state.active_instance = None;
        self.store.save_state(&self.state)?;
        Ok(removed)
    }

    pub fn verify_instance(&self, name: &str) -> Result<Vec<String>, ManagerError> {
        Ok(verify_mods(&self.load_instance(name)?))
    }

    pub fn instance_conflicts(&self, name: &str) -> Result<Vec<Conflict>, ManagerError> {
        Ok(detect_conflicts(&self.load_instance(name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Session {
        _temp: TempDir,
        downloads: PathBuf,
        game_dir: PathBuf,
        manager: ModManager,
    }

    fn session() -> Session {
        let temp = TempDir::new().unwrap();
        let downloads = temp.path().join("downloads");
        let steam_root = temp.path().join("steam");
        let game_dir = steam_root.join("steamapps/Paks");
        fs::create_dir_all(&downloads).unwrap();
        fs::create_dir_all(&game_dir).unwrap();

        let store = DataStore::open(temp.path().join("data")).unwrap();
        let resolution = Ok(GamePaths {
            mods_dir: game_dir.clone(),
            steamapps: steam_root.join("steamapps"),
            steam_root,
        });
        let manager = ModManager::with_resolution(store, resolution);

        Session {
            _temp: temp,
            downloads,
            game_dir,
            manager,
        }
    }

    fn download(session: &Session, filename: &str) -> PathBuf {
        let path = session.downloads.join(filename);
        fs::write(&path, filename).unwrap();
        path
    }

    #[test]
    fn remembers_resolved_steam_root() {
        let s = session();
        let saved = s.manager.store().load_state();
        assert!(saved.steam_path.unwrap().ends_with("steam"));
    }

    #[test]
    fn session_keeps_the_state_it_was_given() {
        let temp = TempDir::new().unwrap();
        let store = DataStore::open(temp.path().join("data")).unwrap();
        store
            .save_state(&AppState {
                active_instance: Some("OnDisk".to_string()),
                steam_path: None,
            })
            .unwrap();

        let given = AppState {
            active_instance: Some("Loaded".to_string()),
            steam_path: None,
        };
        let manager = ModManager::from_parts(store, given, Err(ResolveError::SteamNotFound));
        assert_eq!(manager.active_instance(), Some("Loaded"));
    }

    #[test]
    fn activation_is_recorded_and_guards_delete() {
        let mut s = session();
        s.manager.create_instance("Main").unwrap();
        let pak = download(&s, "a.pak");
        s.manager.add_files("Main", &[pak]).unwrap();

        let report = s.manager.activate_instance("Main").unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(s.manager.active_instance(), Some("Main"));
        assert_eq!(
            s.manager.store().load_state().active_instance.as_deref(),
            Some("Main")
        );
        assert!(s.game_dir.join("ronmgr_a.pak").is_symlink());

        assert!(matches!(
            s.manager.delete_instance("Main"),
            Err(ManagerError::Store(StoreError::InstanceActive(_)))
        ));

        assert_eq!(s.manager.deactivate().unwrap(), 1);
        assert_eq!(s.manager.store().load_state().active_instance, None);
        s.manager.delete_instance("Main").unwrap();
        assert!(s.manager.list_instances().is_empty());
    }

    #[test]
    fn toggle_persists_and_applies_on_next_activation() {
        let mut s = session();
        s.manager.create_instance("Main").unwrap();
        let paks = [download(&s, "a.pak"), download(&s, "b.pak")];
        s.manager.add_files("Main", &paks).unwrap();

        s.manager.set_mod_enabled("Main", "b.pak", false).unwrap();
        let reloaded = s.manager.load_instance("Main").unwrap();
        assert_eq!(reloaded.enabled_mods().count(), 1);

        s.manager.activate_instance("Main").unwrap();
        let links: Vec<_> = s.manager.managed_links().into_iter().map(|l| l.name).collect();
        assert_eq!(links, vec!["ronmgr_a.pak"]);

        assert!(matches!(
            s.manager.set_mod_enabled("Main", "zzz.pak", true),
            Err(ManagerError::ModNotFound { .. })
        ));
    }

    #[test]
    fn scan_and_remove_round_out_editing() {
        let s = session();
        let pak = download(&s, "shared.pak");
        s.manager.store().import_package(&pak).unwrap();
        s.manager.create_instance("Main").unwrap();

        assert_eq!(s.manager.scan_library("Main").unwrap(), (1, 0));
        assert_eq!(s.manager.scan_library("Main").unwrap(), (0, 1));

        let removed = s
            .manager
            .remove_mods("Main", &["shared.pak".to_string(), "other.pak".to_string()])
            .unwrap();
        assert_eq!(removed, vec!["shared.pak".to_string()]);
        assert!(s.manager.load_instance("Main").unwrap().mods.is_empty());
        // The library copy stays
        assert_eq!(s.manager.library_mods().len(), 1);
    }

    #[test]
    fn missing_instances_are_errors() {
        let mut s = session();
        assert!(matches!(
            s.manager.activate_instance("Nope"),
            Err(ManagerError::InstanceNotFound(_))
        ));
        assert!(matches!(
            s.manager.delete_instance("Nope"),
            Err(ManagerError::InstanceNotFound(_))
        ));
        assert_eq!(s.manager.active_instance(), None);
    }

    #[test]
    fn unresolved_game_blocks_activation_only() {
        let temp = TempDir::new().unwrap();
        let store = DataStore::open(temp.path().join("data")).unwrap();
        let mut manager = ModManager::with_resolution(store, Err(ResolveError::SteamNotFound));
        manager.create_instance("Main").unwrap();

        assert!(matches!(
            manager.activate_instance("Main"),
            Err(ManagerError::Activation(ActivationError::GameDirectoryUnavailable))
        ));
        assert_eq!(manager.active_instance(), None);
        assert!(manager.verify_instance("Main").unwrap().is_empty());
        assert!(manager.store().load_state().steam_path.is_none());
    }
}
