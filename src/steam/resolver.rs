//! Locating the game's mod directory inside its Proton prefix
//!
//! Each Steam library root is probed in order. A root without the game's app
//! manifest is skipped; a root with the manifest is authoritative, so any
//! validation failure there ends the search.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::paths::{find_library_roots, steam_root_of, STEAM_INSTALL_PATHS};
use crate::game::{self, GAME_NAME, INSTALL_DIR, STEAM_APP_ID};
use crate::logging::{log_error, log_info};

// ============================================================================
// Errors
// ============================================================================

/// Why the game's mod directory could not be resolved
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Steam installation not detected (native or Flatpak)")]
    SteamNotFound,

    #[error("Ready or Not is not installed in any detected Steam library (checked {roots_checked})")]
    GameNotInstalled { roots_checked: usize },

    #[error("Ready or Not is registered in Steam but game files are missing at {}", .game_dir.display())]
    GameFilesMissing { game_dir: PathBuf },

    #[error("Ready or Not is installed, but the Proton prefix does not exist at {}", .prefix.display())]
    PrefixMissing { prefix: PathBuf },

    #[error("Proton prefix exists but appears incomplete: {} is missing", .appdata_local.display())]
    PrefixIncomplete { appdata_local: PathBuf },

    #[error("Failed to create mod directory {}: {source}", .path.display())]
    DirectoryCreateFailed { path: PathBuf, source: io::Error },
}

impl ResolveError {
    /// What the user should do about it
    pub fn hint(&self) -> String {
        match self {
            ResolveError::SteamNotFound => format!(
                "Expected locations:\n{}",
                STEAM_INSTALL_PATHS
                    .iter()
                    .map(|p| format!("  ~/{}/steamapps", p))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
            ResolveError::GameNotInstalled { .. } => {
                format!("Please install {} from Steam.", GAME_NAME)
            }
            ResolveError::GameFilesMissing { .. } => format!(
                "Please verify the game files in Steam:\n\
                 Right-click {} -> Properties -> Installed Files -> Verify integrity",
                GAME_NAME
            ),
            ResolveError::PrefixMissing { .. } => {
                "Please launch the game once in Steam to generate the Proton prefix.".to_string()
            }
            ResolveError::PrefixIncomplete { .. } => {
                "Please launch the game once to complete prefix initialization.".to_string()
            }
            ResolveError::DirectoryCreateFailed { .. } => {
                "Check the permissions of the Proton prefix directory.".to_string()
            }
        }
    }
}

// ============================================================================
// Probing
// ============================================================================

/// Outcome of checking a single library root
#[derive(Debug)]
pub enum Probe {
    /// The mod directory, validated (and created if it was missing)
    Found(PathBuf),
    /// The game is not in this library
    KeepSearching,
    /// The game belongs to this library but something is wrong with it
    Fatal(ResolveError),
}

/// Where the game lives inside one library root
#[derive(Debug, Clone)]
pub struct PrefixLayout {
    pub manifest: PathBuf,
    pub game_dir: PathBuf,
    pub prefix: PathBuf,
    pub appdata_local: PathBuf,
    pub mods_dir: PathBuf,
}

impl PrefixLayout {
    pub fn for_library(steamapps: &Path) -> Self {
        let prefix = steamapps.join("compatdata").join(STEAM_APP_ID).join("pfx");
        let appdata_local = game::APPDATA_LOCAL.iter().fold(
            prefix.join("drive_c/users").join(game::PREFIX_USER),
            |path, part| path.join(part),
        );
        let mods_dir = game::MOD_DIR_TAIL
            .iter()
            .fold(appdata_local.clone(), |path, part| path.join(part));

        Self {
            manifest: steamapps.join(game::manifest_file_name()),
            game_dir: steamapps.join("common").join(INSTALL_DIR),
            prefix,
            appdata_local,
            mods_dir,
        }
    }
}

/// Validate the prerequisites in one library root, creating the mod
/// directory's missing tail when the prefix is otherwise complete.
pub fn probe_library(steamapps: &Path) -> Probe {
    let layout = PrefixLayout::for_library(steamapps);

    if !layout.manifest.exists() {
        return Probe::KeepSearching;
    }

    if !layout.game_dir.exists() {
        return Probe::Fatal(ResolveError::GameFilesMissing {
            game_dir: layout.game_dir,
        });
    }

    if !layout.prefix.exists() {
        return Probe::Fatal(ResolveError::PrefixMissing {
            prefix: layout.prefix,
        });
    }

    if layout.mods_dir.is_dir() {
        return Probe::Found(layout.mods_dir);
    }

    if !layout.appdata_local.is_dir() {
        return Probe::Fatal(ResolveError::PrefixIncomplete {
            appdata_local: layout.appdata_local,
        });
    }

    match fs::create_dir_all(&layout.mods_dir) {
        Ok(()) => {
            log_info(&format!("Created mod directory: {}", layout.mods_dir.display()));
            Probe::Found(layout.mods_dir)
        }
        Err(source) => Probe::Fatal(ResolveError::DirectoryCreateFailed {
            path: layout.mods_dir,
            source,
        }),
    }
}

/// Successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePaths {
    /// Directory the game loads paks from
    pub mods_dir: PathBuf,
    /// Library root (`steamapps`) that holds the game
    pub steamapps: PathBuf,
    /// Steam installation root owning that library
    pub steam_root: PathBuf,
}

/// Search `roots` in order; the first root that is not `KeepSearching` decides.
pub fn resolve_in_roots(roots: &[PathBuf]) -> Result<GamePaths, ResolveError> {
    if roots.is_empty() {
        return Err(ResolveError::SteamNotFound);
    }

    for steamapps in roots {
        match probe_library(steamapps) {
            Probe::KeepSearching => continue,
            Probe::Found(mods_dir) => {
                return Ok(GamePaths {
                    mods_dir,
                    steamapps: steamapps.clone(),
                    steam_root: steam_root_of(steamapps),
                })
            }
            Probe::Fatal(err) => return Err(err),
        }
    }

    Err(ResolveError::GameNotInstalled {
        roots_checked: roots.len(),
    })
}

// ============================================================================
// Locator
// ============================================================================

/// Resolves the game's mod directory for a given home directory
#[derive(Debug, Clone)]
pub struct GameLocator {
    home: PathBuf,
    cached_steam_root: Option<PathBuf>,
}

impl GameLocator {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            cached_steam_root: None,
        }
    }

    /// Locator for the current user's home directory
    pub fn from_env() -> Self {
        Self::new(dirs::home_dir().unwrap_or_default())
    }

    /// Try a previously successful Steam root before the standard locations.
    pub fn with_cached_steam_root(mut self, steam_root: Option<PathBuf>) -> Self {
        self.cached_steam_root = steam_root;
        self
    }

    pub fn library_roots(&self) -> Vec<PathBuf> {
        find_library_roots(&self.home, self.cached_steam_root.as_deref())
    }

    pub fn resolve(&self) -> Result<GamePaths, ResolveError> {
        let result = resolve_in_roots(&self.library_roots());
        match &result {
            Ok(paths) => log_info(&format!(
                "{} mod directory: {}",
                GAME_NAME,
                paths.mods_dir.display()
            )),
            Err(e) => log_error(&format!("Game directory error: {}", e)),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Build a library root with the requested pieces present
    fn fabricate_library(
        base: &Path,
        manifest: bool,
        game_files: bool,
        prefix: bool,
        appdata: bool,
    ) -> PathBuf {
        let steamapps = base.join("steamapps");
        fs::create_dir_all(&steamapps).unwrap();
        let layout = PrefixLayout::for_library(&steamapps);
        if manifest {
            fs::write(&layout.manifest, "\"AppState\" { \"appid\" \"1144200\" }").unwrap();
        }
        if game_files {
            fs::create_dir_all(&layout.game_dir).unwrap();
        }
        if prefix {
            fs::create_dir_all(&layout.prefix).unwrap();
        }
        if appdata {
            fs::create_dir_all(&layout.appdata_local).unwrap();
        }
        steamapps
    }

    #[test]
    fn library_without_manifest_keeps_searching() {
        let temp = TempDir::new().unwrap();
        let lib = fabricate_library(temp.path(), false, true, true, true);
        assert!(matches!(probe_library(&lib), Probe::KeepSearching));
    }

    #[test]
    fn manifest_without_game_files_is_fatal_and_stops_search() {
        let temp = TempDir::new().unwrap();
        let broken = fabricate_library(&temp.path().join("a"), true, false, false, false);
        let healthy = fabricate_library(&temp.path().join("b"), true, true, true, true);

        let err = resolve_in_roots(&[broken, healthy.clone()]).unwrap_err();
        assert!(matches!(err, ResolveError::GameFilesMissing { .. }));

        // The second root was never probed, so its mod dir was not created
        assert!(!PrefixLayout::for_library(&healthy).mods_dir.exists());
    }

    #[test]
    fn missing_prefix_is_reported() {
        let temp = TempDir::new().unwrap();
        let lib = fabricate_library(temp.path(), true, true, false, false);
        let err = resolve_in_roots(&[lib]).unwrap_err();
        assert!(matches!(err, ResolveError::PrefixMissing { .. }));
        assert!(err.hint().contains("launch the game once"));
    }

    #[test]
    fn incomplete_prefix_is_reported() {
        let temp = TempDir::new().unwrap();
        let lib = fabricate_library(temp.path(), true, true, true, false);
        let err = resolve_in_roots(&[lib]).unwrap_err();
        assert!(matches!(err, ResolveError::PrefixIncomplete { .. }));
    }

    #[test]
    fn creates_missing_tail_directories() {
        let temp = TempDir::new().unwrap();
        let lib = fabricate_library(temp.path(), true, true, true, true);
        let expected = PrefixLayout::for_library(&lib).mods_dir;
        assert!(!expected.exists());

        let paths = resolve_in_roots(&[lib.clone()]).unwrap();
        assert_eq!(paths.mods_dir, expected);
        assert!(expected.is_dir());
        assert!(expected.ends_with("AppData/Local/ReadyOrNot/Saved/Paks"));
        assert_eq!(paths.steam_root, temp.path());
    }

    #[test]
    fn blocked_mod_dir_creation_is_fatal() {
        let temp = TempDir::new().unwrap();
        let lib = fabricate_library(temp.path(), true, true, true, true);
        let layout = PrefixLayout::for_library(&lib);
        // A plain file where the game's data folder should be
        fs::write(layout.appdata_local.join("ReadyOrNot"), "not a folder").unwrap();

        match resolve_in_roots(&[lib]) {
            Err(ResolveError::DirectoryCreateFailed { path, .. }) => {
                assert_eq!(path, layout.mods_dir)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn skips_libraries_without_the_game() {
        let temp = TempDir::new().unwrap();
        let empty = fabricate_library(&temp.path().join("a"), false, false, false, false);
        let game = fabricate_library(&temp.path().join("b"), true, true, true, true);

        let paths = resolve_in_roots(&[empty, game.clone()]).unwrap();
        assert_eq!(paths.steamapps, game);
    }

    #[test]
    fn not_installed_counts_roots() {
        let temp = TempDir::new().unwrap();
        let a = fabricate_library(&temp.path().join("a"), false, false, false, false);
        let b = fabricate_library(&temp.path().join("b"), false, false, false, false);

        match resolve_in_roots(&[a, b]) {
            Err(ResolveError::GameNotInstalled { roots_checked }) => assert_eq!(roots_checked, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn locator_without_steam_reports_steam_not_found() {
        let home = TempDir::new().unwrap();
        let err = GameLocator::new(home.path()).resolve().unwrap_err();
        assert!(matches!(err, ResolveError::SteamNotFound));
        assert!(err.hint().contains(".var/app/com.valvesoftware.Steam"));
    }

    #[test]
    fn locator_finds_native_install() {
        let home = TempDir::new().unwrap();
        fabricate_library(&home.path().join(".steam/steam"), true, true, true, true);

        let paths = GameLocator::new(home.path()).resolve().unwrap();
        assert!(paths.mods_dir.starts_with(home.path().join(".steam/steam/steamapps")));
    }
}
