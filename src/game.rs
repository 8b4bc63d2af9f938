//! Fixed facts about the managed title and its Proton layout

/// Display name of the managed game
pub const GAME_NAME: &str = "Ready or Not";

/// Steam App ID for Ready or Not
pub const STEAM_APP_ID: &str = "1144200";

/// Folder name under `steamapps/common`
pub const INSTALL_DIR: &str = "Ready Or Not";

/// Wine user inside the Proton prefix
pub const PREFIX_USER: &str = "steamuser";

/// Path from the prefix's user profile down to `AppData/Local`
pub const APPDATA_LOCAL: &[&str] = &["AppData", "Local"];

/// Path from `AppData/Local` down to the folder the game scans for paks
pub const MOD_DIR_TAIL: &[&str] = &["ReadyOrNot", "Saved", "Paks"];

/// Extension of a mod package (compared case-insensitively)
pub const PACKAGE_EXTENSION: &str = "pak";

/// Name prefix that marks a symlink as owned by this manager
pub const SYMLINK_PREFIX: &str = "ronmgr_";

/// Name of the app manifest Steam writes for the game
pub fn manifest_file_name() -> String {
    format!("appmanifest_{}.acf", STEAM_APP_ID)
}

/// Returns true if `path` has the package extension.
pub fn is_package_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PACKAGE_EXTENSION))
}
