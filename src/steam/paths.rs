//! Steam library discovery
//!
//! Finds every `steamapps` directory that could hold the game: the native and
//! Flatpak installs plus any extra library folders they declare.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::logging::{log_info, log_warning};

/// Steam installation roots relative to `$HOME`, in search order
pub const STEAM_INSTALL_PATHS: &[&str] = &[
    ".steam/steam",
    ".var/app/com.valvesoftware.Steam/.steam/steam",
];

static LIBRARY_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""path"\s+"([^"]+)""#).expect("valid library path pattern"));

/// Extract every `"path" "<value>"` pair from a libraryfolders.vdf document.
pub fn parse_library_paths(content: &str) -> Vec<PathBuf> {
    LIBRARY_PATH_RE
        .captures_iter(content)
        .map(|caps| PathBuf::from(caps[1].replace("\\\\", "\\")))
        .collect()
}

/// Steam installation roots under `home` that exist on disk
pub fn find_steam_installs(home: &Path) -> Vec<PathBuf> {
    STEAM_INSTALL_PATHS
        .iter()
        .map(|relative| home.join(relative))
        .filter(|path| path.exists())
        .collect()
}

/// The `steamapps` directories belonging to one Steam installation.
///
/// The install's own `steamapps` comes first, followed by the extra libraries
/// declared in its `libraryfolders.vdf` that exist on disk.
pub fn library_roots_for_install(install: &Path) -> Vec<PathBuf> {
    let mut roots = Vec::new();

    let main_steamapps = install.join("steamapps");
    if main_steamapps.is_dir() {
        roots.push(main_steamapps.clone());
    }

    let vdf_path = main_steamapps.join("libraryfolders.vdf");
    if vdf_path.exists() {
        match fs::read_to_string(&vdf_path) {
            Ok(content) => {
                for library in parse_library_paths(&content) {
                    let steamapps = library.join("steamapps");
                    if steamapps.is_dir() {
                        roots.push(steamapps);
                    }
                }
            }
            Err(e) => log_warning(&format!(
                "Error parsing {}: {}",
                vdf_path.display(),
                e
            )),
        }
    }

    roots
}

/// All candidate `steamapps` roots, ordered and deduplicated.
///
/// `preferred` (a previously cached Steam root) is searched before the
/// standard install locations when it still exists.
pub fn find_library_roots(home: &Path, preferred: Option<&Path>) -> Vec<PathBuf> {
    let mut installs = Vec::new();
    if let Some(cached) = preferred.filter(|p| p.exists()) {
        installs.push(cached.to_path_buf());
    }
    installs.extend(find_steam_installs(home));

    let mut roots: Vec<PathBuf> = Vec::new();
    let mut seen: Vec<PathBuf> = Vec::new();

    for install in installs {
        for root in library_roots_for_install(&install) {
            // ~/.steam/steam is usually a symlink, compare resolved paths
            let canonical = root.canonicalize().unwrap_or_else(|_| root.clone());
            if seen.contains(&canonical) {
                continue;
            }
            seen.push(canonical);
            roots.push(root);
        }
    }

    log_info(&format!("Found {} Steam library root(s)", roots.len()));
    roots
}

/// The Steam installation a `steamapps` directory belongs to
pub fn steam_root_of(steamapps: &Path) -> PathBuf {
    steamapps
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| steamapps.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_library_paths() {
        let content = r#"
"libraryfolders"
{
    "0"
    {
        "path"      "/home/user/.local/share/Steam"
        "label"     ""
    }
    "1"
    {
        "path"		"/mnt/games/SteamLibrary"
        "label"     "Games"
    }
}
"#;
        let paths = parse_library_paths(content);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/home/user/.local/share/Steam"),
                PathBuf::from("/mnt/games/SteamLibrary"),
            ]
        );
    }

    #[test]
    fn roots_include_existing_extra_libraries_only() {
        let home = TempDir::new().unwrap();
        let install = home.path().join(".steam/steam");
        let extra = home.path().join("games/SteamLibrary");
        fs::create_dir_all(install.join("steamapps")).unwrap();
        fs::create_dir_all(extra.join("steamapps")).unwrap();

        let vdf = format!(
            "\"libraryfolders\"\n{{\n \"0\" {{ \"path\" \"{}\" }}\n \"1\" {{ \"path\" \"{}\" }}\n \"2\" {{ \"path\" \"/nonexistent/lib\" }}\n}}\n",
            install.display(),
            extra.display()
        );
        fs::write(install.join("steamapps/libraryfolders.vdf"), vdf).unwrap();

        let roots = find_library_roots(home.path(), None);
        assert_eq!(roots, vec![install.join("steamapps"), extra.join("steamapps")]);
    }

    #[test]
    fn flatpak_install_is_searched_after_native() {
        let home = TempDir::new().unwrap();
        let native = home.path().join(".steam/steam/steamapps");
        let flatpak = home
            .path()
            .join(".var/app/com.valvesoftware.Steam/.steam/steam/steamapps");
        fs::create_dir_all(&native).unwrap();
        fs::create_dir_all(&flatpak).unwrap();

        assert_eq!(find_library_roots(home.path(), None), vec![native, flatpak]);
    }

    #[test]
    fn no_installs_yields_no_roots() {
        let home = TempDir::new().unwrap();
        assert!(find_library_roots(home.path(), None).is_empty());
    }

    #[test]
    fn preferred_root_goes_first() {
        let home = TempDir::new().unwrap();
        let native = home.path().join(".steam/steam/steamapps");
        let custom = home.path().join("custom/Steam");
        fs::create_dir_all(&native).unwrap();
        fs::create_dir_all(custom.join("steamapps")).unwrap();

        let roots = find_library_roots(home.path(), Some(&custom));
        assert_eq!(roots, vec![custom.join("steamapps"), native]);
        assert_eq!(steam_root_of(&roots[0]), custom);
    }
}
