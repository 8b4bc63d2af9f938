use std::{path::PathBuf, sync::LazyLock};

/// Environment variable that relocates the data directory.
pub const DATA_DIR_ENV: &str = "RONMGR_DATA_DIR";

pub static DEFAULT_DATA_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    let mut path = dirs::home_dir().unwrap_or_default();
    path.push(".ron-modmgr");
    path
});

/// Computes a path below the mod manager data directory.
///
/// Returns a `&Path` referencing the data directory itself if no arguments are passed in, or a
/// `PathBuf` created by joining all of the arguments to the base directory if at least
/// one argument is passed in.
///
/// # Examples
///
/// ```
/// // Without `RONMGR_DATA_DIR` the base is ~/.ron-modmgr
/// let logs = ron_modmgr::data_path!("logs");
/// assert_eq!(logs, ron_modmgr::data_path!().join("logs"));
/// ```
#[macro_export]
macro_rules! data_path {
    () => {
        $crate::paths::DEFAULT_DATA_PATH.as_path()
    };

    ( $( $path:expr ),+ $(,)? ) => {
        [
            $crate::paths::DEFAULT_DATA_PATH.as_path(),
            $( std::path::Path::new(&$path) ),+
        ].into_iter().collect::<std::path::PathBuf>()
    };
}
