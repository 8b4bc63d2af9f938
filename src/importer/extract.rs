//! Archive extraction backends
//!
//! Zip archives are unpacked in-process. 7z and rar archives are handed to the
//! `7z` and `unrar` command line tools, which are looked up on `PATH` once per
//! extractor and remembered.

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use super::ImportError;
use crate::logging::log_info;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
    Rar,
}

impl ArchiveFormat {
    pub const EXTENSIONS: &'static [&'static str] = &["zip", "7z", "rar"];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "zip" => Some(ArchiveFormat::Zip),
            "7z" => Some(ArchiveFormat::SevenZip),
            "rar" => Some(ArchiveFormat::Rar),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_extension(path.extension()?.to_str()?)
    }

    /// External tool needed for this format, if any
    pub fn tool(self) -> Option<&'static str> {
        match self {
            ArchiveFormat::Zip => None,
            ArchiveFormat::SevenZip => Some(SEVEN_ZIP),
            ArchiveFormat::Rar => Some(UNRAR),
        }
    }
}

const SEVEN_ZIP: &str = "7z";
const UNRAR: &str = "unrar";

// ============================================================================
// Extractor capability
// ============================================================================

/// One extraction method per supported format.
pub trait Extractor {
    fn extract_zip(&self, archive: &Path, dest: &Path) -> Result<(), ImportError>;
    fn extract_7z(&self, archive: &Path, dest: &Path) -> Result<(), ImportError>;
    fn extract_rar(&self, archive: &Path, dest: &Path) -> Result<(), ImportError>;

    /// Whether the format can be extracted on this system
    fn supports(&self, format: ArchiveFormat) -> bool;

    fn extract(&self, format: ArchiveFormat, archive: &Path, dest: &Path) -> Result<(), ImportError> {
        match format {
            ArchiveFormat::Zip => self.extract_zip(archive, dest),
            ArchiveFormat::SevenZip => self.extract_7z(archive, dest),
            ArchiveFormat::Rar => self.extract_rar(archive, dest),
        }
    }
}

/// Built-in zip support plus the system's `7z` and `unrar` binaries
#[derive(Debug, Default)]
pub struct SystemExtractor {
    search_dirs: Option<Vec<PathBuf>>,
    seven_zip: OnceLock<Option<PathBuf>>,
    unrar: OnceLock<Option<PathBuf>>,
}

impl SystemExtractor {
    /// Extractor that looks tools up on `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor that only looks for tools in `dirs`
    pub fn with_search_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs: Some(dirs),
            ..Self::default()
        }
    }

    fn cache_for(&self, tool: &str) -> &OnceLock<Option<PathBuf>> {
        if tool == UNRAR {
            &self.unrar
        } else {
            &self.seven_zip
        }
    }

    /// Location of an external tool, resolved on first use
    pub fn tool_path(&self, tool: &str) -> Option<&Path> {
        self.cache_for(tool)
            .get_or_init(|| {
                let found = find_executable(tool, self.search_dirs.as_deref());
                if let Some(path) = &found {
                    log_info(&format!("Using {} at {}", tool, path.display()));
                }
                found
            })
            .as_deref()
    }

    pub fn tool_available(&self, tool: &str) -> bool {
        self.tool_path(tool).is_some()
    }

    fn run_tool(&self, tool: &str, args: &[&OsStr]) -> Result<(), ImportError> {
        let program = self
            .tool_path(tool)
            .ok_or_else(|| ImportError::ToolNotAvailable(tool.to_string()))?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ImportError::ToolNotAvailable(tool.to_string()),
                _ => ImportError::ExtractionFailed {
                    tool: tool.to_string(),
                    message: e.to_string(),
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ImportError::ExtractionFailed {
                tool: tool.to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

impl Extractor for SystemExtractor {
    fn extract_zip(&self, archive: &Path, dest: &Path) -> Result<(), ImportError> {
        let file = fs::File::open(archive).map_err(ImportError::Scratch)?;
        let mut zip = zip::ZipArchive::new(file)?;
        zip.extract(dest)?;
        Ok(())
    }

    fn extract_7z(&self, archive: &Path, dest: &Path) -> Result<(), ImportError> {
        let out_flag = format!("-o{}", dest.display());
        self.run_tool(
            SEVEN_ZIP,
            &[OsStr::new("x"), OsStr::new("-y"), archive.as_os_str(), OsStr::new(&out_flag)],
        )
    }

    fn extract_rar(&self, archive: &Path, dest: &Path) -> Result<(), ImportError> {
        // unrar treats the destination as a directory only with a trailing slash
        let dest_dir = format!("{}/", dest.display());
        self.run_tool(
            UNRAR,
            &[OsStr::new("x"), OsStr::new("-y"), archive.as_os_str(), OsStr::new(&dest_dir)],
        )
    }

    fn supports(&self, format: ArchiveFormat) -> bool {
        format.tool().map_or(true, |tool| self.tool_available(tool))
    }
}

/// Find an executable named `tool` in `dirs`, or on `PATH` when `dirs` is `None`.
fn find_executable(tool: &str, dirs: Option<&[PathBuf]>) -> Option<PathBuf> {
    let candidates: Vec<PathBuf> = match dirs {
        Some(dirs) => dirs.to_vec(),
        None => env::var_os("PATH")
            .map(|path| env::split_paths(&path).collect())
            .unwrap_or_default(),
    };

    candidates
        .into_iter()
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
