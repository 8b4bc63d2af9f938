//! Getting mod packages into the library and into instances
//!
//! Archives are unpacked into a scratch directory, every `.pak` inside them
//! (at any depth) is copied into the library, and the scratch directory is
//! dropped afterwards. Library duplicates are skipped silently.

mod extract;

pub use extract::{ArchiveFormat, Extractor, SystemExtractor};

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::game;
use crate::logging::{log_import, log_warning};
use crate::models::{Instance, Mod};
use crate::store::DataStore;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Archive file not found: {}", .0.display())]
    ArchiveNotFound(PathBuf),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Extraction tool not found: {0}")]
    ToolNotAvailable(String),
    #[error("{tool} extraction failed: {message}")]
    ExtractionFailed { tool: String, message: String },
    #[error("zip extraction failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("No .pak files found in archive")]
    NoPackagesFound,
    #[error("Failed to import: {0}")]
    PackageImportFailed(String),
    #[error("Scratch directory error: {0}")]
    Scratch(io::Error),
}

// ============================================================================
// Archives
// ============================================================================

/// Whether `path` is something the importer accepts (a package or an archive)
pub fn is_supported_file(path: &Path) -> bool {
    game::is_package_file(path) || ArchiveFormat::from_path(path).is_some()
}

/// Import every package contained in an archive.
///
/// Returns the mods newly added to the library; the error, if any, explains
/// why nothing could be imported.
pub fn import_archive(
    store: &DataStore,
    extractor: &dyn Extractor,
    archive: &Path,
) -> (Vec<Mod>, Option<ImportError>) {
    match harvest_archive(store, extractor, archive) {
        Ok(harvest) => (harvest.imported, None),
        Err(e) => {
            log_warning(&format!("Archive error ({}): {}", archive.display(), e));
            (Vec::new(), Some(e))
        }
    }
}

/// Packages found in one archive, split by whether the library already had them
#[derive(Debug, Default)]
struct ArchiveHarvest {
    imported: Vec<Mod>,
    existing: Vec<Mod>,
}

fn harvest_archive(
    store: &DataStore,
    extractor: &dyn Extractor,
    archive: &Path,
) -> Result<ArchiveHarvest, ImportError> {
    if !archive.is_file() {
        return Err(ImportError::ArchiveNotFound(archive.to_path_buf()));
    }

    let format = ArchiveFormat::from_path(archive).ok_or_else(|| {
        ImportError::UnsupportedFormat(extension_label(archive))
    })?;

    // Removed on drop, whatever happens below
    let scratch = tempfile::Builder::new()
        .prefix("ronmgr-extract-")
        .tempdir()
        .map_err(ImportError::Scratch)?;

    extractor.extract(format, archive, scratch.path())?;

    let packages = collect_packages(scratch.path());
    if packages.is_empty() {
        return Err(ImportError::NoPackagesFound);
    }

    let mut harvest = ArchiveHarvest::default();
    for pak in &packages {
        match store.import_package(pak) {
            Some(entry) => harvest.imported.push(entry),
            None => {
                if let Some(entry) = library_copy_of(store, pak) {
                    harvest.existing.push(entry);
                }
            }
        }
    }

    log_import(&format!(
        "{}: {} package(s) found, {} new",
        archive.display(),
        packages.len(),
        harvest.imported.len()
    ));

    Ok(harvest)
}

/// Every package file below `root`, in a stable order
pub fn collect_packages(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && game::is_package_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// The library record for a package whose filename is already taken
fn library_copy_of(store: &DataStore, package: &Path) -> Option<Mod> {
    let filename = package.file_name()?.to_str()?;
    store.find_library_mod(filename)
}

fn extension_label(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_else(|| "(no extension)".to_string())
}

// ============================================================================
// Adding files to an instance
// ============================================================================

/// A file that could not be added
#[derive(Debug)]
pub struct ImportFailure {
    pub source: PathBuf,
    pub error: ImportError,
}

/// Result of adding a batch of files to an instance
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Filenames newly added to the instance
    pub added: Vec<String>,
    /// Filenames the instance already had
    pub already_present: Vec<String>,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    fn offer(&mut self, instance: &mut Instance, entry: Mod) {
        let filename = entry.filename.clone();
        if instance.add_mod(entry) {
            log_import(&format!("Added to '{}': {}", instance.name, filename));
            self.added.push(filename);
        } else {
            self.already_present.push(filename);
        }
    }

    fn fail(&mut self, source: &Path, error: ImportError) {
        log_warning(&format!("{}: {}", source.display(), error));
        self.failures.push(ImportFailure {
            source: source.to_path_buf(),
            error,
        });
    }
}

/// Import packages and archives and add the results to `instance`.
///
/// Each file is handled on its own; a failure is recorded and the batch goes
/// on. Packages already in the library, loose or inside an archive, are added
/// from the library copy. The caller persists the instance afterwards.
pub fn import_files<P: AsRef<Path>>(
    store: &DataStore,
    extractor: &dyn Extractor,
    instance: &mut Instance,
    paths: &[P],
) -> ImportReport {
    let mut report = ImportReport::default();

    for path in paths {
        let path = path.as_ref();

        if ArchiveFormat::from_path(path).is_some() {
            match harvest_archive(store, extractor, path) {
                Ok(harvest) => {
                    for entry in harvest.imported.into_iter().chain(harvest.existing) {
                        report.offer(instance, entry);
                    }
                }
                Err(error) => report.fail(path, error),
            }
        } else if game::is_package_file(path) {
            let entry = store
                .import_package(path)
                .or_else(|| library_copy_of(store, path));
            match entry {
                Some(entry) => report.offer(instance, entry),
                None => report.fail(
                    path,
                    ImportError::PackageImportFailed(
                        path.file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_else(|| path.display().to_string()),
                    ),
                ),
            }
        } else {
            report.fail(path, ImportError::UnsupportedFormat(extension_label(path)));
        }
    }

    report
}

/// Add every library mod the instance does not have yet.
///
/// Returns `(added, skipped)`.
pub fn add_library_mods(store: &DataStore, instance: &mut Instance) -> (usize, usize) {
    let mut added = 0;
    let mut skipped = 0;

    for entry in store.list_library_mods() {
        if instance.add_mod(entry) {
            added += 1;
        } else {
            skipped += 1;
        }
    }

    (added, skipped)
}
