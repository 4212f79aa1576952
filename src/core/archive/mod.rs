// ─── Archive extraction ───
// Whole-archive and single-member extraction, plus scoped scratch directories.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{InstallerError, InstallerResult};

/// Extraction capability used by the installer front-ends and the processor
/// pipeline. Only "extract everything" and "extract one named member" are needed.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into `dest`. With a `selector`, only the matching
    /// member is written. Returns the paths written.
    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        selector: Option<&str>,
    ) -> InstallerResult<Vec<PathBuf>>;

    /// Read one member fully into memory, `None` if it is absent.
    fn read_member(&self, archive: &Path, member: &str) -> InstallerResult<Option<Vec<u8>>>;
}

/// `zip`-backed extractor (jars and installer archives are zip files).
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

/// A selector with no `/` matches a member by file name anywhere in the archive.
fn selector_matches(member: &str, selector: &str) -> bool {
    if member == selector {
        return true;
    }
    !selector.contains('/') && member.rsplit('/').next() == Some(selector)
}

fn open_zip(archive: &Path) -> InstallerResult<zip::ZipArchive<std::fs::File>> {
    let file = std::fs::File::open(archive).map_err(|e| InstallerError::io(archive, e))?;
    Ok(zip::ZipArchive::new(file)?)
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        selector: Option<&str>,
    ) -> InstallerResult<Vec<PathBuf>> {
        let mut zip = open_zip(archive)?;
        std::fs::create_dir_all(dest).map_err(|e| InstallerError::io(dest, e))?;

        let mut written = Vec::new();
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index)?;
            if let Some(selector) = selector {
                if !selector_matches(entry.name(), selector) {
                    continue;
                }
            }

            let Some(relative) = entry.enclosed_name() else {
                return Err(InstallerError::Other(format!(
                    "Unsafe archive entry path: {}",
                    entry.name()
                )));
            };
            let out_path = dest.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&out_path).map_err(|e| InstallerError::io(&out_path, e))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
            }

            let mut out =
                std::fs::File::create(&out_path).map_err(|e| InstallerError::io(&out_path, e))?;
            std::io::copy(&mut entry, &mut out).map_err(|e| InstallerError::io(&out_path, e))?;
            written.push(out_path);
        }

        debug!(
            "Extracted {} entries from {:?} into {:?}",
            written.len(),
            archive,
            dest
        );
        Ok(written)
    }

    fn read_member(&self, archive: &Path, member: &str) -> InstallerResult<Option<Vec<u8>>> {
        let mut zip = open_zip(archive)?;
        let mut entry = match zip.by_name(member) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| InstallerError::io(archive, e))?;
        Ok(Some(bytes))
    }
}

/// Uniquely named working directory, removed when dropped on every exit path.
#[derive(Debug)]
pub struct ScratchDir {
    dir: tempfile::TempDir,
}

impl ScratchDir {
    /// Create `<parent>/<prefix>XXXXXX`, creating `parent` if needed.
    pub fn new_in(parent: &Path, prefix: &str) -> InstallerResult<Self> {
        std::fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map_err(|e| InstallerError::io(parent, e))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
