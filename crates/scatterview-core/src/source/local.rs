use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::LocalSettings;
use crate::error::Result;
use crate::io::load_array;
use crate::scan::{Mask, MaskPolarity, ScanImage};

use super::{resolve, ScanList, ScanSource, SourceKind};

/// Scans stored as files of one extension in a local directory.
///
/// The listing is sorted by file name so indices stay stable across calls.
/// Nothing is excluded beyond files of another extension; the mask is
/// expected to live under a different extension or name.
pub struct LocalDirectorySource {
    settings: LocalSettings,
}

impl LocalDirectorySource {
    pub fn new(settings: LocalSettings) -> Self {
        Self { settings }
    }

    fn scan_path(&self, id: &str) -> PathBuf {
        self.settings.dir.join(id)
    }
}

impl ScanSource for LocalDirectorySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn location(&self) -> String {
        self.settings.dir.display().to_string()
    }

    fn list(&self) -> Result<ScanList> {
        let wanted = self.settings.extension.trim_start_matches('.');
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.settings.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(wanted));
            if !matches {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        debug!(dir = %self.location(), count = names.len(), "Listed local scans");
        Ok(ScanList::sorted(names))
    }

    fn load(&self, id: &str) -> Result<ScanImage> {
        let data = load_array(&self.scan_path(id))?;
        Ok(ScanImage::new(id, data))
    }

    fn load_mask(&self) -> Result<Mask> {
        let values = load_array(&self.scan_path(&self.settings.mask_file))?;
        Ok(Mask::from_values(values, self.settings.mask_polarity))
    }
}

/// List the scans of `directory` with `extension` and load `mask_filename`
/// from the same directory.
pub fn list_local_files(
    directory: &Path,
    extension: &str,
    mask_filename: &str,
    polarity: MaskPolarity,
) -> Result<(ScanList, Mask)> {
    let source = LocalDirectorySource::new(LocalSettings {
        dir: directory.to_path_buf(),
        extension: extension.to_string(),
        mask_file: mask_filename.to_string(),
        mask_polarity: polarity,
    });
    resolve(&source)
}
