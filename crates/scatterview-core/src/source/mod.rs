pub mod list;
pub mod local;
pub mod remote;
pub mod tiled;

use tracing::info;

use crate::config::SourceSettings;
use crate::error::Result;
use crate::scan::{Mask, ScanImage};

pub use list::ScanList;
pub use local::LocalDirectorySource;
pub use remote::{ArrayStore, RemoteStoreSource};

/// Where a source's scans come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    Remote,
}

/// A collection of detector scans plus the mask shared by all of them.
///
/// Both variants return arrays with the same element type and shape contract,
/// so everything downstream is source-agnostic.
pub trait ScanSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Stable human-readable location, e.g. a directory or store URI.
    fn location(&self) -> String;

    /// Ordered scan identifiers, excluding the mask.
    fn list(&self) -> Result<ScanList>;

    /// Full-resolution image for one identifier.
    fn load(&self, id: &str) -> Result<ScanImage>;

    fn load_mask(&self) -> Result<Mask>;
}

/// Resolve the scan listing and the detector mask of a source.
pub fn resolve(source: &dyn ScanSource) -> Result<(ScanList, Mask)> {
    let scans = source.list()?;
    let mask = source.load_mask()?;
    info!(
        source = %source.location(),
        scans = scans.len(),
        mask_shape = ?mask.shape(),
        selected_pixels = mask.selected_count(),
        "Resolved scan source"
    );
    Ok((scans, mask))
}

/// Build the source variant named by `settings`.
///
/// Remote sources connect both store clients here; no request is sent until
/// the first listing or load.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn ScanSource>> {
    match settings {
        SourceSettings::Local(local) => Ok(Box::new(LocalDirectorySource::new(local.clone()))),
        SourceSettings::Remote(remote) => Ok(Box::new(RemoteStoreSource::connect(remote)?)),
    }
}
