use ndarray::Array2;
use tracing::debug;

use crate::config::RemoteSettings;
use crate::error::Result;
use crate::scan::{Mask, MaskPolarity, ScanImage};

use super::tiled::TiledClient;
use super::{ScanList, ScanSource, SourceKind};

/// Client for one node of an array-serving store.
pub trait ArrayStore: Send + Sync {
    /// URI this client was connected with.
    fn uri(&self) -> &str;

    /// Keys of the node's children, in the order the store returns them.
    fn list_scan_options(&self) -> Result<Vec<String>>;

    /// Read the node itself as a 2-D array.
    fn read(&self) -> Result<Array2<f64>>;

    /// Read the child `key` of this node as a 2-D array.
    fn read_child(&self, key: &str) -> Result<Array2<f64>>;
}

/// Scans served by a remote store, with the mask held at a second,
/// independently configured location.
pub struct RemoteStoreSource {
    images: Box<dyn ArrayStore>,
    mask: Box<dyn ArrayStore>,
    mask_file_name: String,
    polarity: MaskPolarity,
}

impl RemoteStoreSource {
    pub fn new(
        images: Box<dyn ArrayStore>,
        mask: Box<dyn ArrayStore>,
        mask_file_name: impl Into<String>,
        polarity: MaskPolarity,
    ) -> Self {
        Self {
            images,
            mask,
            mask_file_name: mask_file_name.into(),
            polarity,
        }
    }

    pub fn connect(settings: &RemoteSettings) -> Result<Self> {
        let images = TiledClient::connect(
            &settings.images_uri,
            &settings.images_api_key,
            &settings.options,
        )?;
        let mask = TiledClient::connect(
            &settings.mask_uri,
            &settings.mask_api_key,
            &settings.options,
        )?;
        Ok(Self::new(
            Box::new(images),
            Box::new(mask),
            settings.mask_file_name(),
            settings.mask_polarity,
        ))
    }
}

impl ScanSource for RemoteStoreSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    fn location(&self) -> String {
        self.images.uri().to_string()
    }

    fn list(&self) -> Result<ScanList> {
        let raw = self.images.list_scan_options()?;
        let listed = raw.len();
        let ids = normalize_identifiers(raw, &self.mask_file_name);
        debug!(
            uri = self.images.uri(),
            listed,
            kept = ids.len(),
            mask = %self.mask_file_name,
            "Listed remote scans"
        );
        Ok(ScanList::new(ids))
    }

    fn load(&self, id: &str) -> Result<ScanImage> {
        let data = self.images.read_child(id)?;
        Ok(ScanImage::new(id, data))
    }

    fn load_mask(&self) -> Result<Mask> {
        let values = self.mask.read()?;
        Ok(Mask::from_values(values, self.polarity))
    }
}

/// Strip one leading `/` from each identifier and drop the mask's own entry.
pub fn normalize_identifiers(raw: Vec<String>, mask_file_name: &str) -> Vec<String> {
    raw.into_iter()
        .map(|id| match id.strip_prefix('/') {
            Some(rest) => rest.to_string(),
            None => id,
        })
        .filter(|id| id != mask_file_name)
        .collect()
}
