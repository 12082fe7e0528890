use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_DATA_EXTENSION, DEFAULT_DATA_LOCAL_PATH, DEFAULT_LIST_PAGE_SIZE,
    DEFAULT_LOCAL_MASK_FILE, DEFAULT_REMOTE_TIMEOUT_SECS, DEFAULT_STATS_BATCH_SIZE,
    ENV_TILED_API_KEY_IMAGES, ENV_TILED_API_KEY_MASK, ENV_TILED_URI_IMAGES, ENV_TILED_URI_MASK,
};
use crate::error::{Result, ScanviewError};
use crate::scan::MaskPolarity;
use crate::stats::AccumulateOptions;

/// Static settings for how scans are located, decoded and reduced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding scan files in DEV (local) mode.
    pub data_local_path: PathBuf,
    /// Extension of scan files in the local directory, e.g. ".edf".
    pub data_extension: String,
    /// Mask file inside `data_local_path`.
    pub local_mask_file: String,
    pub mask_polarity: MaskPolarity,
    /// Scans loaded and reduced per parallel batch.
    pub stats_batch_size: usize,
    pub remote_timeout_secs: u64,
    /// Extra attempts for failed remote calls; 0 means a single attempt.
    pub remote_retries: u32,
    pub list_page_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_local_path: PathBuf::from(DEFAULT_DATA_LOCAL_PATH),
            data_extension: DEFAULT_DATA_EXTENSION.to_string(),
            local_mask_file: DEFAULT_LOCAL_MASK_FILE.to_string(),
            mask_polarity: MaskPolarity::default(),
            stats_batch_size: DEFAULT_STATS_BATCH_SIZE,
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            remote_retries: 0,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }
}

impl SourceConfig {
    pub fn local_settings(&self) -> LocalSettings {
        LocalSettings {
            dir: self.data_local_path.clone(),
            extension: self.data_extension.clone(),
            mask_file: self.local_mask_file.clone(),
            mask_polarity: self.mask_polarity,
        }
    }

    pub fn remote_settings(&self, credentials: &StoreCredentials) -> RemoteSettings {
        RemoteSettings {
            images_uri: credentials.images_uri.clone(),
            mask_uri: credentials.mask_uri.clone(),
            images_api_key: credentials.images_api_key.clone(),
            mask_api_key: credentials.mask_api_key.clone(),
            mask_polarity: self.mask_polarity,
            options: RemoteOptions {
                timeout: Duration::from_secs(self.remote_timeout_secs),
                retries: self.remote_retries,
                page_size: self.list_page_size.max(1),
            },
        }
    }

    pub fn accumulate_options(&self) -> AccumulateOptions {
        AccumulateOptions {
            batch_size: self.stats_batch_size.max(1),
        }
    }
}

/// Store locations and credentials as read from the environment.
/// Empty strings count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreEnv {
    pub images_uri: Option<String>,
    pub mask_uri: Option<String>,
    pub images_api_key: Option<String>,
    pub mask_api_key: Option<String>,
}

impl StoreEnv {
    /// Snapshot the relevant process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            images_uri: get(ENV_TILED_URI_IMAGES),
            mask_uri: get(ENV_TILED_URI_MASK),
            images_api_key: get(ENV_TILED_API_KEY_IMAGES),
            mask_api_key: get(ENV_TILED_API_KEY_MASK),
        }
    }

    /// Check every required value before any I/O happens.
    ///
    /// The mask key falls back to the images key so the mask store is never
    /// contacted without a credential.
    pub fn validate(&self) -> Result<StoreCredentials> {
        let missing: Vec<&str> = [
            (ENV_TILED_URI_IMAGES, self.images_uri.is_none()),
            (ENV_TILED_URI_MASK, self.mask_uri.is_none()),
            (ENV_TILED_API_KEY_IMAGES, self.images_api_key.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        match (&self.images_uri, &self.mask_uri, &self.images_api_key) {
            (Some(images_uri), Some(mask_uri), Some(images_api_key)) => Ok(StoreCredentials {
                images_uri: images_uri.clone(),
                mask_uri: mask_uri.clone(),
                images_api_key: images_api_key.clone(),
                mask_api_key: self
                    .mask_api_key
                    .clone()
                    .unwrap_or_else(|| images_api_key.clone()),
            }),
            _ => Err(ScanviewError::MissingConfig(missing.join(", "))),
        }
    }
}

/// Validated store configuration for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreCredentials {
    pub images_uri: String,
    pub mask_uri: String,
    pub images_api_key: String,
    pub mask_api_key: String,
}

impl StoreCredentials {
    /// Identifier of the mask inside the images listing.
    pub fn mask_file_name(&self) -> String {
        mask_file_name(&self.mask_uri)
    }
}

/// Final path segment of a store URI, ignoring a trailing slash and any
/// query string.
pub fn mask_file_name(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocalSettings {
    pub dir: PathBuf,
    pub extension: String,
    pub mask_file: String,
    pub mask_polarity: MaskPolarity,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RemoteSettings {
    pub images_uri: String,
    pub mask_uri: String,
    pub images_api_key: String,
    pub mask_api_key: String,
    pub mask_polarity: MaskPolarity,
    pub options: RemoteOptions,
}

impl RemoteSettings {
    pub fn mask_file_name(&self) -> String {
        mask_file_name(&self.mask_uri)
    }
}

/// Per-call policy for the remote store client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteOptions {
    pub timeout: Duration,
    pub retries: u32,
    pub page_size: usize,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            retries: 0,
            page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }
}

/// Which scan backend a request reads from, chosen once at request setup.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceSettings {
    Local(LocalSettings),
    Remote(RemoteSettings),
}
