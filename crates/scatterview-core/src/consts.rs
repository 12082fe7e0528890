/// Scans decoded and reduced together in one batch of the statistics pass.
/// Cancellation is checked between batches.
pub const DEFAULT_STATS_BATCH_SIZE: usize = 8;

/// Minimum batch length for which the per-scan load+reduce step fans out to Rayon.
pub const PARALLEL_SCAN_THRESHOLD: usize = 2;

/// EDF headers are padded with spaces to a multiple of this many bytes.
pub const EDF_BLOCK_SIZE: usize = 512;

/// Leading magic of a NumPy `.npy` file.
pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Per-call timeout applied to every remote store request.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

/// Page size requested when listing a remote container.
pub const DEFAULT_LIST_PAGE_SIZE: usize = 100;

/// First backoff delay between remote retries; doubles per attempt.
pub const RETRY_INITIAL_BACKOFF_MS: u64 = 100;

/// Upper bound on the backoff delay between remote retries.
pub const RETRY_MAX_BACKOFF_MS: u64 = 2_000;

/// File extension of scans in a local data directory.
pub const DEFAULT_DATA_EXTENSION: &str = ".edf";

/// Mask file looked up inside the local data directory.
pub const DEFAULT_LOCAL_MASK_FILE: &str = "new_mask.npy";

/// Local data directory used in DEV mode.
pub const DEFAULT_DATA_LOCAL_PATH: &str = "../new_camera";

/// Right-hand scan index forced in DEV mode.
pub const DEV_MODE_RIGHT_INDEX: usize = 0;

/// Environment key: remote store URI of the scan container.
pub const ENV_TILED_URI_IMAGES: &str = "TILED_URI_IMAGES";

/// Environment key: remote store URI of the detector mask array.
pub const ENV_TILED_URI_MASK: &str = "TILED_URI_MASK";

/// Environment key: API key for the scan container.
pub const ENV_TILED_API_KEY_IMAGES: &str = "TILED_API_KEY_IMAGES";

/// Environment key: API key for the mask array.
pub const ENV_TILED_API_KEY_MASK: &str = "TILED_API_KEY_MASK";
