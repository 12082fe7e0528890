use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanviewError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scan index {index} out of range (total: {total})")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("Invalid EDF file: {0}")]
    InvalidEdf(String),

    #[error("Invalid NPY file: {0}")]
    InvalidNpy(String),

    #[error("Unsupported scan format: {0}")]
    UnsupportedFormat(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid array payload: {0}")]
    InvalidArray(String),

    #[error("Mask shape {mask:?} does not match image shape {image:?}")]
    ShapeMismatch {
        mask: (usize, usize),
        image: (usize, usize),
    },

    #[error("Remote store error at {url}: {message}")]
    Remote { url: String, message: String },

    #[error("Remote store timed out at {url}")]
    Timeout { url: String },

    #[error("Request cancelled")]
    Cancelled,
}

/// Coarse classification used to pick a response status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required configuration absent or malformed.
    Config,
    /// Client asked for a scan index that does not exist.
    Index,
    /// Local file missing, unreadable or undecodable.
    LocalIo,
    /// Remote store unreachable or returned an error.
    RemoteIo,
    /// Remote store did not answer in time.
    Timeout,
    Cancelled,
}

impl ScanviewError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingConfig(_) | Self::InvalidConfig(_) => ErrorKind::Config,
            Self::IndexOutOfRange { .. } => ErrorKind::Index,
            Self::Remote { .. } | Self::InvalidArray(_) => ErrorKind::RemoteIo,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_)
            | Self::InvalidEdf(_)
            | Self::InvalidNpy(_)
            | Self::UnsupportedFormat(_)
            | Self::ImageError(_)
            | Self::ShapeMismatch { .. } => ErrorKind::LocalIo,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote { .. } | Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanviewError>;
