use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for attacher operations
pub type AttachResult<T> = Result<T, AttachError>;

/// Result type for backend and uploadable I/O
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for remote fetches
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Error kinds recorded on an attacher after a rejected assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TooLarge,
    InvalidContentType,
    InvalidExtension,
    DownloadFailed,
}

impl ErrorKind {
    /// Stable snake_case name, suitable as a message lookup key
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TooLarge => "too_large",
            ErrorKind::InvalidContentType => "invalid_content_type",
            ErrorKind::InvalidExtension => "invalid_extension",
            ErrorKind::DownloadFailed => "download_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error returned by the attacher
#[derive(Error, Debug)]
pub enum AttachError {
    #[error("Invalid attachment: {kind}")]
    Invalid { kind: ErrorKind },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AttachError {
    /// Create an invalid-attachment error
    pub fn invalid(kind: ErrorKind) -> Self {
        Self::Invalid { kind }
    }

    /// True for validation failures that a form layer turns into field messages
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    /// The validation kind, if this is an `Invalid` error
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Invalid { kind } => Some(*kind),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AttachError {
    fn from(source: std::io::Error) -> Self {
        Self::Storage(StorageError::Io(source))
    }
}

/// Infrastructure failures raised by backends. Never suppressed by `raise_errors`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {id}")]
    NotFound { id: String },

    #[error("Invalid file identifier: {id}")]
    InvalidId { id: String },

    #[error("Operation not supported by this backend")]
    Unsupported,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an invalid identifier error
    pub fn invalid_id<S: Into<String>>(id: S) -> Self {
        Self::InvalidId { id: id.into() }
    }

    /// Whether the error means the content is absent
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Transport failures while fetching a remote URL
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Maximum of {limit} redirects reached fetching {url}")]
    MaxRedirectsReached { url: String, limit: usize },

    #[error("Redirect from {url} has no usable Location header")]
    MissingLocation { url: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP transport error: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
}

impl DownloadError {
    pub(crate) fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Transport { source: error }
        }
    }
}
