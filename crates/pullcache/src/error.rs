use std::path::PathBuf;
use std::sync::Arc;

use reqwest::StatusCode;

/// Errors produced while moving a downloaded file into the cache tree
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlaceError {
    #[error("failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("failed to rename {from:?} to {to:?}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("cross-device copy {from:?} to {to:?} failed: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("failed to remove source {path:?} after copy: {source}")]
    RemoveSource {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },
}

impl PlaceError {
    pub(crate) fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PlaceError::CreateDir {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn rename(
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        PlaceError::Rename {
            from: from.into(),
            to: to.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn copy(
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        PlaceError::Copy {
            from: from.into(),
            to: to.into(),
            source: Arc::new(source),
        }
    }
}

/// Errors from one fetch+place pipeline run, tagged by the stage that failed
#[derive(Debug, Clone, thiserror::Error)]
pub enum PullError {
    #[error("Invalid URL: {0}")]
    UrlError(String),

    #[error("Invalid DNS server address: {0}")]
    DnsConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(Arc<reqwest::Error>),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        source: Arc<reqwest::Error>,
    },

    #[error("Origin {url} returned status code {status}")]
    Status { url: String, status: StatusCode },

    #[error("Transfer from {url} failed: {source}")]
    Transfer {
        url: String,
        source: Arc<reqwest::Error>,
    },

    #[error("Temporary file error: {0}")]
    TempFile(Arc<std::io::Error>),

    #[error("Placement failed: {0}")]
    Placement(#[from] PlaceError),

    #[error("Download task aborted: {0}")]
    Aborted(String),
}

impl PullError {
    /// Whether the error happened after a successful download, while
    /// writing into the cache tree. A leftover source after the copy
    /// fallback does not count: the file is already in place.
    pub fn is_fatal(&self) -> bool {
        match self {
            PullError::Placement(PlaceError::RemoveSource { .. }) => false,
            PullError::Placement(_) => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for PullError {
    fn from(err: std::io::Error) -> Self {
        PullError::TempFile(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_placement_is_fatal() {
        let place = PullError::from(PlaceError::create_dir(
            "/cache/a",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        ));
        assert!(place.is_fatal());

        let status = PullError::Status {
            url: "http://example.com/a".to_string(),
            status: StatusCode::NOT_FOUND,
        };
        assert!(!status.is_fatal());
        assert!(!PullError::Aborted("panic".to_string()).is_fatal());
    }

    #[test]
    fn test_leftover_source_is_not_fatal() {
        let err = PullError::from(PlaceError::RemoveSource {
            path: PathBuf::from("/tmp/.pullcache-1.part"),
            source: Arc::new(std::io::Error::from(std::io::ErrorKind::PermissionDenied)),
        });
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_messages_carry_stage_context() {
        let err = PullError::Status {
            url: "http://example.com/a.bin".to_string(),
            status: StatusCode::BAD_GATEWAY,
        };
        let msg = err.to_string();
        assert!(msg.contains("http://example.com/a.bin"));
        assert!(msg.contains("502"));
    }
}
