//! Where packaged bytes live.
//!
//! A [`Location`] names a destination; a [`Storage`] backend moves whole
//! byte buffers to and from it. The only distinction the pipeline relies
//! on is [`StorageError::NotFound`] versus everything else.
//!
//! Backends are plain values built by the caller and handed to a
//! [`Router`]; nothing here keeps process-wide clients.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "network")]
pub mod http;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "network")]
pub use http::HttpStorage;
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// A parsed storage destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Local filesystem path (`/path`, `rel/path` or `file:///path`).
    File(PathBuf),
    /// Object in an S3 bucket (`s3://bucket/key`).
    S3 {
        /// Bucket name.
        bucket: String,
        /// Object key, without a leading slash.
        key: String,
    },
    /// Plain HTTP(S) URL, read-only.
    Http(String),
}

impl FromStr for Location {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(StorageError::InvalidLocation(s.to_string()));
        }

        if let Some(rest) = s.strip_prefix("s3://") {
            return match rest.split_once('/') {
                Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Self::S3 {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }),
                _ => Err(StorageError::InvalidLocation(s.to_string())),
            };
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(Self::Http(s.to_string()));
        }

        match s.strip_prefix("file://") {
            Some("") => Err(StorageError::InvalidLocation(s.to_string())),
            Some(path) => Ok(Self::File(PathBuf::from(path))),
            None if s.contains("://") => Err(StorageError::InvalidLocation(s.to_string())),
            None => Ok(Self::File(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
            Self::Http(url) => f.write_str(url),
        }
    }
}

/// Errors raised by storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Nothing exists at the location.
    #[error("tarball not found: {0}")]
    NotFound(String),

    /// Local filesystem failure.
    #[error("{location}: {source}")]
    Io {
        /// Location being accessed.
        location: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// HTTP transfer failure.
    #[cfg(feature = "network")]
    #[error("{location}: {source}")]
    Http {
        /// URL being accessed.
        location: String,
        /// Underlying failure.
        #[source]
        source: reqwest::Error,
    },

    /// S3 request failure, rendered with its full error context.
    #[cfg(feature = "s3")]
    #[error("{location}: {message}")]
    S3 {
        /// Object being accessed.
        location: String,
        /// Rendered SDK error.
        message: String,
    },

    /// The backend cannot perform this operation (HTTP writes).
    #[error("read-only location: {0}")]
    ReadOnly(String),

    /// No backend is configured for this kind of location.
    #[error("no storage backend configured for {0}")]
    Unsupported(String),

    /// The location string could not be parsed.
    #[error("invalid storage location: {0:?}")]
    InvalidLocation(String),
}

impl StorageError {
    /// Whether this is the "nothing there" case callers may tolerate.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A backend that stores and retrieves whole byte buffers.
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Store `data` at `location`, replacing anything already there.
    async fn create(&self, location: &Location, data: Vec<u8>) -> Result<(), StorageError>;

    /// Fetch everything stored at `location`.
    ///
    /// Absence must be reported as [`StorageError::NotFound`].
    async fn open(&self, location: &Location) -> Result<Vec<u8>, StorageError>;
}

/// Dispatches each [`Location`] kind to the backend configured for it.
#[derive(Debug)]
pub struct Router {
    local: LocalStorage,
    #[cfg(feature = "network")]
    http: Option<HttpStorage>,
    #[cfg(feature = "s3")]
    s3: Option<S3Storage>,
}

impl Router {
    /// Local files, plus HTTP(S) reads when the `network` feature is on.
    pub fn new() -> Self {
        Self {
            local: LocalStorage,
            #[cfg(feature = "network")]
            http: Some(HttpStorage::default()),
            #[cfg(feature = "s3")]
            s3: None,
        }
    }

    /// Use `http` for HTTP(S) locations.
    #[cfg(feature = "network")]
    pub fn with_http(mut self, http: HttpStorage) -> Self {
        self.http = Some(http);
        self
    }

    /// Use `s3` for `s3://` locations.
    #[cfg(feature = "s3")]
    pub fn with_s3(mut self, s3: S3Storage) -> Self {
        self.s3 = Some(s3);
        self
    }

    fn backend(&self, location: &Location) -> Result<&dyn Storage, StorageError> {
        let unsupported = || StorageError::Unsupported(location.to_string());
        match location {
            Location::File(_) => Ok(&self.local),
            #[cfg(feature = "network")]
            Location::Http(_) => self
                .http
                .as_ref()
                .map(|b| b as &dyn Storage)
                .ok_or_else(unsupported),
            #[cfg(feature = "s3")]
            Location::S3 { .. } => self
                .s3
                .as_ref()
                .map(|b| b as &dyn Storage)
                .ok_or_else(unsupported),
            #[allow(unreachable_patterns)]
            _ => Err(unsupported()),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for Router {
    async fn create(&self, location: &Location, data: Vec<u8>) -> Result<(), StorageError> {
        self.backend(location)?.create(location, data).await
    }

    async fn open(&self, location: &Location) -> Result<Vec<u8>, StorageError> {
        self.backend(location)?.open(location).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            "/var/tmp/site.tar".parse::<Location>().unwrap(),
            Location::File(PathBuf::from("/var/tmp/site.tar"))
        );
        assert_eq!(
            "file:///var/tmp/site.tar".parse::<Location>().unwrap(),
            Location::File(PathBuf::from("/var/tmp/site.tar"))
        );
        assert_eq!(
            "s3://bucket/releases/site.tar.zst".parse::<Location>().unwrap(),
            Location::S3 {
                bucket: "bucket".into(),
                key: "releases/site.tar.zst".into()
            }
        );
        assert_eq!(
            "https://example.com/site.tar".parse::<Location>().unwrap(),
            Location::Http("https://example.com/site.tar".into())
        );
    }

    #[test]
    fn test_parse_invalid_locations() {
        for bad in ["", "s3://bucket", "s3://bucket/", "s3:///key", "file://", "ftp://host/x"] {
            assert!(
                matches!(bad.parse::<Location>(), Err(StorageError::InvalidLocation(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_display_roundtrips() {
        for s in ["/a/b", "s3://b/k/x", "http://h/x"] {
            assert_eq!(s.parse::<Location>().unwrap().to_string(), s);
        }
    }

    #[tokio::test]
    async fn test_router_local() {
        let dir = tempdir().unwrap();
        let location = Location::File(dir.path().join("pkg"));
        let router = Router::new();

        router.create(&location, b"bytes".to_vec()).await.unwrap();
        assert_eq!(router.open(&location).await.unwrap(), b"bytes");
    }

    #[cfg(not(feature = "s3"))]
    #[tokio::test]
    async fn test_router_without_s3_backend() {
        let router = Router::new();
        let location: Location = "s3://bucket/key".parse().unwrap();
        let err = router.open(&location).await.unwrap_err();
        assert!(matches!(err, StorageError::Unsupported(_)), "{err}");
        assert!(!err.is_not_found());
    }
}
