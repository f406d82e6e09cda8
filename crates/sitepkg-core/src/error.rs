//! Error types for the archive engine and the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised while creating or extracting an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// A manifest path does not exist on disk at create time.
    #[error("missing source: {}", path.display())]
    SourceMissing {
        /// Resolved path that was looked up.
        path: PathBuf,
    },

    /// A manifest path was not present in the archive at extract time.
    #[error("not found in archive: {name}")]
    NotInArchive {
        /// Manifest entry that never appeared.
        name: String,
    },

    /// Symlinks, devices, sockets and the like cannot be archived.
    #[error("non-regular files not supported: {name} ({kind})")]
    Unsupported {
        /// Entry name as listed in the manifest or archive.
        name: String,
        /// Human-readable file type.
        kind: String,
    },

    /// Filesystem failure on a specific path.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The archive stream itself could not be read or written.
    #[error("archive stream: {0}")]
    Stream(#[source] std::io::Error),

    /// The manifest list could not be read.
    #[error("unable to load manifest {}: {source}", path.display())]
    Manifest {
        /// Manifest list file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Errors raised by [`Pipeline`](crate::Pipeline) operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Building or restoring the archive failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Compression or decompression failed.
    #[error("{compression} stream: {source}")]
    Compression {
        /// Codec in use.
        compression: crate::Compression,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// Sealing, unsealing or decoding the box failed.
    #[error("sealed box: {0}")]
    Seal(#[from] sealedbox::Error),

    /// Moving bytes to or from storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The blocking archive task panicked or was cancelled.
    #[error("archive task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
