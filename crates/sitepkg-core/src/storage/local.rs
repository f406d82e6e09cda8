//! Local filesystem backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{Location, Storage, StorageError};
use crate::digest::sha256_hex;

/// Reads and writes plain files.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a partially written package.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    fn path(location: &Location) -> Result<&Path, StorageError> {
        match location {
            Location::File(path) => Ok(path.as_path()),
            other => Err(StorageError::Unsupported(other.to_string())),
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp-{}", std::process::id()))
}

#[async_trait]
impl Storage for LocalStorage {
    async fn create(&self, location: &Location, data: Vec<u8>) -> Result<(), StorageError> {
        let path = Self::path(location)?;
        let io_err = |source| StorageError::Io {
            location: location.to_string(),
            source,
        };

        let tmp = temp_sibling(path);
        debug!(tmp = %tmp.display(), "writing temporary file");

        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(e));
        }

        info!(
            location = %location,
            bytes = data.len(),
            sha256 = %sha256_hex(&data),
            "wrote file"
        );
        Ok(())
    }

    async fn open(&self, location: &Location) -> Result<Vec<u8>, StorageError> {
        let path = Self::path(location)?;
        match tokio::fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(source) => Err(StorageError::Io {
                location: location.to_string(),
                source,
            }),
        }
    }
}
