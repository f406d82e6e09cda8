//! Read-only HTTP(S) backend.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::info;

use super::{Location, Storage, StorageError};
use crate::digest::sha256_hex;

/// Fetches packages with plain `GET` requests.
#[derive(Debug, Clone, Default)]
pub struct HttpStorage {
    client: Client,
}

impl HttpStorage {
    /// Use a preconfigured client (timeouts, proxies, user agent).
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Storage for HttpStorage {
    async fn create(&self, location: &Location, _data: Vec<u8>) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly(location.to_string()))
    }

    async fn open(&self, location: &Location) -> Result<Vec<u8>, StorageError> {
        let Location::Http(url) = location else {
            return Err(StorageError::Unsupported(location.to_string()));
        };
        let http_err = |source| StorageError::Http {
            location: url.clone(),
            source,
        };

        let resp = self.client.get(url).send().await.map_err(http_err)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(url.clone()));
        }

        let data = resp
            .error_for_status()
            .map_err(http_err)?
            .bytes()
            .await
            .map_err(http_err)?
            .to_vec();

        info!(
            location = %url,
            bytes = data.len(),
            sha256 = %sha256_hex(&data),
            "downloaded"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_is_read_only() {
        let location: Location = "https://example.invalid/site.tar".parse().unwrap();
        let err = HttpStorage::default()
            .create(&location, vec![1, 2, 3])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ReadOnly(_)), "{err}");
    }

    #[tokio::test]
    async fn test_http_rejects_file_location() {
        let location: Location = "/tmp/site.tar".parse().unwrap();
        let err = HttpStorage::default().open(&location).await.unwrap_err();
        assert!(matches!(err, StorageError::Unsupported(_)));
    }
}
