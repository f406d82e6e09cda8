//! S3 backend.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3 as s3;
use aws_sdk_s3::error::DisplayErrorContext;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use tracing::info;

use super::{Location, Storage, StorageError};

/// Stores packages as single S3 objects.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: s3::Client,
}

impl S3Storage {
    /// Wrap an already configured client.
    pub fn new(client: s3::Client) -> Self {
        Self { client }
    }

    /// Build a client from the standard AWS environment (credentials
    /// chain, region, profile).
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(s3::Client::new(&config))
    }
}

fn object(location: &Location) -> Result<(&str, &str), StorageError> {
    match location {
        Location::S3 { bucket, key } => Ok((bucket.as_str(), key.as_str())),
        other => Err(StorageError::Unsupported(other.to_string())),
    }
}

fn s3_err(location: &Location, err: impl std::error::Error) -> StorageError {
    StorageError::S3 {
        location: location.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn create(&self, location: &Location, data: Vec<u8>) -> Result<(), StorageError> {
        let (bucket, key) = object(location)?;
        let digest = Sha256::digest(&data);
        let bytes = data.len();

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .checksum_sha256(STANDARD.encode(&digest[..]))
            .content_type("application/octet-stream")
            .body(s3::primitives::ByteStream::from(data))
            .send()
            .await
            .map_err(|e| s3_err(location, e))?;

        info!(
            location = %location,
            bytes,
            sha256 = %hex::encode(&digest[..]),
            "uploaded"
        );
        Ok(())
    }

    async fn open(&self, location: &Location) -> Result<Vec<u8>, StorageError> {
        let (bucket, key) = object(location)?;

        let resp = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(resp) => resp,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Err(StorageError::NotFound(location.to_string()));
            }
            Err(e) => return Err(s3_err(location, e)),
        };

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| s3_err(location, e))?
            .into_bytes()
            .to_vec();

        info!(location = %location, bytes = data.len(), "downloaded");
        Ok(data)
    }
}
