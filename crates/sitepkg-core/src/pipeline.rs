//! The fixed transform order between a manifest and stored bytes.
//!
//! Create: archive, compress (optional), seal (optional), digest, store.
//! Extract: fetch, digest, open (optional), decompress (optional), restore.
//! With neither compression nor a key the stored bytes are exactly the tar
//! stream written by [`Manifest::create`].

use std::fmt;
use std::sync::Arc;

use sealedbox::{Key, SealedBox};
use tracing::{debug, info};

use crate::digest::{HashingWriter, sha256_hex};
use crate::storage::{Location, Storage};
use crate::{ByName, Compression, Manifest, OwnerResolver, PipelineError};

/// Output of [`Pipeline::pack`].
#[derive(Clone, PartialEq, Eq)]
pub struct Packed {
    /// Final bytes, ready for storage.
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`.
    pub sha256: String,
}

impl fmt::Debug for Packed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packed")
            .field("bytes", &self.bytes.len())
            .field("sha256", &self.sha256)
            .finish()
    }
}

/// Outcome of [`Pipeline::extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extracted {
    /// The package was fetched and restored.
    Done,
    /// Storage had nothing at the location and the caller tolerates that.
    TarballNotFound,
}

/// Compression and sealing settings shared by both directions.
///
/// Both ends must agree on the settings; nothing in the stored bytes
/// records which transforms were applied.
#[derive(Debug, Clone)]
pub struct Pipeline {
    compression: Option<Compression>,
    key: Option<Arc<Key>>,
    owners: Arc<dyn OwnerResolver>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Plain tar, owners resolved by name.
    pub fn new() -> Self {
        Self {
            compression: None,
            key: None,
            owners: Arc::new(ByName),
        }
    }

    /// Compress the archive stream.
    pub fn with_compression(mut self, compression: Option<Compression>) -> Self {
        self.compression = compression;
        self
    }

    /// Seal the (possibly compressed) stream with `key`.
    pub fn with_key(mut self, key: Option<Arc<Key>>) -> Self {
        self.key = key;
        self
    }

    /// Owner resolution used on extract.
    pub fn with_owners(mut self, owners: Arc<dyn OwnerResolver>) -> Self {
        self.owners = owners;
        self
    }

    /// Build the stored form of `manifest`.
    ///
    /// # Errors
    ///
    /// Any archive, compression or sealing failure.
    pub fn pack(&self, manifest: &Manifest) -> Result<Packed, PipelineError> {
        let tar = manifest.create(HashingWriter::new(Vec::new()))?;
        debug!(bytes = tar.bytes_read(), sha256 = %tar.hex_digest(), "archive stream");
        let mut bytes = tar.into_inner();

        if let Some(compression) = self.compression {
            bytes = compression
                .compress(&bytes)
                .map_err(|source| PipelineError::Compression {
                    compression,
                    source,
                })?;
            debug!(%compression, bytes = bytes.len(), "compressed");
        }

        if let Some(key) = &self.key {
            bytes = SealedBox::seal(key, &bytes)?.to_bytes();
        }

        let sha256 = sha256_hex(&bytes);
        info!(
            bytes = bytes.len(),
            sha256 = %sha256,
            compression = ?self.compression,
            fpr = ?self.key.as_deref().map(Key::fingerprint),
            "packed"
        );
        Ok(Packed { bytes, sha256 })
    }

    /// Restore `manifest` from stored bytes.
    ///
    /// # Errors
    ///
    /// Any format, authentication, decompression or archive failure.
    pub fn unpack(&self, manifest: &Manifest, data: &[u8]) -> Result<(), PipelineError> {
        info!(
            bytes = data.len(),
            sha256 = %sha256_hex(data),
            fpr = ?self.key.as_deref().map(Key::fingerprint),
            "unpacking"
        );

        let opened;
        let mut payload = data;
        if let Some(key) = &self.key {
            opened = SealedBox::from_bytes(data)?.open(key)?;
            payload = &opened;
        }

        match self.compression {
            Some(compression) => {
                let decoder =
                    compression
                        .decoder(payload)
                        .map_err(|source| PipelineError::Compression {
                            compression,
                            source,
                        })?;
                manifest.extract_with(decoder, self.owners.as_ref())?;
            }
            None => manifest.extract_with(payload, self.owners.as_ref())?,
        }

        Ok(())
    }

    /// Pack `manifest` and store it at `location`.
    ///
    /// Archiving runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::pack`]; storage failures as [`PipelineError::Storage`].
    pub async fn create(
        &self,
        manifest: &Manifest,
        storage: &dyn Storage,
        location: &Location,
    ) -> Result<Packed, PipelineError> {
        let pipeline = self.clone();
        let manifest = manifest.clone();
        let packed = tokio::task::spawn_blocking(move || pipeline.pack(&manifest)).await??;
        storage.create(location, packed.bytes.clone()).await?;
        info!(location = %location, sha256 = %packed.sha256, "stored");
        Ok(packed)
    }

    /// Fetch `location` and restore `manifest` from it.
    ///
    /// With `ignore_not_found`, an absent package is a successful no-op.
    /// Restoring runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::unpack`]; storage failures as [`PipelineError::Storage`].
    pub async fn extract(
        &self,
        manifest: &Manifest,
        storage: &dyn Storage,
        location: &Location,
        ignore_not_found: bool,
    ) -> Result<Extracted, PipelineError> {
        let data = match storage.open(location).await {
            Ok(data) => data,
            Err(e) if ignore_not_found && e.is_not_found() => {
                info!(location = %location, "tarball not found, nothing to extract");
                return Ok(Extracted::TarballNotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let pipeline = self.clone();
        let manifest = manifest.clone();
        tokio::task::spawn_blocking(move || pipeline.unpack(&manifest, &data)).await??;
        Ok(Extracted::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalStorage, StorageError};
    use crate::{ArchiveError, NumericIds};
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    fn source() -> (TempDir, Manifest) {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/site.conf"), b"port = 8080\n".repeat(50)).unwrap();
        fs::write(dir.path().join("index.html"), b"<h1>hi</h1>").unwrap();

        let mut m = Manifest::new(dir.path());
        for p in ["etc", "etc/site.conf", "index.html"] {
            m.add(p);
        }
        (dir, m)
    }

    fn target(src: &Manifest) -> (TempDir, Manifest) {
        let dir = tempdir().unwrap();
        let mut m = Manifest::new(dir.path());
        for p in src.entries() {
            m.add(p.as_str());
        }
        (dir, m)
    }

    fn assert_restored(dst: &Path) {
        assert_eq!(
            fs::read(dst.join("etc/site.conf")).unwrap(),
            b"port = 8080\n".repeat(50)
        );
        assert_eq!(fs::read(dst.join("index.html")).unwrap(), b"<h1>hi</h1>");
    }

    #[test]
    fn test_all_combinations_roundtrip() {
        let key = Arc::new(Key::generate().unwrap());
        let (_src_dir, src) = source();

        for compression in [None, Some(Compression::Zstd), Some(Compression::Gzip)] {
            for key in [None, Some(Arc::clone(&key))] {
                let pipeline = Pipeline::new()
                    .with_compression(compression)
                    .with_key(key)
                    .with_owners(Arc::new(NumericIds));
                let packed = pipeline.pack(&src).unwrap();
                assert_eq!(packed.sha256, sha256_hex(&packed.bytes));

                let (dst_dir, dst) = target(&src);
                pipeline.unpack(&dst, &packed.bytes).unwrap();
                assert_restored(dst_dir.path());
            }
        }
    }

    #[test]
    fn test_plain_is_raw_tar() {
        let (_src_dir, src) = source();
        let packed = Pipeline::new().pack(&src).unwrap();
        assert_eq!(packed.bytes.len() % 512, 0);

        let mut archive = tar::Archive::new(&packed.bytes[..]);
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["etc", "etc/site.conf", "index.html"]);
    }

    #[test]
    fn test_layering_order() {
        let key = Arc::new(Key::generate().unwrap());
        let (_src_dir, src) = source();

        let zstd = Pipeline::new()
            .with_compression(Some(Compression::Zstd))
            .pack(&src)
            .unwrap();
        assert_eq!(&zstd.bytes[..4], &[0x28, 0xb5, 0x2f, 0xfd]);

        let sealed = Pipeline::new()
            .with_compression(Some(Compression::Zstd))
            .with_key(Some(Arc::clone(&key)))
            .pack(&src)
            .unwrap();
        assert_eq!(&sealed.bytes[..2], &sealedbox::MAGIC);

        let inner = SealedBox::from_bytes(&sealed.bytes).unwrap().open(&key).unwrap();
        assert_eq!(&inner[..4], &[0x28, 0xb5, 0x2f, 0xfd]);
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let key = Arc::new(Key::generate().unwrap());
        let other = Arc::new(Key::generate().unwrap());
        let (_src_dir, src) = source();
        let packed = Pipeline::new().with_key(Some(key)).pack(&src).unwrap();

        let (dst_dir, dst) = target(&src);
        let err = Pipeline::new()
            .with_key(Some(other))
            .unpack(&dst, &packed.bytes)
            .unwrap_err();
        assert!(
            matches!(err, PipelineError::Seal(sealedbox::Error::Authentication)),
            "{err}"
        );
        assert!(!dst_dir.path().join("index.html").exists());
    }

    #[test]
    fn test_tampered_bytes_fail() {
        let key = Arc::new(Key::generate().unwrap());
        let (_src_dir, src) = source();
        let pipeline = Pipeline::new().with_key(Some(key));
        let mut packed = pipeline.pack(&src).unwrap();
        let last = packed.bytes.len() - 1;
        packed.bytes[last] ^= 0x01;

        let (_dst_dir, dst) = target(&src);
        assert!(matches!(
            pipeline.unpack(&dst, &packed.bytes),
            Err(PipelineError::Seal(_))
        ));
    }

    #[test]
    fn test_missing_entry_surfaces_archive_error() {
        let (_src_dir, src) = source();
        let packed = Pipeline::new().pack(&src).unwrap();

        let (_dst_dir, mut dst) = target(&src);
        dst.add("not-packed");
        let err = Pipeline::new()
            .with_owners(Arc::new(NumericIds))
            .unpack(&dst, &packed.bytes)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Archive(ArchiveError::NotInArchive { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_and_extract_through_storage() {
        let store = tempdir().unwrap();
        let location = Location::File(store.path().join("site.tar.zst"));
        let key = Arc::new(Key::generate().unwrap());
        let pipeline = Pipeline::new()
            .with_compression(Some(Compression::Zstd))
            .with_key(Some(key));

        let (_src_dir, src) = source();
        let packed = pipeline.create(&src, &LocalStorage, &location).await.unwrap();
        assert_eq!(fs::read(store.path().join("site.tar.zst")).unwrap(), packed.bytes);

        let (dst_dir, dst) = target(&src);
        let outcome = pipeline
            .extract(&dst, &LocalStorage, &location, false)
            .await
            .unwrap();
        assert_eq!(outcome, Extracted::Done);
        assert_restored(dst_dir.path());
    }

    #[tokio::test]
    async fn test_tarball_not_found_policy() {
        let store = tempdir().unwrap();
        let location = Location::File(store.path().join("absent.tar"));
        let (_src_dir, src) = source();
        let (dst_dir, dst) = target(&src);

        let outcome = Pipeline::new()
            .extract(&dst, &LocalStorage, &location, true)
            .await
            .unwrap();
        assert_eq!(outcome, Extracted::TarballNotFound);
        assert!(!dst_dir.path().join("index.html").exists());

        let err = Pipeline::new()
            .extract(&dst, &LocalStorage, &location, false)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Storage(StorageError::NotFound(_))));
    }
}
