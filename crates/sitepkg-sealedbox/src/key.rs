//! Symmetric key material and keyfiles.

use std::fs::{self, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{Error, Result};

/// Size of a key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

const FINGERPRINT_BYTES: usize = 7;
const KEYFILE_MODE: u32 = 0o600;

/// 32 bytes of symmetric key material.
///
/// The buffer is zeroed when the key is dropped, so every exit path of the
/// owning scope wipes it. [`Key::close`] wipes it earlier; closing twice is
/// harmless. A closed key is all zeroes and will fail to open any box
/// sealed before the close.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Key {
    bytes: [u8; KEY_SIZE],
}

impl Key {
    /// Generate a fresh key from the operating system's CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Random`] if the random source is unavailable.
    pub fn generate() -> Result<Self> {
        let mut key = Self {
            bytes: [0; KEY_SIZE],
        };
        OsRng
            .try_fill_bytes(&mut key.bytes)
            .map_err(Error::Random)?;
        Ok(key)
    }

    /// Wrap key material obtained elsewhere, e.g. from a secret store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyLength`] unless `data` is exactly [`KEY_SIZE`] bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = data.try_into().map_err(|_| Error::KeyLength(data.len()))?;
        Ok(Self { bytes })
    }

    /// Generate a key and persist it to `path` with mode `0600`.
    ///
    /// Unless `overwrite` is set the file must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Keyfile`] if the file exists (without `overwrite`)
    /// or cannot be written.
    pub fn new_keyfile(path: &Path, overwrite: bool) -> Result<Self> {
        let key = Self::generate()?;
        let keyfile_err = |source| Error::Keyfile {
            path: path.to_path_buf(),
            source,
        };

        let mut opts = OpenOptions::new();
        opts.write(true).mode(KEYFILE_MODE);
        if overwrite {
            opts.create(true).truncate(true);
        } else {
            opts.create_new(true);
        }

        let mut file = opts.open(path).map_err(keyfile_err)?;
        // mode() only applies to newly created files
        file.set_permissions(Permissions::from_mode(KEYFILE_MODE))
            .map_err(keyfile_err)?;
        file.write_all(&key.bytes).map_err(keyfile_err)?;
        file.sync_all().map_err(keyfile_err)?;

        Ok(key)
    }

    /// Load a key previously written by [`Key::new_keyfile`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Keyfile`] if the file cannot be read and
    /// [`Error::UnusableKeyfile`] if it does not hold exactly [`KEY_SIZE`] bytes.
    pub fn load_keyfile(path: &Path) -> Result<Self> {
        let data = Zeroizing::new(fs::read(path).map_err(|source| Error::Keyfile {
            path: path.to_path_buf(),
            source,
        })?);

        if data.len() != KEY_SIZE {
            return Err(Error::UnusableKeyfile {
                path: path.to_path_buf(),
                size: data.len(),
            });
        }

        Self::from_bytes(&data)
    }

    /// Raw key bytes, for handing to a secret store.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Short, non-secret identifier of this key for log correlation.
    ///
    /// Hex encoding of the first 7 bytes of the key's SHA-256.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(&digest[..FINGERPRINT_BYTES])
    }

    /// Wipe the key material now instead of waiting for drop.
    pub fn close(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("fpr", &self.fingerprint())
            .finish()
    }
}
