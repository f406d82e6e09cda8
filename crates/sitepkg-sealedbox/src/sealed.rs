//! The sealed box container and its binary/JSON encodings.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key as CipherKey, Nonce};
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::{Error, Key, Result};

/// Leading bytes of every encoded box.
pub const MAGIC: [u8; 2] = [0xce, 0x3a];

/// Size of the AES-GCM nonce in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

const HEADER_SIZE: usize = MAGIC.len() + 2 + NONCE_SIZE;

/// Supported AEAD algorithms, by wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Algorithm {
    /// AES-256 in Galois/Counter mode.
    Aes256Gcm = 1,
}

impl TryFrom<u16> for Algorithm {
    type Error = Error;

    fn try_from(id: u16) -> Result<Self> {
        match id {
            1 => Ok(Self::Aes256Gcm),
            other => Err(Error::UnsupportedAlgorithm(other)),
        }
    }
}

/// An encrypted and authenticated payload.
///
/// The JSON form mirrors the struct with base64 byte fields:
/// `{"alg": 1, "nonce": "...", "ciphertext": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    /// Algorithm id, see [`Algorithm`].
    pub alg: u16,
    /// Per-box random nonce.
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    /// Ciphertext followed by the authentication tag.
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl SealedBox {
    /// Encrypt `plaintext` under `key` with a freshly drawn nonce.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Random`] if no nonce can be drawn and [`Error::Seal`]
    /// if the cipher rejects the input.
    pub fn seal(key: &Key, plaintext: &[u8]) -> Result<Self> {
        let cipher = Aes256Gcm::new(CipherKey::<Aes256Gcm>::from_slice(key.as_bytes()));

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(Error::Random)?;

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| Error::Seal)?;

        Ok(Self {
            alg: Algorithm::Aes256Gcm as u16,
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }

    /// Decrypt and authenticate the box.
    ///
    /// No plaintext is released unless the tag verifies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAlgorithm`] or [`Error::NonceLength`] for
    /// malformed boxes and [`Error::Authentication`] for a wrong key or any
    /// tampering.
    pub fn open(&self, key: &Key) -> Result<Vec<u8>> {
        match Algorithm::try_from(self.alg)? {
            Algorithm::Aes256Gcm => {
                if self.nonce.len() != NONCE_SIZE {
                    return Err(Error::NonceLength(self.nonce.len()));
                }

                let cipher = Aes256Gcm::new(CipherKey::<Aes256Gcm>::from_slice(key.as_bytes()));
                cipher
                    .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_slice())
                    .map_err(|_| Error::Authentication)
            }
        }
    }

    /// Encode the box in its fixed binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MAGIC.len() + 2 + self.nonce.len() + self.ciphertext.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.alg.to_be_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Decode a box from its binary layout.
    ///
    /// The magic and algorithm id are checked before anything else; the
    /// ciphertext is everything after the fixed header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Truncated`], [`Error::Magic`] or
    /// [`Error::UnsupportedAlgorithm`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < MAGIC.len() {
            return Err(Error::Truncated(data.len()));
        }
        let magic = [data[0], data[1]];
        if magic != MAGIC {
            return Err(Error::Magic(magic));
        }

        if data.len() < HEADER_SIZE {
            return Err(Error::Truncated(data.len()));
        }
        let alg = u16::from_be_bytes([data[2], data[3]]);
        Algorithm::try_from(alg)?;

        let (nonce, ciphertext) = data[MAGIC.len() + 2..].split_at(NONCE_SIZE);
        Ok(Self {
            alg,
            nonce: nonce.to_vec(),
            ciphertext: ciphertext.to_vec(),
        })
    }
}

impl TryFrom<&[u8]> for SealedBox {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        Self::from_bytes(data)
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
