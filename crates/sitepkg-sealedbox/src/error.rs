use std::path::PathBuf;

use thiserror::Error;

/// Result alias for sealed box operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while handling keys and sealed boxes.
#[derive(Error, Debug)]
pub enum Error {
    /// Key material of the wrong length was supplied.
    #[error("unable to construct key; unexpected length: {0} != {expected}", expected = crate::KEY_SIZE)]
    KeyLength(usize),

    /// A keyfile exists but does not hold exactly one key.
    #[error("unusable keyfile (invalid size {size}): {}", path.display())]
    UnusableKeyfile {
        /// Keyfile that was read.
        path: PathBuf,
        /// Number of bytes found in it.
        size: usize,
    },

    /// A keyfile could not be created, written or read.
    #[error("keyfile {}: {source}", path.display())]
    Keyfile {
        /// Keyfile being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The operating system random source failed.
    #[error("random source failure: {0}")]
    Random(#[source] rand::rand_core::OsError),

    /// The encoded box does not start with the expected magic bytes.
    #[error("unexpected magic bytes: {0:02x?}")]
    Magic([u8; 2]),

    /// The box names an algorithm this build does not implement.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(u16),

    /// The encoded box is shorter than its fixed header.
    #[error("truncated box: {0} bytes")]
    Truncated(usize),

    /// The nonce is not exactly 96 bits.
    #[error("invalid nonce length: {0}")]
    NonceLength(usize),

    /// Encryption failed inside the cipher.
    #[error("unable to seal plaintext")]
    Seal,

    /// Decryption failed: wrong key or tampered nonce/ciphertext.
    #[error("unable to open box: authentication failed")]
    Authentication,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_length_message() {
        assert_eq!(
            Error::KeyLength(31).to_string(),
            "unable to construct key; unexpected length: 31 != 32"
        );
    }

    #[test]
    fn test_random_failure_keeps_source() {
        fn source_of(e: &Error) -> Option<String> {
            std::error::Error::source(e).map(ToString::to_string)
        }
        fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}

        assert_error::<rand::rand_core::OsError>();
        assert_error::<Error>();
        assert_eq!(source_of(&Error::KeyLength(0)), None);
    }
}
