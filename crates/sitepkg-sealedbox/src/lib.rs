//! Sealed boxes: a minimal authenticated-encryption container.
//!
//! A [`SealedBox`] holds an algorithm id, a fresh 96-bit nonce and the
//! AES-256-GCM ciphertext (tag included) of a single plaintext. Keys are
//! 32 raw bytes wrapped in [`Key`], which wipes itself when dropped and can
//! be wiped early with [`Key::close`].
//!
//! # Wire format
//!
//! ```text
//! [2 bytes magic = CE 3A][2 bytes big-endian algorithm id][12 bytes nonce][ciphertext + tag]
//! ```
//!
//! # Example
//!
//! ```
//! use sealedbox::{Key, SealedBox};
//!
//! let key = Key::generate().unwrap();
//! let sealed = SealedBox::seal(&key, b"site package").unwrap();
//! let bytes = sealed.to_bytes();
//!
//! let opened = SealedBox::from_bytes(&bytes).unwrap().open(&key).unwrap();
//! assert_eq!(opened, b"site package");
//! ```

mod error;
mod key;
mod sealed;

pub use error::{Error, Result};
pub use key::{KEY_SIZE, Key};
pub use sealed::{Algorithm, MAGIC, NONCE_SIZE, SealedBox};
