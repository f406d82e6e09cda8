//! Keyfile commands

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use sitepkg_core::Key;

/// Generate a key, write it to `path` and print its fingerprint.
pub fn new_keyfile(path: &Path, force: bool) -> Result<()> {
    let key = Key::new_keyfile(path, force)
        .with_context(|| format!("Failed to create keyfile {}", path.display()))?;

    let fpr = key.fingerprint();
    info!(path = %path.display(), fpr = %fpr, "created keyfile");
    println!("{fpr}");
    Ok(())
}

/// Print the fingerprint of the key stored at `path`.
pub fn fingerprint(path: &Path) -> Result<()> {
    let key = Key::load_keyfile(path)
        .with_context(|| format!("Failed to load keyfile {}", path.display()))?;
    println!("{}", key.fingerprint());
    Ok(())
}
