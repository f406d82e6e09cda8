//! Create command

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use sitepkg_core::Pipeline;

use crate::PackageArgs;

/// Archive the manifest paths, then compress, seal and store the result.
pub async fn create(args: &PackageArgs) -> Result<()> {
    let manifest = args.load_manifest()?;
    let key = args.load_key()?;
    let storage = args.storage().await;

    let pipeline = Pipeline::new()
        .with_compression(args.compress)
        .with_key(key.map(Arc::new));

    let packed = pipeline
        .create(&manifest, &storage, &args.tarball)
        .await
        .with_context(|| format!("Failed to create {}", args.tarball))?;

    info!(
        tarball = %args.tarball,
        entries = manifest.len(),
        bytes = packed.bytes.len(),
        sha256 = %packed.sha256,
        "created"
    );
    Ok(())
}
