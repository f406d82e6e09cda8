//! Extract command

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use sitepkg_core::{Extracted, Pipeline};

use crate::PackageArgs;

/// Fetch the package and restore the manifest paths under the root.
pub async fn extract(args: &PackageArgs, ignore_tarball_not_found: bool) -> Result<()> {
    let manifest = args.load_manifest()?;
    let key = args.load_key()?;
    let storage = args.storage().await;

    let pipeline = Pipeline::new()
        .with_compression(args.compress)
        .with_key(key.map(Arc::new))
        .with_owners(args.owners.resolver());

    let outcome = pipeline
        .extract(&manifest, &storage, &args.tarball, ignore_tarball_not_found)
        .await
        .with_context(|| format!("Failed to extract {}", args.tarball))?;

    match outcome {
        Extracted::Done => info!(
            tarball = %args.tarball,
            root = %manifest.root().display(),
            "extracted"
        ),
        Extracted::TarballNotFound => info!(tarball = %args.tarball, "nothing extracted"),
    }
    Ok(())
}
