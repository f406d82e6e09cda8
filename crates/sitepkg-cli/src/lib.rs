//! sitepkg - package a declared set of paths into a verifiable archive
//!
//! Every flag can also be given through a `SITEPKG_*` environment variable.
//! Boolean variables count as set unless they hold a falsey literal
//! (`0`, `false`, `no`, `off` or empty).

#![allow(clippy::missing_errors_doc)]

pub mod cmd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};

use sitepkg_core::storage::{Location, Router};
use sitepkg_core::{ByName, Compression, Key, Manifest, MissingPolicy, NumericIds, OwnerResolver};

/// Package and restore site trees
#[derive(Debug, Parser)]
#[command(name = "sitepkg")]
#[command(author, version)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, env = "SITEPKG_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Archive the manifest paths and store the package
    Create {
        /// Shared package options.
        #[command(flatten)]
        package: PackageArgs,
    },
    /// Fetch a package and restore the manifest paths
    Extract {
        /// Shared package options.
        #[command(flatten)]
        package: PackageArgs,
        /// Succeed without doing anything if the package does not exist
        #[arg(long, env = "SITEPKG_IGNORE_TARBALL_NOT_FOUND", value_parser = FalseyValueParser::new())]
        ignore_tarball_not_found: bool,
    },
    /// Write a fresh random key to PATH (mode 0600)
    NewKeyfile {
        /// Destination keyfile
        path: PathBuf,
        /// Replace an existing keyfile
        #[arg(long, short = 'f', env = "SITEPKG_FORCE", value_parser = FalseyValueParser::new())]
        force: bool,
    },
    /// Print the fingerprint of a keyfile
    Fingerprint {
        /// Keyfile to read
        #[arg(long, env = "SITEPKG_KEYFILE")]
        keyfile: PathBuf,
    },
}

/// How extracted files get their owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Owners {
    /// Look up the archived user/group names, falling back to archived ids
    Name,
    /// Apply the archived numeric ids as-is
    Numeric,
}

impl Owners {
    /// The matching resolution strategy.
    pub fn resolver(self) -> Arc<dyn OwnerResolver> {
        match self {
            Self::Name => Arc::new(ByName),
            Self::Numeric => Arc::new(NumericIds),
        }
    }
}

/// Options shared by `create` and `extract`.
#[derive(Debug, Args)]
pub struct PackageArgs {
    /// Directory the manifest paths are relative to [default: current directory]
    #[arg(long, visible_alias = "chroot", env = "SITEPKG_ROOT")]
    pub root: Option<PathBuf>,

    /// File listing one path per line
    #[arg(long, env = "SITEPKG_MANIFEST")]
    pub manifest: PathBuf,

    /// Package location: a path, file://, s3://bucket/key or http(s):// URL
    #[arg(long, env = "SITEPKG_TARBALL")]
    pub tarball: Location,

    /// Seal the package with the key in this file
    #[arg(long, env = "SITEPKG_KEYFILE")]
    pub keyfile: Option<PathBuf>,

    /// Compress the archive (zstd or gzip)
    #[arg(long, env = "SITEPKG_COMPRESS")]
    pub compress: Option<Compression>,

    /// Skip manifest paths that are absent instead of failing
    #[arg(long, env = "SITEPKG_IGNORE_MISSING", value_parser = FalseyValueParser::new())]
    pub ignore_missing: bool,

    /// Owner resolution on extract
    #[arg(long, value_enum, env = "SITEPKG_OWNERS", default_value_t = Owners::Name)]
    pub owners: Owners,
}

impl PackageArgs {
    /// Absolute root directory.
    pub fn root(&self) -> Result<PathBuf> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        std::path::absolute(&root)
            .with_context(|| format!("Failed to resolve root {}", root.display()))
    }

    /// Load the manifest list against the root.
    pub fn load_manifest(&self) -> Result<Manifest> {
        let manifest = Manifest::load(&self.manifest, self.root()?)?
            .with_policy(MissingPolicy::from_ignore(self.ignore_missing));
        tracing::debug!(
            root = %manifest.root().display(),
            entries = manifest.len(),
            "loaded manifest"
        );
        Ok(manifest)
    }

    /// Load the sealing key, if one was configured.
    pub fn load_key(&self) -> Result<Option<Key>> {
        self.keyfile
            .as_deref()
            .map(|path| {
                Key::load_keyfile(path)
                    .with_context(|| format!("Failed to load keyfile {}", path.display()))
            })
            .transpose()
    }

    /// Storage router able to reach the configured location.
    #[allow(clippy::unused_async)] // async only when the s3 backend is compiled in
    pub async fn storage(&self) -> Router {
        let router = Router::new();
        #[cfg(feature = "s3")]
        if matches!(self.tarball, Location::S3 { .. }) {
            return router.with_s3(sitepkg_core::storage::S3Storage::from_env().await);
        }
        router
    }
}
