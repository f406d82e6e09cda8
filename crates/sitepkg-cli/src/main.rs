//! sitepkg - package and restore site trees

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sitepkg_cli::cmd;
use sitepkg_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Create { package } => cmd::create::create(&package).await,
        Commands::Extract {
            package,
            ignore_tarball_not_found,
        } => cmd::extract::extract(&package, ignore_tarball_not_found).await,
        Commands::NewKeyfile { path, force } => cmd::keyfile::new_keyfile(&path, force),
        Commands::Fingerprint { keyfile } => cmd::keyfile::fingerprint(&keyfile),
    }
}
