use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dicomweb_server::config::Config;
use dicomweb_server::storage::memory::MemoryBackend;
use dicomweb_server::storage::StorageProvider;

/// A DICOMweb (QIDO-RS/WADO-RS/STOW-RS) server with a pluggable storage
/// backend.
#[derive(Debug, Parser)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, default_value = "config/default.toml")]
    config: String,

    /// Overrides the listening port from the config file.
    #[arg(long)]
    port: Option<u16>,

    /// Selects a built-in preset when no config file is found.
    #[arg(long, value_enum, default_value_t = Preset::Development)]
    preset: Preset,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Preset {
    Development,
    Production,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, path = %cli.config, "using built-in preset");
            match cli.preset {
                Preset::Development => Config::development(),
                Preset::Production => Config::production(),
            }
        }
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let storage: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new());
    dicomweb_server::run(config, storage).await
}
