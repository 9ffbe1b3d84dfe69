//! CLI definitions and command implementations.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::chain::ChainRegistry;
use crate::config::{Config, load_config};
use crate::error::Error;
use crate::telemetry::{Telemetry, TelemetryGuard};

pub mod init;
pub mod list;
pub mod resolve;
pub mod rpc;
pub mod serve;

/// EVM chain registry: look up chain metadata and RPC URLs.
#[derive(Debug, Parser)]
#[command(name = "chainreg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a default TOML configuration file.
    Init {
        /// Output path for the configuration file.
        #[arg(short, long, default_value = "chainreg.toml")]
        output: PathBuf,

        /// Overwrite the file if it already exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Start the chain lookup HTTP server.
    Serve {
        /// Path to the TOML configuration file.
        #[arg(short, long, env = "CONFIG", default_value = "chainreg.toml")]
        config: PathBuf,
    },

    /// Print a chain record as JSON.
    Resolve {
        /// Chain ID or slug.
        key: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Print a generic record for unknown numeric chain IDs.
        #[arg(long, default_value_t = false)]
        fallback: bool,
    },

    /// Print the RPC URL for a chain.
    Rpc {
        /// Chain ID or slug.
        key: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Client ID substituted into the RPC template; overrides `rpc.client_id`.
        #[arg(long, env = "THIRDWEB_CLIENT_ID")]
        client_id: Option<String>,
    },

    /// List known chains as `id slug name` lines.
    List {
        #[command(flatten)]
        source: SourceArgs,

        /// Only testnets.
        #[arg(long, conflicts_with = "mainnets")]
        testnets: bool,

        /// Only mainnets.
        #[arg(long)]
        mainnets: bool,
    },
}

/// Where lookup commands get their chain data from.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(short, long, env = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Use bundled chain data only, without contacting the chain-list endpoint.
    #[arg(long, default_value_t = false)]
    pub offline: bool,
}

/// Loads `path` if given, otherwise the default configuration.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, Error> {
    path.map_or_else(|| Ok(Config::default()), load_config)
}

/// Console-only logging for one-shot commands; defaults to `warn` so
/// stdout output is not interleaved with progress messages.
fn init_logging() -> TelemetryGuard {
    Telemetry::new().with_log_level("warn").register()
}

/// Builds the registry for a lookup command.
///
/// Unless `offline`, the remote chain list is fetched once; a failure is
/// logged and the bundled data is used instead.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the HTTP
/// client cannot be built.
pub async fn open_registry(
    source: &SourceArgs,
    client_id: Option<&str>,
) -> Result<(Config, ChainRegistry), Error> {
    dotenvy::dotenv().ok();
    let config = load_or_default(source.config.as_deref())?;
    let registry = config.registry().build_registry();
    if source.offline {
        tracing::debug!("offline, using bundled chain data");
        return Ok((config, registry));
    }

    let client_id = client_id.or(config.rpc().client_id.as_deref());
    let fetcher = config.registry().build_fetcher(client_id)?;
    if let Err(error) = registry.ensure_fetched(&fetcher).await {
        tracing::warn!(%error, endpoint = %fetcher.endpoint(), "using bundled chain data");
    }
    Ok((config, registry))
}
