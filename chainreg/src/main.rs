//! chainreg CLI
//!
//! ```sh
//! chainreg init               # Generate default chainreg.toml
//! chainreg serve              # Start the lookup server
//! chainreg resolve polygon    # Print a chain record
//! chainreg rpc 1 --client-id <id>
//! chainreg list --testnets
//! ```

use chainreg::cmd::{self, Cli, Commands, list::NetworkFilter};
use clap::Parser;

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { output, force } => cmd::init::run(&output, force),
        Commands::Serve { config } => cmd::serve::run(&config).await,
        Commands::Resolve {
            key,
            source,
            fallback,
        } => cmd::resolve::run(&key, &source, fallback).await,
        Commands::Rpc {
            key,
            source,
            client_id,
        } => cmd::rpc::run(&key, &source, client_id.as_deref()).await,
        Commands::List {
            source,
            testnets,
            mainnets,
        } => cmd::list::run(&source, NetworkFilter::from_flags(testnets, mainnets)).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
