//! EVM chain registry and RPC URL resolver.
//!
//! Chain metadata comes from two places: a chain list compiled into the
//! binary and a remote chain-list endpoint. [`ChainRegistry`] serves lookups
//! by chain ID or slug from the fetched list when one is loaded and falls
//! back to the bundled list otherwise.
//!
//! ```no_run
//! use chainreg::chain::{ChainFetcher, ChainRegistry, DEFAULT_CHAINS_ENDPOINT, resolve_rpc_url};
//!
//! # async fn demo() -> Result<(), chainreg::Error> {
//! let registry = ChainRegistry::bundled();
//! let fetcher = ChainFetcher::new(DEFAULT_CHAINS_ENDPOINT.parse().expect("valid url"))?;
//! if let Err(err) = registry.ensure_fetched(&fetcher).await {
//!     eprintln!("using bundled chains: {err}");
//! }
//!
//! let ethereum = registry.resolve_by_id(1).expect("bundled");
//! let url = resolve_rpc_url(&ethereum, "my-client-id")?;
//! assert_eq!(url, "https://1.rpc.thirdweb.com/my-client-id");
//! # Ok(())
//! # }
//! ```
//!
//! The `chainreg` binary wraps the same API in a CLI and an HTTP lookup
//! service; see [`cmd`].

pub mod chain;
pub mod cmd;
pub mod config;
pub mod error;
pub mod routes;
pub mod signal;
pub mod telemetry;

pub use chain::{ChainKey, ChainRecord, ChainRegistry};
pub use error::Error;
