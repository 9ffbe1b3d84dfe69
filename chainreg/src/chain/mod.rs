//! Chain metadata, retrieval, resolution and RPC templating.
//!
//! - [`record`]: [`ChainRecord`] and its wire format.
//! - [`bundle`]: records compiled into the binary.
//! - [`fetch`]: [`ChainFetcher`] for the remote chain list.
//! - [`snapshot`]: indexed record sets and [`DuplicatePolicy`].
//! - [`registry`]: [`ChainRegistry`], the resolver.
//! - [`rpc`]: [`RpcTemplate`] and [`resolve_rpc_url`].

pub mod bundle;
pub mod fetch;
pub mod record;
pub mod registry;
pub mod rpc;
pub mod snapshot;

pub use self::bundle::all_static;
pub use self::fetch::{
    ChainFetcher, ChainFetcherBuilder, ChainSource, DEFAULT_CHAINS_ENDPOINT, FetchError,
    FetchFuture,
};
pub use self::record::{ChainRecord, ChainStatus, Explorer, Feature, Icon, NativeCurrency};
pub use self::registry::{
    ALL_CHAINS_CACHE_KEY, BundleFallback, ChainKey, ChainRegistry, RegistryStats,
};
pub use self::rpc::{
    Placeholder, RenderError, RpcContext, RpcError, RpcTemplate, TemplateError, resolve_rpc_url,
    resolve_rpc_url_with,
};
pub use self::snapshot::{DuplicatePolicy, Snapshot, SnapshotOrigin};
