//! `chainreg rpc` command: print the RPC URL for a chain.

use super::{SourceArgs, init_logging, open_registry};
use crate::chain::{ChainKey, ChainRegistry, RpcContext, resolve_rpc_url_with};
use crate::error::Error;

/// Resolves `key` and renders its RPC URL against `ctx`.
///
/// # Errors
///
/// Returns [`Error::Chain`] for unknown chains and [`Error::Rpc`] when no
/// template can be rendered.
pub fn rpc_url(registry: &ChainRegistry, key: &str, ctx: &RpcContext) -> Result<String, Error> {
    let Ok(key) = key.parse::<ChainKey>();
    let record = registry
        .resolve(&key)
        .ok_or_else(|| Error::chain(format!("unknown chain '{key}'")))?;
    Ok(resolve_rpc_url_with(&record, ctx)?)
}

/// Execute the `rpc` command.
///
/// `client_id` takes precedence over `rpc.client_id` from the configuration.
///
/// # Errors
///
/// Returns an error if configuration loading fails, the chain is unknown or
/// its RPC cannot be resolved.
#[allow(clippy::print_stdout)]
pub async fn run(key: &str, source: &SourceArgs, client_id: Option<&str>) -> Result<(), Error> {
    let _logging = init_logging();
    let (config, registry) = open_registry(source, client_id).await?;
    let mut ctx = config.rpc().context();
    if let Some(client_id) = client_id {
        ctx = ctx.with_client_id(client_id);
    }
    println!("{}", rpc_url(&registry, key, &ctx)?);
    Ok(())
}
