//! `chainreg resolve` command: print a chain record as JSON.

use std::sync::Arc;

use super::{SourceArgs, init_logging, open_registry};
use crate::chain::{ChainKey, ChainRecord, ChainRegistry};
use crate::error::Error;

/// Looks up `key`, substituting a generic record for unknown numeric IDs
/// when `fallback` is set.
///
/// # Errors
///
/// Returns [`Error::Chain`] if the chain is unknown.
pub fn lookup(registry: &ChainRegistry, key: &str, fallback: bool) -> Result<Arc<ChainRecord>, Error> {
    let Ok(key) = key.parse::<ChainKey>();
    match (registry.resolve(&key), &key) {
        (Some(record), _) => Ok(record),
        (None, ChainKey::Id(id)) if fallback => Ok(registry.resolve_or_fallback(*id)),
        (None, _) => Err(Error::chain(format!("unknown chain '{key}'"))),
    }
}

/// Execute the `resolve` command.
///
/// # Errors
///
/// Returns an error if configuration loading fails or the chain is unknown.
#[allow(clippy::print_stdout)]
pub async fn run(key: &str, source: &SourceArgs, fallback: bool) -> Result<(), Error> {
    let _logging = init_logging();
    let (_, registry) = open_registry(source, None).await?;
    let record = lookup(&registry, key, fallback)?;
    let json = serde_json::to_string_pretty(record.as_ref())
        .map_err(|e| Error::chain(format!("failed to encode '{}': {e}", record.slug)))?;
    println!("{json}");
    Ok(())
}
