//! `chainreg list` command: print known chains.

use std::sync::Arc;

use super::{SourceArgs, init_logging, open_registry};
use crate::chain::{ChainRecord, ChainRegistry};
use crate::error::Error;

/// Which chains `list` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFilter {
    /// Every chain.
    #[default]
    All,
    /// Testnets only.
    Testnets,
    /// Mainnets only.
    Mainnets,
}

impl NetworkFilter {
    /// Filter selected by the `--testnets` / `--mainnets` flags.
    #[must_use]
    pub const fn from_flags(testnets: bool, mainnets: bool) -> Self {
        match (testnets, mainnets) {
            (true, _) => Self::Testnets,
            (false, true) => Self::Mainnets,
            (false, false) => Self::All,
        }
    }

    const fn accepts(self, record: &ChainRecord) -> bool {
        match self {
            Self::All => true,
            Self::Testnets => record.testnet,
            Self::Mainnets => !record.testnet,
        }
    }
}

/// Records passing `filter`, sorted by chain ID.
#[must_use]
pub fn select(registry: &ChainRegistry, filter: NetworkFilter) -> Vec<Arc<ChainRecord>> {
    registry
        .all()
        .into_iter()
        .filter(|record| filter.accepts(record))
        .collect()
}

/// Execute the `list` command.
///
/// # Errors
///
/// Returns an error if configuration loading fails.
#[allow(clippy::print_stdout)]
pub async fn run(source: &SourceArgs, filter: NetworkFilter) -> Result<(), Error> {
    let _logging = init_logging();
    let (_, registry) = open_registry(source, None).await?;
    for record in select(&registry, filter) {
        println!("{} {} {}", record.chain_id, record.slug, record.name);
    }
    Ok(())
}
