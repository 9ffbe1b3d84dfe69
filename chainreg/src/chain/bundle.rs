//! Chain records compiled into the binary.
//!
//! The list lives in `data/chains.json` in the same shape the remote endpoint
//! serves, and is parsed once on first access.

use std::sync::LazyLock;

use super::record::ChainRecord;

const BUNDLED_CHAINS_JSON: &str = include_str!("../../data/chains.json");

static BUNDLED_CHAINS: LazyLock<Vec<ChainRecord>> = LazyLock::new(|| {
    serde_json::from_str(BUNDLED_CHAINS_JSON).expect("bundled data/chains.json is valid")
});

/// All bundled chain records, in file order.
///
/// # Panics
///
/// Panics on first access if the bundled JSON does not parse, which the test
/// suite rules out.
#[must_use]
pub fn all_static() -> &'static [ChainRecord] {
    &BUNDLED_CHAINS
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::chain::rpc::RpcTemplate;

    #[test]
    fn bundled_records_hold_invariants() {
        let records = all_static();
        assert!(!records.is_empty());
        for record in records {
            assert!(record.chain_id > 0, "{record}");
            record.validate().unwrap();
            assert!(!record.rpc.is_empty(), "{record} has no RPC");
            for rpc in &record.rpc {
                RpcTemplate::parse(rpc).unwrap_or_else(|e| panic!("{record}: {e}"));
            }
        }
    }

    #[test]
    fn bundled_slugs_and_ids_are_unique() {
        let records = all_static();
        let slugs: HashSet<_> = records.iter().map(|r| r.slug.as_str()).collect();
        let ids: HashSet<_> = records.iter().map(|r| r.chain_id).collect();
        assert_eq!(slugs.len(), records.len());
        assert_eq!(ids.len(), records.len());
    }

    #[test]
    fn ethereum_mainnet_is_bundled() {
        let ethereum = all_static().iter().find(|r| r.chain_id == 1).unwrap();
        assert_eq!(ethereum.name, "Ethereum");
        assert_eq!(ethereum.slug, "ethereum");
        assert_eq!(ethereum.native_currency.symbol, "ETH");
        assert!(!ethereum.testnet);
    }

    #[test]
    fn testnets_carry_faucets_or_explorers() {
        for record in all_static().iter().filter(|r| r.testnet) {
            assert!(
                !record.faucets.is_empty() || !record.explorers.is_empty(),
                "{record}"
            );
        }
    }
}
