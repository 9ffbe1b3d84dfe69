//! Chain metadata records as served by the chain-list endpoint and bundled
//! into the binary.
//!
//! The JSON shape uses camelCase keys (`chainId`, `nativeCurrency`, ...).
//! Unknown keys are ignored and list fields default to empty, so records from
//! newer endpoint revisions still deserialize.

use std::fmt;

use serde::{Deserialize, Serialize};

/// RPC template used for chains the registry knows nothing about.
pub const FALLBACK_RPC_TEMPLATE: &str = "https://{chain_id}.rpc.thirdweb.com/${THIRDWEB_API_KEY}";

/// Native currency of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Display name (e.g. `"Ether"`).
    pub name: String,
    /// Ticker symbol (e.g. `"ETH"`).
    pub symbol: String,
    /// Number of decimals of the smallest unit.
    pub decimals: u8,
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self {
            name: "Ether".to_owned(),
            symbol: "ETH".to_owned(),
            decimals: 18,
        }
    }
}

/// Block explorer entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explorer {
    /// Explorer name.
    pub name: String,
    /// Base URL.
    pub url: String,
    /// URL scheme standard, usually `"EIP3091"` or `"none"`.
    #[serde(default)]
    pub standard: String,
}

/// Chain feature flag (e.g. `EIP155`, `EIP1559`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature name.
    pub name: String,
}

/// Chain icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    /// Icon location, often an `ipfs://` URI.
    pub url: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Image format (e.g. `"png"`, `"svg"`).
    pub format: String,
}

/// Lifecycle status of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainStatus {
    /// Live network.
    Active,
    /// Superseded or shut down.
    Deprecated,
    /// Not yet generally available.
    Incubating,
}

/// One blockchain network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRecord {
    /// EIP-155 chain ID.
    pub chain_id: u64,
    /// URL-safe identifier, unique within a snapshot.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Short name (e.g. `"eth"`).
    #[serde(default)]
    pub short_name: String,
    /// Chain family label (e.g. `"ETH"`).
    #[serde(default)]
    pub chain: String,
    /// Network ID, often equal to `chain_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<u64>,
    /// Project homepage.
    #[serde(
        default,
        rename = "infoURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub info_url: Option<String>,
    /// Native currency.
    #[serde(default)]
    pub native_currency: NativeCurrency,
    /// RPC URL templates, most preferred first.
    #[serde(default)]
    pub rpc: Vec<String>,
    /// Block explorers, most preferred first.
    #[serde(default)]
    pub explorers: Vec<Explorer>,
    /// Faucet URLs (testnets).
    #[serde(default)]
    pub faucets: Vec<String>,
    /// Supported features.
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Chain icon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    /// Whether this is a test network.
    #[serde(default)]
    pub testnet: bool,
    /// Lifecycle status; absent means active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChainStatus>,
}

impl ChainRecord {
    /// Builds the generic record used when a chain ID is unknown.
    ///
    /// The record is named `Chain {id}`, uses the chain ID as slug and carries
    /// a single thirdweb RPC template so it stays dispatchable.
    #[must_use]
    pub fn fallback(chain_id: u64) -> Self {
        Self {
            chain_id,
            slug: chain_id.to_string(),
            name: format!("Chain {chain_id}"),
            short_name: chain_id.to_string(),
            chain: String::new(),
            network_id: Some(chain_id),
            info_url: None,
            native_currency: NativeCurrency::default(),
            rpc: vec![FALLBACK_RPC_TEMPLATE.replace("{chain_id}", &chain_id.to_string())],
            explorers: Vec::new(),
            faucets: Vec::new(),
            features: Vec::new(),
            icon: None,
            testnet: false,
            status: None,
        }
    }

    /// Whether the chain is flagged as deprecated.
    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        self.status == Some(ChainStatus::Deprecated)
    }

    /// Whether the chain advertises the named feature (case-insensitive).
    #[must_use]
    pub fn has_feature(&self, name: &str) -> bool {
        self.features
            .iter()
            .any(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Preferred block explorer URL, if any.
    #[must_use]
    pub fn explorer_url(&self) -> Option<&str> {
        self.explorers.first().map(|e| e.url.as_str())
    }

    /// Checks the key invariants: positive chain ID and URL-safe slug.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] describing the first violated invariant.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.chain_id == 0 {
            return Err(RecordError::ZeroChainId {
                slug: self.slug.clone(),
            });
        }
        if !is_url_safe_slug(&self.slug) {
            return Err(RecordError::InvalidSlug {
                chain_id: self.chain_id,
                slug: self.slug.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ChainRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}

/// A record violating a registry invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Chain IDs must be positive.
    #[error("chain '{slug}' has chain ID 0")]
    ZeroChainId {
        /// Offending record's slug.
        slug: String,
    },
    /// Slug is empty or contains characters that are not URL-safe.
    #[error("chain {chain_id} has invalid slug '{slug}'")]
    InvalidSlug {
        /// Offending record's chain ID.
        chain_id: u64,
        /// The rejected slug.
        slug: String,
    },
}

/// Whether `slug` is non-empty and consists of ASCII alphanumerics, `-`, `_` or `.`.
#[must_use]
pub fn is_url_safe_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}
