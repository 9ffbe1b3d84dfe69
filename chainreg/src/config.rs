//! Configuration loading and default template generation.
//!
//! This module provides:
//!
//! - [`Config`]: server address plus `[registry]` and `[rpc]` sections.
//! - [`load_config`]: reads a TOML file, resolving `$VAR` / `${VAR}`
//!   references in string values against the environment.
//! - [`generate_default_config`]: produces a commented TOML template.
//!
//! # Configuration File Format
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 8080
//!
//! [registry]
//! endpoint = "https://api.thirdweb.com/v1/chains"
//! refresh_interval_secs = 300
//! duplicate_policy = "last-wins"
//! bundle_fallback = "until-fetched"
//!
//! [rpc]
//! client_id = "$THIRDWEB_CLIENT_ID"
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chain::{
    BundleFallback, ChainFetcher, ChainRegistry, DEFAULT_CHAINS_ENDPOINT, DuplicatePolicy,
    FetchError, RpcContext,
};
use crate::error::Error;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Bind address (`HOST`, default `127.0.0.1`).
    #[serde(default = "default_host")]
    host: IpAddr,
    /// Bind port (`PORT`, default `8080`).
    #[serde(default = "default_port")]
    port: u16,
    /// Chain registry settings.
    #[serde(default)]
    registry: RegistryConfig,
    /// RPC resolution settings.
    #[serde(default)]
    rpc: RpcConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            registry: RegistryConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

impl Config {
    /// Parses a TOML document, resolving environment references first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid TOML, unknown values or
    /// references to unset environment variables.
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let mut doc: toml::Table =
            toml::from_str(content).map_err(|e| Error::config_with("invalid TOML", e))?;
        for (_, value) in doc.iter_mut() {
            resolve_env_refs(value)?;
        }
        toml::Value::Table(doc)
            .try_into()
            .map_err(|e: toml::de::Error| Error::config_with("invalid configuration", e))
    }

    /// Bind address.
    #[must_use]
    pub const fn host(&self) -> IpAddr {
        self.host
    }

    /// Bind port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `[registry]` section.
    #[must_use]
    pub const fn registry(&self) -> &RegistryConfig {
        &self.registry
    }

    /// `[rpc]` section.
    #[must_use]
    pub const fn rpc(&self) -> &RpcConfig {
        &self.rpc
    }
}

/// `[registry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Chain-list endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Background refresh period for `serve`; `0` disables refreshing.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// How to pick among records sharing a chain ID.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Whether bundled records back up the fetched list.
    #[serde(default = "default_true")]
    pub bundled: bool,
    /// Whether bundled records still answer once a list has been fetched.
    #[serde(default)]
    pub bundle_fallback: BundleFallback,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            duplicate_policy: DuplicatePolicy::default(),
            bundled: true,
            bundle_fallback: BundleFallback::default(),
        }
    }
}

impl RegistryConfig {
    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Background refresh period, `None` when disabled.
    #[must_use]
    pub const fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.refresh_interval_secs))
        }
    }

    /// Builds an empty-cache registry honouring `bundled`, `duplicate_policy`
    /// and `bundle_fallback`.
    #[must_use]
    pub fn build_registry(&self) -> ChainRegistry {
        let registry = if self.bundled {
            ChainRegistry::bundled()
        } else {
            ChainRegistry::empty()
        };
        registry
            .with_policy(self.duplicate_policy)
            .with_fallback(self.bundle_fallback)
    }

    /// Builds a fetcher for `endpoint`, sending `client_id` when present.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the HTTP client cannot be built.
    pub fn build_fetcher(&self, client_id: Option<&str>) -> Result<ChainFetcher, FetchError> {
        let mut builder = ChainFetcher::builder(self.endpoint.clone()).timeout(self.timeout());
        if let Some(client_id) = client_id {
            builder = builder.client_id(client_id);
        }
        builder.build()
    }
}

/// `[rpc]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Client ID substituted for `${THIRDWEB_API_KEY}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Value for `${INFURA_API_KEY}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infura_api_key: Option<String>,
    /// Value for `${ALCHEMY_API_KEY}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alchemy_api_key: Option<String>,
}

impl RpcConfig {
    /// Template context built from the configured keys.
    #[must_use]
    pub fn context(&self) -> RpcContext {
        let mut ctx = RpcContext::new(self.client_id.clone().unwrap_or_default());
        if let Some(key) = &self.infura_api_key {
            ctx = ctx.with_infura_api_key(key.clone());
        }
        if let Some(key) = &self.alchemy_api_key {
            ctx = ctx.with_alchemy_api_key(key.clone());
        }
        ctx
    }
}

fn default_host() -> IpAddr {
    std::env::var("HOST")
        .ok()
        .and_then(|h| h.parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn default_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

fn default_endpoint() -> Url {
    Url::parse(DEFAULT_CHAINS_ENDPOINT).expect("default endpoint is a valid URL")
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_refresh_interval_secs() -> u64 {
    300
}

const fn default_true() -> bool {
    true
}

/// Resolve an environment-variable reference (`$VAR` or `${VAR}`), returning
/// the literal string unchanged if it does not match either pattern.
///
/// Only a whole-value reference to a single name made of ASCII alphanumerics
/// and `_` is resolved; `"${A}-${B}"` is kept as written.
fn resolve_env(value: &str) -> Result<String, Error> {
    let reference = value
        .strip_prefix("${")
        .and_then(|v| v.strip_suffix('}'))
        .or_else(|| value.strip_prefix('$'));
    let var_name = match reference {
        Some(name) if is_env_name(name) => name,
        _ => return Ok(value.to_owned()),
    };
    std::env::var(var_name).map_err(|_| {
        Error::config(format!(
            "env var '{var_name}' not found (referenced as '{value}')"
        ))
    })
}

fn is_env_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn resolve_env_refs(value: &mut toml::Value) -> Result<(), Error> {
    match value {
        toml::Value::String(s) => *s = resolve_env(s)?,
        toml::Value::Array(items) => {
            for item in items {
                resolve_env_refs(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                resolve_env_refs(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Load configuration from a TOML file at the given path.
///
/// Values not present in the file fall back to environment variables
/// (`PORT`, `HOST`) and then to hardcoded defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be resolved, read, or parsed.
pub fn load_config(path: &Path) -> Result<Config, Error> {
    let config_path = path.canonicalize().map_err(|e| {
        Error::config_with(format!("failed to resolve config path '{}'", path.display()), e)
    })?;
    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        Error::config_with(
            format!("failed to read config file '{}'", config_path.display()),
            e,
        )
    })?;
    Config::from_toml_str(&content).map_err(|e| match e {
        Error::Config(msg) => Error::config(format!("{}: {msg}", config_path.display())),
        other => other,
    })
}

/// Generate a default TOML configuration template.
#[must_use]
pub fn generate_default_config() -> String {
    format!(
        r#"# chainreg configuration

# Server bind address and port for `chainreg serve`.
# Can also be set via HOST / PORT environment variables.
host = "127.0.0.1"
port = 8080

# ── Chain registry ──────────────────────────────────────────────────
[registry]
# Chain-list endpoint returning {{ "data": [ ... ] }}.
endpoint = "{DEFAULT_CHAINS_ENDPOINT}"
# Request timeout in seconds.
timeout_secs = 10
# How often `serve` refreshes the chain list; 0 disables refreshing.
refresh_interval_secs = 300
# Records sharing a chain ID: "last-wins", "first-wins" or "prefer-active".
duplicate_policy = "last-wins"
# Fall back to the chain list compiled into the binary.
bundled = true
# "until-fetched": bundled records are dropped once a list is fetched.
# "per-key": chains missing from the fetched list resolve from the bundle.
bundle_fallback = "until-fetched"

# ── RPC resolution ──────────────────────────────────────────────────
# Values support environment variable references: "$VAR" or "${{VAR}}"
[rpc]
client_id = "$THIRDWEB_CLIENT_ID"
# infura_api_key = "$INFURA_API_KEY"
# alchemy_api_key = "$ALCHEMY_API_KEY"
"#
    )
}
