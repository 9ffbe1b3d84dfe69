//! RPC URL templates and client-key substitution.
//!
//! Chain records carry RPC URLs such as
//! `https://1.rpc.thirdweb.com/${THIRDWEB_API_KEY}`. A [`RpcTemplate`] parses
//! such a string into literal and [`Placeholder`] segments so that only known
//! variables are accepted and nothing is rendered while a variable is unbound.
//! Bound values are restricted to URL-unreserved characters and every
//! rendered URL is parsed before it is returned.

use std::fmt;
use std::str::FromStr;

use url::Url;

use super::record::ChainRecord;

/// Substitution variables understood in RPC templates.
///
/// `${KEY}` and `${API_KEY_PLACEHOLDER}` are accepted as spellings of
/// `${THIRDWEB_API_KEY}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `${THIRDWEB_API_KEY}`, bound to the caller's client ID.
    ThirdwebApiKey,
    /// `${INFURA_API_KEY}`.
    InfuraApiKey,
    /// `${ALCHEMY_API_KEY}`.
    AlchemyApiKey,
}

impl Placeholder {
    /// Variable name as written between `${` and `}`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ThirdwebApiKey => "THIRDWEB_API_KEY",
            Self::InfuraApiKey => "INFURA_API_KEY",
            Self::AlchemyApiKey => "ALCHEMY_API_KEY",
        }
    }
}

impl FromStr for Placeholder {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "THIRDWEB_API_KEY" | "KEY" | "API_KEY_PLACEHOLDER" => Ok(Self::ThirdwebApiKey),
            "INFURA_API_KEY" => Ok(Self::InfuraApiKey),
            "ALCHEMY_API_KEY" => Ok(Self::AlchemyApiKey),
            other => Err(TemplateError::UnknownPlaceholder(other.to_owned())),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}}}", self.name())
    }
}

/// Malformed RPC template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// `${` without a closing `}`.
    #[error("unterminated placeholder in '{0}'")]
    Unterminated(String),
    /// Placeholder name outside the known set (includes the empty `${}`).
    #[error("unknown placeholder '${{{0}}}'")]
    UnknownPlaceholder(String),
    /// The template does not render to a valid URL.
    #[error("'{template}' is not a valid URL template: {reason}")]
    InvalidUrl {
        /// Raw template.
        template: String,
        /// Parser message.
        reason: String,
    },
}

/// Failure to produce a dispatchable RPC URL for a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// The record has no usable HTTP(S) RPC endpoint.
    #[error("no RPC available for chain {chain_id}")]
    NoRpcAvailable {
        /// Chain the lookup was for.
        chain_id: u64,
    },
    /// The preferred template needs a value the caller did not supply.
    #[error("RPC for chain {chain_id} requires {placeholder} but no value was supplied")]
    MissingValue {
        /// Chain the lookup was for.
        chain_id: u64,
        /// The unbound placeholder.
        placeholder: Placeholder,
    },
    /// The preferred template is malformed.
    #[error("invalid RPC template for chain {chain_id}: {source}")]
    InvalidTemplate {
        /// Chain the lookup was for.
        chain_id: u64,
        /// Underlying template error.
        #[source]
        source: TemplateError,
    },
    /// A bound value contains characters outside the URL-unreserved set.
    #[error("value for {placeholder} on chain {chain_id} contains characters not allowed in a URL")]
    InvalidValue {
        /// Chain the lookup was for.
        chain_id: u64,
        /// The placeholder whose value was rejected.
        placeholder: Placeholder,
    },
    /// The rendered template is not a valid URL.
    #[error("RPC URL for chain {chain_id} is invalid: {reason}")]
    InvalidUrl {
        /// Chain the lookup was for.
        chain_id: u64,
        /// Parser message.
        reason: String,
    },
}

/// Why a template could not be rendered against an [`RpcContext`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// No value is bound to the placeholder.
    #[error("{0} is unbound")]
    Unbound(Placeholder),
    /// The bound value contains characters outside `A-Z a-z 0-9 - . _ ~`.
    #[error("value for {0} contains characters not allowed in a URL")]
    InvalidValue(Placeholder),
    /// The rendered string does not parse as a URL.
    #[error("rendered URL is invalid: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(Placeholder),
}

/// Parsed RPC URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl RpcTemplate {
    /// Parses `raw`, checking placeholder syntax and URL shape.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for unterminated or unknown placeholders, or
    /// when the template (with placeholders filled by a dummy value) is not a
    /// valid absolute URL.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = raw;
        while let Some(start) = rest.find("${") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_owned()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| TemplateError::Unterminated(raw.to_owned()))?;
            segments.push(Segment::Var(after[..end].parse()?));
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_owned()));
        }

        let template = Self {
            raw: raw.to_owned(),
            segments,
        };
        let sample = template.render_with(|_| Some("key"));
        Url::parse(&sample).map_err(|e| TemplateError::InvalidUrl {
            template: raw.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(template)
    }

    /// The raw template string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholders referenced by this template, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Var(p) => Some(*p),
            Segment::Literal(_) => None,
        })
    }

    /// URL scheme (`https`, `wss`, ...), lowercased.
    #[must_use]
    pub fn scheme(&self) -> String {
        self.raw
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Whether the template targets an HTTP(S) endpoint.
    #[must_use]
    pub fn is_http(&self) -> bool {
        matches!(self.scheme().as_str(), "http" | "https")
    }

    /// Renders the template against `ctx`.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Unbound`] for the first placeholder without a value.
    /// - [`RenderError::InvalidValue`] if a value could change the URL
    ///   structure (`/`, `?`, `#`, `@`, whitespace, ...).
    /// - [`RenderError::InvalidUrl`] if the result does not parse.
    pub fn render(&self, ctx: &RpcContext) -> Result<String, RenderError> {
        for placeholder in self.placeholders() {
            let value = ctx
                .value(placeholder)
                .ok_or(RenderError::Unbound(placeholder))?;
            if !is_unreserved(value) {
                return Err(RenderError::InvalidValue(placeholder));
            }
        }
        let rendered = self.render_with(|p| ctx.value(p));
        Url::parse(&rendered).map_err(|e| RenderError::InvalidUrl(e.to_string()))?;
        Ok(rendered)
    }

    fn render_with<'a>(&self, mut value: impl FnMut(Placeholder) -> Option<&'a str>) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Var(p) => out.push_str(value(*p).unwrap_or_default()),
            }
        }
        out
    }
}

impl FromStr for RpcTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RpcTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Values bound to template placeholders at resolve time.
///
/// Empty strings count as unbound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcContext {
    client_id: Option<String>,
    infura_api_key: Option<String>,
    alchemy_api_key: Option<String>,
}

impl RpcContext {
    /// Context binding `client_id` to `${THIRDWEB_API_KEY}`.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: non_empty(client_id.into()),
            ..Self::default()
        }
    }

    /// Binds `${INFURA_API_KEY}`.
    #[must_use]
    pub fn with_infura_api_key(mut self, key: impl Into<String>) -> Self {
        self.infura_api_key = non_empty(key.into());
        self
    }

    /// Binds `${ALCHEMY_API_KEY}`.
    #[must_use]
    pub fn with_alchemy_api_key(mut self, key: impl Into<String>) -> Self {
        self.alchemy_api_key = non_empty(key.into());
        self
    }

    /// Replaces the client ID, keeping third-party keys.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = non_empty(client_id.into());
        self
    }

    /// Whether a client ID is bound.
    #[must_use]
    pub const fn has_client_id(&self) -> bool {
        self.client_id.is_some()
    }

    /// Value bound to `placeholder`, if any.
    #[must_use]
    pub fn value(&self, placeholder: Placeholder) -> Option<&str> {
        match placeholder {
            Placeholder::ThirdwebApiKey => self.client_id.as_deref(),
            Placeholder::InfuraApiKey => self.infura_api_key.as_deref(),
            Placeholder::AlchemyApiKey => self.alchemy_api_key.as_deref(),
        }
    }
}

fn is_unreserved(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

fn non_empty(s: String) -> Option<String> {
    (!s.trim().is_empty()).then_some(s)
}

/// Resolves the preferred RPC URL of `record`, binding `client_id` to
/// `${THIRDWEB_API_KEY}`.
///
/// # Errors
///
/// See [`resolve_rpc_url_with`].
pub fn resolve_rpc_url(record: &ChainRecord, client_id: &str) -> Result<String, RpcError> {
    resolve_rpc_url_with(record, &RpcContext::new(client_id))
}

/// Resolves the preferred RPC URL of `record` against `ctx`.
///
/// Templates are tried in order; non-HTTP templates are skipped and the first
/// template whose placeholders are all bound is rendered.
///
/// # Errors
///
/// - [`RpcError::InvalidValue`] as soon as a template would embed a value
///   with URL-reserved characters.
/// - [`RpcError::NoRpcAvailable`] if the record has no HTTP(S) template.
/// - Otherwise, when no template can be rendered, the error of the first
///   HTTP(S) template ([`RpcError::MissingValue`], [`RpcError::InvalidUrl`]
///   or [`RpcError::InvalidTemplate`]).
pub fn resolve_rpc_url_with(record: &ChainRecord, ctx: &RpcContext) -> Result<String, RpcError> {
    let chain_id = record.chain_id;
    let mut first_error = None;

    for raw in &record.rpc {
        let template = match RpcTemplate::parse(raw) {
            Ok(template) => template,
            Err(source) => {
                if is_http_like(raw) {
                    tracing::debug!(chain_id, rpc = %raw, error = %source, "skipping malformed RPC template");
                    first_error.get_or_insert(RpcError::InvalidTemplate { chain_id, source });
                }
                continue;
            }
        };
        if !template.is_http() {
            continue;
        }
        match template.render(ctx) {
            Ok(url) => return Ok(url),
            Err(RenderError::Unbound(placeholder)) => {
                first_error.get_or_insert(RpcError::MissingValue {
                    chain_id,
                    placeholder,
                });
            }
            Err(RenderError::InvalidValue(placeholder)) => {
                return Err(RpcError::InvalidValue {
                    chain_id,
                    placeholder,
                });
            }
            Err(RenderError::InvalidUrl(reason)) => {
                tracing::debug!(chain_id, rpc = %raw, %reason, "rendered RPC URL does not parse");
                first_error.get_or_insert(RpcError::InvalidUrl { chain_id, reason });
            }
        }
    }

    Err(first_error.unwrap_or(RpcError::NoRpcAvailable { chain_id }))
}

fn is_http_like(raw: &str) -> bool {
    let lower = raw.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(rpc: &[&str]) -> ChainRecord {
        let mut record = ChainRecord::fallback(1);
        record.rpc = rpc.iter().map(|s| (*s).to_owned()).collect();
        record
    }

    #[test]
    fn substitutes_client_id() {
        let record = record_with(&["https://1.rpc.x.com/${THIRDWEB_API_KEY}"]);
        assert_eq!(
            resolve_rpc_url(&record, "abc").unwrap(),
            "https://1.rpc.x.com/abc"
        );
    }

    #[test]
    fn empty_rpc_list_has_no_rpc() {
        let record = record_with(&[]);
        assert_eq!(
            resolve_rpc_url(&record, "abc"),
            Err(RpcError::NoRpcAvailable { chain_id: 1 })
        );
    }

    #[test]
    fn websocket_only_has_no_rpc() {
        let record = record_with(&["wss://mainnet.infura.io/ws/v3/${INFURA_API_KEY}"]);
        let ctx = RpcContext::new("abc").with_infura_api_key("inf");
        assert_eq!(
            resolve_rpc_url_with(&record, &ctx),
            Err(RpcError::NoRpcAvailable { chain_id: 1 })
        );
    }

    #[test]
    fn skips_templates_with_unbound_keys() {
        let record = record_with(&[
            "https://mainnet.infura.io/v3/${INFURA_API_KEY}",
            "wss://mainnet.infura.io/ws/v3/${INFURA_API_KEY}",
            "https://1.rpc.thirdweb.com/${THIRDWEB_API_KEY}",
        ]);
        assert_eq!(
            resolve_rpc_url(&record, "client").unwrap(),
            "https://1.rpc.thirdweb.com/client"
        );

        let ctx = RpcContext::new("client").with_infura_api_key("inf");
        assert_eq!(
            resolve_rpc_url_with(&record, &ctx).unwrap(),
            "https://mainnet.infura.io/v3/inf"
        );
    }

    #[test]
    fn empty_client_id_is_unbound() {
        let record = record_with(&["https://1.rpc.thirdweb.com/${THIRDWEB_API_KEY}"]);
        assert_eq!(
            resolve_rpc_url(&record, ""),
            Err(RpcError::MissingValue {
                chain_id: 1,
                placeholder: Placeholder::ThirdwebApiKey,
            })
        );
    }

    #[test]
    fn reports_first_template_error() {
        let record = record_with(&[
            "https://eth-mainnet.g.alchemy.com/v2/${ALCHEMY_API_KEY}",
            "https://mainnet.infura.io/v3/${INFURA_API_KEY}",
        ]);
        assert_eq!(
            resolve_rpc_url(&record, "abc"),
            Err(RpcError::MissingValue {
                chain_id: 1,
                placeholder: Placeholder::AlchemyApiKey,
            })
        );
    }

    #[test]
    fn plain_urls_pass_through() {
        let record = record_with(&["https://cloudflare-eth.com"]);
        assert_eq!(
            resolve_rpc_url(&record, "abc").unwrap(),
            "https://cloudflare-eth.com"
        );
    }

    #[test]
    fn malformed_templates_are_skipped() {
        let record = record_with(&[
            "https://rpc.example.com/${QUICKNODE_KEY}",
            "https://rpc.example.org",
        ]);
        assert_eq!(
            resolve_rpc_url(&record, "abc").unwrap(),
            "https://rpc.example.org"
        );

        let record = record_with(&["https://rpc.example.com/${QUICKNODE_KEY}"]);
        assert!(matches!(
            resolve_rpc_url(&record, "abc"),
            Err(RpcError::InvalidTemplate {
                source: TemplateError::UnknownPlaceholder(_),
                ..
            })
        ));
    }

    #[test]
    fn parse_rejects_bad_syntax() {
        assert_eq!(
            RpcTemplate::parse("https://x.com/${THIRDWEB_API_KEY"),
            Err(TemplateError::Unterminated(
                "https://x.com/${THIRDWEB_API_KEY".to_owned()
            ))
        );
        assert_eq!(
            RpcTemplate::parse("https://x.com/${}"),
            Err(TemplateError::UnknownPlaceholder(String::new()))
        );
        assert!(matches!(
            RpcTemplate::parse("not a url"),
            Err(TemplateError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn parse_lists_placeholders_and_scheme() {
        let template: RpcTemplate = "wss://a.io/${INFURA_API_KEY}/${ALCHEMY_API_KEY}"
            .parse()
            .unwrap();
        assert_eq!(
            template.placeholders().collect::<Vec<_>>(),
            vec![Placeholder::InfuraApiKey, Placeholder::AlchemyApiKey]
        );
        assert_eq!(template.scheme(), "wss");
        assert!(!template.is_http());
        assert_eq!(template.to_string(), "wss://a.io/${INFURA_API_KEY}/${ALCHEMY_API_KEY}");
        assert_eq!(Placeholder::InfuraApiKey.to_string(), "${INFURA_API_KEY}");
    }

    #[test]
    fn rendered_urls_never_keep_placeholders() {
        let template = RpcTemplate::parse("https://${THIRDWEB_API_KEY}.example.com/path").unwrap();
        let url = template.render(&RpcContext::new("key")).unwrap();
        assert_eq!(url, "https://key.example.com/path");
        assert!(!url.contains("${"));
        assert_eq!(
            template.render(&RpcContext::default()),
            Err(RenderError::Unbound(Placeholder::ThirdwebApiKey))
        );
    }

    #[test]
    fn short_key_spellings_bind_the_client_id() {
        let record = record_with(&["https://1.rpc.x.com/${KEY}"]);
        assert_eq!(
            resolve_rpc_url(&record, "abc").unwrap(),
            "https://1.rpc.x.com/abc"
        );

        let record = record_with(&["https://1.rpc.x.com/${API_KEY_PLACEHOLDER}"]);
        assert_eq!(
            resolve_rpc_url(&record, "abc").unwrap(),
            "https://1.rpc.x.com/abc"
        );
        assert_eq!("KEY".parse::<Placeholder>(), Ok(Placeholder::ThirdwebApiKey));
        assert!("SECRET".parse::<Placeholder>().is_err());
    }

    #[test]
    fn values_with_reserved_characters_are_rejected() {
        let record = record_with(&["https://1.rpc.x.com/${THIRDWEB_API_KEY}"]);
        for client_id in ["abc def#x?y", "a/b", "user@host", "x%2F"] {
            assert_eq!(
                resolve_rpc_url(&record, client_id),
                Err(RpcError::InvalidValue {
                    chain_id: 1,
                    placeholder: Placeholder::ThirdwebApiKey,
                }),
                "{client_id}"
            );
        }
        assert_eq!(
            resolve_rpc_url(&record, "Ab-9._~").unwrap(),
            "https://1.rpc.x.com/Ab-9._~"
        );
    }

    #[test]
    fn values_cannot_move_the_host() {
        let template = RpcTemplate::parse("https://${THIRDWEB_API_KEY}.rpc.x.com/").unwrap();
        assert_eq!(
            template.render(&RpcContext::new("evil.com/")),
            Err(RenderError::InvalidValue(Placeholder::ThirdwebApiKey))
        );

        let url = template.render(&RpcContext::new("key.v2")).unwrap();
        let host = Url::parse(&url).unwrap().host_str().unwrap().to_owned();
        assert!(host.ends_with(".rpc.x.com"), "{host}");

        // A value-free public endpoint is not a way around a bad value.
        let record = record_with(&[
            "https://${THIRDWEB_API_KEY}.rpc.x.com/",
            "https://public.example.org",
        ]);
        assert!(matches!(
            resolve_rpc_url(&record, "evil.com/"),
            Err(RpcError::InvalidValue { .. })
        ));
    }

    #[test]
    fn rendered_url_is_parsed() {
        // Valid with a word label, an out-of-range IPv4 address with digits.
        let record = record_with(&["https://10.0.0.${THIRDWEB_API_KEY}/"]);
        assert!(matches!(
            resolve_rpc_url(&record, "999"),
            Err(RpcError::InvalidUrl { chain_id: 1, .. })
        ));
        assert_eq!(
            resolve_rpc_url(&record, "node").unwrap(),
            "https://10.0.0.node/"
        );
    }
}
