//! Remote chain-list retrieval.
//!
//! [`ChainFetcher`] issues `GET <endpoint>` and expects `{ "data": [...] }`.
//! Failures carry the server's `error.message` when the body has one. There
//! is no retry and no caching here; [`ChainRegistry`](super::ChainRegistry)
//! owns the cache and callers own the retry policy.

use std::error::Error as _;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use url::Url;

use super::record::ChainRecord;

/// Default chain-list endpoint.
pub const DEFAULT_CHAINS_ENDPOINT: &str = "https://api.thirdweb.com/v1/chains";

/// Default request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const CLIENT_ID_HEADER: &str = "x-client-id";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Boxed future returned by [`ChainSource::fetch_all`].
pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<ChainRecord>, FetchError>> + Send + 'a>>;

/// Anything able to produce a full chain list.
pub trait ChainSource: Send + Sync {
    /// Retrieves the complete chain list.
    fn fetch_all(&self) -> FetchFuture<'_>;
}

/// Chain-list retrieval failure.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// Transport-level failure (connect, timeout, body read).
    #[error("chain list request failed: {0}{cause}", cause = cause_suffix(.0))]
    Http(#[from] reqwest::Error),
    /// Non-success HTTP status.
    #[error("chain list request failed with HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, or the status reason phrase.
        message: String,
    },
    /// Success status with an `error` field in the body.
    #[error("chain list endpoint returned an error: {message}")]
    Api {
        /// Server-provided message.
        message: String,
    },
    /// The body is not a valid chain-list payload.
    #[error("malformed chain list payload: {0}")]
    Decode(#[from] serde_json::Error),
    /// Success status with neither `data` nor `error`.
    #[error("chain list payload has no data")]
    MissingData,
    /// The configured client ID cannot be sent as a header.
    #[error("client ID is not a valid header value")]
    InvalidClientId,
}

fn cause_suffix(err: &reqwest::Error) -> String {
    err.source()
        .map(|cause| format!(" ({cause})"))
        .unwrap_or_default()
}

impl FetchError {
    /// HTTP status of the failed response, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Vec<ChainRecord>>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiError {
    Detailed { message: String },
    Plain(String),
}

impl ApiError {
    fn into_message(self) -> String {
        match self {
            Self::Detailed { message } | Self::Plain(message) => message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorOnly {
    error: ApiError,
}

/// HTTP client for the chain-list endpoint.
#[derive(Debug, Clone)]
pub struct ChainFetcher {
    client: reqwest::Client,
    endpoint: Url,
}

impl ChainFetcher {
    /// Fetcher for `endpoint` with the default timeout and no client ID.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new(endpoint: Url) -> Result<Self, FetchError> {
        Self::builder(endpoint).build()
    }

    /// Starts a [`ChainFetcherBuilder`].
    #[must_use]
    pub const fn builder(endpoint: Url) -> ChainFetcherBuilder {
        ChainFetcherBuilder {
            endpoint,
            timeout: DEFAULT_FETCH_TIMEOUT,
            client_id: None,
        }
    }

    /// Endpoint this fetcher targets.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Retrieves the full chain list.
    ///
    /// # Errors
    ///
    /// See [`FetchError`].
    pub async fn fetch_all(&self) -> Result<Vec<ChainRecord>, FetchError> {
        tracing::debug!(endpoint = %self.endpoint, "fetching chain list");
        let response = self.client.get(self.endpoint.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorOnly>(&body).map_or_else(
                |_| status.canonical_reason().unwrap_or("unknown status").to_owned(),
                |e| e.error.into_message(),
            );
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope = serde_json::from_slice(&body)?;
        if let Some(error) = envelope.error {
            return Err(FetchError::Api {
                message: error.into_message(),
            });
        }
        let records = envelope.data.ok_or(FetchError::MissingData)?;
        tracing::debug!(endpoint = %self.endpoint, count = records.len(), "fetched chain list");
        Ok(records)
    }
}

impl ChainSource for ChainFetcher {
    fn fetch_all(&self) -> FetchFuture<'_> {
        Box::pin(Self::fetch_all(self))
    }
}

/// Builder for [`ChainFetcher`].
#[derive(Debug, Clone)]
pub struct ChainFetcherBuilder {
    endpoint: Url,
    timeout: Duration,
    client_id: Option<String>,
}

impl ChainFetcherBuilder {
    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Client ID sent as `x-client-id`. Empty values are ignored.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        self.client_id = (!client_id.trim().is_empty()).then_some(client_id);
        self
    }

    /// Builds the fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidClientId`] for a client ID containing
    /// characters not allowed in headers, or [`FetchError::Client`] if the HTTP
    /// client cannot be built.
    pub fn build(self) -> Result<ChainFetcher, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(client_id) = &self.client_id {
            let value =
                HeaderValue::from_str(client_id).map_err(|_| FetchError::InvalidClientId)?;
            headers.insert(CLIENT_ID_HEADER, value);
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;
        Ok(ChainFetcher {
            client,
            endpoint: self.endpoint,
        })
    }
}
