//! HTTP fetcher implementation
//!
//! One GET per identifier. Redirects are never followed because a redirect
//! status is itself a classification signal, and every request carries the
//! configured timeout so a stalled mirror surfaces as a transport error.

use crate::config::FetchConfig;
use crate::url::UrlTemplate;
use crate::SweepError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use thiserror::Error;

/// Raw response for one identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body, decoded as text
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure below the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Capability that retrieves the document for one identifier
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, id: i64) -> Result<FetchResponse, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    template: UrlTemplate,
}

impl HttpFetcher {
    pub fn new(client: Client, template: UrlTemplate) -> Self {
        Self { client, template }
    }

    /// Builds the client and request template from configuration
    pub fn from_config(config: &FetchConfig) -> Result<Self, SweepError> {
        let template = config.template()?;
        let client = build_http_client(config)?;
        Ok(Self::new(client, template))
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, id: i64) -> Result<FetchResponse, TransportError> {
        let url = self.template.render(id);
        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(FetchResponse { status, body })
    }
}
