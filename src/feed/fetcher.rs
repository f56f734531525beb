//! Feed fetcher with SSRF protection and resource limits.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::FetchConfig;
use crate::{PesosError, Result};

/// Reasons a feed could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The URL could not be parsed or uses an unsupported scheme.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL points at a loopback, private or reserved host.
    #[error("forbidden host: {0}")]
    ForbiddenHost(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The body exceeds the configured size limit.
    #[error("feed too large: {size} bytes (max {max} bytes)")]
    TooLarge {
        /// Observed size.
        size: u64,
        /// Configured limit.
        max: u64,
    },

    /// Connection, TLS or body transfer failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Raw feed body plus the declared content type.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    /// Response body.
    pub body: Vec<u8>,
    /// Value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
}

/// Something that can retrieve a feed body by URL.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch the raw body of the feed at `url`.
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedFeed, FetchError>;
}

/// HTTP client settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout between body reads.
    pub read_timeout: Duration,
    /// Timeout for the whole request.
    pub timeout: Duration,
    /// Maximum number of redirects.
    pub max_redirects: usize,
    /// Maximum body size in bytes.
    pub max_feed_size: u64,
    /// User agent header.
    pub user_agent: String,
    /// Skip the private-address check.
    pub allow_private_hosts: bool,
}

impl From<&FetchConfig> for FetchOptions {
    fn from(config: &FetchConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            timeout: Duration::from_secs(config.total_timeout_secs),
            max_redirects: config.max_redirects,
            max_feed_size: config.max_feed_size_bytes,
            user_agent: config.user_agent.clone(),
            allow_private_hosts: config.allow_private_hosts,
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

/// Feed fetcher backed by reqwest.
pub struct HttpFetcher {
    client: Client,
    options: FetchOptions,
}

impl HttpFetcher {
    /// Create a new fetcher with the given options.
    pub fn new(options: FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .timeout(options.timeout)
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .user_agent(options.user_agent.as_str())
            .build()
            .map_err(|e| PesosError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, options })
    }

    /// Create a fetcher from the `[fetch]` configuration section.
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Self::new(FetchOptions::from(config))
    }

    fn check_size(&self, size: u64) -> std::result::Result<(), FetchError> {
        if size > self.options.max_feed_size {
            return Err(FetchError::TooLarge {
                size,
                max: self.options.max_feed_size,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedFeed, FetchError> {
        if self.options.allow_private_hosts {
            parse_http_url(url)?;
        } else {
            validate_url(url)?;
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        if let Some(content_length) = response.content_length() {
            self.check_size(content_length)?;
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        // Servers may omit or understate Content-Length; stop reading once
        // the body passes the limit.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_request_error)? {
            body.extend_from_slice(&chunk);
            self.check_size(body.len() as u64)?;
        }

        debug!("Fetched {} ({} bytes)", url, body.len());

        Ok(FetchedFeed { body, content_type })
    }
}

fn map_request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

fn parse_http_url(url: &str) -> std::result::Result<url::Url, FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(FetchError::InvalidUrl(format!(
            "unsupported URL scheme: {scheme}"
        ))),
    }
}

/// Validate a feed URL for SSRF protection.
///
/// The URL must be http(s) and must not point at a loopback, private,
/// link-local or reserved address or hostname.
pub fn validate_url(url: &str) -> std::result::Result<(), FetchError> {
    let parsed = parse_http_url(url)?;

    let host = parsed
        .host()
        .ok_or_else(|| FetchError::InvalidUrl("URL has no host".to_string()))?;

    match host {
        url::Host::Domain(domain) if is_forbidden_hostname(domain) => {
            Err(FetchError::ForbiddenHost(domain.to_string()))
        }
        url::Host::Domain(_) => Ok(()),
        url::Host::Ipv4(ip) if is_private_ip(&IpAddr::V4(ip)) => {
            Err(FetchError::ForbiddenHost(ip.to_string()))
        }
        url::Host::Ipv6(ip) if is_private_ip(&IpAddr::V6(ip)) => {
            Err(FetchError::ForbiddenHost(ip.to_string()))
        }
        _ => Ok(()),
    }
}

/// Hostnames that only resolve inside a private network.
const FORBIDDEN_SUFFIXES: &[&str] = &[
    ".local",
    ".localhost",
    ".internal",
    ".intranet",
    ".corp",
    ".home",
    ".lan",
];

fn is_forbidden_hostname(host: &str) -> bool {
    let host = host.to_lowercase();
    host == "localhost" || FORBIDDEN_SUFFIXES.iter().any(|s| host.ends_with(s))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.is_documentation()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // unique local fc00::/7
                || (first & 0xfe00) == 0xfc00
                // link-local fe80::/10
                || (first & 0xffc0) == 0xfe80
        }
    }
}
