//! Outbound page fetching with target validation on every redirect hop.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{redirect::Policy, Client, Url};
use thiserror::Error;

use crate::core::config::settings::WebSettings;

const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("only http/https URLs are supported, got '{0}'")]
    UnsupportedScheme(String),

    #[error("fetching '{0}' is not allowed")]
    Blocked(String),

    #[error("host '{0}' could not be resolved")]
    Unresolvable(String),

    #[error("request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("fetch of {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("fetched content exceeded max size of {0} bytes")]
    TooLarge(usize),

    #[error("too many redirects starting at {0}")]
    TooManyRedirects(String),
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Address after redirects.
    pub url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("html"))
            .unwrap_or(true)
    }
}

#[derive(Clone)]
pub struct WebFetcher {
    client: Client,
    settings: WebSettings,
}

impl WebFetcher {
    pub fn new(settings: WebSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(settings.fetch_timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(settings.fetch_timeout_secs.clamp(1, 30)))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(FetchError::Http)?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &WebSettings {
        &self.settings
    }

    /// GETs `url`, following up to five redirects by hand so each target is
    /// checked before it is contacted.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut current = parse_http_url(url.trim())?;

        for _ in 0..=MAX_REDIRECTS {
            self.validate_target(&current).await?;

            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(FetchError::Http)?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| FetchError::Status {
                        url: current.to_string(),
                        status: status.as_u16(),
                    })?;
                let next = current
                    .join(location)
                    .map_err(|_| FetchError::InvalidUrl(location.to_string()))?;
                tracing::debug!("Following redirect {} -> {}", current, next);
                current = parse_http_url(next.as_str())?;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let max_bytes = self.settings.max_bytes;
            let mut bytes = Vec::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(FetchError::Http)?;
                if bytes.len().saturating_add(chunk.len()) > max_bytes {
                    return Err(FetchError::TooLarge(max_bytes));
                }
                bytes.extend_from_slice(&chunk);
            }

            return Ok(FetchedPage {
                url: current,
                content_type,
                body: String::from_utf8_lossy(&bytes).to_string(),
            });
        }

        Err(FetchError::TooManyRedirects(url.to_string()))
    }

    async fn validate_target(&self, url: &Url) -> Result<(), FetchError> {
        if self.settings.allow_private_networks {
            return Ok(());
        }

        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        let bare = host.trim_start_matches('[').trim_end_matches(']');

        if self
            .settings
            .url_denylist
            .iter()
            .any(|pattern| host_matches_pattern(bare, pattern))
        {
            return Err(FetchError::Blocked(host.to_string()));
        }

        if let Ok(ip) = bare.parse::<IpAddr>() {
            return ensure_public_ip(host, ip);
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let addresses = tokio::net::lookup_host((bare, port))
            .await
            .map_err(|_| FetchError::Unresolvable(host.to_string()))?
            .collect::<Vec<_>>();
        if addresses.is_empty() {
            return Err(FetchError::Unresolvable(host.to_string()));
        }
        for address in addresses {
            ensure_public_ip(host, address.ip())?;
        }
        Ok(())
    }
}

pub fn parse_http_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|_| FetchError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::UnsupportedScheme(other.to_string())),
    }
}

fn ensure_public_ip(host: &str, ip: IpAddr) -> Result<(), FetchError> {
    if is_blocked_ip(ip) {
        return Err(FetchError::Blocked(host.to_string()));
    }
    Ok(())
}

fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_multicast()
        // carrier-grade NAT
        || (octets[0] == 100 && (64..=127).contains(&octets[1]))
        || octets[0] == 0
        || octets[0] >= 240
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(mapped);
    }

    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_unique_local()
        || ip.is_unicast_link_local()
}

fn host_matches_pattern(host: &str, pattern: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();

    if let Some(suffix) = pattern.strip_prefix('*') {
        return host.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return host.starts_with(prefix);
    }
    host == pattern
}
