//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client (browser-like headers, timeouts, DNS cache)
//! - Cleaning a target's domain and deriving the four URL variants
//! - Trying the variants in order until one yields enough text
//! - Turning the last failure into a classified outcome

use crate::config::Config;
use crate::crawler::classifier::{classify, error_detail, Failure};
use crate::crawler::extractor::{check_content, extract_text};
use crate::state::ErrorKind;
use crate::storage::TargetRecord;
use crate::TesseraError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const MAX_REDIRECTS: usize = 10;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Final result of fetching one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A variant produced enough text
    Success { target_id: i64, text: String },

    /// Every variant failed; kind and detail come from the last failure
    Failed {
        target_id: i64,
        kind: ErrorKind,
        detail: String,
    },
}

impl Outcome {
    /// Builds a failed outcome from a classified failure
    pub fn failed(target_id: i64, failure: &Failure) -> Self {
        Self::Failed {
            target_id,
            kind: classify(failure),
            detail: error_detail(failure),
        }
    }

    pub fn target_id(&self) -> i64 {
        match self {
            Self::Success { target_id, .. } | Self::Failed { target_id, .. } => *target_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error kind of a failed outcome
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Response to a single GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    /// Status after redirects were followed
    pub status: u16,
    /// Decoded body; left empty for error statuses
    pub body: String,
}

impl PageResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Issues GET requests on behalf of the fetcher
///
/// Implementations are shared by every in-flight fetch.
#[async_trait]
pub trait PageClient: Send + Sync {
    /// Fetches `url`, following redirects
    ///
    /// Any response, including an error status, is `Ok`; `Err` means no
    /// response was obtained.
    async fn get(&self, url: &str) -> Result<PageResponse, Failure>;
}

/// [`PageClient`] backed by a pooled `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpPageClient {
    client: Client,
}

impl HttpPageClient {
    /// Builds the client from the `[crawler]` and `[http]` settings
    pub fn new(config: &Config) -> Result<Self, TesseraError> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Wraps an already-built client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageClient for HttpPageClient {
    async fn get(&self, url: &str) -> Result<PageResponse, Failure> {
        let response = self.client.get(url).send().await.map_err(transport_failure)?;
        let status = response.status().as_u16();

        if status >= 400 {
            return Ok(PageResponse {
                status,
                body: String::new(),
            });
        }

        let body = response.text().await.map_err(transport_failure)?;
        Ok(PageResponse { status, body })
    }
}

/// Builds an HTTP client with browser-like headers
///
/// # Arguments
///
/// * `config` - The full configuration; `[crawler]` supplies the timeouts,
///   `[http]` the headers and pool settings
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(TesseraError)` - Invalid header value or client build failure
pub fn build_http_client(config: &Config) -> Result<Client, TesseraError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.http.accept_language)?,
    );

    let client = Client::builder()
        .user_agent(config.http.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.crawler.connect_timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .pool_max_idle_per_host(config.http.pool_max_idle_per_host)
        .danger_accept_invalid_certs(config.http.accept_invalid_certs)
        .hickory_dns(true)
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

fn transport_failure(err: reqwest::Error) -> Failure {
    let timed_out = err.is_timeout();
    let connect = err.is_connect();
    // Domain names must not reach the classifier markers
    let err = err.without_url();

    Failure::Transport {
        message: describe_chain(&err),
        timed_out,
        connect,
    }
}

fn describe_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Strips scheme, a leading `www.` and trailing slashes from a domain value
///
/// # Example
///
/// ```
/// use tessera::crawler::clean_domain;
///
/// assert_eq!(clean_domain("https://www.example.it/"), "example.it");
/// ```
pub fn clean_domain(raw: &str) -> String {
    let mut domain = raw.trim();

    for scheme in ["https://", "http://"] {
        if let Some(rest) = strip_prefix_ignore_case(domain, scheme) {
            domain = rest;
            break;
        }
    }

    if let Some(rest) = strip_prefix_ignore_case(domain, "www.") {
        domain = rest;
    }

    domain.trim_end_matches('/').to_string()
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

/// Resolves the domain to fetch for a target
///
/// Uses the domain field, falling back to the host of the URL field when the
/// domain is empty. Returns `None` when nothing usable remains after cleaning.
pub fn resolve_domain(domain: Option<&str>, url: Option<&str>) -> Option<String> {
    let raw = match domain.map(str::trim).filter(|d| !d.is_empty()) {
        Some(domain) => domain.to_string(),
        None => {
            let url = url.map(str::trim).filter(|u| !u.is_empty())?;
            host_of(url).unwrap_or_else(|| url.to_string())
        }
    };

    let cleaned = clean_domain(&raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// The four URL variants of a cleaned domain, in the order they are tried
pub fn url_variants(domain: &str) -> [String; 4] {
    [
        format!("https://www.{}", domain),
        format!("https://{}", domain),
        format!("http://www.{}", domain),
        format!("http://{}", domain),
    ]
}

/// Fetches targets through a shared [`PageClient`]
pub struct Fetcher<C> {
    client: Arc<C>,
    min_content_chars: usize,
}

impl<C: PageClient> Fetcher<C> {
    pub fn new(client: Arc<C>, min_content_chars: usize) -> Self {
        Self {
            client,
            min_content_chars,
        }
    }

    /// Fetches one target and produces its outcome
    ///
    /// Variants are tried strictly in order and the first success stops the
    /// attempt; when all four fail, the last failure decides the error kind.
    /// A target without a usable domain fails with `no_url` and makes no
    /// requests.
    pub async fn fetch(&self, target: &TargetRecord) -> Outcome {
        let domain = match resolve_domain(target.domain.as_deref(), target.url.as_deref()) {
            Some(domain) => domain,
            None => return Outcome::failed(target.id, &Failure::NoUrl),
        };

        let mut last_failure = Failure::NoUrl;
        for url in url_variants(&domain) {
            match self.try_variant(&url).await {
                Ok(text) => {
                    debug!("Target {} fetched via {}", target.id, url);
                    return Outcome::Success {
                        target_id: target.id,
                        text,
                    };
                }
                Err(failure) => {
                    debug!("Target {} failed via {}: {}", target.id, url, failure);
                    last_failure = failure;
                }
            }
        }

        Outcome::failed(target.id, &last_failure)
    }

    async fn try_variant(&self, url: &str) -> Result<String, Failure> {
        let response = self.client.get(url).await?;
        if response.status >= 400 {
            return Err(Failure::Status {
                code: response.status,
            });
        }

        check_content(extract_text(&response.body), self.min_content_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::test_support::{target, StubClient};

    fn fetcher(client: StubClient, min_chars: usize) -> (Fetcher<StubClient>, Arc<StubClient>) {
        let client = Arc::new(client);
        (Fetcher::new(client.clone(), min_chars), client)
    }

    #[test]
    fn test_build_http_client_with_defaults() {
        assert!(build_http_client(&Config::default()).is_ok());
    }

    #[test]
    fn test_build_http_client_rejects_bad_header() {
        let mut config = Config::default();
        config.http.accept_language = "it\nIT".to_string();
        assert!(matches!(
            build_http_client(&config),
            Err(TesseraError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_clean_domain() {
        assert_eq!(clean_domain("example.it"), "example.it");
        assert_eq!(clean_domain("www.example.it"), "example.it");
        assert_eq!(clean_domain("https://www.example.it/"), "example.it");
        assert_eq!(clean_domain("HTTP://WWW.Example.it//"), "Example.it");
        assert_eq!(clean_domain("  example.it/chi-siamo/ "), "example.it/chi-siamo");
        assert_eq!(clean_domain("https://"), "");
        assert_eq!(clean_domain(""), "");
    }

    #[test]
    fn test_resolve_domain_prefers_domain_field() {
        assert_eq!(
            resolve_domain(Some("rossi.it"), Some("https://bianchi.it")),
            Some("rossi.it".to_string())
        );
    }

    #[test]
    fn test_resolve_domain_falls_back_to_url() {
        assert_eq!(
            resolve_domain(None, Some("https://www.bianchi.it/contatti")),
            Some("bianchi.it".to_string())
        );
        assert_eq!(
            resolve_domain(Some("   "), Some("http://127.0.0.1:8080/")),
            Some("127.0.0.1:8080".to_string())
        );
    }

    #[test]
    fn test_resolve_domain_nothing_usable() {
        assert_eq!(resolve_domain(None, None), None);
        assert_eq!(resolve_domain(Some(""), Some("")), None);
        assert_eq!(resolve_domain(Some("https://www./"), None), None);
    }

    #[test]
    fn test_url_variants_order() {
        assert_eq!(
            url_variants("example.it"),
            [
                "https://www.example.it".to_string(),
                "https://example.it".to_string(),
                "http://www.example.it".to_string(),
                "http://example.it".to_string(),
            ]
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = Outcome::Success {
            target_id: 3,
            text: "x".to_string(),
        };
        let failed = Outcome::failed(4, &Failure::Status { code: 404 });

        assert_eq!(ok.target_id(), 3);
        assert!(ok.is_success());
        assert_eq!(ok.error_kind(), None);
        assert_eq!(failed.target_id(), 4);
        assert_eq!(failed.error_kind(), Some(ErrorKind::Http4xx));
    }

    #[tokio::test]
    async fn test_first_variant_success_stops() {
        let stub = StubClient::new().page(
            "https://www.example.it",
            "<html><body><h1>Hi</h1><footer>x</footer></body></html>",
        );
        let (fetcher, client) = fetcher(stub, 2);

        let outcome = fetcher.fetch(&target(1, Some("example.it"))).await;

        assert_eq!(
            outcome,
            Outcome::Success {
                target_id: 1,
                text: "Hi".to_string()
            }
        );
        assert_eq!(client.calls(), vec!["https://www.example.it".to_string()]);
    }

    #[tokio::test]
    async fn test_short_page_is_parse_error_with_default_threshold() {
        let stub = StubClient::serving("<html><body><h1>Hi</h1><footer>x</footer></body></html>");
        let (fetcher, client) = fetcher(stub, 50);

        let outcome = fetcher.fetch(&target(1, Some("example.it"))).await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::ParseError));
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn test_falls_through_to_later_variant() {
        let stub = StubClient::new()
            .status("https://www.example.it", 404)
            .status("https://example.it", 500)
            .page("http://www.example.it", "<p>Benvenuti nel sito</p>");
        let (fetcher, client) = fetcher(stub, 5);

        let outcome = fetcher.fetch(&target(9, Some("example.it"))).await;

        assert!(outcome.is_success());
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_all_variants_fail_last_failure_wins() {
        let stub = StubClient::new()
            .status("https://www.example.it", 404)
            .status("https://example.it", 404)
            .status("http://www.example.it", 404)
            .status("http://example.it", 503);
        let (fetcher, client) = fetcher(stub, 5);

        let outcome = fetcher.fetch(&target(2, Some("example.it"))).await;

        assert_eq!(
            outcome,
            Outcome::Failed {
                target_id: 2,
                kind: ErrorKind::Http5xx,
                detail: "HTTP 503".to_string()
            }
        );
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn test_timeouts_everywhere() {
        let stub = StubClient::failing(Failure::Transport {
            message: "operation timed out".to_string(),
            timed_out: true,
            connect: false,
        });
        let (fetcher, client) = fetcher(stub, 50);

        let outcome = fetcher.fetch(&target(5, Some("deadsite.it"))).await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(
            client.calls(),
            url_variants("deadsite.it").to_vec(),
            "all four variants tried in order"
        );
    }

    #[tokio::test]
    async fn test_no_url_makes_no_requests() {
        let (fetcher, client) = fetcher(StubClient::new(), 50);

        let outcome = fetcher.fetch(&target(7, None)).await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::NoUrl));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_long_failure_detail_is_truncated() {
        let stub = StubClient::failing(Failure::transport("boom ".repeat(400)));
        let (fetcher, _) = fetcher(stub, 50);

        match fetcher.fetch(&target(8, Some("example.it"))).await {
            Outcome::Failed { kind, detail, .. } => {
                assert_eq!(kind, ErrorKind::OtherError);
                assert_eq!(detail.chars().count(), 500);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
