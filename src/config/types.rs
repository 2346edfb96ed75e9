use serde::Deserialize;

/// Browser-like user agent; many small company sites reject obvious bots
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Prefer Italian content, fall back to English
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "it-IT,it;q=0.9,en-US;q=0.8,en;q=0.7";

/// Main configuration structure for Tessera
///
/// Every section is optional; missing keys take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Crawl engine behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent target fetches (gate width)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout covering connect, headers and body
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Extracted text shorter than this (in characters) is a parse error
    #[serde(rename = "min-content-chars", default = "default_min_content")]
    pub min_content_chars: usize,

    /// Default region (country code) filter applied when the CLI gives none
    #[serde(default)]
    pub region: Option<String>,

    /// Log a progress line every N completed targets
    #[serde(rename = "progress-every", default = "default_progress_every")]
    pub progress_every: u64,

    /// Stop dispatching after this many seconds (0 disables the deadline)
    #[serde(rename = "max-run-secs", default)]
    pub max_run_secs: u64,
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,

    /// Idle keep-alive connections kept per host in the shared pool
    #[serde(rename = "pool-max-idle-per-host", default = "default_pool_idle")]
    pub pool_max_idle_per_host: usize,

    #[serde(rename = "accept-invalid-certs", default)]
    pub accept_invalid_certs: bool,
}

/// Batch persister settings
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Buffered outcomes that trigger an automatic flush
    #[serde(rename = "flush-threshold", default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Attempts made for the final flush before the run fails
    #[serde(rename = "final-flush-attempts", default = "default_final_flush_attempts")]
    pub final_flush_attempts: u32,

    /// Length of the truncated text variant stored next to the full text
    #[serde(rename = "cleaned-max-chars", default = "default_cleaned_max_chars")]
    pub cleaned_max_chars: usize,
}

/// Record store location
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

fn default_concurrency() -> usize {
    50
}

fn default_request_timeout() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_min_content() -> usize {
    50
}

fn default_progress_every() -> u64 {
    100
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_accept_language() -> String {
    DEFAULT_ACCEPT_LANGUAGE.to_string()
}

fn default_pool_idle() -> usize {
    8
}

fn default_flush_threshold() -> usize {
    50
}

fn default_final_flush_attempts() -> u32 {
    3
}

fn default_cleaned_max_chars() -> usize {
    10_000
}

fn default_database_path() -> String {
    "./tessera.db".to_string()
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            min_content_chars: default_min_content(),
            region: None,
            progress_every: default_progress_every(),
            max_run_secs: 0,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            pool_max_idle_per_host: default_pool_idle(),
            accept_invalid_certs: false,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            flush_threshold: default_flush_threshold(),
            final_flush_attempts: default_final_flush_attempts(),
            cleaned_max_chars: default_cleaned_max_chars(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}
