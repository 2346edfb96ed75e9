/// Stable error-kind tags stored alongside failed targets
use std::fmt;

/// Classified reason a target could not be fetched
///
/// The string tags are persisted and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Target has neither a domain nor a fallback URL
    NoUrl,
    Timeout,
    DnsError,
    SslError,
    ConnectionError,
    Http4xx,
    Http5xx,
    /// Page loaded but yielded too little text
    ParseError,
    OtherError,
}

impl ErrorKind {
    /// Returns the persisted tag for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoUrl => "no_url",
            Self::Timeout => "timeout",
            Self::DnsError => "dns_error",
            Self::SslError => "ssl_error",
            Self::ConnectionError => "connection_error",
            Self::Http4xx => "http_4xx",
            Self::Http5xx => "http_5xx",
            Self::ParseError => "parse_error",
            Self::OtherError => "other_error",
        }
    }

    /// Parses a persisted tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Returns every kind in the taxonomy
    pub fn all() -> [Self; 9] {
        [
            Self::NoUrl,
            Self::Timeout,
            Self::DnsError,
            Self::SslError,
            Self::ConnectionError,
            Self::Http4xx,
            Self::Http5xx,
            Self::ParseError,
            Self::OtherError,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
