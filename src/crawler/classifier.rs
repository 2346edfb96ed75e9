//! Failure classification
//!
//! Every way a URL variant can fail is captured as a [`Failure`]; [`classify`]
//! maps it onto the persisted [`ErrorKind`] taxonomy. Classification is total:
//! anything unrecognised becomes `other_error`.

use crate::state::ErrorKind;
use std::fmt;

/// Error details are cut to this many characters before they are stored
pub const MAX_DETAIL_CHARS: usize = 500;

const DNS_MARKERS: &[&str] = &[
    "dns",
    "nodename",
    "name or service not known",
    "getaddrinfo",
    "failed to lookup address",
    "no such host",
];

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "deadline"];

const TLS_MARKERS: &[&str] = &["ssl", "tls", "certificate", "handshake"];

const CONNECTION_MARKERS: &[&str] = &["connect", "refused", "reset"];

/// A single failed attempt at fetching a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The target has neither a domain nor a fallback URL
    NoUrl,

    /// The server answered with a status the fetcher does not accept
    Status { code: u16 },

    /// The request never produced a response
    Transport {
        message: String,
        /// The HTTP layer reported a timeout
        timed_out: bool,
        /// The HTTP layer reported a connect-phase failure
        connect: bool,
    },

    /// The page loaded but yielded too little text
    ContentTooShort { chars: usize, min: usize },
}

impl Failure {
    /// Builds a transport failure from a bare message
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: false,
            connect: false,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUrl => write!(f, "No website or URL available"),
            Self::Status { code } => write!(f, "HTTP {}", code),
            Self::Transport { message, .. } => write!(f, "{}", message),
            Self::ContentTooShort { chars, min } => write!(
                f,
                "Extracted text too short ({} chars, minimum {})",
                chars, min
            ),
        }
    }
}

/// Maps a failure to its error kind
///
/// Priority: HTTP status class, then DNS, timeout, TLS and connection markers
/// in the failure message, then `other_error`.
pub fn classify(failure: &Failure) -> ErrorKind {
    match failure {
        Failure::NoUrl => ErrorKind::NoUrl,
        Failure::ContentTooShort { .. } => ErrorKind::ParseError,
        Failure::Status { code } if (400..500).contains(code) => ErrorKind::Http4xx,
        Failure::Status { code } if (500..600).contains(code) => ErrorKind::Http5xx,
        Failure::Status { .. } => classify_message(&failure.to_string(), false, false),
        Failure::Transport {
            message,
            timed_out,
            connect,
        } => classify_message(message, *timed_out, *connect),
    }
}

fn classify_message(message: &str, timed_out: bool, connect: bool) -> ErrorKind {
    let message = message.to_lowercase();
    let mentions = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

    if mentions(DNS_MARKERS) {
        ErrorKind::DnsError
    } else if timed_out || mentions(TIMEOUT_MARKERS) {
        ErrorKind::Timeout
    } else if mentions(TLS_MARKERS) {
        ErrorKind::SslError
    } else if connect || mentions(CONNECTION_MARKERS) {
        ErrorKind::ConnectionError
    } else {
        ErrorKind::OtherError
    }
}

/// Returns the failure message truncated to [`MAX_DETAIL_CHARS`]
pub fn error_detail(failure: &Failure) -> String {
    truncate_chars(&failure.to_string(), MAX_DETAIL_CHARS)
}

/// Truncates to at most `max` characters without splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
