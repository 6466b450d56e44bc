use thiserror::Error;

/// Failure modes of a quote lookup.
///
/// The distinction that matters to callers is [`QuoteError::is_degraded`]:
/// degraded failures mean the provider is rate-limiting or unreachable and
/// last-known-good data should be substituted; everything else is a
/// per-symbol failure the caller absorbs locally.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("transport error: {message}")]
    Transport { message: String, timed_out: bool },

    #[error("provider returned HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("malformed provider response for {symbol}: {reason}")]
    Parse { symbol: String, reason: String },

    #[error("invalid holding: {0}")]
    InvalidHolding(String),
}

impl QuoteError {
    /// True when the failure signals degraded provider availability:
    /// an explicit HTTP 429, a rate-limit-shaped message, or a transport
    /// timeout. These trigger the fallback price table instead of an error.
    pub fn is_degraded(&self) -> bool {
        match self {
            QuoteError::Provider { status: 429, .. } => true,
            QuoteError::Provider { message, .. } => {
                message.to_ascii_lowercase().contains("rate limit")
            }
            QuoteError::Transport { timed_out, .. } => *timed_out,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for QuoteError {
    fn from(e: reqwest::Error) -> Self {
        // Strip query parameters from the request URL embedded in reqwest
        // messages so log lines never leak request details. Only the URL is
        // touched; the rest of the message is kept verbatim.
        let mut message = e.to_string();
        if let Some(url) = e.url() {
            if url.query().is_some() {
                if let Some((base, _)) = url.as_str().split_once('?') {
                    message = message.replace(url.as_str(), &format!("{base}?<query redacted>"));
                }
            }
        }
        QuoteError::Transport {
            message,
            timed_out: e.is_timeout(),
        }
    }
}
