use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid identifier `{input}`: {reason}")]
    InvalidIdentifier { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("malformed catalog: {reason}")]
    Malformed { reason: String },

    #[error("variant `{id}` has no fetchable location")]
    MissingLocation { id: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl CatalogError {
    pub fn invalid_identifier(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Whether the failure was caused by cancellation rather than the remote side.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
