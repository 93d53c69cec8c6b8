use thiserror::Error;

/// A fetch that never produced a body.
#[derive(Debug, Clone, Error)]
#[error("GET {url} failed: {reason}")]
pub struct TransportError {
    pub url: String,
    pub reason: String,
}

impl TransportError {
    pub fn new(url: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Detail page did not have the shape we expect. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("expected 1 name, found {found}")]
    NameCount { found: usize },

    #[error("name is blank")]
    EmptyName,

    #[error("expected 1 article, found {found}")]
    ArticleCount { found: usize },

    #[error("expected 1 address in article, found {found}")]
    AddressCount { found: usize },
}

/// Geocoding response could not be turned into an address + coordinates.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("response is not a geocode document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("geocode returned no results (status {status})")]
    NoResults { status: String },

    #[error("malformed geocode response: `{field}` missing or mistyped")]
    MalformedResponse { field: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// Why one stable was left out of the geocoded output.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}
