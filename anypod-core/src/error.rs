use thiserror::Error;

/// The error taxonomy for the core pipeline.
///
/// Each variant is a *kind*, not a concrete backend type, so that the store
/// and filesystem crates can convert their own errors into this shape without
/// leaking `sqlx`/`std::io` types past the component boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("data integrity error for {entity}: {reason}")]
    DataIntegrity { entity: String, reason: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("extractor error: {0}")]
    Extractor(#[from] ExtractorErrorKind),

    #[error("invalid identifier {kind} {value:?}: {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("illegal state transition: {0}")]
    IllegalTransition(String),
}

impl Error {
    pub fn invalid_identifier(kind: &'static str, value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidIdentifier {
            kind,
            value: value.into(),
            reason,
        }
    }
}

/// Extractor-subprocess error subclassification.
#[derive(Error, Debug, Clone)]
pub enum ExtractorErrorKind {
    #[error("source not found")]
    NotFound,
    #[error("access forbidden")]
    Forbidden,
    #[error("rate limited")]
    RateLimited,
    #[error("cookies required")]
    CookiesRequired,
    #[error("item had no media matching selection")]
    ItemFiltered,
    #[error("extractor failed: {0}")]
    ExtractorFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
