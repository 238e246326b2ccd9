use thiserror::Error;

/// Reasons a poster image could not be turned into a texture.
///
/// Every variant is terminal for the URL that produced it: the image cache
/// marks the URL unavailable and the entity keeps its tinted fallback card.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Transport failure or a non-success HTTP status.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The payload was fetched but is not a decodable image.
    #[error("decode failed for {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Neither http(s), file:// nor a local path.
    #[error("unsupported image location: {0}")]
    UnsupportedScheme(String),

    /// The blocking decode task panicked or was cancelled.
    #[error("decode task aborted for {0}")]
    Aborted(String),
}

impl LoadError {
    pub fn url(&self) -> &str {
        match self {
            LoadError::Fetch { url, .. } | LoadError::Decode { url, .. } => url,
            LoadError::UnsupportedScheme(url) | LoadError::Aborted(url) => url,
        }
    }
}

/// Failures of the trending-media catalog fetch.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("AniList API error: {0}")]
    Status(u16),

    #[error("AniList returned errors: {0}")]
    Graphql(String),

    #[error("AniList response had no page data")]
    MissingPage,

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
