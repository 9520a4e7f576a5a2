use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedditError>;

#[derive(Debug, Error)]
pub enum RedditError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Redirected to {0}")]
    Redirect(String),

    /// `reason` is the platform's explanation when it gives one
    /// (`private`, `quarantined`, `gold_only`, ...).
    #[error("Forbidden: {path} (reason: {})", reason.as_deref().unwrap_or("unspecified"))]
    Forbidden {
        path: String,
        reason: Option<String>,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The token endpoint rejected the app credentials or the password grant.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// An API call was refused with 401; the cached token is no longer valid.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for RedditError {
    fn from(err: reqwest::Error) -> Self {
        RedditError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for RedditError {
    fn from(err: serde_json::Error) -> Self {
        RedditError::Parse(err.to_string())
    }
}
