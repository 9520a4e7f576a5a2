use thiserror::Error;

/// Failure reported by the platform adapter. Closed set; callers match exhaustively.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("redirected: {0}")]
    Redirect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

impl PlatformError {
    /// Request-level failures are worth retrying on the next iteration.
    /// `Other` covers client misconfiguration (rejected credentials and the like).
    pub fn is_request_level(&self) -> bool {
        match self {
            Self::NotFound(_)
            | Self::Forbidden(_)
            | Self::MalformedRequest(_)
            | Self::Redirect(_)
            | Self::Transport(_) => true,
            Self::Other(_) => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(String),

    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run loop aborted after {failures} consecutive failures")]
    Aborted { failures: u32 },
}

impl ScoutError {
    /// Whether the run loop should count this failure and try again.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Platform(e) => e.is_request_level(),
            Self::Config(_) | Self::Aborted { .. } => false,
        }
    }
}
