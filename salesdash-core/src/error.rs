use thiserror::Error;

/// Errors surfaced by the dashboard API client.
///
/// `Clone` so a single in-flight request can hand the same failure to every
/// caller attached to it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error ({status}): {}", detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// The server-provided `detail` message, if the failure carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Message to show a user: the server's `detail` when present, otherwise
    /// `fallback` for HTTP failures and the error's own text for the rest.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Status { detail: Some(d), .. } if !d.trim().is_empty() => d.clone(),
            ApiError::Status { .. } => fallback.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else if e.is_builder() {
            ApiError::InvalidRequest(e.to_string())
        } else if let Some(status) = e.status() {
            ApiError::Status {
                status: status.as_u16(),
                detail: None,
            }
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Crate-level error for setup: configuration and API client construction.
#[derive(Error, Debug)]
pub enum SalesdashError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),
}
