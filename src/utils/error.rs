use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{message}")]
    BadRequest { message: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("access denied")]
    Forbidden,

    #[error("page not found")]
    NotFound,

    #[error("{message}")]
    Unprocessable { message: String },

    #[error("{message}")]
    Server {
        message: String,
        stack: Option<serde_json::Value>,
    },

    #[error("no network")]
    NoNetwork(#[source] reqwest::Error),

    #[error("unknown error: {reason}")]
    Unknown { status: u16, reason: String },

    #[error("no refresh token")]
    NoRefreshToken,

    #[error("Invalid response body: {message}")]
    InvalidBody { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL pattern '{pattern}': {source}")]
    PatternError {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },
}

impl SessionError {
    /// Status code reported to callers. Transport failures and unrecognised
    /// statuses collapse to 500, a missing refresh token is 601.
    pub fn status(&self) -> u16 {
        match self {
            SessionError::BadRequest { .. } => 400,
            SessionError::Unauthorized => 401,
            SessionError::Forbidden => 403,
            SessionError::NotFound => 404,
            SessionError::Unprocessable { .. } => 422,
            SessionError::Server { .. }
            | SessionError::NoNetwork(_)
            | SessionError::Unknown { .. }
            | SessionError::InvalidBody { .. } => 500,
            SessionError::NoRefreshToken => 601,
            _ => 0,
        }
    }

    /// True for errors that came back from (or failed to reach) the backend.
    pub fn is_api_error(&self) -> bool {
        self.status() != 0
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SessionError::Unauthorized | SessionError::NoRefreshToken => {
                "Log in again to obtain a fresh session"
            }
            SessionError::Forbidden => "The current account lacks permission for this resource",
            SessionError::NoNetwork(_) => "Check that the API server is running and reachable",
            SessionError::BadRequest { .. } | SessionError::Unprocessable { .. } => {
                "Correct the submitted values and retry"
            }
            SessionError::ConfigError { .. }
            | SessionError::InvalidConfigValueError { .. }
            | SessionError::ConfigValidationError { .. }
            | SessionError::PatternError { .. } => "Review the configuration file",
            _ => "Retry later or inspect the server logs",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_status_codes() {
        assert_eq!(SessionError::NotFound.status(), 404);
        assert_eq!(SessionError::NoRefreshToken.status(), 601);
        assert_eq!(
            SessionError::Unknown {
                status: 418,
                reason: "I'm a teapot".to_string()
            }
            .status(),
            500
        );
        assert!(!SessionError::ConfigError {
            message: "x".to_string()
        }
        .is_api_error());
    }

    #[test]
    fn test_messages() {
        assert_eq!(SessionError::Forbidden.to_string(), "access denied");
        assert_eq!(
            SessionError::Unknown {
                status: 302,
                reason: "Found".to_string()
            }
            .to_string(),
            "unknown error: Found"
        );
    }
}
