use fitbit_api::FitbitApiError;
use fitbit_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Token exchange failed: {0}")]
    AuthExchange(String),

    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Failed to write {series} point at {timestamp}: {message}")]
    Write {
        series: String,
        timestamp: i64,
        message: String,
    },

    #[error("Fitbit API error: {0}")]
    Api(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Invalid weight record {log_id}: {message}")]
    InvalidRecord { log_id: u64, message: String },
}

/// Coarse error category, used for exit status and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    AuthExchange,
    TransientNetwork,
    Write,
    Api,
    Storage,
    InvalidRecord,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::AuthExchange => "auth_exchange",
            Self::TransientNetwork => "transient_network",
            Self::Write => "write",
            Self::Api => "api",
            Self::Storage => "storage",
            Self::InvalidRecord => "invalid_record",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RecorderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::AuthExchange(_) => ErrorKind::AuthExchange,
            Self::TransientNetwork(_) => ErrorKind::TransientNetwork,
            Self::Write { .. } => ErrorKind::Write,
            Self::Api(_) => ErrorKind::Api,
            Self::Storage(_) => ErrorKind::Storage,
            Self::InvalidRecord { .. } => ErrorKind::InvalidRecord,
        }
    }

    /// Whether the next scheduled run may succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }
}

impl From<AuthError> for RecorderError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Configuration(msg) => RecorderError::Configuration(msg),
            AuthError::Storage(msg) => RecorderError::Storage(msg),
            AuthError::Io(e) => RecorderError::Storage(e.to_string()),
            AuthError::TransientNetwork(msg) => RecorderError::TransientNetwork(msg),
            e @ (AuthError::Exchange { .. } | AuthError::InvalidResponse(_)) => {
                RecorderError::AuthExchange(e.to_string())
            }
        }
    }
}

impl From<FitbitApiError> for RecorderError {
    fn from(err: FitbitApiError) -> Self {
        match err.status() {
            None if matches!(err, FitbitApiError::Timeout(_) | FitbitApiError::Network(_)) => {
                RecorderError::TransientNetwork(err.to_string())
            }
            Some(status) if status.is_server_error() || status.as_u16() == 429 => {
                RecorderError::TransientNetwork(err.to_string())
            }
            _ => RecorderError::Api(err.to_string()),
        }
    }
}
