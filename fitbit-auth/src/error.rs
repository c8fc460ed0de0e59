use thiserror::Error;

use crate::models::OAuthErrorBody;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Token endpoint rejected the request ({status}): {body}")]
    Exchange { status: u16, body: OAuthErrorBody },

    #[error("Network error talking to the token endpoint: {0}")]
    TransientNetwork(String),

    #[error("Unexpected token endpoint response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            AuthError::Configuration(err.to_string())
        } else {
            // timeouts, refused connections, resets
            AuthError::TransientNetwork(err.to_string())
        }
    }
}
