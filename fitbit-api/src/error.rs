use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_api_client::{Error as ApiError, StatusCode};

#[derive(Debug)]
pub enum FitbitApiError {
    Fitbit(StatusCode, ErrorResponse),
    Timeout(Duration),
    /// The request never got a response: connection refused, DNS failure, reset.
    Network(String),
    Internal(ApiError),
}

impl FitbitApiError {
    /// True when the API rejected the access token (expired, revoked or invalid).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FitbitApiError::Fitbit(status, _) if *status == StatusCode::UNAUTHORIZED)
    }

    /// Build an API error from a raw status code and response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        FitbitApiError::Fitbit(status, ErrorResponse::parse(body))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FitbitApiError::Fitbit(status, _) => Some(*status),
            _ => None,
        }
    }
}

impl From<ApiError> for FitbitApiError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::ClientError(status, detail) | ApiError::ServerError(status, detail) => {
                FitbitApiError::Fitbit(status, ErrorResponse::parse(&detail))
            }
            e @ (ApiError::Hyper(_) | ApiError::Io(_)) => FitbitApiError::Network(e.to_string()),
            e => FitbitApiError::Internal(e),
        }
    }
}

impl std::fmt::Display for FitbitApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitbitApiError::Internal(e) => write!(f, "Internal error: {}", e),
            FitbitApiError::Network(e) => write!(f, "Network error: {}", e),
            FitbitApiError::Timeout(after) => write!(f, "Request timed out after {:?}", after),
            FitbitApiError::Fitbit(status, response) => write!(f, "({}) {}", status, response),
        }
    }
}

impl std::error::Error for FitbitApiError {}

/// Error envelope returned by the Fitbit Web API.
///
/// `{"errors":[{"errorType":"expired_token","message":"..."}],"success":false}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorResponse {
    /// Parse an error body, keeping the raw text when it is not the Fitbit envelope.
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self {
            errors: vec![ErrorDetail {
                error_type: "unknown".to_string(),
                message: body.to_string(),
            }],
            success: false,
        })
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for detail in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", detail.error_type, detail.message)?;
            first = false;
        }
        if first {
            f.write_str("no error detail")?;
        }
        Ok(())
    }
}
