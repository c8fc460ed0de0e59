pub mod endpoints;
mod error;
mod macros;
pub mod repositories;

pub use crate::error::{ErrorDetail, ErrorResponse, FitbitApiError};
use repositories::*;
use std::time::Duration;
use tower_api_client::{Client as ApiClient, Request as ApiRequest};

pub const BASE_URL: &str = "https://api.fitbit.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bearer-authenticated client for the Fitbit Web API.
///
/// A client is bound to one access token. After a token refresh, build a new
/// one with the rotated token.
pub struct Client {
    inner: ApiClient,
    timeout: Duration,
}

impl Client {
    pub fn new(access_token: &str) -> Self {
        Self::with_base_url(BASE_URL, access_token)
    }

    pub fn with_base_url(base_url: &str, access_token: &str) -> Self {
        Self {
            inner: ApiClient::new(base_url.trim_end_matches('/')).bearer_auth(access_token),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, FitbitApiError>
    where
        R: ApiRequest,
    {
        match tokio::time::timeout(self.timeout, self.inner.send(request)).await {
            Ok(result) => result.map_err(From::from),
            Err(_) => Err(FitbitApiError::Timeout(self.timeout)),
        }
    }
}

pub struct Request;

impl Request {
    pub fn weight() -> WeightRepository {
        WeightRepository::new()
    }
}
