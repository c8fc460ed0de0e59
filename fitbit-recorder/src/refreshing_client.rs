//! Weight-log fetching with one transparent token refresh.
//!
//! Per call, the client moves through
//!
//! ```text
//! Authenticated --401--> Refreshing --saved--> Retrying --ok--> Succeeded
//!                                                       --401--> Failed
//! ```
//!
//! Any other error ends the call where it happens. There is never more than
//! one refresh per call, and the rotated tokens are on disk before the retry
//! is sent.

use async_trait::async_trait;
use chrono::NaiveDate;
use fitbit_api::endpoints::{weight::WeightRecord, Period};
use fitbit_api::{Client, FitbitApiError, Request};
use fitbit_auth::{AuthError, Credential, CredentialLock, CredentialStore, TokenAuthenticator, TokenPair};
use std::time::Duration;

use crate::error::RecorderError;

/// The weight-log endpoint.
#[async_trait(?Send)]
pub trait WeightLogApi {
    async fn weight_logs(
        &self,
        access_token: &str,
        user_id: &str,
        base_date: NaiveDate,
        period: Period,
    ) -> Result<Vec<WeightRecord>, FitbitApiError>;
}

/// Source of fresh token pairs.
#[async_trait(?Send)]
pub trait TokenRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<TokenPair, AuthError>;
}

/// Durable credential storage with an exclusive lock.
pub trait CredentialRepository {
    type Lock;

    fn lock(&self) -> Result<Self::Lock, AuthError>;
    fn load(&self) -> Result<Credential, AuthError>;
    fn save(&self, credential: &Credential) -> Result<(), AuthError>;
}

/// [`WeightLogApi`] backed by the Fitbit Web API.
pub struct FitbitWeightLogs {
    base_url: String,
    timeout: Duration,
}

impl FitbitWeightLogs {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait(?Send)]
impl WeightLogApi for FitbitWeightLogs {
    async fn weight_logs(
        &self,
        access_token: &str,
        user_id: &str,
        base_date: NaiveDate,
        period: Period,
    ) -> Result<Vec<WeightRecord>, FitbitApiError> {
        // Tokens rotate, so the client is rebuilt for every request
        let client = Client::with_base_url(&self.base_url, access_token).timeout(self.timeout);
        let request = Request::weight().with_user(user_id).logs(base_date, period);

        Ok(client.send(request).await?.weight)
    }
}

#[async_trait(?Send)]
impl TokenRefresher for TokenAuthenticator {
    async fn refresh(&self, credential: &Credential) -> Result<TokenPair, AuthError> {
        TokenAuthenticator::refresh(self, credential).await
    }
}

impl CredentialRepository for CredentialStore {
    type Lock = CredentialLock;

    fn lock(&self) -> Result<CredentialLock, AuthError> {
        CredentialStore::lock(self)
    }

    fn load(&self) -> Result<Credential, AuthError> {
        CredentialStore::load(self)
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        CredentialStore::save(self, credential)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub records: Vec<WeightRecord>,
    /// The stored token pair was rotated during this call.
    pub refreshed: bool,
}

enum CallState {
    Authenticated,
    Refreshing(FitbitApiError),
    Retrying,
}

pub struct RefreshingClient<'a, A, R, S> {
    api: &'a A,
    refresher: &'a R,
    store: &'a S,
}

impl<'a, A, R, S> RefreshingClient<'a, A, R, S>
where
    A: WeightLogApi,
    R: TokenRefresher,
    S: CredentialRepository,
{
    pub fn new(api: &'a A, refresher: &'a R, store: &'a S) -> Self {
        Self {
            api,
            refresher,
            store,
        }
    }

    /// Fetch the weight logs for `period` ending at `base_date`.
    ///
    /// On a refresh, `credential` is updated in place and saved.
    pub async fn fetch_weight_logs(
        &self,
        credential: &mut Credential,
        base_date: NaiveDate,
        period: Period,
    ) -> Result<FetchOutcome, RecorderError> {
        let mut state = CallState::Authenticated;

        loop {
            state = match state {
                CallState::Authenticated => match self.request(credential, base_date, period).await? {
                    Ok(records) => {
                        return Ok(FetchOutcome {
                            records,
                            refreshed: false,
                        })
                    }
                    Err(e) if e.is_unauthorized() => CallState::Refreshing(e),
                    Err(e) => return Err(e.into()),
                },
                CallState::Refreshing(cause) => {
                    tracing::info!("caught {}, refreshing", cause);
                    let tokens = self.refresher.refresh(credential).await?;
                    credential.apply_tokens(&tokens);
                    self.store.save(credential)?;
                    CallState::Retrying
                }
                CallState::Retrying => match self.request(credential, base_date, period).await? {
                    Ok(records) => {
                        return Ok(FetchOutcome {
                            records,
                            refreshed: true,
                        })
                    }
                    Err(e) if e.is_unauthorized() => {
                        return Err(RecorderError::AuthExchange(format!(
                            "still unauthorized after refreshing the access token: {}",
                            e
                        )))
                    }
                    Err(e) => return Err(e.into()),
                },
            };
        }
    }

    /// The outer error is a credential that cannot be sent at all; the inner
    /// one is the API's answer, which the caller may recover from.
    async fn request(
        &self,
        credential: &Credential,
        base_date: NaiveDate,
        period: Period,
    ) -> Result<Result<Vec<WeightRecord>, FitbitApiError>, RecorderError> {
        let access_token = credential.access_token()?;
        tracing::debug!(%base_date, %period, user_id = %credential.user_id, "fetching weight logs");
        Ok(self
            .api
            .weight_logs(access_token, &credential.user_id, base_date, period)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    fn unauthorized() -> FitbitApiError {
        FitbitApiError::from_status(
            401,
            r#"{"errors":[{"errorType":"expired_token","message":"Access token expired"}]}"#,
        )
    }

    fn credential() -> Credential {
        Credential {
            client_id: "22ABCD".to_string(),
            client_secret: "s3cret".to_string(),
            authorization_uri: "https://www.fitbit.com/oauth2/authorize".to_string(),
            token_request_uri: "https://api.fitbit.com/oauth2/token".to_string(),
            callback_url: "http://localhost:3000/callback".to_string(),
            access_token: Some("expired".to_string()),
            refresh_token: Some("refresh".to_string()),
            user_id: "6XYZ".to_string(),
        }
    }

    fn record() -> WeightRecord {
        serde_json::from_value(serde_json::json!({
            "date": "2018-10-04", "time": "14:51:16", "weight": 66.6, "logId": 1u64
        }))
        .unwrap()
    }

    struct ScriptedApi {
        responses: RefCell<VecDeque<Result<Vec<WeightRecord>, FitbitApiError>>>,
        tokens_seen: RefCell<Vec<String>>,
    }

    impl ScriptedApi {
        fn new(responses: Vec<Result<Vec<WeightRecord>, FitbitApiError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                tokens_seen: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl WeightLogApi for ScriptedApi {
        async fn weight_logs(
            &self,
            access_token: &str,
            _user_id: &str,
            _base_date: NaiveDate,
            _period: Period,
        ) -> Result<Vec<WeightRecord>, FitbitApiError> {
            self.tokens_seen.borrow_mut().push(access_token.to_string());
            self.responses
                .borrow_mut()
                .pop_front()
                .expect("unexpected weight log request")
        }
    }

    struct FixedRefresher {
        calls: Cell<u32>,
    }

    #[async_trait(?Send)]
    impl TokenRefresher for FixedRefresher {
        async fn refresh(&self, _credential: &Credential) -> Result<TokenPair, AuthError> {
            self.calls.set(self.calls.get() + 1);
            Ok(serde_json::from_value(serde_json::json!({
                "access_token": "A",
                "refresh_token": "B"
            }))
            .unwrap())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        saved: RefCell<Vec<Credential>>,
    }

    impl CredentialRepository for MemoryStore {
        type Lock = ();

        fn lock(&self) -> Result<(), AuthError> {
            Ok(())
        }

        fn load(&self) -> Result<Credential, AuthError> {
            Ok(credential())
        }

        fn save(&self, credential: &Credential) -> Result<(), AuthError> {
            self.saved.borrow_mut().push(credential.clone());
            Ok(())
        }
    }

    fn base_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 10, 10).unwrap()
    }

    #[tokio::test]
    async fn success_needs_no_refresh() {
        let api = ScriptedApi::new(vec![Ok(vec![record()])]);
        let refresher = FixedRefresher { calls: Cell::new(0) };
        let store = MemoryStore::default();
        let client = RefreshingClient::new(&api, &refresher, &store);

        let mut credential = credential();
        let outcome = client
            .fetch_weight_logs(&mut credential, base_date(), Period::SevenDays)
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert!(!outcome.refreshed);
        assert_eq!(refresher.calls.get(), 0);
        assert!(store.saved.borrow().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_then_success_refreshes_once_and_saves_once() {
        let api = ScriptedApi::new(vec![Err(unauthorized()), Ok(vec![record()])]);
        let refresher = FixedRefresher { calls: Cell::new(0) };
        let store = MemoryStore::default();
        let client = RefreshingClient::new(&api, &refresher, &store);

        let mut credential = credential();
        let outcome = client
            .fetch_weight_logs(&mut credential, base_date(), Period::SevenDays)
            .await
            .unwrap();

        assert!(outcome.refreshed);
        assert_eq!(refresher.calls.get(), 1);
        assert_eq!(credential.access_token.as_deref(), Some("A"));
        assert_eq!(credential.refresh_token.as_deref(), Some("B"));

        let saved = store.saved.borrow();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].access_token.as_deref(), Some("A"));
        assert_eq!(saved[0].refresh_token.as_deref(), Some("B"));

        // The retry used the rotated token
        assert_eq!(*api.tokens_seen.borrow(), vec!["expired", "A"]);
    }

    #[tokio::test]
    async fn second_unauthorized_fails_without_looping() {
        let api = ScriptedApi::new(vec![Err(unauthorized()), Err(unauthorized())]);
        let refresher = FixedRefresher { calls: Cell::new(0) };
        let store = MemoryStore::default();
        let client = RefreshingClient::new(&api, &refresher, &store);

        let mut credential = credential();
        let err = client
            .fetch_weight_logs(&mut credential, base_date(), Period::SevenDays)
            .await
            .unwrap_err();

        assert!(matches!(err, RecorderError::AuthExchange(_)));
        assert_eq!(refresher.calls.get(), 1);
        assert_eq!(api.tokens_seen.borrow().len(), 2);
        // The rotated pair is still persisted
        assert_eq!(store.saved.borrow().len(), 1);
    }

    #[tokio::test]
    async fn other_api_errors_do_not_refresh() {
        let forbidden = FitbitApiError::from_status(
            403,
            r#"{"errors":[{"errorType":"insufficient_scope","message":"no weight scope"}]}"#,
        );
        let api = ScriptedApi::new(vec![Err(forbidden)]);
        let refresher = FixedRefresher { calls: Cell::new(0) };
        let store = MemoryStore::default();
        let client = RefreshingClient::new(&api, &refresher, &store);

        let mut credential = credential();
        let err = client
            .fetch_weight_logs(&mut credential, base_date(), Period::SevenDays)
            .await
            .unwrap_err();

        assert!(matches!(err, RecorderError::Api(_)));
        assert_eq!(refresher.calls.get(), 0);
        assert_eq!(credential.access_token.as_deref(), Some("expired"));
    }

    #[tokio::test]
    async fn malformed_stored_token_is_never_sent() {
        let api = ScriptedApi::new(vec![]);
        let refresher = FixedRefresher { calls: Cell::new(0) };
        let store = MemoryStore::default();
        let client = RefreshingClient::new(&api, &refresher, &store);

        let mut credential = credential();
        credential.access_token = Some("abc\ndef".to_string());
        let err = client
            .fetch_weight_logs(&mut credential, base_date(), Period::SevenDays)
            .await
            .unwrap_err();

        assert!(matches!(err, RecorderError::Configuration(_)));
        assert!(api.tokens_seen.borrow().is_empty());
        assert_eq!(refresher.calls.get(), 0);
    }
}
