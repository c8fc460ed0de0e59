use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client};
use std::time::Duration;
use url::Url;

use crate::error::AuthError;
use crate::models::{Credential, OAuthErrorBody, TokenPair};

/// Scopes requested during the interactive login.
pub const SCOPE: &str = "activity heartrate location nutrition profile settings sleep social weight";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to the OAuth2 token endpoint named in the credential.
pub struct TokenAuthenticator {
    http_client: Client,
}

impl TokenAuthenticator {
    pub fn new() -> Result<Self, AuthError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AuthError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Login URL the operator opens in a browser.
    pub fn build_authorization_url(credential: &Credential) -> Result<Url, AuthError> {
        let mut url = Url::parse(&credential.authorization_uri).map_err(|e| {
            AuthError::Configuration(format!(
                "Invalid authorization_uri '{}': {}",
                credential.authorization_uri, e
            ))
        })?;

        url.query_pairs_mut()
            .clear()
            .append_pair("client_id", &credential.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPE)
            .append_pair("redirect_uri", &credential.callback_url);

        Ok(url)
    }

    /// Exchange a one-time authorization code for the first token pair.
    ///
    /// A rejected code is not retried; the operator has to log in again.
    pub async fn exchange_code(
        &self,
        credential: &Credential,
        code: &str,
    ) -> Result<TokenPair, AuthError> {
        let form = [
            ("client_id", credential.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", credential.callback_url.as_str()),
            ("code", code),
        ];

        let tokens = self.request_tokens(credential, &form).await?;
        tracing::debug!(user_id = ?tokens.user_id, "exchanged authorization code for tokens");
        Ok(tokens)
    }

    /// Trade the stored refresh token for a new token pair.
    pub async fn refresh(&self, credential: &Credential) -> Result<TokenPair, AuthError> {
        let refresh_token = credential.refresh_token()?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let tokens = self.request_tokens(credential, &form).await?;
        tracing::debug!(expires_in = ?tokens.expires_in, "refreshed tokens");
        Ok(tokens)
    }

    async fn request_tokens(
        &self,
        credential: &Credential,
        form: &[(&str, &str)],
    ) -> Result<TokenPair, AuthError> {
        let resp = self
            .http_client
            .post(&credential.token_request_uri)
            .header(
                header::AUTHORIZATION,
                basic_auth_header(&credential.client_id, &credential.client_secret),
            )
            .form(form)
            .send()
            .await
            .map_err(AuthError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body = OAuthErrorBody::parse(&body);
            tracing::warn!(status = status.as_u16(), error = %body, "token endpoint rejected request");
            return Err(AuthError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<TokenPair>().await.map_err(AuthError::from_reqwest)
    }
}

/// `Basic base64(client_id:client_secret)`
fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", client_id, client_secret))
    )
}

/// Pull the authorization code out of the URL the browser was redirected to.
///
/// The code may sit in the query (`?code=..`) or the fragment (`#code=..`).
/// A bare code without any URL syntax is returned as is.
pub fn extract_code(redirect: &str) -> Option<String> {
    let redirect = redirect.trim();
    if redirect.is_empty() {
        return None;
    }

    let Ok(url) = Url::parse(redirect) else {
        if redirect.contains(['=', '?', '#', '&', '/']) {
            return scan_code(redirect);
        }
        return Some(redirect.to_string());
    };

    let from_query = url
        .query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned());

    from_query
        .or_else(|| {
            url.fragment().and_then(|fragment| {
                url::form_urlencoded::parse(fragment.as_bytes())
                    .find(|(key, _)| key == "code")
                    .map(|(_, value)| value.into_owned())
            })
        })
        .filter(|code| !code.is_empty())
}

/// Find `code=...` in text that is not an absolute URL, e.g. `localhost/callback?code=abc`.
fn scan_code(text: &str) -> Option<String> {
    text.split(['?', '#'])
        .flat_map(|segment| url::form_urlencoded::parse(segment.as_bytes()))
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}
