use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Fitbit alias for the user the access token was issued to.
const CURRENT_USER: &str = "-";

/// OAuth2 client registration plus the current token pair.
///
/// The token fields are empty until `authorize` has run once.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_uri: String,
    pub token_request_uri: String,
    pub callback_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    CURRENT_USER.to_string()
}

impl Credential {
    /// Replace both tokens at once; a half-rotated pair is never observable.
    pub fn apply_tokens(&mut self, tokens: &TokenPair) {
        self.access_token = Some(tokens.access_token.clone());
        self.refresh_token = Some(tokens.refresh_token.clone());
        if let Some(user_id) = tokens.user_id.as_ref().filter(|id| !id.is_empty()) {
            self.user_id = user_id.clone();
        }
    }

    /// The stored access token, checked to be usable as a bearer header value.
    pub fn access_token(&self) -> Result<&str, AuthError> {
        let token = self.access_token.as_deref().ok_or_else(|| {
            AuthError::Configuration("no access token stored; run `authorize` first".to_string())
        })?;
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_graphic()) {
            return Err(AuthError::Configuration(
                "stored access token is malformed; run `authorize` again".to_string(),
            ));
        }
        Ok(token)
    }

    pub fn refresh_token(&self) -> Result<&str, AuthError> {
        self.refresh_token.as_deref().ok_or_else(|| {
            AuthError::Configuration("no refresh token stored; run `authorize` first".to_string())
        })
    }

    /// Check that every client registration field is filled in.
    pub fn validate(&self) -> Result<(), AuthError> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("authorization_uri", &self.authorization_uri),
            ("token_request_uri", &self.token_request_uri),
            ("callback_url", &self.callback_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AuthError::Configuration(format!("{} is required", name)));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("authorization_uri", &self.authorization_uri)
            .field("token_request_uri", &self.token_request_uri)
            .field("callback_url", &self.callback_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Token endpoint success response
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Token endpoint error body.
///
/// Fitbit answers `{"errors":[{"errorType":..,"message":..}],"success":false}`;
/// plain RFC 6749 servers answer `{"error":..,"error_description":..}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OAuthErrorBody {
    #[serde(default)]
    pub errors: Vec<OAuthErrorDetail>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(skip)]
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthErrorDetail {
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

impl OAuthErrorBody {
    pub fn parse(body: &str) -> Self {
        let mut parsed: Self = serde_json::from_str(body).unwrap_or_default();
        parsed.raw = body.to_string();
        parsed
    }

    /// Machine-readable error codes, e.g. `invalid_grant`.
    pub fn error_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.errors.iter().map(|e| e.error_type.as_str()).collect();
        if let Some(error) = &self.error {
            types.push(error);
        }
        types
    }
}

impl std::fmt::Display for OAuthErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(detail) = self.errors.first() {
            return write!(f, "{}: {}", detail.error_type, detail.message);
        }
        match (&self.error, &self.error_description) {
            (Some(error), Some(description)) => write!(f, "{}: {}", error, description),
            (Some(error), None) => f.write_str(error),
            _ if self.raw.is_empty() => f.write_str("empty response body"),
            _ => f.write_str(&self.raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            client_id: "22ABCD".to_string(),
            client_secret: "s3cret".to_string(),
            authorization_uri: "https://www.fitbit.com/oauth2/authorize".to_string(),
            token_request_uri: "https://api.fitbit.com/oauth2/token".to_string(),
            callback_url: "http://localhost:3000/callback".to_string(),
            access_token: Some("old-access".to_string()),
            refresh_token: Some("old-refresh".to_string()),
            user_id: "-".to_string(),
        }
    }

    fn token_pair(access: &str, refresh: &str) -> TokenPair {
        serde_json::from_value(serde_json::json!({
            "access_token": access,
            "refresh_token": refresh,
        }))
        .unwrap()
    }

    #[test]
    fn apply_tokens_replaces_both_tokens() {
        let mut credential = credential();
        credential.apply_tokens(&token_pair("A", "B"));
        assert_eq!(credential.access_token.as_deref(), Some("A"));
        assert_eq!(credential.refresh_token.as_deref(), Some("B"));
        assert_eq!(credential.user_id, "-");
    }

    #[test]
    fn apply_tokens_takes_user_id_when_present() {
        let mut credential = credential();
        let mut tokens = token_pair("A", "B");
        tokens.user_id = Some("6XYZ".to_string());
        credential.apply_tokens(&tokens);
        assert_eq!(credential.user_id, "6XYZ");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let output = format!("{:?}", credential());
        assert!(!output.contains("s3cret"));
        assert!(!output.contains("old-access"));
        assert!(!output.contains("old-refresh"));
        assert!(output.contains("22ABCD"));
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let mut credential = credential();
        credential.client_secret = "  ".to_string();
        let err = credential.validate().unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn missing_tokens_are_configuration_errors() {
        let mut credential = credential();
        credential.refresh_token = None;
        assert!(matches!(
            credential.refresh_token(),
            Err(AuthError::Configuration(_))
        ));
    }

    #[test]
    fn malformed_access_token_is_configuration_error() {
        let mut credential = credential();
        for token in ["", "abc\ndef", "abc def", "t\u{e9}st"] {
            credential.access_token = Some(token.to_string());
            assert!(
                matches!(credential.access_token(), Err(AuthError::Configuration(_))),
                "{:?}",
                token
            );
        }

        credential.access_token = Some("eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiI2WFlaIn0.sig-_+/=".to_string());
        assert!(credential.access_token().is_ok());
    }

    #[test]
    fn error_body_parses_fitbit_and_rfc_shapes() {
        let fitbit = OAuthErrorBody::parse(
            r#"{"errors":[{"errorType":"invalid_grant","message":"Refresh token invalid"}],"success":false}"#,
        );
        assert_eq!(fitbit.error_types(), vec!["invalid_grant"]);
        assert_eq!(fitbit.to_string(), "invalid_grant: Refresh token invalid");

        let rfc = OAuthErrorBody::parse(r#"{"error":"invalid_client","error_description":"bad id"}"#);
        assert_eq!(rfc.error_types(), vec!["invalid_client"]);
        assert_eq!(rfc.to_string(), "invalid_client: bad id");

        let raw = OAuthErrorBody::parse("gateway exploded");
        assert_eq!(raw.to_string(), "gateway exploded");
    }
}
