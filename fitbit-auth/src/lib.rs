// Credential model shared by the authorization flow and the sync client
pub mod models;

mod client;
mod error;

pub use client::{authorize, extract_code, CredentialLock, CredentialStore, TokenAuthenticator, SCOPE};
pub use error::AuthError;
pub use models::{Credential, OAuthErrorBody, TokenPair};
