mod authenticator;
mod credential_store;

pub use authenticator::{extract_code, TokenAuthenticator, SCOPE};
pub use credential_store::{CredentialLock, CredentialStore};

use crate::error::AuthError;
use crate::models::Credential;
use std::io::{BufRead, Write};

/// Interactive authorization-code grant.
///
/// Prints the login URL, reads the redirect URL the operator pastes back,
/// exchanges the code and stores the resulting token pair.
pub async fn authorize<R, W>(
    store: &CredentialStore,
    authenticator: &TokenAuthenticator,
    mut input: R,
    mut output: W,
    open_browser: bool,
) -> Result<Credential, AuthError>
where
    R: BufRead,
    W: Write,
{
    let _lock = store.lock()?;
    let mut credential = store.load()?;

    let login = TokenAuthenticator::build_authorization_url(&credential)?;
    writeln!(output, "Log in here:")?;
    writeln!(output, "{}", login)?;

    if open_browser {
        if let Err(e) = open::that(login.as_str()) {
            tracing::debug!("Failed to open browser automatically: {}", e);
        }
    }

    writeln!(output, "Then paste the URL where the browser is redirected:")?;
    output.flush()?;

    let mut pasted = String::new();
    input.read_line(&mut pasted)?;
    let code = extract_code(&pasted).ok_or_else(|| {
        AuthError::Configuration("No authorization code found in the pasted URL".to_string())
    })?;

    let tokens = authenticator.exchange_code(&credential, &code).await?;
    credential.apply_tokens(&tokens);
    store.save(&credential)?;

    tracing::info!(user_id = %credential.user_id, "authorization successful");
    writeln!(output, "authorization successful")?;

    Ok(credential)
}
