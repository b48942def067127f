use thiserror::Error;
use tracing::info;

use crate::{
    error::RequestError,
    gateway::ApiGateway,
    session::{decode_identity, Identity, SessionError, SessionStore},
};

#[derive(Debug, Error)]
pub enum SignInError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Exchanges username/password for a token and stores the credential.
pub async fn sign_in(
    gateway: &ApiGateway,
    username: &str,
    password: &str,
) -> Result<Identity, SignInError> {
    let response = gateway.login(username, password).await?;
    let identity = decode_identity(&response.token, response.role)?;
    gateway
        .session()
        .set_credential(response.token, identity.clone())
        .await?;
    info!(
        "auth: signed in subject={} role={}",
        identity.subject, identity.role
    );
    Ok(identity)
}

pub async fn sign_out(session: &SessionStore) -> Result<(), SessionError> {
    session.clear().await?;
    info!("auth: signed out");
    Ok(())
}
