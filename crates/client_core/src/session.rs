use std::{fs, path::PathBuf, sync::Arc};

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::Role;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to access session file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("session file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("credential token is malformed: {0}")]
    MalformedToken(String),
}

/// Who the credential belongs to, as decoded from the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    pub role: Role,
}

/// Token plus its decoded identity; one is never stored without the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub identity: Identity,
}

/// Where a credential survives process restarts.
pub trait SessionPersistence: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, SessionError>;
    fn save(&self, credential: &Credential) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// Keeps nothing; every process starts signed out.
pub struct EphemeralSessionPersistence;

impl SessionPersistence for EphemeralSessionPersistence {
    fn load(&self) -> Result<Option<Credential>, SessionError> {
        Ok(None)
    }

    fn save(&self, _credential: &Credential) -> Result<(), SessionError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// JSON file in the per-user data directory.
pub struct FileSessionPersistence {
    path: PathBuf,
}

impl FileSessionPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionPersistence for FileSessionPersistence {
    fn load(&self) -> Result<Option<Credential>, SessionError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| SessionError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, credential: &Credential) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let serialized = serde_json::to_string_pretty(credential).map_err(|source| {
            SessionError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, serialized).map_err(|err| self.io_error(err))
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// Shared handle to the current credential.
///
/// Clones share one credential slot. Readers are everywhere; only sign-in and
/// sign-out write.
#[derive(Clone)]
pub struct SessionStore {
    credential: Arc<RwLock<Option<Credential>>>,
    persistence: Arc<dyn SessionPersistence>,
}

impl SessionStore {
    pub fn ephemeral() -> Self {
        Self {
            credential: Arc::new(RwLock::new(None)),
            persistence: Arc::new(EphemeralSessionPersistence),
        }
    }

    /// Builds a store seeded with whatever the persistence backend kept.
    pub fn restore(persistence: Arc<dyn SessionPersistence>) -> Result<Self, SessionError> {
        let restored = persistence.load()?;
        if let Some(credential) = &restored {
            info!(
                "session: restored subject={} role={}",
                credential.identity.subject, credential.identity.role
            );
        }
        Ok(Self {
            credential: Arc::new(RwLock::new(restored)),
            persistence,
        })
    }

    /// Persists first; on failure the previous credential stays in place.
    pub async fn set_credential(
        &self,
        token: impl Into<String>,
        identity: Identity,
    ) -> Result<(), SessionError> {
        let credential = Credential {
            token: token.into(),
            identity,
        };
        let mut slot = self.credential.write().await;
        self.persistence.save(&credential)?;
        debug!("session: credential set subject={}", credential.identity.subject);
        *slot = Some(credential);
        Ok(())
    }

    /// Removes the persisted copy first; on failure the store stays signed in.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let mut slot = self.credential.write().await;
        self.persistence.clear()?;
        debug!("session: credential cleared");
        *slot = None;
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.credential.read().await.is_some()
    }

    pub async fn token(&self) -> Option<String> {
        self.credential
            .read()
            .await
            .as_ref()
            .map(|credential| credential.token.clone())
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.credential
            .read()
            .await
            .as_ref()
            .map(|credential| credential.identity.clone())
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }
}

#[derive(Deserialize)]
struct SubjectClaims {
    sub: String,
}

/// Reads the subject out of a bearer token.
///
/// Only the payload is inspected: the signature belongs to the service, and
/// expiry is discovered when a request is rejected.
pub fn decode_identity(token: &str, role: Role) -> Result<Identity, SessionError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<SubjectClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|err| SessionError::MalformedToken(err.to_string()))?;
    if data.claims.sub.trim().is_empty() {
        return Err(SessionError::MalformedToken("empty subject claim".to_string()));
    }

    Ok(Identity {
        subject: data.claims.sub,
        role,
    })
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
