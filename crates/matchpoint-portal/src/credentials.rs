//! The credential lookup seam.
//!
//! Decryption and storage of platform credentials belong to an external
//! collaborator; this engine only ever sees the decrypted pair, holds it for
//! the duration of one submission, and drops it with the session.

use async_trait::async_trait;
use matchpoint_core::config::CredentialsConfig;

use crate::error::{PortalError, Result};

/// A decrypted portal login. Never persisted by this engine; `Debug`
/// deliberately not derived so the password cannot leak into logs.
#[derive(Clone)]
pub struct PlatformCredentials {
    pub username: String,
    pub password: String,
}

/// Resolves an owner to their portal login for exactly one execution.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn lookup(&self, owner_id: &str) -> Result<PlatformCredentials>;
}

/// Config/env-backed source for single-operator deployments: every owner
/// maps to the one configured login.
pub struct ConfigCredentials {
    credentials: Option<PlatformCredentials>,
}

impl ConfigCredentials {
    pub fn new(cfg: &CredentialsConfig) -> Self {
        let credentials = match (&cfg.username, &cfg.password) {
            (Some(username), Some(password)) => Some(PlatformCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        Self { credentials }
    }
}

#[async_trait]
impl CredentialSource for ConfigCredentials {
    async fn lookup(&self, owner_id: &str) -> Result<PlatformCredentials> {
        self.credentials
            .clone()
            .ok_or_else(|| PortalError::MissingCredentials {
                owner_id: owner_id.to_string(),
            })
    }
}
