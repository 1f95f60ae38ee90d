//! Credentials handed to a requester whose request was granted.
//!
//! Minting is done elsewhere; the service only forwards what an issuer
//! returns.

use std::sync::Arc;

use meter_core::config::NotifyConfig;
use meter_core::RequestMeta;

use crate::error::NotifyError;

pub trait CredentialIssuer: Send + Sync {
    /// Credential for one grant. `None` sends the grant without a token.
    fn issue(&self, meta: &RequestMeta) -> Result<Option<String>, NotifyError>;
}

#[derive(Debug, Default)]
pub struct NoCredential;

impl CredentialIssuer for NoCredential {
    fn issue(&self, _meta: &RequestMeta) -> Result<Option<String>, NotifyError> {
        Ok(None)
    }
}

/// Hands out the same pre-minted credential for every grant.
#[derive(Debug)]
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Result<Self, NotifyError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(NotifyError::Config("recorder token is empty".into()));
        }
        Ok(Self { token })
    }
}

impl CredentialIssuer for StaticCredential {
    fn issue(&self, _meta: &RequestMeta) -> Result<Option<String>, NotifyError> {
        Ok(Some(self.token.clone()))
    }
}

/// `StaticCredential` when `RECORDER_TOKEN` is set, `NoCredential` otherwise.
pub fn issuer_from_config(cfg: &NotifyConfig) -> Result<Arc<dyn CredentialIssuer>, NotifyError> {
    match &cfg.recorder_token {
        Some(token) => Ok(Arc::new(StaticCredential::new(token.clone())?)),
        None => Ok(Arc::new(NoCredential)),
    }
}
