//! Credential Store: where the model client gets its API key.
//!
//! The key comes from configuration, either in plain text or base64-obscured
//! the way the desktop settings file stores it. Obscuring is not encryption.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("No API key configured")]
    NotConfigured,

    #[error("Stored API key could not be decoded: {0}")]
    Undecodable(String),
}

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Credential, CredentialError>;
}

/// Credential taken from configuration values captured at startup.
pub struct ConfiguredCredentialStore {
    plain: Option<String>,
    obscured: Option<String>,
}

impl ConfiguredCredentialStore {
    pub fn new(plain: Option<String>, obscured: Option<String>) -> Self {
        Self { plain, obscured }
    }
}

impl CredentialStore for ConfiguredCredentialStore {
    fn get(&self) -> Result<Credential, CredentialError> {
        if let Some(key) = self.plain.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(Credential(key.to_string()));
        }
        match self.obscured.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            Some(encoded) => reveal(encoded).map(Credential),
            None => Err(CredentialError::NotConfigured),
        }
    }
}

/// Base64 form used by the settings file.
#[cfg(test)]
pub fn obscure(key: &str) -> String {
    STANDARD.encode(key.as_bytes())
}

fn reveal(encoded: &str) -> Result<String, CredentialError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| CredentialError::Undecodable(e.to_string()))?;
    let key = String::from_utf8(bytes).map_err(|e| CredentialError::Undecodable(e.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CredentialError::NotConfigured);
    }
    Ok(key.to_string())
}
