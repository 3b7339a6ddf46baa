//! Privileged inventory management.
//!
//! Every operation verifies the shared admin secret first; a mismatch is
//! `Forbidden` before the target key is even looked up.

use crate::error::{LicenseError, LicenseResult};
use crate::record::{generate_license_key, parse_expiry, LicenseRecord};
use crate::store::LicenseStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

/// Shared admin credential. Compared in constant time, never printed.
#[derive(Clone)]
pub struct AdminSecret(String);

impl AdminSecret {
    /// Wraps a secret.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty (or all-whitespace) secret.
    pub fn new(secret: impl Into<String>) -> LicenseResult<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(LicenseError::InvalidConfig(
                "admin secret must not be empty".to_string(),
            ));
        }
        Ok(Self(secret))
    }

    /// Constant-time comparison against a provided secret.
    ///
    /// A length mismatch still runs a dummy comparison so timing does not
    /// depend on how much of the secret was guessed.
    #[must_use]
    pub fn matches(&self, provided: &str) -> bool {
        let expected = self.0.as_bytes();
        let provided = provided.as_bytes();
        if provided.len() != expected.len() {
            let _ = expected.ct_eq(expected);
            return false;
        }
        provided.ct_eq(expected).into()
    }
}

impl std::fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminSecret([REDACTED])")
    }
}

/// Admin service settings.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Secret every admin call must present.
    pub secret: AdminSecret,
    /// Whether `add_key` may overwrite an existing key (dropping its binding).
    pub allow_reissue: bool,
}

impl AdminConfig {
    /// Config with reissue allowed.
    pub fn new(secret: AdminSecret) -> Self {
        Self {
            secret,
            allow_reissue: true,
        }
    }

    /// Sets whether reissue is allowed.
    #[must_use]
    pub fn with_reissue(mut self, allow: bool) -> Self {
        self.allow_reissue = allow;
        self
    }
}

/// Result of a successful `add_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedKey {
    /// The stored key (generated if none was supplied).
    pub key: String,
    /// True if an existing record was overwritten.
    pub replaced: bool,
}

/// Listing projection of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySummary {
    pub key: String,
    pub hwid: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub bound: bool,
}

impl From<&LicenseRecord> for KeySummary {
    fn from(record: &LicenseRecord) -> Self {
        Self {
            key: record.key().to_string(),
            hwid: record.hwid().map(str::to_string),
            expires: record.expires_at(),
            bound: record.is_bound(),
        }
    }
}

/// Create / reset / delete / list over the store.
#[derive(Debug, Clone)]
pub struct AdminService {
    store: Arc<LicenseStore>,
    config: Arc<AdminConfig>,
}

impl AdminService {
    pub fn new(store: Arc<LicenseStore>, config: AdminConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    fn verify(&self, provided: &str) -> LicenseResult<()> {
        if self.config.secret.matches(provided) {
            Ok(())
        } else {
            warn!("Rejected admin request with an invalid secret");
            Err(LicenseError::Forbidden)
        }
    }

    /// Creates an unbound key. A missing or empty `key` gets a generated
    /// one; a missing or empty `expires` means non-expiring.
    ///
    /// Overwriting an existing key discards its binding. That reissue is
    /// logged, and refused with `KeyExists` when reissue is disabled.
    pub async fn add_key(
        &self,
        secret: &str,
        key: Option<&str>,
        expires: Option<&str>,
    ) -> LicenseResult<AddedKey> {
        self.verify(secret)?;

        let expires_at = match expires.filter(|e| !e.trim().is_empty()) {
            Some(raw) => Some(parse_expiry(raw)?),
            None => None,
        };
        let key = match key.filter(|k| !k.is_empty()) {
            Some(k) => k.to_string(),
            None => generate_license_key(),
        };
        let record = LicenseRecord::new(key.clone(), expires_at);

        if !self.config.allow_reissue {
            self.store.insert_new(record).await?;
            info!("Key added: {key}");
            return Ok(AddedKey {
                key,
                replaced: false,
            });
        }

        let previous = self.store.put(record).await?;
        match &previous {
            Some(prev) if prev.is_bound() => {
                warn!("Key {key} reissued, previous hwid binding discarded");
            }
            Some(_) => warn!("Key {key} reissued"),
            None => info!("Key added: {key}"),
        }
        Ok(AddedKey {
            key,
            replaced: previous.is_some(),
        })
    }

    /// Clears the hwid binding of an existing key.
    pub async fn reset_key(&self, secret: &str, key: &str) -> LicenseResult<()> {
        self.verify(secret)?;
        let previous = self.store.mutate(key, |record| record.clear_binding()).await?;
        if previous.is_some() {
            info!("Key reset: {key}");
        } else {
            info!("Key reset: {key} (was not bound)");
        }
        Ok(())
    }

    /// Removes a key from the inventory.
    pub async fn delete_key(&self, secret: &str, key: &str) -> LicenseResult<()> {
        self.verify(secret)?;
        self.store.delete(key).await?;
        info!("Key deleted: {key}");
        Ok(())
    }

    /// Lists every key, ordered by key.
    pub async fn list_keys(&self, secret: &str) -> LicenseResult<Vec<KeySummary>> {
        self.verify(secret)?;
        Ok(self.store.list().await.iter().map(KeySummary::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_matching() {
        let secret = AdminSecret::new("s3cret").unwrap();
        assert!(secret.matches("s3cret"));
        assert!(!secret.matches("s3cre"));
        assert!(!secret.matches("s3cretX"));
        assert!(!secret.matches("S3CRET"));
        assert!(!secret.matches(""));
    }

    #[test]
    fn empty_secret_rejected() {
        assert!(matches!(
            AdminSecret::new(""),
            Err(LicenseError::InvalidConfig(_))
        ));
        assert!(AdminSecret::new("   ").is_err());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = AdminSecret::new("hunter2").unwrap();
        let debug = format!("{secret:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
