//! Authorization with first-use hwid binding.

use crate::error::{LicenseError, LicenseResult};
use crate::record::{Binding, DenyReason};
use crate::store::LicenseStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of an authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Access granted. `newly_bound` is set when this call performed the bind.
    Granted {
        /// True if the key was unbound and is now bound to the caller's hwid.
        newly_bound: bool,
    },
    /// Access refused.
    Denied(DenyReason),
}

impl AuthOutcome {
    /// Returns true if access was granted.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    /// Returns the refusal reason, if any.
    #[must_use]
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Granted { .. } => None,
            Self::Denied(reason) => Some(*reason),
        }
    }
}

/// Validates `(key, hwid)` pairs and binds unbound keys on first use.
#[derive(Debug, Clone)]
pub struct AuthService {
    store: Arc<LicenseStore>,
}

impl AuthService {
    pub fn new(store: Arc<LicenseStore>) -> Self {
        Self { store }
    }

    /// Authorizes `hwid` against `key` at the current time.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if a first-use bind could not be saved.
    /// The bind is still in effect in memory.
    pub async fn authorize(&self, key: &str, hwid: &str) -> LicenseResult<AuthOutcome> {
        self.authorize_at(key, hwid, Utc::now()).await
    }

    /// Authorizes `hwid` against `key` as of `now`.
    ///
    /// Lookup, expiry check and bind run as one critical section in the
    /// store, so concurrent first-use calls on the same key bind exactly once.
    pub async fn authorize_at(
        &self,
        key: &str,
        hwid: &str,
        now: DateTime<Utc>,
    ) -> LicenseResult<AuthOutcome> {
        if key.is_empty() || hwid.is_empty() {
            return Ok(AuthOutcome::Denied(DenyReason::MissingParams));
        }

        let result = self
            .store
            .mutate(key, |record| {
                if record.is_expired_at(now) {
                    return AuthOutcome::Denied(DenyReason::Expired);
                }
                match record.try_bind(hwid) {
                    Binding::Bound => AuthOutcome::Granted { newly_bound: true },
                    Binding::Matched => AuthOutcome::Granted { newly_bound: false },
                    Binding::Mismatch => AuthOutcome::Denied(DenyReason::HwidMismatch),
                }
            })
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(LicenseError::NotFound(_)) => AuthOutcome::Denied(DenyReason::InvalidKey),
            Err(e) => return Err(e),
        };

        match outcome {
            AuthOutcome::Granted { newly_bound: true } => info!("Key {key} bound to a new hwid"),
            AuthOutcome::Granted { newly_bound: false } => debug!("Key {key} authorized"),
            AuthOutcome::Denied(reason) => debug!("Key {key} denied: {reason}"),
        }
        Ok(outcome)
    }
}
