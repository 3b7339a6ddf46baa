//! Read-only validation. Never binds.

use crate::record::DenyReason;
use crate::store::LicenseStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Outcome of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Key exists, is not expired, and is bound to the given hwid.
    Valid,
    /// Refused for the given reason.
    Invalid(DenyReason),
}

impl CheckOutcome {
    /// Returns true for [`CheckOutcome::Valid`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validates `(key, hwid)` pairs without touching the store.
#[derive(Debug, Clone)]
pub struct CheckService {
    store: Arc<LicenseStore>,
}

impl CheckService {
    pub fn new(store: Arc<LicenseStore>) -> Self {
        Self { store }
    }

    /// Checks `hwid` against `key` at the current time.
    pub async fn check(&self, key: &str, hwid: &str) -> CheckOutcome {
        self.check_at(key, hwid, Utc::now()).await
    }

    /// Checks `hwid` against `key` as of `now`. An unbound key matches no hwid.
    pub async fn check_at(&self, key: &str, hwid: &str, now: DateTime<Utc>) -> CheckOutcome {
        if key.is_empty() || hwid.is_empty() {
            return CheckOutcome::Invalid(DenyReason::MissingParams);
        }

        let Ok(record) = self.store.get(key).await else {
            return CheckOutcome::Invalid(DenyReason::InvalidKey);
        };

        if record.is_expired_at(now) {
            debug!("Check on expired key {key}");
            return CheckOutcome::Invalid(DenyReason::Expired);
        }

        if record.hwid() == Some(hwid) {
            CheckOutcome::Valid
        } else {
            CheckOutcome::Invalid(DenyReason::HwidMismatch)
        }
    }
}
