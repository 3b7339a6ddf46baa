//! The license record and its hwid binding state machine.
//!
//! A record moves between three observable states:
//!
//! ```text
//!            try_bind (auth)              expires passes
//!  Unbound ──────────────────▶ Bound ─────────────────▶ Expired
//!     ▲                          │
//!     └──── clear_binding ───────┘  (admin reset)
//! ```
//!
//! Deletion (admin) is the only way a record leaves the inventory. Expired
//! records are kept until an admin deletes them.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single license entry as stored and persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Unique license key; never changes after creation.
    key: String,
    /// Bound hardware identifier, `None` until first authorization.
    #[serde(default)]
    hwid: Option<String>,
    /// Expiry instant, `None` for non-expiring keys.
    #[serde(default, rename = "expires")]
    expires_at: Option<DateTime<Utc>>,
}

/// Result of offering an hwid to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The record was unbound and is now bound to the offered hwid.
    Bound,
    /// The record was already bound to the offered hwid.
    Matched,
    /// The record is bound to a different hwid; nothing changed.
    Mismatch,
}

/// Lifecycle state of a record at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseState {
    /// No hwid bound yet.
    Unbound,
    /// Bound to an hwid and not expired.
    Bound,
    /// Past its expiry, regardless of binding.
    Expired,
}

/// Why an authorization or check was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Key or hwid missing or empty.
    MissingParams,
    /// No record for the key.
    InvalidKey,
    /// Record is past its expiry.
    Expired,
    /// Record is bound to another hwid (or, for checks, not bound at all).
    HwidMismatch,
}

impl DenyReason {
    /// Wire code for this reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingParams => "missing_params",
            Self::InvalidKey => "invalid_key",
            Self::Expired => "expired",
            Self::HwidMismatch => "hwid_mismatch",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LicenseRecord {
    /// Creates an unbound record.
    pub fn new(key: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.into(),
            hwid: None,
            expires_at,
        }
    }

    /// Returns the license key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the bound hwid, if any.
    #[must_use]
    pub fn hwid(&self) -> Option<&str> {
        self.hwid.as_deref()
    }

    /// Returns the expiry instant, if any.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if an hwid is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.hwid.is_some()
    }

    /// Returns true if `now` is strictly past the expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Returns the lifecycle state at `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> LicenseState {
        if self.is_expired_at(now) {
            LicenseState::Expired
        } else if self.is_bound() {
            LicenseState::Bound
        } else {
            LicenseState::Unbound
        }
    }

    /// Offers `hwid` to this record. Binds only when currently unbound.
    pub fn try_bind(&mut self, hwid: &str) -> Binding {
        match self.hwid.as_deref() {
            None => {
                self.hwid = Some(hwid.to_string());
                Binding::Bound
            }
            Some(bound) if bound == hwid => Binding::Matched,
            Some(_) => Binding::Mismatch,
        }
    }

    /// Clears the binding, returning the hwid that was bound.
    pub fn clear_binding(&mut self) -> Option<String> {
        self.hwid.take()
    }
}

/// Generates a random license key of the form `XXXX-XXXX-XXXX-XXXX`.
#[must_use]
pub fn generate_license_key() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    hex.as_bytes()[..16]
        .chunks(4)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

/// Parses an admin-supplied expiry: RFC 3339, or a bare `YYYY-MM-DD` date
/// taken as midnight UTC.
///
/// # Errors
///
/// Returns `InvalidExpiry` if the value matches neither form.
pub fn parse_expiry(value: &str) -> LicenseResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| LicenseError::InvalidExpiry(value.to_string()))
}
