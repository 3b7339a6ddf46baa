//! License inventory and hardware binding for keyguard.
//!
//! This crate handles:
//! - The license record and its hwid binding state machine
//! - Durable storage of the whole inventory (atomic file replace)
//! - First-use binding and validation of `(key, hwid)` pairs
//! - Privileged inventory management behind a shared admin secret
//!
//! # Design Principles
//!
//! - **Single point of truth**: every read and write goes through [`LicenseStore`]
//! - **Monotonic binding**: authorization binds `None → Some(hwid)` once; only an
//!   admin reset clears it
//! - **Durable before done**: a mutation is reported complete only after the
//!   backend save succeeds, otherwise the caller gets a `Persistence` error
//! - **No lost binds**: check-then-bind runs under the store lock, so racing
//!   first-use authorizations have exactly one winner
//!
//! # Persisted Format
//!
//! The inventory is a JSON array of `{ "key", "hwid", "expires" }` objects,
//! rewritten in full on every mutation.

mod admin;
mod auth;
mod check;
mod error;
mod persistence;
mod record;
mod store;

pub use admin::{AddedKey, AdminConfig, AdminSecret, AdminService, KeySummary};
pub use auth::{AuthOutcome, AuthService};
pub use check::{CheckOutcome, CheckService};
pub use error::{LicenseError, LicenseResult};
pub use persistence::{JsonFileBackend, LicenseBackend, MemoryBackend};
pub use record::{
    generate_license_key, parse_expiry, Binding, DenyReason, LicenseRecord, LicenseState,
};
pub use store::LicenseStore;
