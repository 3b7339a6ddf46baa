//! Shared test helpers for license tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use keyguard_license::{
    AdminConfig, AdminSecret, AdminService, AuthService, CheckService, LicenseBackend,
    LicenseError, LicenseRecord, LicenseResult, LicenseStore, MemoryBackend,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const ADMIN_SECRET: &str = "test-admin-secret";

/// All three services over one store.
pub struct Services {
    pub store: Arc<LicenseStore>,
    pub auth: AuthService,
    pub check: CheckService,
    pub admin: AdminService,
}

impl Services {
    pub fn new(store: Arc<LicenseStore>) -> Self {
        let config = AdminConfig::new(AdminSecret::new(ADMIN_SECRET).unwrap());
        Self::with_config(store, config)
    }

    pub fn with_config(store: Arc<LicenseStore>, config: AdminConfig) -> Self {
        Self {
            auth: AuthService::new(store.clone()),
            check: CheckService::new(store.clone()),
            admin: AdminService::new(store.clone(), config),
            store,
        }
    }
}

/// Empty store over a fresh in-memory backend.
pub async fn memory_store() -> (Arc<MemoryBackend>, Arc<LicenseStore>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(LicenseStore::open(backend.clone()).await);
    (backend, store)
}

/// Services over an empty in-memory store.
pub async fn memory_services() -> (Arc<MemoryBackend>, Services) {
    let (backend, store) = memory_store().await;
    (backend, Services::new(store))
}

pub fn past() -> DateTime<Utc> {
    Utc::now() - Duration::days(1)
}

pub fn future() -> DateTime<Utc> {
    Utc::now() + Duration::days(30)
}

pub fn bound_record(key: &str, hwid: &str) -> LicenseRecord {
    let mut record = LicenseRecord::new(key, None);
    record.try_bind(hwid);
    record
}

/// Backend whose saves can be switched to fail.
#[derive(Default)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    failing: AtomicBool,
}

impl FlakyBackend {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<LicenseRecord> {
        self.inner.snapshot()
    }
}

#[async_trait]
impl LicenseBackend for FlakyBackend {
    async fn load(&self) -> LicenseResult<Vec<LicenseRecord>> {
        self.inner.load().await
    }

    async fn save(&self, records: &[LicenseRecord]) -> LicenseResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LicenseError::Persistence("disk full".into()));
        }
        self.inner.save(records).await
    }
}

/// Backend whose load always fails with the given error factory.
pub struct BrokenLoadBackend(pub fn() -> LicenseError);

#[async_trait]
impl LicenseBackend for BrokenLoadBackend {
    async fn load(&self) -> LicenseResult<Vec<LicenseRecord>> {
        Err((self.0)())
    }

    async fn save(&self, _records: &[LicenseRecord]) -> LicenseResult<()> {
        Ok(())
    }
}
