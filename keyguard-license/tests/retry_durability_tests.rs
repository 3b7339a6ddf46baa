mod common;

use common::{FlakyBackend, Services, ADMIN_SECRET};
use keyguard_license::{
    AuthOutcome, DenyReason, LicenseError, LicenseRecord, LicenseStore, MemoryBackend,
};
use std::sync::Arc;

async fn flaky_services() -> (Arc<FlakyBackend>, Services) {
    let backend = Arc::new(FlakyBackend::default());
    let store = Arc::new(LicenseStore::open(backend.clone()).await);
    (backend, Services::new(store))
}

/// Services over whatever the backend last accepted, as after a restart.
async fn restarted(backend: &FlakyBackend) -> Services {
    let disk = Arc::new(MemoryBackend::with_records(backend.snapshot()));
    Services::new(Arc::new(LicenseStore::open(disk).await))
}

fn disk_hwid(backend: &FlakyBackend, key: &str) -> Option<String> {
    backend
        .snapshot()
        .iter()
        .find(|r| r.key() == key)
        .and_then(|r| r.hwid().map(str::to_string))
}

// ── Reset ────────────────────────────────────────────────────────

#[tokio::test]
async fn retried_reset_reaches_disk() {
    let (backend, svc) = flaky_services().await;
    svc.admin.add_key(ADMIN_SECRET, Some("K1"), None).await.unwrap();
    svc.auth.authorize("K1", "HW-A").await.unwrap();

    backend.set_failing(true);
    let err = svc.admin.reset_key(ADMIN_SECRET, "K1").await.unwrap_err();
    assert!(err.is_persistence());
    assert!(svc.store.is_dirty().await);

    // Memory is already reset, so the retry is a no-op change that still
    // has to save before it may report success.
    backend.set_failing(false);
    svc.admin.reset_key(ADMIN_SECRET, "K1").await.unwrap();
    assert!(!svc.store.is_dirty().await);
    assert_eq!(disk_hwid(&backend, "K1"), None);

    let after = restarted(&backend).await;
    assert_eq!(
        after.auth.authorize("K1", "HW-B").await.unwrap(),
        AuthOutcome::Granted { newly_bound: true }
    );
    assert_eq!(
        after.auth.authorize("K1", "HW-A").await.unwrap(),
        AuthOutcome::Denied(DenyReason::HwidMismatch)
    );
}

#[tokio::test]
async fn retried_reset_fails_while_disk_is_down() {
    let (backend, svc) = flaky_services().await;
    svc.admin.add_key(ADMIN_SECRET, Some("K1"), None).await.unwrap();
    svc.auth.authorize("K1", "HW-A").await.unwrap();

    backend.set_failing(true);
    assert!(svc.admin.reset_key(ADMIN_SECRET, "K1").await.is_err());
    let retry = svc.admin.reset_key(ADMIN_SECRET, "K1").await.unwrap_err();
    assert!(matches!(retry, LicenseError::Persistence(_)));
    assert_eq!(disk_hwid(&backend, "K1").as_deref(), Some("HW-A"));
}

// ── Bind ─────────────────────────────────────────────────────────

#[tokio::test]
async fn retried_bind_reaches_disk() {
    let (backend, svc) = flaky_services().await;
    svc.store.put(LicenseRecord::new("K1", None)).await.unwrap();

    backend.set_failing(true);
    assert!(svc.auth.authorize("K1", "HW-A").await.unwrap_err().is_persistence());

    // Still down: the matched retry must not claim success.
    assert!(svc.auth.authorize("K1", "HW-A").await.unwrap_err().is_persistence());
    assert_eq!(disk_hwid(&backend, "K1"), None);

    backend.set_failing(false);
    assert_eq!(
        svc.auth.authorize("K1", "HW-A").await.unwrap(),
        AuthOutcome::Granted { newly_bound: false }
    );
    assert_eq!(disk_hwid(&backend, "K1").as_deref(), Some("HW-A"));

    let after = restarted(&backend).await;
    assert_eq!(
        after.auth.authorize("K1", "HW-B").await.unwrap(),
        AuthOutcome::Denied(DenyReason::HwidMismatch)
    );
}

#[tokio::test]
async fn mismatch_while_dirty_flushes_pending_bind() {
    let (backend, svc) = flaky_services().await;
    svc.store.put(LicenseRecord::new("K1", None)).await.unwrap();

    backend.set_failing(true);
    svc.auth.authorize("K1", "HW-A").await.unwrap_err();

    backend.set_failing(false);
    assert_eq!(
        svc.auth.authorize("K1", "HW-B").await.unwrap(),
        AuthOutcome::Denied(DenyReason::HwidMismatch)
    );
    assert_eq!(disk_hwid(&backend, "K1").as_deref(), Some("HW-A"));
}

// ── Delete ───────────────────────────────────────────────────────

#[tokio::test]
async fn retried_delete_reaches_disk_before_not_found() {
    let (backend, svc) = flaky_services().await;
    svc.admin.add_key(ADMIN_SECRET, Some("K1"), None).await.unwrap();
    svc.admin.add_key(ADMIN_SECRET, Some("K2"), None).await.unwrap();

    backend.set_failing(true);
    assert!(svc.admin.delete_key(ADMIN_SECRET, "K1").await.unwrap_err().is_persistence());

    // While the disk is down the retry surfaces the storage failure,
    // not a misleading `NotFound`.
    let retry = svc.admin.delete_key(ADMIN_SECRET, "K1").await.unwrap_err();
    assert!(retry.is_persistence());

    backend.set_failing(false);
    let retry = svc.admin.delete_key(ADMIN_SECRET, "K1").await.unwrap_err();
    assert!(matches!(retry, LicenseError::NotFound(_)));
    let keys: Vec<String> = backend.snapshot().iter().map(|r| r.key().to_string()).collect();
    assert_eq!(keys, vec!["K2"]);

    let after = restarted(&backend).await;
    assert_eq!(
        after.auth.authorize("K1", "HW").await.unwrap(),
        AuthOutcome::Denied(DenyReason::InvalidKey)
    );
}

// ── Add ──────────────────────────────────────────────────────────

#[tokio::test]
async fn refused_add_flushes_pending_add() {
    let backend = Arc::new(FlakyBackend::default());
    let store = Arc::new(LicenseStore::open(backend.clone()).await);
    store.insert_new(LicenseRecord::new("K0", None)).await.unwrap();

    backend.set_failing(true);
    assert!(store.insert_new(LicenseRecord::new("K1", None)).await.is_err());

    backend.set_failing(false);
    let err = store.insert_new(LicenseRecord::new("K1", None)).await.unwrap_err();
    assert!(matches!(err, LicenseError::KeyExists(_)));
    assert_eq!(backend.snapshot().len(), 2);
    assert!(!store.is_dirty().await);
}
