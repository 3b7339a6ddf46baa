//! HTTP API for the keyguard license server.
//!
//! | Method | Path                      | Service           |
//! |--------|---------------------------|-------------------|
//! | POST   | `/api/auth`               | [`AuthService`]   |
//! | POST   | `/api/check`              | [`CheckService`]  |
//! | POST   | `/api/admin/add-key`      | [`AdminService`]  |
//! | POST   | `/api/admin/reset-key`    | [`AdminService`]  |
//! | GET    | `/api/admin/list-keys`    | [`AdminService`]  |
//! | POST   | `/api/admin/delete-key`   | [`AdminService`]  |

mod error;
mod routes;

pub use error::ApiError;
pub use routes::{
    AddKeyRequest, AddKeyResponse, AdminQuery, CheckResponse, KeyRequest, LicenseRequest,
    ListKeysResponse, StatusResponse,
};

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use keyguard_license::{AdminConfig, AdminService, AuthService, CheckService, LicenseStore};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Services shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub check: CheckService,
    pub admin: AdminService,
}

impl AppState {
    /// Builds all services over one store.
    pub fn new(store: Arc<LicenseStore>, admin: AdminConfig) -> Self {
        Self {
            auth: AuthService::new(store.clone()),
            check: CheckService::new(store.clone()),
            admin: AdminService::new(store, admin),
        }
    }
}

/// Browser clients call the API cross-origin.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}

/// Build the HTTP API router over the given services.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth", post(routes::authorize))
        .route("/api/check", post(routes::check))
        .route("/api/admin/add-key", post(routes::add_key))
        .route("/api/admin/reset-key", post(routes::reset_key))
        .route("/api/admin/list-keys", get(routes::list_keys))
        .route("/api/admin/delete-key", post(routes::delete_key))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
