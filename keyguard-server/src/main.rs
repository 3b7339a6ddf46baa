//! keyguard license server
//!
//! Issues and validates hwid-bound license keys over HTTP. The inventory is
//! kept in memory and rewritten to a JSON file on every change.
//!
//! Usage:
//!   keyguard-server --admin-key "$SECRET" --keys-file /var/lib/keyguard/keys.json

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use keyguard_license::{
    AdminConfig, AdminSecret, JsonFileBackend, LicenseBackend, LicenseStore, MemoryBackend,
};
use keyguard_server::{build_router, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keyguard-server")]
#[command(about = "hwid-bound license key server")]
struct Args {
    /// HTTP port
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Address to bind
    #[arg(long, env = "KEYGUARD_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Path to the license inventory file
    #[arg(long, env = "KEYGUARD_KEYS_FILE", default_value = "keys.json")]
    keys_file: PathBuf,

    /// Shared secret for the admin endpoints
    #[arg(long, env = "KEYGUARD_ADMIN_KEY", hide_env_values = true)]
    admin_key: String,

    /// Refuse add-key on an existing key instead of reissuing it
    #[arg(long, env = "KEYGUARD_NO_REISSUE")]
    no_reissue: bool,

    /// Keep the inventory in memory only (nothing is written to disk)
    #[arg(long)]
    ephemeral: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    info!("keyguard server starting...");

    let secret = AdminSecret::new(args.admin_key).context("invalid admin key")?;
    let admin = AdminConfig::new(secret).with_reissue(!args.no_reissue);

    let keys_file = std::path::absolute(&args.keys_file).unwrap_or(args.keys_file);
    let backend: Arc<dyn LicenseBackend> = if args.ephemeral {
        warn!("Ephemeral mode: license changes are not persisted");
        Arc::new(MemoryBackend::new())
    } else {
        Arc::new(JsonFileBackend::new(&keys_file))
    };
    let store = Arc::new(LicenseStore::open(backend).await);
    let loaded = store.len().await;

    let app = build_router(AppState::new(store, admin));

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!("\n========================================");
    println!("  keyguard License Server");
    println!("========================================");
    println!("  Listening:   {addr}");
    if args.ephemeral {
        println!("  Keys file:   (in memory)");
    } else {
        println!("  Keys file:   {}", keys_file.display());
    }
    println!("  Loaded keys: {loaded}");
    println!("  Reissue:     {}", if args.no_reissue { "refused" } else { "allowed" });
    println!("========================================\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("keyguard server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("Shutdown signal received");
}
