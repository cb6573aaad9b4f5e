//! HTTP surface for MyArc: entry CRUD, uploads, profile, and the peripheral
//! admin/cron endpoints, routed over axum with a shared `Arc` state.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use myarc_ai::InsightClient;
use myarc_journal::{EntryLifecycle, Notifier};
use myarc_memory::MemoryStore;
use myarc_store::JournalDb;

mod auth;
mod entry_handlers;
mod error;
mod ops_handlers;
mod upload_handlers;
mod user_handlers;

pub use error::ApiError;

const HEALTH_ENDPOINT: &str = "/health";
const ENTRIES_ENDPOINT: &str = "/entries";
const ENTRY_ENDPOINT: &str = "/entries/{id}";
const UPLOADS_ENDPOINT: &str = "/uploads";
const UPLOADS_CLEANUP_ENDPOINT: &str = "/uploads/cleanup-stale";
const USER_PROFILE_ENDPOINT: &str = "/user/profile";
const ADMIN_SETUP_MEMORY_ENDPOINT: &str = "/admin/setup-memory";
const CRON_NOTIFICATIONS_ENDPOINT: &str = "/cron/notifications";

/// Multipart bodies carry a little framing overhead beyond the file itself.
const UPLOAD_BODY_LIMIT: usize = myarc_assets::MAX_UPLOAD_BYTES + 64 * 1024;

/// Shared state handed to every handler.
pub struct AppState {
    pub db: JournalDb,
    pub lifecycle: EntryLifecycle,
    pub insight: Arc<dyn InsightClient>,
    pub memory: Arc<dyn MemoryStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// Builds the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(HEALTH_ENDPOINT, get(ops_handlers::handle_health))
        .route(ENTRIES_ENDPOINT, post(entry_handlers::handle_create_entry))
        .route(ENTRIES_ENDPOINT, get(entry_handlers::handle_list_entries))
        .route(ENTRY_ENDPOINT, get(entry_handlers::handle_get_entry))
        .route(ENTRY_ENDPOINT, put(entry_handlers::handle_update_entry))
        .route(ENTRY_ENDPOINT, delete(entry_handlers::handle_delete_entry))
        .route(UPLOADS_ENDPOINT, post(upload_handlers::handle_upload))
        .route(
            UPLOADS_CLEANUP_ENDPOINT,
            post(upload_handlers::handle_cleanup_stale),
        )
        .route(USER_PROFILE_ENDPOINT, get(user_handlers::handle_get_profile))
        .route(
            USER_PROFILE_ENDPOINT,
            axum::routing::patch(user_handlers::handle_patch_profile),
        )
        .route(
            ADMIN_SETUP_MEMORY_ENDPOINT,
            post(ops_handlers::handle_setup_memory),
        )
        .route(
            CRON_NOTIFICATIONS_ENDPOINT,
            get(ops_handlers::handle_cron_notifications),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(state)
}

/// Binds `bind` and serves the router until ctrl-c.
pub async fn run_server(state: Arc<AppState>, bind: &str) -> Result<()> {
    let bind_addr = bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid bind address '{bind}'"))?;

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind gateway on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound gateway address")?;

    info!(addr = %local_addr, "gateway listening");

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("gateway server exited unexpectedly")?;

    Ok(())
}
