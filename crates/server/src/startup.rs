use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use common::utils::logging::init_logging_from_env;
use configs::{AppConfig, CacheBackend};
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use service::auth::signing::SigningMaterial;
use service::mail::TracingMailer;
use service::session::{MemorySessionStore, RedisSessionStore};
use service::storage::JsonUserStore;

use crate::errors::StartupError;
use crate::routes;
use crate::state::{AppState, AuthSettings, SharedStore};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Parse the signing pair from inline PEM when present, else from files.
fn load_keys(cfg: &AppConfig) -> Result<SigningMaterial, StartupError> {
    let auth = &cfg.auth;
    let keys = match (&auth.private_key_pem, &auth.public_key_pem) {
        (Some(private), Some(public)) => SigningMaterial::from_pem(private.as_bytes(), public.as_bytes()),
        _ => SigningMaterial::from_pem_files(&auth.private_key_path, &auth.public_key_path),
    };
    keys.map_err(|e| StartupError::Keys(e.to_string()))
}

async fn connect_store(cfg: &AppConfig) -> Result<SharedStore, StartupError> {
    match cfg.cache.backend {
        CacheBackend::Redis => {
            let store = RedisSessionStore::open(&cfg.cache.redis_url).map_err(|e| StartupError::Store(e.to_string()))?;
            tokio::time::timeout(Duration::from_millis(cfg.cache.op_timeout_ms), store.ping())
                .await
                .map_err(|_| StartupError::Store("redis ping timed out".into()))?
                .map_err(|e| StartupError::Store(e.to_string()))?;
            info!(backend = "redis", "session store connected");
            Ok(Arc::new(store))
        }
        CacheBackend::Memory => {
            warn!(backend = "memory", "sessions are process-local and lost on restart");
            Ok(Arc::new(MemorySessionStore::new()))
        }
    }
}

/// Wire configuration into a ready router.
pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    let keys = Arc::new(load_keys(cfg)?);
    let store = connect_store(cfg).await?;
    let users = JsonUserStore::new(cfg.users.path.clone())
        .await
        .map_err(|e| StartupError::InvalidConfig(format!("users file {}: {e}", cfg.users.path)))?;

    let state = AppState::new(keys, store, users, Arc::new(TracingMailer), AuthSettings::from(cfg));
    Ok(routes::build_router(state, build_cors()))
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bind address: {e}")))
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> Result<(), StartupError> {
    dotenv().ok();
    init_logging_from_env();

    let cfg = AppConfig::load_and_validate().map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    let app = build_app(&cfg).await?;

    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting auth server");
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(anyhow::Error::from)?;
    axum::serve(listener, app).await.map_err(anyhow::Error::from)?;
    Ok(())
}
