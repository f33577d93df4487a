use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post, MethodRouter},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    auth::require_basic_auth,
    handlers::{add_ip, health, list_ips, method_not_allowed, remove_ip, whoami},
    store::{
        AllowlistStore, DocumentStore, FirestoreCollection, FirestoreConfig, MemoryStore,
        TokenSource, ALLOWLIST_COLLECTION,
    },
    AppState,
};

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Comma-separated seed for the in-memory allowlist.
    pub allowed_ip: Option<String>,
    /// Shared `user:pass` credential for the management routes.
    pub basic_auth: Option<String>,
    /// Selects the Firestore backend when set.
    pub project_id: Option<String>,
    pub firestore_emulator_host: Option<String>,
    pub firestore_token: Option<String>,
    pub cors_origins: Option<String>,
}

/// Pick the allowlist backend. A configured project means Firestore, and a
/// client that cannot be built is fatal.
pub fn build_store(cfg: &ServerConfig) -> Result<Arc<dyn AllowlistStore>> {
    let Some(project_id) = cfg.project_id.as_deref() else {
        let store = MemoryStore::from_encoded(cfg.allowed_ip.as_deref().unwrap_or_default());
        info!(seeded = %store.encoded()?, "using in-memory allowlist");
        return Ok(Arc::new(store));
    };

    let mut fs_cfg = match cfg.firestore_emulator_host.as_deref() {
        Some(host) => FirestoreConfig::emulator(project_id, ALLOWLIST_COLLECTION, host),
        None => FirestoreConfig::new(project_id, ALLOWLIST_COLLECTION),
    };
    if let Some(token) = &cfg.firestore_token {
        fs_cfg = fs_cfg.with_token(TokenSource::Static(token.clone()));
    }

    info!(
        project_id,
        collection = ALLOWLIST_COLLECTION,
        base_url = %fs_cfg.base_url,
        "using Firestore allowlist"
    );
    let collection = FirestoreCollection::new(fs_cfg).context("create Firestore client")?;
    Ok(Arc::new(DocumentStore::new(collection)))
}

/// All routes, with auth applied to the management endpoints.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required).
    let public = Router::new()
        .route("/health", get(health))
        .route("/", get(whoami));

    // Allowlist management (Basic auth required).
    let protected = Router::new()
        .route("/", post(add_ip).delete(remove_ip))
        .route("/list", get(list_ips))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ));

    // Any other path answers GET like `/`.
    let unrouted: MethodRouter = get(whoami)
        .fallback(method_not_allowed)
        .with_state(state.clone());

    Router::new()
        .merge(public)
        .merge(protected)
        .method_not_allowed_fallback(method_not_allowed)
        .fallback_service(unrouted)
        .with_state(state)
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let store = build_store(&cfg)?;

    if cfg.basic_auth.is_none() {
        warn!("BASIC_AUTH not set; allowlist management endpoints will reject all requests");
    }

    let state = AppState::new(store, cfg.basic_auth.clone());

    let app = router(state)
        .layer(build_cors(cfg.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "whatismyip server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    match origins {
        Some(o) => {
            let origins: Vec<_> = o
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            cors.allow_origin(origins)
        }
        None => cors.allow_origin(Any),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            allowed_ip: None,
            basic_auth: None,
            project_id: None,
            firestore_emulator_host: None,
            firestore_token: None,
            cors_origins: None,
        }
    }

    #[tokio::test]
    async fn no_project_selects_memory_store() {
        let store = build_store(&ServerConfig {
            allowed_ip: Some("203.0.113.5, ,198.51.100.1".into()),
            ..cfg()
        })
        .unwrap();
        assert_eq!(store.backend(), "memory");
        assert_eq!(store.list().await.unwrap(), vec!["203.0.113.5", "198.51.100.1"]);
    }

    #[test]
    fn project_selects_document_store() {
        let store = build_store(&ServerConfig {
            project_id: Some("demo".into()),
            firestore_emulator_host: Some("localhost:8081".into()),
            ..cfg()
        })
        .unwrap();
        assert_eq!(store.backend(), "document");
    }
}
