pub mod access;
pub mod auth;
pub mod client_ip;
pub mod error;
pub mod handlers;
pub mod server;
pub mod store;

use std::sync::Arc;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn store::AllowlistStore>,
    /// `user:pass` required on the management routes. `None` locks them.
    pub basic_auth: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn store::AllowlistStore>, basic_auth: Option<String>) -> Self {
        Self { store, basic_auth }
    }
}

pub use server::{build_store, router, run, ServerConfig};
