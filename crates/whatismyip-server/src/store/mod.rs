pub mod document;
pub mod firestore;
pub mod memory;

use async_trait::async_trait;

pub use document::{DocumentCollection, DocumentStore};
pub use firestore::{FirestoreCollection, FirestoreConfig, TokenSource};
pub use memory::MemoryStore;

/// Firestore collection holding one document per allowed IP.
pub const ALLOWLIST_COLLECTION: &str = "whatismyip-allowed";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("document store returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("access token unavailable: {0}")]
    Token(String),

    #[error("invalid document store configuration: {0}")]
    Config(String),

    #[error("allowlist lock poisoned")]
    Poisoned,
}

/// Membership operations shared by every allowlist backend.
///
/// `add` is idempotent and `remove` of a non-member is a no-op, so callers
/// never need to check membership first.
#[async_trait]
pub trait AllowlistStore: Send + Sync {
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    async fn add(&self, ip: &str) -> Result<(), StoreError>;

    async fn remove(&self, ip: &str) -> Result<(), StoreError>;

    /// Short backend name for log lines.
    fn backend(&self) -> &'static str;
}
