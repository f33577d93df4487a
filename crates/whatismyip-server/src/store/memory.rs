use std::sync::Mutex;

use async_trait::async_trait;

use super::{AllowlistStore, StoreError};

/// Process-local allowlist, seeded from the comma-joined `ALLOWED_IP` value.
///
/// All reads and writes go through one mutex, so concurrent add/remove calls
/// cannot lose each other's updates. Contents are gone on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the comma-joined encoding. Components are trimmed, empty ones
    /// (from stray commas) are dropped and duplicates collapse to one.
    pub fn from_encoded(raw: &str) -> Self {
        let mut entries: Vec<String> = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if !entries.iter().any(|e| e == part) {
                entries.push(part.to_owned());
            }
        }
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Render the allowlist back to its comma-joined form. An empty list
    /// renders as the empty string.
    pub fn encoded(&self) -> Result<String, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.join(","))
    }
}

#[async_trait]
impl AllowlistStore for MemoryStore {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.clone())
    }

    async fn add(&self, ip: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        if !entries.iter().any(|e| e == ip) {
            entries.push(ip.to_owned());
        }
        Ok(())
    }

    async fn remove(&self, ip: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.retain(|e| e != ip);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
