use async_trait::async_trait;

use super::{AllowlistStore, StoreError};

/// A remote collection where a key's existence is all that matters.
///
/// `set` on an existing key and `delete` on a missing one must both
/// succeed.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    async fn list_ids(&self) -> Result<Vec<String>, StoreError>;

    async fn set(&self, id: &str) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Allowlist backed by one remote document per allowed IP.
pub struct DocumentStore<C> {
    collection: C,
}

impl<C: DocumentCollection> DocumentStore<C> {
    pub fn new(collection: C) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl<C: DocumentCollection> AllowlistStore for DocumentStore<C> {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        self.collection.list_ids().await
    }

    async fn add(&self, ip: &str) -> Result<(), StoreError> {
        self.collection.set(ip).await
    }

    async fn remove(&self, ip: &str) -> Result<(), StoreError> {
        self.collection.delete(ip).await
    }

    fn backend(&self) -> &'static str {
        "document"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeCollection {
        ids: Mutex<BTreeSet<String>>,
        fail: bool,
    }

    #[async_trait]
    impl DocumentCollection for FakeCollection {
        async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
            if self.fail {
                return Err(StoreError::Token("no credentials".into()));
            }
            Ok(self.ids.lock().unwrap().iter().cloned().collect())
        }

        async fn set(&self, id: &str) -> Result<(), StoreError> {
            self.ids.lock().unwrap().insert(id.to_owned());
            Ok(())
        }

        async fn delete(&self, id: &str) -> Result<(), StoreError> {
            self.ids.lock().unwrap().remove(id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn add_twice_lists_once() {
        let store = DocumentStore::new(FakeCollection::default());
        store.add("203.0.113.5").await.unwrap();
        store.add("203.0.113.5").await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["203.0.113.5"]);
    }

    #[tokio::test]
    async fn remove_missing_is_noop() {
        let store = DocumentStore::new(FakeCollection::default());
        store.add("203.0.113.5").await.unwrap();
        store.remove("198.51.100.1").await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["203.0.113.5"]);
    }

    #[tokio::test]
    async fn add_then_remove_restores_previous_set() {
        let store = DocumentStore::new(FakeCollection::default());
        store.add("2001:db8::1").await.unwrap();
        let before = store.list().await.unwrap();
        store.add("203.0.113.5").await.unwrap();
        store.remove("203.0.113.5").await.unwrap();
        assert_eq!(store.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn collection_errors_propagate() {
        let store = DocumentStore::new(FakeCollection {
            fail: true,
            ..Default::default()
        });
        assert!(matches!(store.list().await, Err(StoreError::Token(_))));
    }
}
