use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::models::job::ObjectId;

/// Key/value metadata owned by the host, keyed by (object id, field name).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, id: ObjectId, field: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, id: ObjectId, field: &str, value: &str) -> Result<(), StoreError>;

    /// Write several fields of one object. Implementations that can should apply
    /// them atomically.
    async fn set_many(&self, id: ObjectId, fields: &[(&str, String)]) -> Result<(), StoreError> {
        for (field, value) in fields {
            self.set(id, field, value).await?;
        }
        Ok(())
    }

    /// Apply `removes` then `writes` to one object, but only if `guard` admits
    /// the object's current value of the guarded field. The check and the
    /// writes happen as one atomic step. Returns whether anything was written.
    async fn update_if(
        &self,
        id: ObjectId,
        guard: Guard<'_>,
        removes: &[&str],
        writes: &[(&str, String)],
    ) -> Result<bool, StoreError>;

    /// Objects whose `field` currently holds one of `values`, in ascending id
    /// order, at most `limit` of them.
    async fn query(
        &self,
        field: &str,
        values: &[&str],
        limit: usize,
    ) -> Result<Vec<ObjectId>, StoreError>;

    /// Connectivity check for health endpoints.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Precondition for [`MetadataStore::update_if`].
#[derive(Debug, Clone, Copy)]
pub struct Guard<'a> {
    pub field: &'a str,
    /// Values the field may currently hold.
    pub one_of: &'a [&'a str],
    /// Whether a missing field also passes.
    pub or_absent: bool,
}

impl Guard<'_> {
    pub fn admits(&self, current: Option<&str>) -> bool {
        match current {
            Some(value) => self.one_of.contains(&value),
            None => self.or_absent,
        }
    }
}

/// Process-local store, for embedding hosts without their own storage and for tests.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    objects: RwLock<BTreeMap<ObjectId, HashMap<String, String>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get(&self, id: ObjectId, field: &str) -> Result<Option<String>, StoreError> {
        let objects = self.objects.read().await;
        Ok(objects.get(&id).and_then(|fields| fields.get(field).cloned()))
    }

    async fn set(&self, id: ObjectId, field: &str, value: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        objects
            .entry(id)
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn set_many(&self, id: ObjectId, fields: &[(&str, String)]) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        let entry = objects.entry(id).or_default();
        for (field, value) in fields {
            entry.insert(field.to_string(), value.clone());
        }
        Ok(())
    }

    async fn update_if(
        &self,
        id: ObjectId,
        guard: Guard<'_>,
        removes: &[&str],
        writes: &[(&str, String)],
    ) -> Result<bool, StoreError> {
        let mut objects = self.objects.write().await;
        let current = objects
            .get(&id)
            .and_then(|fields| fields.get(guard.field))
            .map(String::as_str);
        if !guard.admits(current) {
            return Ok(false);
        }

        let entry = objects.entry(id).or_default();
        for field in removes {
            entry.remove(*field);
        }
        for (field, value) in writes {
            entry.insert(field.to_string(), value.clone());
        }
        Ok(true)
    }

    async fn query(
        &self,
        field: &str,
        values: &[&str],
        limit: usize,
    ) -> Result<Vec<ObjectId>, StoreError> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .filter(|(_, fields)| {
                fields
                    .get(field)
                    .is_some_and(|v| values.contains(&v.as_str()))
            })
            .map(|(id, _)| *id)
            .take(limit)
            .collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to encode metadata value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Field {0} is not indexed and cannot be queried")]
    NotIndexed(String),

    #[error("Object {id} has an unreadable {field} value: {value}")]
    Corrupt {
        id: ObjectId,
        field: String,
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_roundtrip() {
        tokio_test::block_on(async {
            let store = InMemoryMetadataStore::new();
            assert_eq!(store.get(ObjectId(1), "a").await.unwrap(), None);

            store.set(ObjectId(1), "a", "x").await.unwrap();
            store.set(ObjectId(1), "a", "y").await.unwrap();
            assert_eq!(store.get(ObjectId(1), "a").await.unwrap().as_deref(), Some("y"));
            assert_eq!(store.get(ObjectId(2), "a").await.unwrap(), None);
        });
    }

    #[test]
    fn test_query_filters_orders_and_limits() {
        tokio_test::block_on(async {
            let store = InMemoryMetadataStore::new();
            for (id, status) in [(5, "queued"), (2, "processing"), (9, "completed"), (3, "queued")] {
                store.set(ObjectId(id), "status", status).await.unwrap();
            }

            let pending = store
                .query("status", &["queued", "processing"], 10)
                .await
                .unwrap();
            assert_eq!(pending, vec![ObjectId(2), ObjectId(3), ObjectId(5)]);

            let limited = store.query("status", &["queued", "processing"], 2).await.unwrap();
            assert_eq!(limited, vec![ObjectId(2), ObjectId(3)]);

            assert!(store.query("other", &["queued"], 10).await.unwrap().is_empty());
        });
    }

    #[test]
    fn test_update_if_checks_guard_before_writing() {
        tokio_test::block_on(async {
            let store = InMemoryMetadataStore::new();
            let fresh = Guard { field: "status", one_of: &["done"], or_absent: true };
            let write = [("status", "running".to_string()), ("note", "a".to_string())];

            assert!(store.update_if(ObjectId(1), fresh, &[], &write).await.unwrap());
            assert_eq!(store.get(ObjectId(1), "note").await.unwrap().as_deref(), Some("a"));

            // "running" is neither absent nor "done", so nothing changes.
            let again = [("status", "restarted".to_string())];
            assert!(!store.update_if(ObjectId(1), fresh, &["note"], &again).await.unwrap());
            assert_eq!(store.get(ObjectId(1), "status").await.unwrap().as_deref(), Some("running"));
            assert_eq!(store.get(ObjectId(1), "note").await.unwrap().as_deref(), Some("a"));

            let running = Guard { field: "status", one_of: &["running"], or_absent: false };
            let finish = [("status", "done".to_string())];
            assert!(store.update_if(ObjectId(1), running, &["note"], &finish).await.unwrap());
            assert_eq!(store.get(ObjectId(1), "note").await.unwrap(), None);
            assert!(!store.update_if(ObjectId(2), running, &[], &finish).await.unwrap());
            assert_eq!(store.get(ObjectId(2), "status").await.unwrap(), None);
        });
    }
}
