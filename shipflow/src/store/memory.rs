//! In-memory object store for tests and fixtures.

use super::ObjectStore;
use crate::errors::StoreError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory [`ObjectStore`] keyed by `bucket/key`.
///
/// Objects live in a sorted map so prefix listings come back in a
/// stable order.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects across all buckets.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    fn qualified(bucket: &str, key: &str) -> String {
        format!("{bucket}/{key}")
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .objects
            .read()
            .contains_key(&Self::qualified(bucket, key)))
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.objects
            .write()
            .insert(Self::qualified(bucket, key), bytes);
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .get(&Self::qualified(bucket, key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let qualified_prefix = Self::qualified(bucket, prefix);
        let strip = format!("{bucket}/");
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|k| k.starts_with(&qualified_prefix))
            .filter_map(|k| k.strip_prefix(&strip).map(str::to_string))
            .collect())
    }
}
