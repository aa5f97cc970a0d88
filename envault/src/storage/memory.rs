//! In-memory adapter for [`ObjectStore`], for tests and local development.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::storage::{ObjectStore, StorageError};

#[derive(Default)]
struct Inner {
    buckets: HashSet<String>,
    objects: HashMap<(String, String), (Bytes, String)>,
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    inner: Mutex<Inner>,
    pub upload_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.inner.lock().unwrap().objects.len()
    }

    pub fn content_type_of(&self, bucket: &str, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.inner.lock().unwrap().buckets.insert(bucket.to_string());
        Ok(())
    }

    async fn upload(&self, bucket: &str, key: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert((bucket.to_string(), key.to_string()), (bytes, content_type.to_string()));
        Ok(format!("{bucket}/{key}"))
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.inner.lock().unwrap().objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn presigned_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let inner = self.inner.lock().unwrap();
        if !inner.objects.contains_key(&(bucket.to_string(), key.to_string())) {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(format!("memory://{bucket}/{key}?expires={}", ttl.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_lifecycle() {
        let store = InMemoryObjectStore::new();
        store.ensure_bucket("docs").await.unwrap();

        let locator = store
            .upload("docs", "env1/1_contract.pdf", Bytes::from_static(b"pdf bytes"), "application/pdf")
            .await
            .unwrap();
        assert_eq!(locator, "docs/env1/1_contract.pdf");

        let bytes = store.download("docs", "env1/1_contract.pdf").await.unwrap();
        assert_eq!(bytes.as_ref(), b"pdf bytes");

        let url = store.presigned_url("docs", "env1/1_contract.pdf", Duration::from_secs(900)).await.unwrap();
        assert!(url.starts_with("memory://docs/"));

        store.delete("docs", "env1/1_contract.pdf").await.unwrap();
        assert!(matches!(
            store.download("docs", "env1/1_contract.pdf").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn upload_overwrites_by_key() {
        let store = InMemoryObjectStore::new();
        store.upload("b", "k", Bytes::from_static(b"one"), "text/plain").await.unwrap();
        store.upload("b", "k", Bytes::from_static(b"two"), "text/plain").await.unwrap();
        assert_eq!(store.object_count(), 1);
        assert_eq!(store.download("b", "k").await.unwrap().as_ref(), b"two");
    }
}
