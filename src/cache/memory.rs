//! In-process cache storage.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheKey, CacheStorage, check_cache_name};
use crate::error::Result;
use crate::http::Response;

type Store = HashMap<CacheKey, Response>;

/// Cache storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    stores: RwLock<BTreeMap<String, Store>>,
}

impl MemoryCacheStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        check_cache_name(name)?;
        self.stores
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.stores.read().await.contains_key(name))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.stores.write().await.remove(name).is_some())
    }

    async fn get(&self, name: &str, key: &CacheKey) -> Result<Option<Response>> {
        Ok(self
            .stores
            .read()
            .await
            .get(name)
            .and_then(|store| store.get(key))
            .cloned())
    }

    async fn put(&self, name: &str, key: &CacheKey, response: &Response) -> Result<()> {
        check_cache_name(name)?;
        self.stores
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .insert(key.clone(), response.clone());
        Ok(())
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheKey>> {
        let stores = self.stores.read().await;
        let mut keys: Vec<_> = stores
            .get(name)
            .map(|store| store.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use reqwest::{Method, StatusCode};
    use url::Url;

    fn key(path: &str) -> CacheKey {
        let url = Url::parse("https://portal.example.com").unwrap().join(path).unwrap();
        CacheKey::new(&Method::GET, &url)
    }

    #[tokio::test]
    async fn open_creates_empty_store() {
        let storage = MemoryCacheStorage::new();
        assert!(!storage.has("v1").await.unwrap());
        storage.open("v1").await.unwrap();
        assert!(storage.has("v1").await.unwrap());
        assert!(storage.entries("v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_rejects_bad_names() {
        let storage = MemoryCacheStorage::new();
        assert!(matches!(
            storage.open("../etc").await,
            Err(Error::InvalidCacheName(_))
        ));
    }

    #[tokio::test]
    async fn put_then_get() {
        let storage = MemoryCacheStorage::new();
        let res = Response::new(StatusCode::OK, "shell");
        storage.put("v1", &key("/index.html"), &res).await.unwrap();

        let hit = storage.get("v1", &key("/index.html")).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"shell");
        assert!(storage.get("v1", &key("/other")).await.unwrap().is_none());
        assert!(storage.get("v2", &key("/index.html")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_whole_store() {
        let storage = MemoryCacheStorage::new();
        storage.open("v1").await.unwrap();
        storage.open("v2").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["v1", "v2"]);

        assert!(storage.delete("v1").await.unwrap());
        assert!(!storage.delete("v1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);
    }
}
