//! On-disk cache storage.
//!
//! Layout: `<root>/<cache name>/<sha256 of key>.json`. Each write goes to its
//! own uniquely named temporary file and is renamed into place, so neither a
//! crash nor a concurrent writer of the same key leaves a truncated entry.
//! An entry that fails to decode is dropped and reads as a miss.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{CacheKey, CacheStorage, StoredResponse, check_cache_name, is_valid_cache_name};
use crate::error::Result;
use crate::http::Response;

/// Cache storage persisted under a root directory.
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    /// Creates a storage rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, name: &str) -> Result<PathBuf> {
        check_cache_name(name)?;
        Ok(self.root.join(name))
    }

    fn entry_path(&self, name: &str, key: &CacheKey) -> Result<PathBuf> {
        Ok(self
            .store_dir(name)?
            .join(format!("{}.json", key.digest())))
    }

    async fn read_entry(path: &Path) -> Result<Option<StoredResponse>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                Self::discard(path, &e.to_string()).await;
                Ok(None)
            }
        }
    }

    async fn discard(path: &Path, reason: &str) {
        log::warn!("Dropping corrupt cache entry {}: {reason}", path.display());
        if let Err(e) = tokio::fs::remove_file(path).await
            && e.kind() != ErrorKind::NotFound
        {
            log::warn!("Failed to remove {}: {e}", path.display());
        }
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.store_dir(name)?).await?;
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        if !is_valid_cache_name(name) {
            return Ok(false);
        }
        Ok(tokio::fs::metadata(self.root.join(name))
            .await
            .is_ok_and(|m| m.is_dir()))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && is_valid_cache_name(name)
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        if !is_valid_cache_name(name) {
            return Ok(false);
        }
        match tokio::fs::remove_dir_all(self.root.join(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, name: &str, key: &CacheKey) -> Result<Option<Response>> {
        let path = self.entry_path(name, key)?;
        match Self::read_entry(&path).await? {
            Some(stored) if stored.matches(key) => match stored.into_response() {
                Ok(response) => Ok(Some(response)),
                Err(e) => {
                    Self::discard(&path, &e.to_string()).await;
                    Ok(None)
                }
            },
            Some(_) => {
                log::warn!("Cache entry {} does not match key {key}", path.display());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, name: &str, key: &CacheKey, response: &Response) -> Result<()> {
        let dir = self.store_dir(name)?;
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{}.json", key.digest()));
        let tmp_path = dir.join(format!(
            "{}.{}.tmp",
            key.digest(),
            uuid::Uuid::new_v4().simple()
        ));

        let json = serde_json::to_vec(&StoredResponse::capture(key, response))?;
        let written = match tokio::fs::write(&tmp_path, json).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheKey>> {
        let mut dir = match tokio::fs::read_dir(self.store_dir(name)?).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(stored) = Self::read_entry(&path).await? {
                keys.push(stored.key()?);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
