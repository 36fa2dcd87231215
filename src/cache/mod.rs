//! Versioned cache stores.
//!
//! A cache store is a named map from [`CacheKey`] to a captured [`Response`].
//! The worker keeps exactly one store live: the one named by its version
//! string. Older stores stick around until the next activation deletes them.
//!
//! Two backends implement [`CacheStorage`]:
//!
//! - [`MemoryCacheStorage`] keeps everything in process memory.
//! - [`DiskCacheStorage`] keeps one directory per store and one JSON document
//!   per entry, so cached resources survive a restart.

mod disk;
mod entry;
mod memory;

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Method;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::urls::without_fragment;

pub use disk::DiskCacheStorage;
pub use entry::StoredResponse;
pub use memory::MemoryCacheStorage;

static CACHE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"));

/// Returns true if `name` can identify a cache store.
///
/// Names double as directory names for the on-disk backend, so only ASCII
/// letters, digits, `.`, `_` and `-` are allowed and the first character must
/// be alphanumeric.
#[must_use]
pub fn is_valid_cache_name(name: &str) -> bool {
    CACHE_NAME_RE.is_match(name)
}

pub(crate) fn check_cache_name(name: &str) -> Result<()> {
    if is_valid_cache_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidCacheName(name.to_string()))
    }
}

/// Identity of a cached entry: request method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    method: String,
    url: String,
}

impl CacheKey {
    /// Builds a key from a method and URL.
    #[must_use]
    pub fn new(method: &Method, url: &Url) -> Self {
        Self {
            method: method.as_str().to_string(),
            url: without_fragment(url).to_string(),
        }
    }

    /// Builds the key a request is looked up under.
    #[must_use]
    pub fn for_request(request: &Request) -> Self {
        Self::new(&request.method, &request.url)
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the normalized URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Hex-encoded SHA-256 of the key, used as the entry file name on disk.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Storage for named cache stores.
///
/// Implementations serialize access internally; callers may share one
/// storage across concurrent fetch handlers.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Opens the named store, creating it empty if absent.
    async fn open(&self, name: &str) -> Result<()>;

    /// Returns true if the named store exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Lists the names of all existing stores in ascending order.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Deletes the named store and all of its entries.
    ///
    /// Returns false if no such store existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Looks up an entry in the named store.
    async fn get(&self, name: &str, key: &CacheKey) -> Result<Option<Response>>;

    /// Stores an entry, creating the named store if needed and replacing any
    /// previous entry under the same key.
    async fn put(&self, name: &str, key: &CacheKey, response: &Response) -> Result<()>;

    /// Lists the keys held by the named store; empty if the store is absent.
    async fn entries(&self, name: &str) -> Result<Vec<CacheKey>>;

    /// Stores every entry in order.
    async fn put_all(&self, name: &str, entries: &[(CacheKey, Response)]) -> Result<()> {
        for (key, response) in entries {
            self.put(name, key, response).await?;
        }
        Ok(())
    }
}
