//! Manifest pre-caching performed on install.

use futures::{StreamExt, TryStreamExt, stream};
use url::Url;

use crate::cache::{CacheKey, CacheStorage};
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::http::{Request, Response};

/// Trait for receiving install progress updates.
///
/// All methods have default no-op implementations for convenience.
pub trait InstallProgress: Send + Sync {
    /// Called once before any manifest entry is fetched.
    fn on_start(&self, _cache_name: &str, _entries: usize) {}

    /// Called when a manifest entry has been fetched.
    fn on_entry(&self, _url: &Url, _bytes: u64) {}

    /// Called when a manifest entry could not be fetched.
    fn on_error(&self, _url: &Url, _error: &str) {}

    /// Called after every entry has been stored.
    fn on_complete(&self, _report: &InstallReport) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl InstallProgress for NoProgress {}

/// Summary of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Store that was populated.
    pub cache_name: String,
    /// Number of manifest entries stored.
    pub entries: usize,
    /// Total body bytes stored.
    pub bytes: u64,
}

/// Fetches every manifest entry and stores them all, or none.
///
/// Fetches run concurrently up to `concurrency`. The first failure aborts the
/// install before anything is written.
pub(crate) async fn precache(
    storage: &dyn CacheStorage,
    fetcher: &dyn Fetcher,
    cache_name: &str,
    requests: Vec<Request>,
    concurrency: usize,
    progress: &dyn InstallProgress,
) -> Result<InstallReport> {
    storage.open(cache_name).await?;
    progress.on_start(cache_name, requests.len());

    let entries: Vec<(CacheKey, Response)> = stream::iter(requests)
        .map(|request| async move {
            let fetched = match fetcher.fetch(&request).await {
                Ok(res) if res.ok() => Ok(res),
                Ok(res) => Err(format!("unexpected status {}", res.status)),
                Err(e) => Err(e.to_string()),
            };
            match fetched {
                Ok(response) => {
                    progress.on_entry(&request.url, response.body.len() as u64);
                    Ok((CacheKey::for_request(&request), response))
                }
                Err(reason) => {
                    progress.on_error(&request.url, &reason);
                    Err(Error::Install {
                        url: request.url.to_string(),
                        reason,
                    })
                }
            }
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    storage.put_all(cache_name, &entries).await?;

    let report = InstallReport {
        cache_name: cache_name.to_string(),
        entries: entries.len(),
        bytes: entries.iter().map(|(_, r)| r.body.len() as u64).sum(),
    };
    progress.on_complete(&report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_progress_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoProgress>();
    }
}
