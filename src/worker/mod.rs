//! The offline cache worker.
//!
//! One [`OfflineWorker`] owns one versioned cache store and answers every
//! resource request for the portal:
//!
//! 1. **Install** fetches the manifest into the store, all or nothing.
//! 2. **Activate** deletes every store whose name differs from this worker's.
//! 3. **Resolve** serves hits from the store, stores cacheable misses, and
//!    falls back to the page shell or a `503` when the network is gone.
//!
//! The host-side [`Registration`] decides which worker is active.

mod install;
mod lifecycle;
mod message;
mod notification;
mod registration;
mod sync;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Method;
use url::Url;

use crate::cache::{CacheKey, CacheStorage};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::http::{Request, Response};
use crate::stats::{ResolveSource, ResolveStats, StatsSnapshot};
use crate::urls;

use lifecycle::StateCell;

pub use install::{InstallProgress, InstallReport, NoProgress};
pub use lifecycle::WorkerState;
pub use message::{ControlMessage, ReplyPort, VersionReply, reply_port};
pub use notification::{
    CLOSE_ACTION, ClickOutcome, EXPLORE_ACTION, Notification, NotificationAction,
    NotificationData, NotificationTemplate, on_click,
};
pub use registration::{Registration, open_storage};
pub use sync::{BACKGROUND_SYNC_TAG, EmptyQueue, OfflineQueue, SyncOutcome};

/// A response together with where it came from.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub response: Response,
    pub source: ResolveSource,
}

/// Summary of an activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    /// Store that is now live.
    pub cache_name: String,
    /// Stores that were purged.
    pub deleted: Vec<String>,
}

/// Worker bound to a single cache store version.
pub struct OfflineWorker {
    cache_name: String,
    origin: Url,
    manifest: Vec<String>,
    shell_path: String,
    install_concurrency: usize,
    skip_waiting_on_install: bool,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    queue: Arc<dyn OfflineQueue>,
    notifications: NotificationTemplate,
    state: StateCell,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
    stats: ResolveStats,
}

impl std::fmt::Debug for OfflineWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineWorker")
            .field("cache_name", &self.cache_name)
            .field("origin", &self.origin.as_str())
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl OfflineWorker {
    /// Creates a worker for the configured store version.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured origin is not an absolute URL.
    pub fn from_config(
        config: &AppConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        Ok(Self {
            cache_name: config.cache.cache_name(),
            origin: config.fetch.origin_url()?,
            manifest: config.cache.manifest.clone(),
            shell_path: config.cache.shell_path.clone(),
            install_concurrency: config.cache.install_concurrency,
            skip_waiting_on_install: config.cache.skip_waiting,
            storage,
            fetcher,
            queue: Arc::new(EmptyQueue),
            notifications: NotificationTemplate::from_config(&config.portal),
            state: StateCell::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
            stats: ResolveStats::new(),
        })
    }

    /// Binds the worker to a different store name, e.g. a previous version
    /// being restored after a failed install.
    #[must_use]
    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    /// Uses `queue` as the source of offline actions for background sync.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn OfflineQueue>) -> Self {
        self.queue = queue;
        self
    }

    /// Returns the store name, which is also the version reported to clients.
    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Whether the worker asked to skip the waiting phase.
    #[must_use]
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::Acquire)
    }

    /// Whether the worker has taken control of open clients.
    #[must_use]
    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::Acquire)
    }

    /// Returns resolve counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn request_for(&self, raw: &str) -> Result<Request> {
        Ok(Request::get(urls::resolve(&self.origin, raw)?))
    }

    /// Pre-caches the manifest into this worker's store.
    ///
    /// On failure nothing is stored, the worker becomes redundant and the
    /// error is returned; whatever version was active before keeps serving.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Install`] if any manifest entry cannot be fetched or
    /// answers with a non-OK status, or a store error if writing fails.
    pub async fn install(&self, progress: &dyn InstallProgress) -> Result<InstallReport> {
        self.state
            .transition(WorkerState::Parsed, WorkerState::Installing)?;
        log::info!("Installing {}", self.cache_name);

        let result = async {
            let requests = self
                .manifest
                .iter()
                .map(|raw| self.request_for(raw))
                .collect::<Result<Vec<_>>>()?;
            install::precache(
                self.storage.as_ref(),
                self.fetcher.as_ref(),
                &self.cache_name,
                requests,
                self.install_concurrency,
                progress,
            )
            .await
        }
        .await;

        match result {
            Ok(report) => {
                log::info!(
                    "Cached {} file(s) into {}",
                    report.entries,
                    self.cache_name
                );
                self.state.set(WorkerState::Installed);
                if self.skip_waiting_on_install {
                    self.skip_waiting.store(true, Ordering::Release);
                }
                Ok(report)
            }
            Err(e) => {
                log::error!("Error caching files for {}: {e}", self.cache_name);
                self.state.set(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    /// Deletes every store except this worker's and claims open clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is not installed or a store cannot be
    /// listed or deleted. The worker returns to `installed` in that case.
    pub async fn activate(&self) -> Result<ActivateReport> {
        self.state
            .transition(WorkerState::Installed, WorkerState::Activating)?;
        log::info!("Activating {}", self.cache_name);

        match self.purge_old_caches().await {
            Ok(deleted) => {
                self.state.set(WorkerState::Activated);
                self.clients_claimed.store(true, Ordering::Release);
                log::info!("Activated {}", self.cache_name);
                Ok(ActivateReport {
                    cache_name: self.cache_name.clone(),
                    deleted,
                })
            }
            Err(e) => {
                log::error!("Activation of {} failed: {e}", self.cache_name);
                self.state.set(WorkerState::Installed);
                Err(e)
            }
        }
    }

    async fn purge_old_caches(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name == self.cache_name {
                continue;
            }
            log::info!("Deleting old cache: {name}");
            if self.storage.delete(&name).await? {
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Adopts an existing, already-populated store as active without
    /// installing or purging anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has already started its lifecycle or
    /// the store does not exist.
    pub async fn restore(&self) -> Result<()> {
        if !self.storage.has(&self.cache_name).await? {
            return Err(Error::CacheStore(format!(
                "no cache named {} to restore",
                self.cache_name
            )));
        }
        self.state
            .transition(WorkerState::Parsed, WorkerState::Activated)?;
        self.clients_claimed.store(true, Ordering::Release);
        log::info!("Restored {}", self.cache_name);
        Ok(())
    }

    /// Treats an existing store as a finished install that is waiting to be
    /// activated, e.g. one installed by an earlier process.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has already started its lifecycle or
    /// the store does not exist.
    pub async fn adopt_installed(&self) -> Result<()> {
        if !self.storage.has(&self.cache_name).await? {
            return Err(Error::CacheStore(format!(
                "no cache named {} to activate",
                self.cache_name
            )));
        }
        self.state
            .transition(WorkerState::Parsed, WorkerState::Installed)
    }

    /// Marks the worker as replaced.
    pub(crate) fn retire(&self) {
        self.state.set(WorkerState::Redundant);
    }

    /// Answers a request from the store, the network or an offline fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is not activated or the store cannot be
    /// read. Network failures never surface as errors; they become fallbacks.
    pub async fn resolve(&self, request: &Request) -> Result<Resolved> {
        let state = self.state.get();
        if !state.can_intercept_fetch() {
            return Err(Error::InvalidState {
                expected: WorkerState::Activated,
                actual: state,
            });
        }

        let key = CacheKey::for_request(request);
        let cached = if request.is_cacheable_method() {
            self.storage.get(&self.cache_name, &key).await?
        } else {
            None
        };
        let resolved = if let Some(cached) = cached {
            log::debug!("Serving from cache: {}", request.url);
            Resolved {
                response: cached,
                source: ResolveSource::Cache,
            }
        } else {
            log::debug!("Fetching from network: {}", request.url);
            match self.fetcher.fetch(request).await {
                Ok(response) if request.is_cacheable_method() && response.is_cacheable() => {
                    match self.storage.put(&self.cache_name, &key, &response).await {
                        Ok(()) => log::debug!("Cached new resource: {}", request.url),
                        Err(e) => {
                            self.stats.record_store_error();
                            log::error!("Failed to cache {}: {e}", request.url);
                        }
                    }
                    Resolved {
                        response,
                        source: ResolveSource::Network,
                    }
                }
                Ok(response) => Resolved {
                    response,
                    source: ResolveSource::NetworkUncached,
                },
                Err(e) if e.is_network() => {
                    log::warn!("Fetch failed for {}: {e}", request.url);
                    self.offline_fallback(request).await?
                }
                Err(e) => return Err(e),
            }
        };

        self.stats.record(resolved.source);
        Ok(resolved)
    }

    async fn offline_fallback(&self, request: &Request) -> Result<Resolved> {
        if request.is_navigation() {
            let shell = CacheKey::new(&Method::GET, &urls::resolve(&self.origin, &self.shell_path)?);
            if let Some(response) = self.storage.get(&self.cache_name, &shell).await? {
                return Ok(Resolved {
                    response,
                    source: ResolveSource::ShellFallback,
                });
            }
            log::warn!("Page shell {} is not cached", self.shell_path);
        }
        Ok(Resolved {
            response: Response::service_unavailable(),
            source: ResolveSource::Unavailable,
        })
    }

    /// Handles a control message. `GET_VERSION` answers over `reply`.
    pub fn handle_message(&self, message: ControlMessage, reply: Option<ReplyPort>) {
        log::debug!("Message received: {message:?}");
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::Release);
            }
            ControlMessage::GetVersion => {
                let version = VersionReply {
                    version: self.cache_name.clone(),
                };
                match reply {
                    Some(port) => {
                        if port.send(version).is_err() {
                            log::debug!("Version reply dropped: requester went away");
                        }
                    }
                    None => log::warn!("GET_VERSION without a reply port"),
                }
            }
        }
    }

    /// Handles a background sync trigger.
    pub async fn sync(&self, tag: &str) -> SyncOutcome {
        log::info!("Background sync triggered: {tag}");
        if tag == BACKGROUND_SYNC_TAG {
            sync::run(self.queue.as_ref()).await
        } else {
            SyncOutcome::Ignored
        }
    }

    /// Builds the notification shown for a push with an optional text payload.
    #[must_use]
    pub fn push(&self, payload: Option<&str>) -> Notification {
        log::info!("Push notification received");
        self.notifications.render(payload)
    }

    /// Handles a click on a notification raised by [`push`](Self::push).
    #[must_use]
    pub fn notification_click(&self, action: Option<&str>) -> ClickOutcome {
        log::info!("Notification clicked: {}", action.unwrap_or("<body>"));
        on_click(action)
    }
}
