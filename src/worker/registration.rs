//! Host-side worker registration: which worker is installing, waiting and
//! active, and how a new version takes over.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{
    ActivateReport, ControlMessage, InstallProgress, InstallReport, OfflineWorker, ReplyPort,
    Resolved,
};
use crate::cache::{CacheStorage, DiskCacheStorage, MemoryCacheStorage};
use crate::config::{AppConfig, StorageKind};
use crate::error::Result;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::http::Request;
use crate::state::RegistrationState;
use crate::stats::ResolveSource;

#[derive(Default)]
struct Slots {
    installing: Option<Arc<OfflineWorker>>,
    waiting: Option<Arc<OfflineWorker>>,
    active: Option<Arc<OfflineWorker>>,
}

/// Tracks the worker slots for one scope and routes requests and messages.
pub struct Registration {
    slots: RwLock<Slots>,
    fetcher: Arc<dyn Fetcher>,
    state_path: Option<PathBuf>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("state_path", &self.state_path)
            .finish_non_exhaustive()
    }
}

/// Builds the storage backend selected by the configuration.
#[must_use]
pub fn open_storage(config: &AppConfig) -> Arc<dyn CacheStorage> {
    match config.cache.storage {
        StorageKind::Disk => Arc::new(DiskCacheStorage::new(config.paths.cache_dir())),
        StorageKind::Memory => Arc::new(MemoryCacheStorage::new()),
    }
}

impl Registration {
    /// Creates an empty registration. `fetcher` serves requests while no
    /// worker is active.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            fetcher,
            state_path: None,
        }
    }

    /// Records the active version at `path` after every activation.
    #[must_use]
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Builds storage and fetcher from `config`, then brings up a worker.
    ///
    /// If the configured version was the last one activated and its store
    /// still exists, it is restored without touching the network. Otherwise
    /// the configured version is installed; if that fails the previously
    /// recorded version is restored, and failing that the registration runs
    /// uncontrolled.
    ///
    /// # Errors
    ///
    /// Returns an error only if the configuration itself is unusable.
    pub async fn bootstrap(config: &AppConfig, progress: &dyn InstallProgress) -> Result<Self> {
        let origin = config.fetch.origin_url()?;
        let storage = open_storage(config);
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(origin, &config.fetch)?);
        let state_path = config.paths.registration_path();
        let registration = Self::new(fetcher.clone()).with_state_path(&state_path);

        let build = || OfflineWorker::from_config(config, storage.clone(), fetcher.clone());
        let previous = RegistrationState::load(&state_path);
        let current = config.cache.cache_name();

        if previous
            .as_ref()
            .is_some_and(|p| p.active_version == current)
            && storage.has(&current).await?
        {
            registration.restore(build()?).await?;
            return Ok(registration);
        }

        let Err(e) = registration.register(build()?, progress).await else {
            return Ok(registration);
        };
        log::warn!("Install of {current} failed: {e}");

        if let Some(previous) = previous {
            let fallback = build()?.with_cache_name(previous.active_version);
            match registration.restore(fallback).await {
                Ok(()) => return Ok(registration),
                Err(e) => log::warn!("Cannot restore previous version: {e}"),
            }
        }
        log::warn!("No cached version available, serving uncontrolled");
        Ok(registration)
    }

    /// Installs `worker` and, depending on its skip-waiting request and on
    /// whether anything is active, activates it or parks it as waiting.
    ///
    /// # Errors
    ///
    /// Returns the install or activation error. The previously active worker
    /// keeps serving in that case.
    pub async fn register(
        &self,
        worker: OfflineWorker,
        progress: &dyn InstallProgress,
    ) -> Result<InstallReport> {
        let worker = Arc::new(worker);
        self.slots.write().await.installing = Some(worker.clone());

        let installed = worker.install(progress).await;
        self.slots.write().await.installing = None;
        let report = installed?;

        let has_active = self.slots.read().await.active.is_some();
        if worker.skip_waiting_requested() || !has_active {
            self.promote(worker).await?;
        } else {
            log::info!("{} installed and waiting", worker.cache_name());
            if let Some(previous) = self.slots.write().await.waiting.replace(worker) {
                previous.retire();
            }
        }
        Ok(report)
    }

    /// Adopts an already-populated store as active without installing.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker's store does not exist.
    pub async fn restore(&self, worker: OfflineWorker) -> Result<()> {
        worker.restore().await?;
        self.install_active(Arc::new(worker)).await;
        Ok(())
    }

    /// Activates a store installed earlier, purging every other version.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not exist or activation fails.
    pub async fn activate_stored(&self, worker: OfflineWorker) -> Result<ActivateReport> {
        worker.adopt_installed().await?;
        self.promote(Arc::new(worker)).await
    }

    async fn promote(&self, worker: Arc<OfflineWorker>) -> Result<ActivateReport> {
        let report = worker.activate().await?;
        self.install_active(worker).await;
        Ok(report)
    }

    async fn install_active(&self, worker: Arc<OfflineWorker>) {
        let version = worker.cache_name().to_string();
        {
            let mut slots = self.slots.write().await;
            if slots
                .waiting
                .as_ref()
                .is_some_and(|w| Arc::ptr_eq(w, &worker))
            {
                slots.waiting = None;
            }
            if let Some(old) = slots.active.replace(worker) {
                old.retire();
            }
        }

        if let Some(path) = &self.state_path
            && let Err(e) = RegistrationState::new(&version).save(path)
        {
            log::error!("Failed to record active version {version}: {e}");
        }
    }

    /// Delivers a control message to the waiting worker, or the active one
    /// if nothing is waiting. `SKIP_WAITING` to a waiting worker promotes it.
    ///
    /// # Errors
    ///
    /// Returns an error if promoting the waiting worker fails.
    pub async fn post_message(&self, message: ControlMessage, reply: Option<ReplyPort>) -> Result<()> {
        let (target, is_waiting) = {
            let slots = self.slots.read().await;
            match (&slots.waiting, &slots.active) {
                (Some(w), _) => (w.clone(), true),
                (None, Some(a)) => (a.clone(), false),
                (None, None) => {
                    log::warn!("Dropping {message:?}: no worker registered");
                    return Ok(());
                }
            }
        };

        target.handle_message(message, reply);
        if is_waiting && message == ControlMessage::SkipWaiting {
            self.promote(target).await?;
        }
        Ok(())
    }

    /// Resolves a request through the active worker, or straight from the
    /// network while nothing is active.
    ///
    /// # Errors
    ///
    /// Returns the worker's error, or the network error when uncontrolled.
    pub async fn resolve(&self, request: &Request) -> Result<Resolved> {
        if let Some(active) = self.active().await {
            return active.resolve(request).await;
        }
        let response = self.fetcher.fetch(request).await?;
        Ok(Resolved {
            response,
            source: ResolveSource::Uncontrolled,
        })
    }

    /// Returns the active worker.
    pub async fn active(&self) -> Option<Arc<OfflineWorker>> {
        self.slots.read().await.active.clone()
    }

    /// Returns the active worker's cache name.
    pub async fn active_version(&self) -> Option<String> {
        self.slots
            .read()
            .await
            .active
            .as_ref()
            .map(|w| w.cache_name().to_string())
    }

    /// Returns the waiting worker's cache name.
    pub async fn waiting_version(&self) -> Option<String> {
        self.slots
            .read()
            .await
            .waiting
            .as_ref()
            .map(|w| w.cache_name().to_string())
    }

    /// Whether an install is in flight.
    pub async fn is_installing(&self) -> bool {
        self.slots.read().await.installing.is_some()
    }
}
