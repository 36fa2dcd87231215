//! dealer-portal - a dealership customer portal with an offline cache worker.
//!
//! The core is the [`worker::OfflineWorker`]: it pre-caches a manifest into a
//! versioned store, purges older versions on activation, and answers every
//! request cache-first with network fill and offline fallbacks. A
//! [`worker::Registration`] decides which worker is active, and the optional
//! `server` feature puts both behind an HTTP front together with the portal
//! services in [`portal`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dealer_portal::cache::MemoryCacheStorage;
//! use dealer_portal::fetch::HttpFetcher;
//! use dealer_portal::http::Request;
//! use dealer_portal::worker::{NoProgress, OfflineWorker, Registration};
//! use dealer_portal::AppConfig;
//!
//! # async fn example() -> dealer_portal::Result<()> {
//! let config = AppConfig::default();
//! let origin = config.fetch.origin_url()?;
//! let fetcher = Arc::new(HttpFetcher::new(origin.clone(), &config.fetch)?);
//!
//! let registration = Registration::new(fetcher.clone());
//! let worker = OfflineWorker::from_config(&config, Arc::new(MemoryCacheStorage::new()), fetcher)?;
//! registration.register(worker, &NoProgress).await?;
//!
//! let resolved = registration.resolve(&Request::navigate(origin.join("/")?)).await?;
//! println!("{} from {}", resolved.response.status, resolved.source.label());
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
pub mod http;
pub mod portal;
pub mod state;
pub mod stats;
pub mod urls;
pub mod worker;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types for convenience
pub use cache::{CacheKey, CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use config::{AppConfig, CacheConfig, FetchConfig, PathConfig, PortalConfig, ServerConfig};
pub use error::{Error, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use http::{Request, Response};
pub use state::RegistrationState;
pub use stats::{ResolveSource, StatsSnapshot};
pub use worker::{InstallProgress, NoProgress, OfflineWorker, Registration, WorkerState};
