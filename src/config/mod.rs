//! Configuration for the portal, its offline worker and the front server.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::is_valid_cache_name;
use crate::error::{Error, Result};

const BRAND_LOGO: &str =
    "https://www.tatamotors.com/wp-content/themes/TataMotors/images/Tata-Motors-logo.svg";

/// Resources pre-cached on install, in order.
const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/script.js",
    "/manifest.json",
    "https://cdn.tailwindcss.com",
    "https://unpkg.com/lucide@latest/dist/umd/lucide.js",
    "https://cdnjs.cloudflare.com/ajax/libs/gsap/3.12.2/gsap.min.js",
    "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700;800&family=Roboto:wght@300;400;500;700&display=swap",
    BRAND_LOGO,
    "https://www.tatamotors.com/wp-content/uploads/2025/05/All-new-altroz-ember-glow-lowres.jpg",
    "https://wallpaperbat.com/img/884390-tata-motors-cars-showroom-mascot-motors-pvt-ltd-on-x-a-glimpse-of-the-beast-in-the-wild-ft-harrier-untamedkaziranga-edition-for-any-query-contact-us-91-9639008800-70-71-aligarh-91.jpg",
    "https://cars.tatamotors.com.mu/images/brandbanners/Nexon_banner_2025.webp",
    "https://www.tatamotors.com/wp-content/uploads/2024/07/1-Front-Image-With-Branding-Curvv-Ice-1.jpg",
    "https://images5.alphacoders.com/123/thumbbig-1236548.webp",
    "https://images.carandbike.com/cms/articles/2024/6/3213579/Tata_Tiago_i_CNG_34_82b98cd302.jpg",
    "https://cars.tatamotors.bt/images/brandbanners/safari-new-banner.webp",
];

/// Which backend holds the cache stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One directory per store under the data directory.
    #[default]
    Disk,
    /// Process memory only; everything is lost on exit.
    Memory,
}

/// Offline cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Application name, the first half of the cache name.
    pub app_name: String,
    /// Store version. Bumping it invalidates every previously cached resource.
    pub version: String,
    /// URLs fetched and stored on install. Relative entries resolve against the origin.
    pub manifest: Vec<String>,
    /// Page shell served to navigations when the network is unreachable.
    pub shell_path: String,
    /// Maximum number of manifest fetches in flight during install.
    pub install_concurrency: usize,
    /// Become active right after install instead of waiting for `SKIP_WAITING`.
    pub skip_waiting: bool,
    /// Storage backend.
    pub storage: StorageKind,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            app_name: "tata-motors-portal".to_string(),
            version: "v1.0.0".to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(ToString::to_string).collect(),
            shell_path: "/index.html".to_string(),
            install_concurrency: 4,
            skip_waiting: true,
            storage: StorageKind::Disk,
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store name, `<app-name>-<version>`.
    #[must_use]
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.app_name, self.version)
    }

    /// Sets the store version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Replaces the install manifest.
    #[must_use]
    pub fn with_manifest<I, S>(mut self, manifest: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = manifest.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the page shell path.
    #[must_use]
    pub fn with_shell_path(mut self, path: impl Into<String>) -> Self {
        self.shell_path = path.into();
        self
    }

    /// Sets the install concurrency.
    #[must_use]
    pub const fn with_install_concurrency(mut self, concurrency: usize) -> Self {
        self.install_concurrency = concurrency;
        self
    }

    /// Sets whether install requests immediate activation.
    #[must_use]
    pub const fn with_skip_waiting(mut self, skip: bool) -> Self {
        self.skip_waiting = skip;
        self
    }

    /// Sets the storage backend.
    #[must_use]
    pub const fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }
}

/// Network configuration for the upstream origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Origin serving the portal's own files.
    pub origin: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` sent upstream.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 30,
            user_agent: concat!("dealer-portal/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    /// Sets the upstream origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Parses the origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.origin)?)
    }
}

/// Path configuration for configuration and data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory where the configuration file lives.
    pub config_dir: PathBuf,
    /// Directory holding cache stores and registration state.
    pub data_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));

        // STATE_DIRECTORY is set by systemd when `StateDirectory=` is configured.
        let data_dir = std::env::var("STATE_DIRECTORY").map_or_else(
            |_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("dealer-portal")
            },
            PathBuf::from,
        );

        Self {
            config_dir: config_dir.join("dealer-portal"),
            data_dir,
        }
    }
}

impl PathConfig {
    /// Directory holding one subdirectory per cache store.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("caches")
    }

    /// File recording which version is active.
    #[must_use]
    pub fn registration_path(&self) -> PathBuf {
        self.data_dir.join("registration.toml")
    }

    /// Default location of the configuration file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}

/// Front server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9780,
        }
    }
}

/// Page-controller services and notification branding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Brand shown as notification title and in default texts.
    pub brand: String,
    /// Icon and badge URL for notifications.
    pub notification_icon: String,
    /// Remote lead endpoint; the simulated service is used when unset.
    pub lead_endpoint: Option<String>,
    /// Remote action-logging endpoint; the simulated service is used when unset.
    pub action_endpoint: Option<String>,
    /// Simulated latency of a lead lookup, in milliseconds.
    pub lead_delay_ms: u64,
    /// Simulated latency of an action post, in milliseconds.
    pub action_delay_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            brand: "Tata Motors".to_string(),
            notification_icon: BRAND_LOGO.to_string(),
            lead_endpoint: None,
            action_endpoint: None,
            lead_delay_ms: 1000,
            action_delay_ms: 500,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Offline cache configuration.
    pub cache: CacheConfig,
    /// Upstream network configuration.
    pub fetch: FetchConfig,
    /// Path configuration.
    pub paths: PathConfig,
    /// Front server configuration.
    pub server: ServerConfig,
    /// Portal services configuration.
    pub portal: PortalConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from `path`, writing a default file first if it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, written or parsed, or if
    /// the loaded values fail validation.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            log::info!("Wrote default config to {}", path.display());
            return Ok(config);
        }

        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Checks values that would otherwise fail later at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let name = self.cache.cache_name();
        if !is_valid_cache_name(&name) {
            return Err(Error::Config(format!(
                "cache name {name:?} may only contain letters, digits, '.', '_' and '-'"
            )));
        }
        if self.cache.install_concurrency == 0 {
            return Err(Error::Config("install_concurrency must be at least 1".into()));
        }
        let origin = self
            .fetch
            .origin_url()
            .map_err(|e| Error::Config(format!("origin {:?}: {e}", self.fetch.origin)))?;
        for entry in &self.cache.manifest {
            crate::urls::resolve(&origin, entry)
                .map_err(|e| Error::Config(format!("manifest entry {entry:?}: {e}")))?;
        }
        Ok(())
    }
}
