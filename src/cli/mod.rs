//! Command-line interface for the portal.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use console::style;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStorage;
use crate::config::AppConfig;
use crate::error::Result;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::format::{format_bytes, format_since};
use crate::http::Request;
use crate::portal::ChatRules;
use crate::server::{self, AppState};
use crate::state::RegistrationState;
use crate::urls;
use crate::worker::{OfflineWorker, Registration, open_storage};

use progress::{BarProgress, print_activation, print_stats};

/// portal - dealership portal server with an offline cache worker.
#[derive(Parser, Debug)]
#[command(name = "portal", author, version, about)]
pub struct Cli {
    /// Configuration file (created with defaults if missing).
    #[arg(long, short, global = true, env = "PORTAL_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the configured version if needed and serve the portal.
    Serve {
        /// Bind address, overriding the config file.
        #[arg(long)]
        host: Option<String>,
        /// Bind port, overriding the config file.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Pre-cache the manifest into the configured version's store.
    Install {
        /// Leave the new store waiting instead of activating it.
        #[arg(long)]
        no_activate: bool,
    },
    /// Activate an installed store and delete every other version.
    Activate,
    /// Resolve one URL the way the worker would.
    Resolve {
        /// Absolute URL, or a path relative to the origin.
        url: String,
        /// Treat the request as a page navigation.
        #[arg(long)]
        navigate: bool,
        /// Print the response body.
        #[arg(long)]
        body: bool,
    },
    /// List cache stores and their entries.
    Caches {
        /// Also list the keys in each store.
        #[arg(long)]
        entries: bool,
    },
    /// Show the configured and active versions.
    Version,
    /// Ask the assistant a question.
    Chat {
        /// The message to send.
        message: Vec<String>,
    },
}

impl Cli {
    /// Log filter to use when `RUST_LOG` is unset.
    #[must_use]
    pub const fn default_log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    fn load_config(&self) -> Result<AppConfig> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| AppConfig::default().paths.config_file());
        log::debug!("Loading config from {}", path.display());
        AppConfig::load_or_create(&path)
    }
}

fn worker_for(config: &AppConfig, storage: Arc<dyn CacheStorage>) -> Result<OfflineWorker> {
    let fetcher: Arc<dyn Fetcher> =
        Arc::new(HttpFetcher::new(config.fetch.origin_url()?, &config.fetch)?);
    OfflineWorker::from_config(config, storage, fetcher)
}

fn registration_for(config: &AppConfig) -> Result<Registration> {
    let fetcher: Arc<dyn Fetcher> =
        Arc::new(HttpFetcher::new(config.fetch.origin_url()?, &config.fetch)?);
    Ok(Registration::new(fetcher).with_state_path(config.paths.registration_path()))
}

/// Runs the parsed command.
///
/// # Errors
///
/// Returns the first error that stops the command.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = cli.load_config()?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Commands::Install { no_activate } => install(&config, no_activate).await,
        Commands::Activate => {
            let worker = worker_for(&config, open_storage(&config))?;
            let report = registration_for(&config)?.activate_stored(worker).await?;
            print_activation(&report);
            Ok(())
        }
        Commands::Resolve {
            url,
            navigate,
            body,
        } => resolve(&config, &url, navigate, body).await,
        Commands::Caches { entries } => caches(&config, entries).await,
        Commands::Version => {
            version(&config);
            Ok(())
        }
        Commands::Chat { message } => {
            match ChatRules::default().reply(&message.join(" ")) {
                Some(reply) => println!("{reply}"),
                None => println!("{}", style("(no reply to an empty message)").dim()),
            }
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let registration = Arc::new(Registration::bootstrap(&config, &BarProgress::new()).await?);
    match registration.active_version().await {
        Some(version) => log::info!("Serving with {version} active"),
        None => log::warn!("Serving without an active worker"),
    }

    let state = AppState::from_config(&config, registration)?;
    let listener = server::bind(&config.server).await?;

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutting down");
        }
        on_signal.cancel();
    });

    server::serve(listener, state, shutdown).await
}

async fn install(config: &AppConfig, no_activate: bool) -> Result<()> {
    let worker = worker_for(config, open_storage(config))?;
    if no_activate {
        worker.install(&BarProgress::new()).await?;
        println!(
            "{} is waiting; run `portal activate` to switch to it",
            worker.cache_name()
        );
        return Ok(());
    }

    let registration = registration_for(config)?;
    registration.register(worker, &BarProgress::new()).await?;
    if let Some(active) = registration.active().await {
        println!("{} {}", style("Active:").bold(), active.cache_name());
    }
    Ok(())
}

async fn resolve(config: &AppConfig, raw: &str, navigate: bool, body: bool) -> Result<()> {
    let registration = Registration::bootstrap(config, &BarProgress::new()).await?;
    let url = urls::resolve(&config.fetch.origin_url()?, raw)?;
    let request = if navigate {
        Request::navigate(url)
    } else {
        Request::get(url)
    };

    let resolved = registration.resolve(&request).await?;
    let res = &resolved.response;
    let status = if res.ok() {
        style(res.status.to_string()).green()
    } else {
        style(res.status.to_string()).red()
    };
    println!(
        "{status} {} [{}] {}",
        res.content_type().unwrap_or("-"),
        style(resolved.source.label()).cyan(),
        format_bytes(res.body.len() as u64)
    );
    if body {
        println!("{}", String::from_utf8_lossy(&res.body));
    }
    if let Some(active) = registration.active().await {
        print_stats(&active.stats());
    }
    Ok(())
}

async fn caches(config: &AppConfig, entries: bool) -> Result<()> {
    let storage = open_storage(config);
    let active = RegistrationState::load(&config.paths.registration_path())
        .map(|s| s.active_version);
    let names = storage.keys().await?;
    if names.is_empty() {
        println!("No cache stores in {}", config.paths.cache_dir().display());
        return Ok(());
    }

    for name in names {
        let keys = storage.entries(&name).await?;
        let marker = if active.as_deref() == Some(name.as_str()) {
            style("*").green().bold()
        } else {
            style(" ")
        };
        println!("{marker} {name} ({} entries)", keys.len());
        if entries {
            for key in keys {
                println!("    {key}");
            }
        }
    }
    Ok(())
}

fn version(config: &AppConfig) {
    println!("Configured: {}", config.cache.cache_name());
    match RegistrationState::load(&config.paths.registration_path()) {
        Some(state) => println!(
            "Active:     {} (activated {})",
            state.active_version,
            format_since(state.activated_at, Utc::now())
        ),
        None => println!("Active:     {}", style("none").dim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["portal", "-v", "serve", "--port", "8081"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.default_log_level(), "debug");
        assert!(matches!(
            cli.command,
            Commands::Serve {
                host: None,
                port: Some(8081)
            }
        ));
    }

    #[test]
    fn parses_resolve() {
        let cli = Cli::try_parse_from(["portal", "resolve", "/index.html", "--navigate"]).unwrap();
        assert_eq!(cli.default_log_level(), "info");
        let Commands::Resolve { url, navigate, body } = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(url, "/index.html");
        assert!(navigate);
        assert!(!body);
    }

    #[test]
    fn chat_joins_words() {
        let cli = Cli::try_parse_from(["portal", "chat", "test", "drive?"]).unwrap();
        let Commands::Chat { message } = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(message.join(" "), "test drive?");
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
