//! Network access for the offline worker.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::config::FetchConfig;
use crate::error::Result;
use crate::http::{Request, Response, ResponseType};
use crate::urls::{is_same_origin, without_fragment};

/// Abstraction over the network for testability.
///
/// An `Err` means the network could not be reached. Any response that
/// arrives, whatever its status, is `Ok`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Performs the request and buffers the full response body.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: Url,
}

impl HttpFetcher {
    /// Builds a fetcher with a client configured from `config`.
    ///
    /// `origin` decides which responses count as same-origin (`basic`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(origin: Url, config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, origin))
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, origin: Url) -> Self {
        Self { client, origin }
    }

    /// Returns the origin used for response classification.
    #[must_use]
    pub const fn origin(&self) -> &Url {
        &self.origin
    }

    fn classify(&self, requested: &Url, received: &Url) -> ResponseType {
        if is_same_origin(requested, &self.origin) && is_same_origin(received, &self.origin) {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        let res = builder.send().await?;

        let final_url = res.url().clone();
        let redirected = without_fragment(&final_url) != without_fragment(&request.url);
        let kind = self.classify(&request.url, &final_url);
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.bytes().await?;

        log::debug!(
            "{} {} -> {status} ({} bytes{})",
            request.method,
            request.url,
            body.len(),
            if redirected { ", redirected" } else { "" }
        );

        Ok(Response {
            status,
            headers,
            body,
            kind,
            url: Some(final_url),
            redirected,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted fetcher shared by worker and server tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use url::Url;

    use super::Fetcher;
    use crate::error::{Error, Result};
    use crate::http::{Request, Response, ResponseType};

    pub const ORIGIN: &str = "https://portal.example.com";

    pub fn origin() -> Url {
        Url::parse(ORIGIN).unwrap()
    }

    pub fn url(raw: &str) -> Url {
        crate::urls::resolve(&origin(), raw).unwrap()
    }

    /// Answers from a fixed route table and counts every call.
    #[derive(Default)]
    pub struct MockFetcher {
        routes: Mutex<HashMap<String, Response>>,
        calls: Mutex<Vec<String>>,
        bodies: Mutex<Vec<Bytes>>,
        offline: AtomicBool,
        count: AtomicUsize,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Routes `raw` to a response classified like the HTTP fetcher would.
        pub fn route(self, raw: &str, status: StatusCode, body: &str) -> Self {
            let target = url(raw);
            let kind = if crate::urls::is_same_origin(&target, &origin()) {
                ResponseType::Basic
            } else {
                ResponseType::Cors
            };
            let response = Response {
                kind,
                url: Some(target.clone()),
                ..Response::new(status, body.to_string())
            };
            self.routes
                .lock()
                .unwrap()
                .insert(target.to_string(), response);
            self
        }

        /// Routes `raw` to an arbitrary response.
        pub fn route_response(self, raw: &str, response: Response) -> Self {
            self.routes
                .lock()
                .unwrap()
                .insert(url(raw).to_string(), response);
            self
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        pub fn call_count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }

        pub fn calls_for(&self, raw: &str) -> usize {
            let target = url(raw).to_string();
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| **c == target)
                .count()
        }
    }

    impl MockFetcher {
        /// Payload of the most recent request.
        pub fn last_body(&self) -> Option<Bytes> {
            self.bodies.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response> {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(request.url.to_string());
            self.bodies.lock().unwrap().push(request.body.clone());
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".into()));
            }
            self.routes
                .lock()
                .unwrap()
                .get(request.url.as_str())
                .cloned()
                .ok_or_else(|| Error::Network(format!("no route to {}", request.url)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(
            Url::parse("https://portal.example.com").unwrap(),
            &FetchConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn classify_same_origin_as_basic() {
        let f = fetcher();
        let a = Url::parse("https://portal.example.com/script.js").unwrap();
        assert_eq!(f.classify(&a, &a), ResponseType::Basic);
    }

    #[test]
    fn classify_cross_origin_as_cors() {
        let f = fetcher();
        let cdn = Url::parse("https://cdn.tailwindcss.com/").unwrap();
        assert_eq!(f.classify(&cdn, &cdn), ResponseType::Cors);

        // A same-origin request that lands elsewhere is not basic either.
        let local = Url::parse("https://portal.example.com/logo").unwrap();
        assert_eq!(f.classify(&local, &cdn), ResponseType::Cors);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let f = HttpFetcher::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            &FetchConfig::default().with_timeout_secs(2),
        )
        .unwrap();
        let req = Request::get(Url::parse("http://127.0.0.1:9/index.html").unwrap());
        let err = f.fetch(&req).await.unwrap_err();
        assert!(err.is_network());
    }
}
