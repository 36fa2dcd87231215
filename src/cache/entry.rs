//! Serializable form of a cached response.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use super::CacheKey;
use crate::error::{Error, Result};
use crate::http::{Response, ResponseType};

/// A cached response as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResponse {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Base64-encoded body.
    pub body: String,
    pub kind: ResponseType,
    pub response_url: Option<String>,
    pub redirected: bool,
    pub stored_at: DateTime<Utc>,
}

impl StoredResponse {
    /// Captures a response under the given key.
    ///
    /// Header values that are not valid UTF-8 are dropped.
    #[must_use]
    pub fn capture(key: &CacheKey, response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            method: key.method().to_string(),
            url: key.url().to_string(),
            status: response.status.as_u16(),
            headers,
            body: BASE64.encode(&response.body),
            kind: response.kind,
            response_url: response.url.as_ref().map(ToString::to_string),
            redirected: response.redirected,
            stored_at: Utc::now(),
        }
    }

    /// Returns true if this entry was stored under `key`.
    #[must_use]
    pub fn matches(&self, key: &CacheKey) -> bool {
        self.method == key.method() && self.url == key.url()
    }

    /// Rebuilds the key this entry was stored under.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored method or URL is malformed.
    pub fn key(&self) -> Result<CacheKey> {
        let method = reqwest::Method::from_bytes(self.method.as_bytes())
            .map_err(|e| Error::CacheStore(format!("bad method {:?}: {e}", self.method)))?;
        let url = Url::parse(&self.url)?;
        Ok(CacheKey::new(&method, &url))
    }

    /// Converts back into a live response.
    ///
    /// # Errors
    ///
    /// Returns an error if the status, a header or the body is corrupt.
    pub fn into_response(self) -> Result<Response> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| Error::CacheStore(format!("bad status {}: {e}", self.status)))?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::CacheStore(format!("bad header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::CacheStore(format!("bad header value for {name}: {e}")))?;
            headers.append(name, value);
        }

        let body = BASE64
            .decode(self.body.as_bytes())
            .map_err(|e| Error::CacheStore(format!("bad body encoding: {e}")))?;

        let url = self.response_url.as_deref().map(Url::parse).transpose()?;

        Ok(Response {
            status,
            headers,
            body: body.into(),
            kind: self.kind,
            url,
            redirected: self.redirected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;

    #[test]
    fn capture_and_restore_preserves_response() {
        let url = Url::parse("https://portal.example.com/script.js").unwrap();
        let key = CacheKey::new(&reqwest::Method::GET, &url);
        let response = Response {
            kind: ResponseType::Basic,
            url: Some(url),
            ..Response::new(StatusCode::OK, vec![0u8, 159, 146, 150])
        }
        .with_header(CONTENT_TYPE, HeaderValue::from_static("text/javascript"));

        let stored = StoredResponse::capture(&key, &response);
        assert!(stored.matches(&key));
        assert_eq!(stored.key().unwrap(), key);

        let restored = stored.into_response().unwrap();
        assert_eq!(restored.status, StatusCode::OK);
        assert_eq!(restored.body, response.body);
        assert_eq!(restored.kind, ResponseType::Basic);
        assert_eq!(restored.content_type(), Some("text/javascript"));
        assert_eq!(restored.url, response.url);
    }

    #[test]
    fn corrupt_body_is_a_store_error() {
        let url = Url::parse("https://portal.example.com/").unwrap();
        let key = CacheKey::new(&reqwest::Method::GET, &url);
        let mut stored = StoredResponse::capture(&key, &Response::new(StatusCode::OK, "x"));
        stored.body = "!!not base64!!".to_string();
        assert!(matches!(stored.into_response(), Err(Error::CacheStore(_))));
    }
}
