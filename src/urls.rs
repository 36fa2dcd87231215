//! URL resolution helpers shared by the worker, the fetcher and the cache.

use url::Url;

use crate::error::Result;

/// Resolves a manifest entry or request target against the portal origin.
///
/// Absolute URLs (`https://cdn.example/x.js`) are returned as-is; anything
/// else (`/`, `/index.html`, `script.js`) is joined onto `origin`.
///
/// # Errors
///
/// Returns an error if the input is neither an absolute URL nor a valid
/// reference relative to `origin`.
pub fn resolve(origin: &Url, raw: &str) -> Result<Url> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(origin.join(raw)?),
        Err(e) => Err(e.into()),
    }
}

/// Places a path and query received by the front server onto `origin`.
///
/// Unlike [`resolve`], the authority always stays that of `origin`: a path
/// such as `//other.host/x` becomes `<origin>//other.host/x`.
#[must_use]
pub fn on_origin(origin: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = origin.clone();
    url.set_path(path);
    url.set_query(query);
    url.set_fragment(None);
    url
}

/// Returns the URL with its fragment removed.
///
/// Fragments never reach the network, so two requests that differ only in
/// their fragment share a cache entry.
#[must_use]
pub fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Returns true when both URLs share scheme, host and port.
#[must_use]
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn origin() -> Url {
        Url::parse("https://portal.example.com").unwrap()
    }

    #[test]
    fn resolve_relative_paths() {
        let url = resolve(&origin(), "/index.html").unwrap();
        assert_eq!(url.as_str(), "https://portal.example.com/index.html");

        let root = resolve(&origin(), "/").unwrap();
        assert_eq!(root.as_str(), "https://portal.example.com/");
    }

    #[test]
    fn resolve_keeps_absolute_urls() {
        let url = resolve(&origin(), "https://cdn.tailwindcss.com").unwrap();
        assert_eq!(url.host_str(), Some("cdn.tailwindcss.com"));
    }

    #[test]
    fn resolve_rejects_garbage() {
        assert!(resolve(&origin(), "http://[::1").is_err());
    }

    #[test]
    fn on_origin_never_changes_host() {
        let url = on_origin(&origin(), "//evil.example/secret", None);
        assert!(is_same_origin(&url, &origin()));
        assert_eq!(url.path(), "//evil.example/secret");

        let url = on_origin(&origin(), "/index.html", Some("leadId=LEAD_002"));
        assert_eq!(
            url.as_str(),
            "https://portal.example.com/index.html?leadId=LEAD_002"
        );
    }

    #[test]
    fn same_origin_compares_scheme_host_port() {
        let a = Url::parse("https://portal.example.com/a").unwrap();
        let b = Url::parse("https://portal.example.com:443/b?c=d").unwrap();
        let c = Url::parse("http://portal.example.com/a").unwrap();
        let d = Url::parse("https://cdn.example.com/a").unwrap();
        assert!(is_same_origin(&a, &b));
        assert!(!is_same_origin(&a, &c));
        assert!(!is_same_origin(&a, &d));
    }

    proptest! {
        #[test]
        fn fragment_never_survives(path in "[a-z]{1,8}", frag in "[a-z0-9]{0,8}") {
            let raw = format!("/{path}#{frag}");
            let url = without_fragment(&resolve(&origin(), &raw).unwrap());
            prop_assert!(url.fragment().is_none());
            prop_assert_eq!(url.path(), format!("/{path}"));
        }

        #[test]
        fn on_origin_keeps_authority(path in "/[a-z/.:@]{0,24}") {
            let url = on_origin(&origin(), &path, None);
            prop_assert!(is_same_origin(&url, &origin()));
        }
    }
}
