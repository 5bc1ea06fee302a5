//! Cookie attribute model and the boundary to the `cookie` crate codec.
//!
//! Attribute serialization and parsing are delegated entirely to
//! [`cookie`](https://crates.io/crates/cookie); this module owns the
//! serde-able attribute struct that rides inside a stored
//! [`Record`](crate::Record) and the two header-level operations the commit
//! engine needs: finding the session cookie on a request and appending a
//! `Set-Cookie` value to a response without clobbering cookies set by
//! unrelated middleware.

use cookie::Cookie;
use http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::store;

/// `SameSite` cookie policy.
///
/// A serde-able mirror of [`cookie::SameSite`]: cookie attributes are part of
/// the persisted session record, and the upstream enum has no serde
/// implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl From<SameSite> for cookie::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Strict => cookie::SameSite::Strict,
            SameSite::Lax => cookie::SameSite::Lax,
            SameSite::None => cookie::SameSite::None,
        }
    }
}

/// Attributes of the session cookie, owned exclusively by the session entity.
///
/// `expires` is always derived from `max_age` at creation and touch time; a
/// session without `max_age` is cookie-session-scoped and carries no
/// `Expires`. The field round-trips as RFC 3339 text so stores that serialize
/// timestamps as strings rehydrate cleanly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
    pub max_age: Option<Duration>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires: Option<OffsetDateTime>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            http_only: true,
            secure: false,
            same_site: None,
            max_age: None,
            expires: None,
        }
    }
}

/// Find the named cookie's raw value across every `Cookie` header on the
/// request. Unparseable pairs are skipped rather than failing the request.
pub(crate) fn find_request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

/// Serialize a session cookie with the full attribute set.
pub(crate) fn build_cookie(name: &str, value: String, opts: &CookieOptions) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), value)).path(opts.path.clone());
    if opts.http_only {
        builder = builder.http_only(true);
    }
    if opts.secure {
        builder = builder.secure(true);
    }
    if let Some(domain) = opts.domain.clone() {
        builder = builder.domain(domain);
    }
    if let Some(same_site) = opts.same_site {
        builder = builder.same_site(same_site.into());
    }
    if let Some(max_age) = opts.max_age {
        builder = builder.max_age(max_age);
    }
    if let Some(expires) = opts.expires {
        builder = builder.expires(expires);
    }
    builder.build()
}

/// Append a `Set-Cookie` value, preserving any already present in order.
pub(crate) fn append_set_cookie(headers: &mut HeaderMap, value: &str) -> store::Result<()> {
    let value = HeaderValue::try_from(value).map_err(|e| store::Error::Encode(e.to_string()))?;
    headers.append(SET_COOKIE, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_cookie_across_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1; b=2"));
        headers.append(COOKIE, HeaderValue::from_static("sid=abc123"));

        assert_eq!(find_request_cookie(&headers, "sid").as_deref(), Some("abc123"));
        assert_eq!(find_request_cookie(&headers, "b").as_deref(), Some("2"));
        assert_eq!(find_request_cookie(&headers, "missing"), None);
    }

    #[test]
    fn builds_cookie_with_full_attribute_set() {
        let opts = CookieOptions {
            domain: Some("example.com".to_string()),
            same_site: Some(SameSite::Lax),
            max_age: Some(Duration::seconds(3600)),
            ..Default::default()
        };
        let rendered = build_cookie("sid", "abc".to_string(), &opts).to_string();

        assert!(rendered.starts_with("sid=abc"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Domain=example.com"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("Max-Age=3600"));
        assert!(!rendered.contains("Secure"));
    }

    #[test]
    fn session_scoped_cookie_has_no_expiry_attributes() {
        let rendered =
            build_cookie("sid", "abc".to_string(), &CookieOptions::default()).to_string();
        assert!(!rendered.contains("Max-Age"));
        assert!(!rendered.contains("Expires"));
    }

    #[test]
    fn append_preserves_existing_set_cookie_order() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=b"));
        append_set_cookie(&mut headers, "sid=123; Path=/").expect("valid header value");

        let values: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().expect("utf-8").to_string())
            .collect();
        assert_eq!(values, vec!["a=b".to_string(), "sid=123; Path=/".to_string()]);
    }
}
