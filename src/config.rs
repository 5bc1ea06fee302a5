//! Configuration for the session manager.

use std::fmt;
use std::sync::Arc;

use time::Duration;

use crate::cookie::{CookieOptions, SameSite};
use crate::id::Id;

/// Injectable session-id generator.
pub type IdGenerator = Arc<dyn Fn() -> Id + Send + Sync>;

/// Transform applied to the id when the cookie is written.
pub type EncodeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Transform applied to the raw cookie value when it is read. Returning
/// `None` rejects the candidate and the request gets a fresh session. This
/// is how a signing decoder drops tampered ids.
pub type DecodeFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Options recognized by the session manager.
///
/// Captured once at layer construction; there is no process-wide state.
///
/// # Example
///
/// ```
/// use time::Duration;
/// use tower_lazy_session::{SameSite, SessionConfig};
///
/// let config = SessionConfig::default()
///     .with_cookie_name("my.sid")
///     .with_max_age(Duration::hours(24))
///     .with_same_site(SameSite::Lax)
///     .with_touch_after(Duration::minutes(10));
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    pub(crate) cookie_name: String,
    pub(crate) cookie: CookieOptions,
    pub(crate) touch_after: Option<Duration>,
    pub(crate) auto_commit: bool,
    pub(crate) genid: Option<IdGenerator>,
    pub(crate) encode: Option<EncodeFn>,
    pub(crate) decode: Option<DecodeFn>,
}

impl Default for SessionConfig {
    /// Cookie name `"sid"`, `Path=/`, `HttpOnly`, not `Secure`, no expiry
    /// (session-scoped cookie), touch-throttling disabled, automatic commit
    /// enabled.
    fn default() -> Self {
        Self {
            cookie_name: "sid".to_string(),
            cookie: CookieOptions::default(),
            touch_after: None,
            auto_commit: true,
            genid: None,
            encode: None,
            decode: None,
        }
    }
}

impl SessionConfig {
    /// Name of the session cookie.
    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Replace the whole cookie attribute set.
    #[must_use]
    pub fn with_cookie_options(mut self, cookie: CookieOptions) -> Self {
        self.cookie = cookie;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.cookie.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.cookie.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie.same_site = Some(same_site);
        self
    }

    /// Session lifetime. Sets `Max-Age` on the cookie and drives the stored
    /// expiry; without it the cookie is session-scoped and records never
    /// expire on their own.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.cookie.max_age = Some(max_age);
        self
    }

    /// Throttle automatic expiry refreshes: a loaded session is only
    /// re-touched when at least this much time has passed since its last
    /// touch. `Duration::ZERO` touches on every request. Disabled by default,
    /// so sessions are only extended explicitly.
    #[must_use]
    pub fn with_touch_after(mut self, touch_after: Duration) -> Self {
        self.touch_after = Some(touch_after);
        self
    }

    /// Toggle automatic commit. When disabled the middleware still resolves
    /// sessions and flushes cookies staged by
    /// [`destroy`](crate::Session::destroy)/[`commit`](crate::Session::commit),
    /// but performs no persistence of its own.
    #[must_use]
    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    /// Custom id generator for new sessions.
    #[must_use]
    pub fn with_genid(mut self, genid: impl Fn() -> Id + Send + Sync + 'static) -> Self {
        self.genid = Some(Arc::new(genid));
        self
    }

    /// Transform the id before it is written into the cookie. Apply
    /// symmetrically with [`with_decode`](SessionConfig::with_decode).
    #[must_use]
    pub fn with_encode(mut self, encode: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.encode = Some(Arc::new(encode));
        self
    }

    /// Transform the raw cookie value back into an id; `None` rejects it.
    #[must_use]
    pub fn with_decode(
        mut self,
        decode: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.decode = Some(Arc::new(decode));
        self
    }

    pub(crate) fn generate_id(&self) -> Id {
        match &self.genid {
            Some(genid) => genid(),
            None => Id::default(),
        }
    }

    pub(crate) fn encode_id(&self, id: &str) -> String {
        match &self.encode {
            Some(encode) => encode(id),
            None => id.to_string(),
        }
    }

    pub(crate) fn decode_raw(&self, raw: &str) -> Option<String> {
        match &self.decode {
            Some(decode) => decode(raw),
            None => Some(raw.to_string()),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("cookie", &self.cookie)
            .field("touch_after", &self.touch_after)
            .field("auto_commit", &self.auto_commit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SessionConfig::default();
        assert_eq!(config.cookie_name, "sid");
        assert_eq!(config.cookie.path, "/");
        assert!(config.cookie.http_only);
        assert!(!config.cookie.secure);
        assert_eq!(config.cookie.max_age, None);
        assert_eq!(config.touch_after, None);
        assert!(config.auto_commit);
    }

    #[test]
    fn id_transforms_default_to_identity() {
        let config = SessionConfig::default();
        assert_eq!(config.encode_id("abc"), "abc");
        assert_eq!(config.decode_raw("abc").as_deref(), Some("abc"));
    }

    #[test]
    fn custom_transforms_apply() {
        let config = SessionConfig::default()
            .with_encode(|id| format!("v1.{id}"))
            .with_decode(|raw| raw.strip_prefix("v1.").map(str::to_string));

        assert_eq!(config.encode_id("abc"), "v1.abc");
        assert_eq!(config.decode_raw("v1.abc").as_deref(), Some("abc"));
        assert_eq!(config.decode_raw("tampered"), None);
    }
}
