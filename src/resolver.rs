//! Session identity resolution: one [`Session`] per request cycle.

use std::sync::Arc;

use http::Request;
use time::OffsetDateTime;
use tracing::debug;

use crate::config::SessionConfig;
use crate::cookie;
use crate::id::Id;
use crate::session::{self, fingerprint, Session, SessionInner};
use crate::store::SessionStore;

/// Resolves the session for an incoming request: existing sessions are
/// loaded from the store, everything else gets a fresh entity.
///
/// Resolution is idempotent per request: the resolved handle is cached in
/// the request's extensions, and repeated calls (e.g. from nested
/// middleware) return the same session. Resolution performs no response or
/// cookie writes; those are deferred to response finalization.
///
/// [`SessionManagerLayer`](crate::SessionManagerLayer) drives this
/// automatically; construct one directly only when wiring sessions by hand
/// (typically together with
/// [`with_auto_commit(false)`](SessionConfig::with_auto_commit)).
#[derive(Clone, Debug)]
pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
    config: Arc<SessionConfig>,
}

impl SessionResolver {
    pub fn new<S: SessionStore + 'static>(store: S, config: SessionConfig) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }

    pub(crate) fn from_shared(store: Arc<dyn SessionStore>, config: Arc<SessionConfig>) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Resolve the session for `req`.
    ///
    /// A live session already cached on the request is returned as-is. A
    /// destroyed one counts as detached, so resolving again yields a fresh
    /// session. Store failures propagate; the caller is responsible for
    /// turning them into a server error.
    pub async fn resolve<B>(&self, req: &mut Request<B>) -> Result<Session, session::Error> {
        if let Some(existing) = req.extensions().get::<Session>() {
            if !existing.is_destroyed() {
                return Ok(existing.clone());
            }
        }

        let now = OffsetDateTime::now_utc();
        let candidate = cookie::find_request_cookie(req.headers(), &self.config.cookie_name)
            .and_then(|raw| self.config.decode_raw(&raw));

        let loaded = match &candidate {
            Some(id) => self.store.load(&Id::new(id.clone())).await?,
            None => None,
        };

        let mut inner = match (candidate, loaded) {
            (Some(id), Some(record)) => {
                let id = Id::new(id);
                debug!(id = %id, "session rehydrated from store");
                let mut inner = SessionInner::from_record(id, record, now);
                // Amortize TTL-refresh writes: only re-touch once the session
                // is touch_after past its last touch (expires - max_age).
                if let Some(threshold) = self.config.touch_after {
                    if let (Some(expires), Some(max_age)) =
                        (inner.cookie.expires, inner.cookie.max_age)
                    {
                        let last_touched = expires - max_age;
                        if now - last_touched >= threshold {
                            inner.touch();
                        }
                    }
                }
                inner
            }
            _ => {
                let id = self.config.generate_id();
                debug!(id = %id, "created new session");
                SessionInner::fresh(id, &self.config.cookie, now)
            }
        };

        inner.prev_fingerprint = fingerprint(&inner.data)?;

        let session = Session::new(inner, Arc::clone(&self.store), Arc::clone(&self.config));
        req.extensions_mut().insert(session.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use http::header::COOKIE;
    use time::Duration;

    use super::*;
    use crate::cookie::CookieOptions;
    use crate::memory_store::MemoryStore;
    use crate::session::{Data, Record};

    fn request(cookie_header: Option<&str>) -> Request<()> {
        let mut builder = Request::builder();
        if let Some(value) = cookie_header {
            builder = builder.header(COOKIE, value);
        }
        builder.body(()).expect("request builds")
    }

    async fn seed(store: &MemoryStore, id: &str, max_age: Duration, expires: OffsetDateTime) {
        let record = Record {
            id: Id::new(id),
            data: Data::new(),
            cookie: CookieOptions {
                max_age: Some(max_age),
                expires: Some(expires),
                ..Default::default()
            },
        };
        store.save(&record).await.expect("seed save succeeds");
    }

    #[tokio::test]
    async fn resolution_is_idempotent_within_a_request() {
        let resolver = SessionResolver::new(MemoryStore::new(), SessionConfig::default());
        let mut req = request(None);

        let first = resolver.resolve(&mut req).await.expect("resolve succeeds");
        let second = resolver.resolve(&mut req).await.expect("resolve succeeds");

        assert!(Arc::ptr_eq(&first.inner, &second.inner));
    }

    #[tokio::test]
    async fn missing_cookie_creates_new_session_with_defaults() {
        let config = SessionConfig::default().with_max_age(Duration::seconds(3600));
        let resolver = SessionResolver::new(MemoryStore::new(), config);
        let mut req = request(None);

        let session = resolver.resolve(&mut req).await.expect("resolve succeeds");

        assert!(session.is_new());
        assert!(!session.is_touched());
        let opts = session.cookie_options();
        assert_eq!(opts.path, "/");
        assert!(opts.http_only);
        assert!(!opts.secure);
        let expires = opts.expires.expect("expiry derived from max_age");
        let delta = expires - OffsetDateTime::now_utc();
        assert!((delta - Duration::seconds(3600)).abs() <= Duration::seconds(1));
    }

    #[tokio::test]
    async fn known_cookie_rehydrates_stored_session() {
        let store = MemoryStore::new();
        let now = OffsetDateTime::now_utc();
        seed(&store, "known", Duration::seconds(3600), now + Duration::seconds(3600)).await;

        let resolver = SessionResolver::new(store, SessionConfig::default());
        let mut req = request(Some("sid=known"));
        let session = resolver.resolve(&mut req).await.expect("resolve succeeds");

        assert!(!session.is_new());
        assert_eq!(session.id(), Id::new("known"));
    }

    #[tokio::test]
    async fn unknown_cookie_falls_back_to_new_session() {
        let resolver = SessionResolver::new(MemoryStore::new(), SessionConfig::default());
        let mut req = request(Some("sid=bogus"));

        let session = resolver.resolve(&mut req).await.expect("resolve succeeds");

        assert!(session.is_new());
        assert_ne!(session.id(), Id::new("bogus"));
    }

    #[tokio::test]
    async fn rejecting_decoder_discards_candidate() {
        let store = MemoryStore::new();
        let now = OffsetDateTime::now_utc();
        seed(&store, "known", Duration::seconds(3600), now + Duration::seconds(3600)).await;

        let config = SessionConfig::default().with_decode(|_| None);
        let resolver = SessionResolver::new(store, config);
        let mut req = request(Some("sid=known"));

        let session = resolver.resolve(&mut req).await.expect("resolve succeeds");
        assert!(session.is_new());
    }

    #[tokio::test]
    async fn touch_after_zero_re_touches_every_request() {
        let store = MemoryStore::new();
        let now = OffsetDateTime::now_utc();
        // Touched half its lifetime ago.
        seed(&store, "aging", Duration::seconds(3600), now + Duration::seconds(1800)).await;

        let config = SessionConfig::default().with_touch_after(Duration::ZERO);
        let resolver = SessionResolver::new(store, config);
        let mut req = request(Some("sid=aging"));

        let session = resolver.resolve(&mut req).await.expect("resolve succeeds");

        assert!(session.is_touched());
        let expires = session.expires().expect("expiry present");
        let delta = expires - now;
        assert!((delta - Duration::seconds(3600)).abs() <= Duration::seconds(1));
    }

    #[tokio::test]
    async fn touch_after_threshold_not_reached_skips_touch() {
        let store = MemoryStore::new();
        let now = OffsetDateTime::now_utc();
        // Touched just now: expires a full max_age away.
        seed(&store, "fresh", Duration::seconds(3600), now + Duration::seconds(3600)).await;

        let config = SessionConfig::default().with_touch_after(Duration::seconds(600));
        let resolver = SessionResolver::new(store, config);
        let mut req = request(Some("sid=fresh"));

        let session = resolver.resolve(&mut req).await.expect("resolve succeeds");
        assert!(!session.is_touched());
    }

    #[tokio::test]
    async fn destroyed_session_is_detached_from_the_request() {
        let resolver = SessionResolver::new(MemoryStore::new(), SessionConfig::default());
        let mut req = request(None);

        let first = resolver.resolve(&mut req).await.expect("resolve succeeds");
        first.destroy().await.expect("destroy succeeds");

        let second = resolver.resolve(&mut req).await.expect("resolve succeeds");
        assert!(!Arc::ptr_eq(&first.inner, &second.inner));
        assert!(second.is_new());
        assert!(!second.is_destroyed());
    }
}
