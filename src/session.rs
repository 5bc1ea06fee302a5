//! The session entity: payload, cookie attributes, lifecycle state, and the
//! operations attached to a resolved session.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::commit;
use crate::config::SessionConfig;
use crate::cookie::CookieOptions;
use crate::id::Id;
use crate::store::{self, SessionStore};

/// The application payload: string keys to JSON values.
///
/// An ordered map, so the serialized form (and with it the mutation
/// fingerprint) is deterministic for a given content.
pub type Data = BTreeMap<String, Value>;

/// Errors surfaced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A payload value failed to (de)serialize.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] store::Error),
}

/// The persisted shape of a session: identity, payload, and cookie
/// attributes. This is what a [`SessionStore`] receives and returns;
/// lifecycle flags never appear here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Id,
    pub data: Data,
    pub cookie: CookieOptions,
}

pub(crate) type Fingerprint = Vec<u8>;

/// Deterministic digest of the payload, the sole dirty-check oracle.
///
/// Only `data` participates: cookie attributes and lifecycle flags live
/// outside the payload and are structurally excluded.
pub(crate) fn fingerprint(data: &Data) -> store::Result<Fingerprint> {
    rmp_serde::to_vec(data).map_err(|e| store::Error::Encode(e.to_string()))
}

/// Mutable session state for one request cycle.
///
/// Lifecycle flags sit here, next to the payload rather than inside it, so
/// serialization and fingerprinting never have to filter them out.
#[derive(Debug)]
pub(crate) struct SessionInner {
    pub(crate) id: Id,
    pub(crate) data: Data,
    pub(crate) cookie: CookieOptions,
    pub(crate) is_new: bool,
    pub(crate) is_touched: bool,
    pub(crate) is_destroyed: bool,
    /// Digest captured at resolution, before the application mutates anything.
    pub(crate) prev_fingerprint: Fingerprint,
    /// Resolution timestamp; `touch` extends expiry relative to this.
    pub(crate) now: OffsetDateTime,
    /// `Set-Cookie` value staged by `destroy`/`commit`, drained into the
    /// response by the middleware before headers leave the process.
    pub(crate) staged_cookie: Option<String>,
}

impl SessionInner {
    pub(crate) fn from_record(id: Id, record: Record, now: OffsetDateTime) -> Self {
        Self {
            id,
            data: record.data,
            cookie: record.cookie,
            is_new: false,
            is_touched: false,
            is_destroyed: false,
            prev_fingerprint: Fingerprint::new(),
            now,
            staged_cookie: None,
        }
    }

    pub(crate) fn fresh(id: Id, template: &CookieOptions, now: OffsetDateTime) -> Self {
        let mut cookie = template.clone();
        cookie.expires = cookie.max_age.map(|max_age| now + max_age);
        Self {
            id,
            data: Data::new(),
            cookie,
            is_new: true,
            is_touched: false,
            is_destroyed: false,
            prev_fingerprint: Fingerprint::new(),
            now,
            staged_cookie: None,
        }
    }

    pub(crate) fn touch(&mut self) {
        let max_age = self.cookie.max_age.unwrap_or(Duration::ZERO);
        self.cookie.expires = Some(self.now + max_age);
        self.is_touched = true;
    }

    pub(crate) fn record(&self) -> Record {
        Record {
            id: self.id.clone(),
            data: self.data.clone(),
            cookie: self.cookie.clone(),
        }
    }
}

/// Request-scoped session handle.
///
/// Cloning is cheap and every clone refers to the same state: the resolver
/// inserts one handle into the request's extensions, and handlers, nested
/// middleware, and the commit engine all operate on it. Exactly one session
/// exists per request/response cycle.
///
/// Payload mutation is immediate and in-memory; persistence and the
/// `Set-Cookie` header happen when the response is finalized (or on an
/// explicit [`commit`](Session::commit)).
///
/// # Example
///
/// ```no_run
/// use tower_lazy_session::Session;
///
/// # async fn example(session: Session) -> Result<(), tower_lazy_session::session::Error> {
/// session.insert("user_id", 42)?;
///
/// let user_id: Option<u32> = session.get("user_id")?;
/// assert_eq!(user_id, Some(42));
///
/// let _removed = session.remove::<u32>("user_id")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Session {
    pub(crate) inner: Arc<Mutex<SessionInner>>,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) config: Arc<SessionConfig>,
}

impl Session {
    pub(crate) fn new(
        inner: SessionInner,
        store: Arc<dyn SessionStore>,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
            store,
            config,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The session's identity. Stable for the life of the session; changed
    /// only by [`regenerate`](Session::regenerate).
    pub fn id(&self) -> Id {
        self.lock().id.clone()
    }

    /// True until the session's first successful persistence.
    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    /// True after an explicit or automatic expiry extension.
    pub fn is_touched(&self) -> bool {
        self.lock().is_touched
    }

    /// True after [`destroy`](Session::destroy). Terminal.
    pub fn is_destroyed(&self) -> bool {
        self.lock().is_destroyed
    }

    /// Current cookie attributes.
    pub fn cookie_options(&self) -> CookieOptions {
        self.lock().cookie.clone()
    }

    /// Current absolute expiry, if the session has one.
    pub fn expires(&self) -> Option<OffsetDateTime> {
        self.lock().cookie.expires
    }

    /// Insert a serializable value under `key`.
    pub fn insert(&self, key: impl Into<String>, value: impl Serialize) -> Result<(), Error> {
        let value = serde_json::to_value(value)?;
        self.lock().data.insert(key.into(), value);
        Ok(())
    }

    /// Read the value under `key`, deserialized into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        self.lock()
            .data
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }

    /// Remove and return the value under `key`.
    pub fn remove<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        self.lock()
            .data
            .remove(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }

    /// Drop every key from the payload.
    pub fn clear(&self) {
        self.lock().data.clear();
    }

    /// Extend the session's expiry: `expires` becomes the resolution time
    /// plus `max_age` (zero when unset). Purely in-memory; the store's TTL is
    /// refreshed when the response finalizes.
    pub fn touch(&self) {
        self.lock().touch();
    }

    /// Destroy the session: delete it from the store and expire the cookie.
    ///
    /// The expiry cookie (`Max-Age=-1`, `Expires` at the epoch) is staged
    /// immediately and reaches the response even when automatic commit is
    /// disabled. Destruction is terminal: later payload mutations are
    /// silently ignored by the commit engine and nothing under this id is
    /// ever written again. A subsequent
    /// [`resolve`](crate::SessionResolver::resolve) on the same request
    /// produces a fresh session.
    pub async fn destroy(&self) -> Result<(), Error> {
        let id = {
            let mut inner = self.lock();
            inner.is_destroyed = true;
            inner.cookie.max_age = Some(Duration::seconds(-1));
            inner.cookie.expires = Some(OffsetDateTime::UNIX_EPOCH);
            inner.staged_cookie = Some(commit::set_cookie_header(&self.config, &inner));
            inner.id.clone()
        };
        self.store.delete(&id).await?;
        Ok(())
    }

    /// Persist now, bypassing the dirty check: stage the `Set-Cookie` header
    /// and write the full record to the store.
    ///
    /// For handlers that finalize the response outside the standard path
    /// (streaming, early return) or run with automatic commit disabled.
    pub async fn commit(&self) -> Result<(), Error> {
        let record = {
            let mut inner = self.lock();
            inner.staged_cookie = Some(commit::set_cookie_header(&self.config, &inner));
            inner.record()
        };
        self.store.save(&record).await?;
        self.lock().is_new = false;
        Ok(())
    }

    /// Swap the session onto a fresh id: the old record is deleted, the
    /// payload is saved under a newly generated id, and the session is marked
    /// touched so the replacement cookie is emitted. Use after privilege
    /// changes such as login.
    pub async fn regenerate(&self) -> Result<(), Error> {
        let old = self.id();
        self.store.delete(&old).await?;
        let record = {
            let mut inner = self.lock();
            inner.id = self.config.generate_id();
            inner.is_touched = true;
            inner.record()
        };
        self.store.save(&record).await?;
        Ok(())
    }
}
