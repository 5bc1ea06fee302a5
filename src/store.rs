//! The storage contract sessions are persisted through.
//!
//! The session manager never talks to a backend directly; it goes through
//! [`SessionStore`], which any key-value-shaped backend can implement. The
//! crate ships one implementation, [`MemoryStore`](crate::MemoryStore), used
//! as the default. Database- or network-backed stores live in their own
//! crates and only need to satisfy this trait.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::id::Id;
use crate::session::Record;

/// A `Result` specialized to store errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures a store implementation can surface.
///
/// Backends map their native errors into these variants:
///
/// - transport/database errors → [`Error::Backend`]
/// - serialization errors → [`Error::Encode`]
/// - deserialization errors → [`Error::Decode`]
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// The backend failed while performing the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A record could not be encoded for storage or transmission.
    #[error("encode error: {0}")]
    Encode(String),

    /// A stored payload could not be decoded into a record.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Storage backend for session records.
///
/// Semantics the session manager relies on:
///
/// - [`load`](SessionStore::load) returns `Ok(None)` for unknown or expired
///   ids; `Err` is reserved for backend failures. A resolver `load` failure
///   propagates to the caller as a server error.
/// - [`save`](SessionStore::save) upserts the full record.
/// - [`delete`](SessionStore::delete) is idempotent: deleting an id that does
///   not exist succeeds.
/// - [`touch`](SessionStore::touch) refreshes the stored expiry without
///   rewriting the payload. The default implementation falls back to a full
///   [`save`](SessionStore::save) for backends with no cheaper path.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use tower_lazy_session::store::{self, SessionStore};
/// use tower_lazy_session::{Id, Record};
///
/// #[derive(Debug)]
/// struct NullStore;
///
/// #[async_trait]
/// impl SessionStore for NullStore {
///     async fn load(&self, _id: &Id) -> store::Result<Option<Record>> {
///         Ok(None)
///     }
///
///     async fn save(&self, _record: &Record) -> store::Result<()> {
///         Ok(())
///     }
///
///     async fn delete(&self, _id: &Id) -> store::Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait SessionStore: Debug + Send + Sync {
    /// Load the record for `id`. Not-found is `Ok(None)`, not an error.
    async fn load(&self, id: &Id) -> Result<Option<Record>>;

    /// Upsert the full record.
    async fn save(&self, record: &Record) -> Result<()>;

    /// Delete the record for `id`. Unknown ids succeed.
    async fn delete(&self, id: &Id) -> Result<()>;

    /// Refresh the stored expiry from `record.cookie` without rewriting the
    /// payload.
    async fn touch(&self, record: &Record) -> Result<()> {
        self.save(record).await
    }
}

/// Bulk cleanup of expired records.
///
/// Expiry is otherwise only enforced lazily (stores refuse to load expired
/// records); a store that can enumerate its records should implement this so
/// abandoned sessions are eventually reclaimed.
#[async_trait]
pub trait ExpiredDeletion: SessionStore {
    /// Delete every record whose expiry is in the past.
    async fn delete_expired(&self) -> Result<()>;

    /// Run [`delete_expired`](ExpiredDeletion::delete_expired) on a fixed
    /// period, forever. Spawn this on the runtime as a background task:
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use tower_lazy_session::{ExpiredDeletion, MemoryStore};
    ///
    /// # async fn example() {
    /// let store = MemoryStore::new();
    /// tokio::spawn(
    ///     store
    ///         .clone()
    ///         .continuously_delete_expired(Duration::from_secs(3600)),
    /// );
    /// # }
    /// ```
    async fn continuously_delete_expired(self, period: std::time::Duration) -> Result<()>
    where
        Self: Sized,
    {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            self.delete_expired().await?;
        }
    }
}
