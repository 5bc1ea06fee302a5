//! The default, process-local session store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::id::Id;
use crate::session::Record;
use crate::store::{self, ExpiredDeletion, SessionStore};

/// An in-memory [`SessionStore`] backed by a shared map.
///
/// This is the store used when nothing persistent is configured. Records
/// vanish with the process, so it suits development, tests, and
/// single-instance deployments that can afford to drop sessions on restart.
///
/// Expired records are dropped lazily on [`load`](SessionStore::load); pair
/// with [`continuously_delete_expired`](ExpiredDeletion::continuously_delete_expired)
/// to also reclaim sessions nobody asks for again.
///
/// Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<Mutex<HashMap<String, Record>>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<String, Record>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_expired(record: &Record, now: OffsetDateTime) -> bool {
    record
        .cookie
        .expires
        .is_some_and(|expires| expires <= now)
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &Id) -> store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.lock();
        match sessions.get(id.as_str()) {
            Some(record) if is_expired(record, now) => {
                sessions.remove(id.as_str());
                Ok(None)
            }
            Some(record) => Ok(Some(record.clone())),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &Record) -> store::Result<()> {
        self.lock()
            .insert(record.id.as_str().to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &Id) -> store::Result<()> {
        self.lock().remove(id.as_str());
        Ok(())
    }

    async fn touch(&self, record: &Record) -> store::Result<()> {
        // Expiry refresh only; the stored payload stays as last saved.
        if let Some(stored) = self.lock().get_mut(record.id.as_str()) {
            stored.cookie.max_age = record.cookie.max_age;
            stored.cookie.expires = record.cookie.expires;
        }
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for MemoryStore {
    async fn delete_expired(&self) -> store::Result<()> {
        let now = OffsetDateTime::now_utc();
        self.lock().retain(|_, record| !is_expired(record, now));
        Ok(())
    }
}
