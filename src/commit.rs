//! The commit engine: decides whether the cookie header and the store write
//! happen at response finalization, and performs them.

use http::HeaderMap;
use tracing::debug;

use crate::config::SessionConfig;
use crate::cookie;
use crate::session::{fingerprint, Record, Session, SessionInner};
use crate::store::{self, SessionStore as _};

/// Serialize the session cookie: configured name, encoded id, full attribute
/// set.
pub(crate) fn set_cookie_header(config: &SessionConfig, inner: &SessionInner) -> String {
    let value = config.encode_id(inner.id.as_str());
    cookie::build_cookie(&config.cookie_name, value, &inner.cookie).to_string()
}

/// Header phase, run once per response before its headers leave the process.
///
/// A value staged by [`Session::destroy`]/[`Session::commit`] always flushes,
/// regardless of `auto_commit`: that is their "write the header now" path.
/// Otherwise, under auto-commit, the lazy rule applies: emit the cookie iff
/// the session was touched, or is new and actually mutated. A brand-new
/// session that stays empty never produces a `Set-Cookie`.
pub(crate) fn flush_cookies(
    session: &Session,
    headers: &mut HeaderMap,
    auto_commit: bool,
) -> store::Result<()> {
    let header = {
        let mut inner = session.lock();
        if let Some(staged) = inner.staged_cookie.take() {
            Some(staged)
        } else if auto_commit && !inner.is_destroyed {
            let changed = fingerprint(&inner.data)? != inner.prev_fingerprint;
            if inner.is_touched || (inner.is_new && changed) {
                debug!(id = %inner.id, "emitting session cookie");
                Some(set_cookie_header(&session.config, &inner))
            } else {
                None
            }
        } else {
            None
        }
    };

    if let Some(value) = header {
        cookie::append_set_cookie(headers, &value)?;
    }
    Ok(())
}

enum Write {
    Save(Record),
    Touch(Record),
    Skip,
}

/// Persist phase, run once per response after the header phase. Awaited:
/// finalization must not complete before the store settles.
///
/// Destroyed sessions skip everything; destruction already performed its
/// writes, and any payload mutation made after `destroy` is deliberately
/// ignored. A mutated session is saved in full; an unmutated-but-touched one
/// only has its TTL refreshed.
pub(crate) async fn persist(session: &Session) -> store::Result<()> {
    let write = {
        let inner = session.lock();
        if inner.is_destroyed {
            Write::Skip
        } else if fingerprint(&inner.data)? != inner.prev_fingerprint {
            Write::Save(inner.record())
        } else if inner.is_touched {
            Write::Touch(inner.record())
        } else {
            Write::Skip
        }
    };

    match write {
        Write::Save(record) => {
            debug!(id = %record.id, "persisting mutated session");
            session.store.save(&record).await?;
            session.lock().is_new = false;
        }
        Write::Touch(record) => {
            debug!(id = %record.id, "refreshing session expiry");
            session.store.touch(&record).await?;
        }
        Write::Skip => {}
    }
    Ok(())
}
