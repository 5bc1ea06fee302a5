//! Tower middleware hooking session commit onto response finalization.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::{Request, Response, StatusCode};
use tower_layer::Layer;
use tower_service::Service;
use tracing::error;

use crate::commit;
use crate::config::SessionConfig;
use crate::resolver::SessionResolver;
use crate::session::Session;
use crate::store::SessionStore;

/// Layer that wraps a service in a [`SessionManager`].
///
/// # Example
///
/// ```no_run
/// use axum::{routing::get, Router};
/// use time::Duration;
/// use tower_lazy_session::{MemoryStore, SessionConfig, SessionManagerLayer};
///
/// let session_layer = SessionManagerLayer::new(MemoryStore::new())
///     .with_config(SessionConfig::default().with_max_age(Duration::hours(24)));
///
/// let app: Router = Router::new()
///     .route("/", get(|| async { "hello" }))
///     .layer(session_layer);
/// ```
#[derive(Clone, Debug)]
pub struct SessionManagerLayer {
    store: Arc<dyn SessionStore>,
    config: Arc<SessionConfig>,
}

impl SessionManagerLayer {
    /// Manage sessions in `store` with the default [`SessionConfig`].
    pub fn new<S: SessionStore + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(SessionConfig::default()),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = Arc::new(config);
        self
    }
}

impl Default for SessionManagerLayer {
    /// A manager over a fresh [`MemoryStore`](crate::MemoryStore).
    fn default() -> Self {
        Self::new(crate::MemoryStore::new())
    }
}

impl<S> Layer<S> for SessionManagerLayer {
    type Service = SessionManager<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionManager {
            inner,
            resolver: SessionResolver::from_shared(
                Arc::clone(&self.store),
                Arc::clone(&self.config),
            ),
        }
    }
}

/// Middleware that resolves a [`Session`] for each request and commits it
/// when the response is finalized.
///
/// Per request it runs, in order:
///
/// 1. resolution (store read, awaited): the session lands in the request's
///    extensions for handlers to pick up; a store failure is logged and
///    answered with an empty `500`;
/// 2. the inner service;
/// 3. the header phase, the `Set-Cookie` decision, before the response is
///    released and its headers can be transmitted;
/// 4. the persist phase, the store write decision, awaited, so the response
///    is never released before persistence settles. A failure here is logged
///    and the response still completes.
///
/// Steps 3 and 4 apply their lazy decisions only under automatic commit
/// (the default); cookies staged by [`Session::destroy`] and
/// [`Session::commit`] flush either way. If an enclosing `SessionManager`
/// already resolved a live session for this request, the whole cycle is a
/// pass-through, keeping resolution and commit at-most-once per request.
#[derive(Clone, Debug)]
pub struct SessionManager<S> {
    inner: S,
    resolver: SessionResolver,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SessionManager<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness; leave the clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let resolver = self.resolver.clone();
        let auto_commit = self.resolver.config().auto_commit;

        Box::pin(async move {
            if let Some(existing) = req.extensions().get::<Session>() {
                if !existing.is_destroyed() {
                    return inner.call(req).await;
                }
            }

            let session = match resolver.resolve(&mut req).await {
                Ok(session) => session,
                Err(err) => {
                    error!(err = %err, "failed to resolve session");
                    let mut res = Response::default();
                    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    return Ok(res);
                }
            };

            let mut res = inner.call(req).await?;

            // Header phase strictly precedes the persist phase.
            if let Err(err) = commit::flush_cookies(&session, res.headers_mut(), auto_commit) {
                error!(err = %err, "failed to write session cookie");
            }
            if auto_commit {
                if let Err(err) = commit::persist(&session).await {
                    error!(err = %err, "failed to persist session");
                }
            }

            Ok(res)
        })
    }
}
