//! # Lazy session middleware for Tower services
//!
//! A request-scoped session manager for HTTP servers built on
//! [`tower`](https://crates.io/crates/tower-service): each request/response
//! cycle resolves one [`Session`] against a pluggable [`SessionStore`], the
//! application mutates it freely, and the middleware persists changes and
//! emits the session cookie when the response is finalized: lazily, and
//! only when something actually happened.
//!
//! ## How commits are decided
//!
//! At resolution time a fingerprint of the session payload is captured. When
//! the response finalizes:
//!
//! - a destroyed session writes nothing further (destruction already deleted
//!   the record and staged an expiry cookie);
//! - a mutated session (fingerprint changed) is written to the store in full;
//! - an unmutated-but-touched session only has its TTL refreshed
//!   ([`SessionStore::touch`]);
//! - anything else writes nothing.
//!
//! The `Set-Cookie` header follows the same lazy principle: it is emitted
//! only for touched sessions and for new sessions that were actually
//! mutated. A visitor who never gets any session state assigned never
//! receives a cookie.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::net::SocketAddr;
//!
//! use axum::{routing::get, Extension, Router};
//! use time::Duration;
//! use tower_lazy_session::{MemoryStore, Session, SessionConfig, SessionManagerLayer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session_layer = SessionManagerLayer::new(MemoryStore::new())
//!     .with_config(SessionConfig::default().with_max_age(Duration::hours(24)));
//!
//! async fn handler(Extension(session): Extension<Session>) -> String {
//!     let visits: u64 = session.get("visits").ok().flatten().unwrap_or(0);
//!     session.insert("visits", visits + 1).ok();
//!     format!("visit number {}", visits + 1)
//! }
//!
//! let app = Router::new().route("/", get(handler)).layer(session_layer);
//!
//! let listener =
//!     tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 3000))).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Session lifecycle
//!
//! Handlers pick the session up from the request's extensions and operate on
//! it in memory:
//!
//! ```no_run
//! use tower_lazy_session::Session;
//!
//! # async fn example(session: Session) -> Result<(), tower_lazy_session::session::Error> {
//! // Mutations are in-memory; persistence happens at response finalization.
//! session.insert("user_id", 123)?;
//! let user_id: Option<u32> = session.get("user_id")?;
//!
//! // Extend the expiry without changing data.
//! session.touch();
//!
//! // Rotate the id (e.g. after login).
//! session.regenerate().await?;
//!
//! let _removed: Option<u32> = session.remove("user_id")?;
//!
//! // Log out: delete the record and expire the cookie.
//! session.destroy().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage backends
//!
//! The bundled [`MemoryStore`] keeps records in a process-local map and is
//! the default choice for development and tests. Anything else (SQL, Redis,
//! and friends) implements the [`SessionStore`] trait in its own crate; the
//! manager is indifferent to what sits behind it.

mod commit;
pub mod config;
pub mod cookie;
mod id;
mod memory_store;
mod resolver;
mod service;
pub mod session;
pub mod store;

/// Session manager configuration.
///
/// Captured at layer construction; see the `with_*` builders.
pub use config::SessionConfig;

/// Cookie attribute set owned by each session.
pub use cookie::{CookieOptions, SameSite};

/// Opaque session identifier.
pub use id::Id;

/// The bundled in-memory store, used when nothing persistent is configured.
pub use memory_store::MemoryStore;

/// Per-request session resolution, for wiring sessions without the layer.
pub use resolver::SessionResolver;

/// The Tower layer and service that hook commits onto response finalization.
pub use service::{SessionManager, SessionManagerLayer};

/// The request-scoped session handle and its persisted record form.
pub use session::{Data, Record, Session};

/// The storage contract and the periodic-sweep extension.
pub use store::{ExpiredDeletion, SessionStore};
