//! Axum demo for tower-lazy-session.
//!
//! Shows the session layer on a small Axum application with the bundled
//! in-memory store: values are set and read across requests, and the session
//! can be destroyed to log out.
//!
//! # Running the demo
//!
//! ```bash
//! cargo run --example axum_demo
//! ```
//!
//! The server starts on http://127.0.0.1:3000.
//!
//! # Trying it
//!
//! ```bash
//! # Set a session value (the first mutation also sets the cookie)
//! curl -v -c cookies.txt -X POST "http://127.0.0.1:3000/set?name=username&value=john_doe"
//!
//! # Get the session value back
//! curl -v -b cookies.txt "http://127.0.0.1:3000/get?name=username"
//!
//! # Destroy the session
//! curl -v -b cookies.txt -c cookies.txt -X POST http://127.0.0.1:3000/clear
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Extension, Router,
};
use time::Duration as TimeDuration;
use tower_lazy_session::{
    ExpiredDeletion, MemoryStore, Session, SessionConfig, SessionManagerLayer,
};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let store = MemoryStore::new();

    // Reclaim abandoned sessions once an hour.
    tokio::spawn(
        store
            .clone()
            .continuously_delete_expired(Duration::from_secs(3600)),
    );

    // Sessions last a day of inactivity; the expiry is refreshed at most
    // once a minute per session.
    let session_layer = SessionManagerLayer::new(store).with_config(
        SessionConfig::default()
            .with_max_age(TimeDuration::hours(24))
            .with_touch_after(TimeDuration::minutes(1)),
    );

    let app = Router::new()
        .route("/", get(index))
        .route("/set", post(set_session_value))
        .route("/get", get(get_session_value))
        .route("/clear", post(clear_session))
        .layer(session_layer);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("Server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Index route with basic usage information.
async fn index() -> impl IntoResponse {
    Html(
        r#"
        <html>
            <head><title>tower-lazy-session demo</title></head>
            <body>
                <h1>tower-lazy-session demo</h1>
                <p>Sessions are committed lazily: you only get a cookie once something is stored.</p>

                <h2>Available Routes:</h2>
                <ul>
                    <li><code>POST /set?name=key&value=some_value</code> - Set a session value</li>
                    <li><code>GET /get?name=key</code> - Get a session value</li>
                    <li><code>POST /clear</code> - Destroy the session</li>
                </ul>
            </body>
        </html>
        "#,
    )
}

/// Set a value in the session.
///
/// Example: POST /set?name=username&value=john_doe
async fn set_session_value(
    Extension(session): Extension<Session>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let name = params.get("name");
    let value = params.get("value");

    match (name, value) {
        (Some(name), Some(value)) => {
            if let Err(e) = session.insert(name.as_str(), value) {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to set session value: {}", e),
                );
            }

            (
                StatusCode::OK,
                format!("Successfully set session value '{}' to '{}'", name, value),
            )
        }
        _ => (
            StatusCode::BAD_REQUEST,
            "Missing name or value parameter".to_string(),
        ),
    }
}

/// Get a value from the session.
///
/// Example: GET /get?name=username
async fn get_session_value(
    Extension(session): Extension<Session>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let name = params.get("name");

    match name {
        Some(name) => match session.get::<String>(name) {
            Ok(Some(value)) => (
                StatusCode::OK,
                format!("Session value '{}' = '{}'", name, value),
            ),
            Ok(None) => (
                StatusCode::NOT_FOUND,
                format!("No session value found for '{}'", name),
            ),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get session value: {}", e),
            ),
        },
        None => (
            StatusCode::BAD_REQUEST,
            "Missing name parameter".to_string(),
        ),
    }
}

/// Destroy the session: the record is deleted and the cookie expired.
async fn clear_session(Extension(session): Extension<Session>) -> impl IntoResponse {
    match session.destroy().await {
        Ok(_) => (StatusCode::OK, "Session cleared successfully".to_string()),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to clear session: {}", e),
        ),
    }
}
