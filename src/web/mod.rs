//! Web presentation layer
//!
//! [`WebServer`] composes the axum router, registers the API routes and
//! the embedded chat page, and starts the HTTP listener. Everything here
//! is wiring; the chat semantics live in [`crate::router`].

pub mod api;
pub mod frontend;

use crate::config::Settings;
use crate::router::SessionRouter;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

const UPLOAD_BODY_LIMIT: usize = 25 * 1024 * 1024;

/// Shared state accessible from every axum handler
pub struct AppState {
    pub router: SessionRouter,
    pub settings: Settings,
    pub upload_dir: PathBuf,
}

/// The chat relay web server
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server around a built session router.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload spool directory cannot be created.
    pub fn new(settings: Settings, router: SessionRouter) -> anyhow::Result<Self> {
        let upload_dir = std::env::temp_dir().join(format!("web-gpt-uploads-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&upload_dir)?;

        Ok(Self {
            state: Arc::new(AppState {
                router,
                settings,
                upload_dir,
            }),
        })
    }

    /// The `host:port` string this server will bind to
    #[must_use]
    pub fn addr(&self) -> String {
        format!(
            "{}:{}",
            self.state.settings.bind_addr, self.state.settings.port
        )
    }

    /// Build the axum router with all routes registered
    fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);

        Router::new()
            // Embedded frontend.
            .route("/", get(api::index))
            // REST API.
            .route("/api/status", get(api::status))
            .route("/api/models", get(api::models))
            .route("/api/chat", post(api::chat))
            .route("/api/history/{model}", get(api::history))
            .route("/api/upload", post(api::upload))
            .route("/api/reset", post(api::reset))
            .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound or the server
    /// fails while running.
    pub async fn start(self) -> anyhow::Result<()> {
        let addr = self.addr();
        info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails while running.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        let router = self.router();
        axum::serve(listener, router).await?;
        Ok(())
    }
}
