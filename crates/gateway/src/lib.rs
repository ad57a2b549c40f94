//! # Bazaar Gateway Crate
//!
//! The small HTTP surface that sits next to the hosted backend. Browsers
//! talk to the platform directly for data, auth and storage; this crate only
//! serves what needs a trusted server: handing invite emails to the mailer.
//!
//! ## Architecture
//!
//! - **REST**: `POST /api/send-invite` and `GET /health`
//! - **State**: backend handle, profile lookup and the mailer
//! - **Middleware**: request logging, CORS and bearer token extraction
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bazaar_backend::{Backend, MemoryBackend};
//! use bazaar_gateway::{create_router, GatewayState};
//!
//! # async fn serve() -> std::io::Result<()> {
//! let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
//! let app = create_router(GatewayState::with_log_mailer(backend, 3));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, app).await
//! # }
//! ```

pub mod docs;
pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;

pub use error::{ErrorResponse, GatewayError, GatewayResult};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let router = Router::new()
        .merge(rest::create_rest_routes().with_state(Arc::new(state)))
        .layer(middleware::create_cors_middleware())
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    #[cfg(debug_assertions)]
    let router = {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        router.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
        )
    };

    router
}
