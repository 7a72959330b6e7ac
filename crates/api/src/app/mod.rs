//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: registry, coprocessor, event bus, projection worker
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Router plus the services behind it (kept for shutdown).
pub struct App {
    pub router: Router,
    pub services: Arc<services::AppServices>,
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build(config: &ApiConfig) -> anyhow::Result<App> {
    let jwt = Arc::new(invoicechain_auth::Hs256JwtValidator::new(
        config.jwt_secret.as_bytes(),
    ));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(services::build_services(&config.registry)?);

    // Protected routes: every call acts as the authenticated address.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let router = Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new());

    Ok(App { router, services })
}

/// Router only; the projection worker lives until the process exits.
pub fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    Ok(build(config)?.router)
}
