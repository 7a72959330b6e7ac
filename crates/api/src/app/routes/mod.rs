use axum::{Router, routing::get};

pub mod accounts;
pub mod invoices;
pub mod relayer;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/registry", get(system::registry_info))
        .nest("/invoices", invoices::router())
        .nest("/accounts", accounts::router())
        .nest("/balances", accounts::balances_router())
        .nest("/relayer", relayer::router())
}
