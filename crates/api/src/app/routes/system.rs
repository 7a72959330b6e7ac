use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::{errors, services::AppServices};
use crate::context::CallerContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(caller): Extension<CallerContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "address": caller.address(),
    }))
}

/// Contract address, variant and invoice count of the served registry.
pub async fn registry_info(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let registry = &services.registry;
    match services.blocking(|r| r.invoice_count()).await {
        Ok(count) => Json(serde_json::json!({
            "contract": registry.contract(),
            "variant": registry.variant(),
            "invoice_count": count,
            "max_page_size": registry.max_page_size(),
        }))
        .into_response(),
        Err(e) => errors::registry_call_error_to_response(e),
    }
}
