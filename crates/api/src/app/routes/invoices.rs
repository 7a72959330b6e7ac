use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use invoicechain_core::Address;
use invoicechain_infra::RegistryError;
use invoicechain_invoicing::InvoiceId;

use crate::app::services::{AppServices, Registry};
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice))
        .route("/count", get(invoice_count))
        .route("/:id", get(get_invoice))
        .route("/:id/pay", post(pay_invoice))
        .route("/:id/cancel", post(cancel_invoice))
        .route("/:id/dispute", post(dispute_invoice))
        .route("/:id/encrypted-amount", get(encrypted_amount))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    body: Result<Json<dto::CreateInvoiceRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let new_invoice = match body.into_new_invoice() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let caller = caller.address();
    match services
        .blocking(move |r| r.create_invoice(caller, new_invoice))
        .await
    {
        Ok(id) => (StatusCode::CREATED, Json(dto::CreatedInvoice { id })).into_response(),
        Err(e) => errors::registry_call_error_to_response(e),
    }
}

pub async fn invoice_count(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.blocking(|r| r.invoice_count()).await {
        Ok(count) => Json(serde_json::json!({ "count": count })).into_response(),
        Err(e) => errors::registry_call_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.blocking(move |r| r.get_invoice(id)).await {
        Ok(record) => Json(dto::InvoiceView::from(record)).into_response(),
        Err(e) => errors::registry_call_error_to_response(e),
    }
}

pub async fn pay_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(&services, &id, caller.address(), Registry::pay_invoice).await
}

pub async fn cancel_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(&services, &id, caller.address(), Registry::cancel_invoice).await
}

pub async fn dispute_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    transition(&services, &id, caller.address(), Registry::dispute_invoice).await
}

pub async fn encrypted_amount(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let caller = caller.address();
    match services
        .blocking(move |r| r.encrypted_amount(caller, id))
        .await
    {
        Ok(handle) => Json(dto::HandleView { handle }).into_response(),
        Err(e) => errors::registry_call_error_to_response(e),
    }
}

/// Run a status transition and answer with the updated invoice.
async fn transition(
    services: &Arc<AppServices>,
    raw_id: &str,
    caller: Address,
    run: fn(&Registry, Address, InvoiceId) -> Result<(), RegistryError>,
) -> axum::response::Response {
    let id = match dto::parse_invoice_id(raw_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let updated = services
        .blocking(move |r| {
            run(r, caller, id)?;
            r.get_invoice(id)
        })
        .await;

    match updated {
        Ok(record) => Json(dto::InvoiceView::from(record)).into_response(),
        Err(e) => errors::registry_call_error_to_response(e),
    }
}
