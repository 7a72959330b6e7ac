use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/activity", get(list_activity))
        .route("/:address/sent", get(sent_invoices))
        .route("/:address/received", get(received_invoices))
        .route("/:address/activity", get(account_activity))
        .route("/:address/balance", get(balance))
}

pub fn balances_router() -> Router {
    Router::new().route("/deposit", post(deposit))
}

pub async fn sent_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Path(address): Path<String>,
    q: Result<Query<dto::PageQuery>, QueryRejection>,
) -> axum::response::Response {
    let account = match dto::parse_address(&address) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let page = match q {
        Ok(Query(q)) => q.to_page(),
        Err(rejection) => return page_rejection(rejection),
    };

    match services
        .blocking(move |r| r.sent_invoices(account, page))
        .await
    {
        Ok(ids) => Json(dto::InvoiceIdsView {
            account,
            offset: page.offset,
            ids,
        })
        .into_response(),
        Err(e) => errors::registry_call_error_to_response(e),
    }
}

pub async fn received_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Path(address): Path<String>,
    q: Result<Query<dto::PageQuery>, QueryRejection>,
) -> axum::response::Response {
    let account = match dto::parse_address(&address) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let page = match q {
        Ok(Query(q)) => q.to_page(),
        Err(rejection) => return page_rejection(rejection),
    };

    match services
        .blocking(move |r| r.received_invoices(account, page))
        .await
    {
        Ok(ids) => Json(dto::InvoiceIdsView {
            account,
            offset: page.offset,
            ids,
        })
        .into_response(),
        Err(e) => errors::registry_call_error_to_response(e),
    }
}

pub async fn account_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Path(address): Path<String>,
) -> axum::response::Response {
    let account = match dto::parse_address(&address) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.activity.get(account) {
        Some(activity) => Json(activity).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "no activity recorded"),
    }
}

pub async fn list_activity(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let mut all = services.activity.list();
    all.sort_by_key(|a| a.account);
    Json(all).into_response()
}

/// Encrypted balance handle of `address`; only the owner may read it.
pub async fn balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(address): Path<String>,
) -> axum::response::Response {
    let owner = match dto::parse_address(&address) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let caller = caller.address();
    match services
        .blocking(move |r| r.encrypted_balance(caller, owner))
        .await
    {
        Ok(handle) => Json(serde_json::json!({
            "account": owner,
            "handle": handle,
        }))
        .into_response(),
        Err(e) => errors::registry_call_error_to_response(e),
    }
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    body: Result<Json<dto::DepositRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let caller = caller.address();
    match services
        .blocking(move |r| r.deposit(caller, &body.ciphertext, &body.proof))
        .await
    {
        Ok(handle) => Json(dto::HandleView { handle }).into_response(),
        Err(e) => errors::registry_call_error_to_response(e),
    }
}

fn page_rejection(rejection: QueryRejection) -> axum::response::Response {
    errors::json_error(rejection.status(), "invalid_request", rejection.body_text())
}
