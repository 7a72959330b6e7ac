//! Client-side relayer endpoints: encrypt inputs for the served registry and
//! decrypt handles the caller has been granted.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/encrypt", post(encrypt))
        .route("/decrypt", post(decrypt))
}

/// Input is bound to the registry contract and the calling address.
pub async fn encrypt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    body: Result<Json<dto::EncryptRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let contract = services.registry.contract();
    match services
        .relayer
        .encrypt_input(body.value, contract, caller.address())
    {
        Ok((ciphertext, proof)) => Json(dto::EncryptedInput { ciphertext, proof }).into_response(),
        Err(e) => errors::fhe_error_to_response(e),
    }
}

pub async fn decrypt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    body: Result<Json<dto::DecryptRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    match services.relayer.user_decrypt(&body.handle, caller.address()) {
        Ok(value) => Json(serde_json::json!({ "value": value })).into_response(),
        Err(e) => errors::fhe_error_to_response(e),
    }
}
