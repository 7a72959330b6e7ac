use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use invoicechain_core::DomainError;
use invoicechain_fhe::FheError;
use invoicechain_infra::{RegistryError, RepositoryError};

use crate::app::services::RegistryCallError;

pub fn registry_call_error_to_response(err: RegistryCallError) -> axum::response::Response {
    match err {
        RegistryCallError::Registry(e) => registry_error_to_response(e),
        RegistryCallError::Join(msg) => {
            tracing::error!(error = %msg, "registry task failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

/// Malformed or unreadable JSON bodies, in the same shape as every other error.
pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(rejection.status(), "invalid_request", rejection.body_text())
}

pub fn registry_error_to_response(err: RegistryError) -> axum::response::Response {
    match err {
        RegistryError::Domain(e) => domain_error_to_response(e),
        RegistryError::Fhe(e) => fhe_error_to_response(e),
        RegistryError::Repository(RepositoryError::Conflict(msg)) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        RegistryError::Repository(e) => {
            tracing::error!(error = %e, "repository failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        RegistryError::Serialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "serialize_error", msg)
        }
        RegistryError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match err {
        DomainError::NotFound => StatusCode::NOT_FOUND,
        DomainError::Unauthorized => StatusCode::FORBIDDEN,
        DomainError::InvalidStatus(_) | DomainError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn fhe_error_to_response(err: FheError) -> axum::response::Response {
    let (status, code) = match err {
        FheError::InvalidProof => (StatusCode::BAD_REQUEST, "invalid_proof"),
        FheError::Malformed(_) => (StatusCode::BAD_REQUEST, "malformed_ciphertext"),
        FheError::TypeMismatch(_) => (StatusCode::BAD_REQUEST, "type_mismatch"),
        FheError::AccessDenied { .. } => (StatusCode::FORBIDDEN, "access_denied"),
        FheError::UnknownHandle(_) => (StatusCode::NOT_FOUND, "unknown_handle"),
        FheError::Backend(_) => (StatusCode::BAD_GATEWAY, "coprocessor_error"),
    };
    json_error(status, code, err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
