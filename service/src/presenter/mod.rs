use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use bb8_redis::redis;

use libs::ValidationFailure;

use crate::{auth::AuthError, store::StoreError};

pub mod handlers;
pub mod logic;

#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("JSON error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    UnprocessableEntity(#[from] ValidationFailure),

    #[error(transparent)]
    AuthError(#[from] AuthError),

    #[error("No user found with this email.")]
    UnknownEmail,

    #[error("Incorrect password. Please try again.")]
    IncorrectPassword,

    #[error("Task `{0}` not found")]
    TaskNotFound(String),
}

impl IntoResponse for RuntimeError {
    fn into_response(self) -> axum::http::Response<axum::body::Body> {
        match self {
            RuntimeError::StoreError(err) => {
                let (status, err_payload) = construct_err_payload_store(err);
                (status, axum::Json(err_payload)).into_response()
            }
            RuntimeError::SerdeError(err) => {
                let err_payload = construct_err_payload_de_upstream_data(err);
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(err_payload)).into_response()
            }
            RuntimeError::UnprocessableEntity(failure) => {
                let err_payload = construct_err_payload_unprocessable_entity(failure);
                (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(err_payload)).into_response()
            }
            RuntimeError::AuthError(err) => {
                let (status, err_payload) = construct_err_payload_auth(err);
                (status, axum::Json(err_payload)).into_response()
            }
            case @ RuntimeError::UnknownEmail => {
                (StatusCode::NOT_FOUND, axum::Json(error_message(case))).into_response()
            }
            case @ RuntimeError::IncorrectPassword => {
                (StatusCode::UNAUTHORIZED, axum::Json(error_message(case))).into_response()
            }
            case @ RuntimeError::TaskNotFound(_) => {
                (StatusCode::NOT_FOUND, axum::Json(error_message(case))).into_response()
            }
        }
    }
}

fn error_message(err: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({
        "status": "error",
        "message": err.to_string(),
    })
}

fn construct_err_payload_unprocessable_entity(failure: ValidationFailure) -> serde_json::Value {
    serde_json::json!({
        "status": "error",
        "message": failure.to_string(),
        "field": failure.field(),
    })
}

fn construct_err_payload_store(err: StoreError) -> (StatusCode, serde_json::Value) {
    match err {
        StoreError::NotFound { id, .. } => (
            StatusCode::NOT_FOUND,
            error_message(format!("Task `{}` not found", id)),
        ),
        StoreError::Conflict { .. } => (
            StatusCode::CONFLICT,
            error_message("An account with this email already exists."),
        ),
        StoreError::SerdeError(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            construct_err_payload_de_upstream_data(err),
        ),
        StoreError::MissingField(field) => {
            tracing::error!("stored document lacks `{}`", field);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_message("Internal Error - Please report an issue if you encounter this."),
            )
        }
        StoreError::RedisError(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            construct_err_payload_redis(err),
        ),
        StoreError::PoolError(reason) => {
            tracing::error!("redis pool: {}", reason);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                error_message("Store unavailable"),
            )
        }
    }
}

fn construct_err_payload_redis(err: redis::RedisError) -> serde_json::Value {
    tracing::error!("redis: {:?}", err);
    match err.kind() {
        redis::ErrorKind::AuthenticationFailed => serde_json::json!({
            "status": "error",
            "message": "Store unavailable: the service could not authenticate",
        }),
        _ => serde_json::json!({
            "status": "error",
            "message": "Store unavailable",
        }),
    }
}

fn construct_err_payload_auth(err: AuthError) -> (StatusCode, serde_json::Value) {
    match err {
        AuthError::MissingToken | AuthError::InvalidToken(_) => {
            tracing::debug!("rejected session: {:?}", err);
            (StatusCode::UNAUTHORIZED, error_message(err))
        }
        AuthError::Issue(_) | AuthError::MalformedHash => {
            tracing::error!("auth: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_message("Internal Error - Please report an issue if you encounter this."),
            )
        }
    }
}

fn construct_err_payload_de_upstream_data(err: serde_json::Error) -> serde_json::Value {
    tracing::error!(
        "upstream data malformed: it has been modified, and now is in incorrect format"
    );
    tracing::debug!("upstream de err: {:?}", err);
    serde_json::json!({
        "status": "error",
        "message": "Internal Error - Please report an issue if you encounter this."
    })
}

fn construct_err_resp_invalid_incoming_json(
    err: &JsonRejection,
) -> (StatusCode, axum::Json<serde_json::Value>) {
    match err {
        case @ JsonRejection::JsonDataError(_) => {
            tracing::error!("rejected json: {:?}", case);
            let p = serde_json::json!({
                "status": "error",
                "message": "Invalid JSON",
                "error": case.body_text(),
            });
            (StatusCode::BAD_REQUEST, Json(p))
        }
        JsonRejection::JsonSyntaxError(e) => {
            tracing::error!("invalid json: {:?}", e);
            let p = serde_json::json!({
                "status": "error",
                "message": "Invalid JSON",
            });
            (StatusCode::BAD_REQUEST, Json(p))
        }
        JsonRejection::MissingJsonContentType(_) => {
            let p = serde_json::json!({
                "status": "error",
                "message": "Expected `Content-Type: application/json`",
            });
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, Json(p))
        }
        _ => {
            let p = serde_json::json!({
                "status": "error",
                "message": "Unknown error",
            });
            (StatusCode::BAD_REQUEST, Json(p))
        }
    }
}
