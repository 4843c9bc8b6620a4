use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request as AxumExtractRequest, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use libs::{
    payload::{DeleteTaskPayload, LoginPayload, SignupPayload, UpdateTaskPayload},
    record::TaskFields,
};

use super::{
    construct_err_resp_invalid_incoming_json,
    logic::{
        perform_create_todo, perform_delete_todo, perform_list_todos, perform_login,
        perform_signup, perform_update_todo,
    },
    RuntimeError,
};
use crate::{auth::AuthUser, AppState};

#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, axum::Json<serde_json::Value>);

    async fn from_request(req: AxumExtractRequest, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(json) => Ok(Self(json.0)),
            Err(rejection) => {
                tracing::error!("{:?}", rejection);
                let err_resp = construct_err_resp_invalid_incoming_json(&rejection);
                Err(err_resp)
            }
        }
    }
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "data": {},
    }))
}

pub async fn signup(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SignupPayload>,
) -> Result<impl IntoResponse, RuntimeError> {
    match perform_signup(payload, &app_state).await {
        Ok(user) => Ok(Json(serde_json::json!({
            "status": "ok",
            "data": {
                "user": user,
            }
        }))),
        Err(err) => Err(err),
    }
}

pub async fn login(
    State(app_state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginPayload>,
) -> Result<impl IntoResponse, RuntimeError> {
    match perform_login(payload, &app_state).await {
        Ok(login_data) => Ok(Json(serde_json::json!({
            "status": "ok",
            "data": login_data,
        }))),
        Err(err) => Err(err),
    }
}

pub async fn list_todos(
    State(app_state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<impl IntoResponse, RuntimeError> {
    match perform_list_todos(&claims, &app_state).await {
        Ok(todos) => Ok(Json(serde_json::json!({
            "status": "ok",
            "data": {
                "todos": todos,
            }
        }))),
        Err(err) => Err(err),
    }
}

pub async fn create_todo(
    State(app_state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(fields): ValidatedJson<TaskFields>,
) -> Result<impl IntoResponse, RuntimeError> {
    match perform_create_todo(fields, &claims, &app_state).await {
        Ok(created) => Ok(Json(serde_json::json!({
            "status": "ok",
            "data": created,
        }))),
        Err(err) => Err(err),
    }
}

pub async fn update_todo(
    State(app_state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(payload): ValidatedJson<UpdateTaskPayload>,
) -> Result<impl IntoResponse, RuntimeError> {
    match perform_update_todo(payload, &claims, &app_state).await {
        Ok(_) => Ok(Json(serde_json::json!({
            "status": "ok",
            "data": {},
        }))),
        Err(err) => Err(err),
    }
}

pub async fn delete_todo(
    State(app_state): State<AppState>,
    AuthUser(claims): AuthUser,
    ValidatedJson(payload): ValidatedJson<DeleteTaskPayload>,
) -> Result<impl IntoResponse, RuntimeError> {
    match perform_delete_todo(&payload.id, &claims, &app_state).await {
        Ok(_) => Ok(Json(serde_json::json!({
            "status": "ok",
            "data": {},
        }))),
        Err(err) => Err(err),
    }
}
