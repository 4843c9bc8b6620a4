use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::IgnoredAny;

use libs::{
    payload::{
        CreatedTask, DeleteTaskPayload, LoginData, LoginPayload, SignupData, SignupPayload,
        TodoListData, UpdateTaskPayload,
    },
    record::{TaskFields, TaskPatch, TaskRecord, UserProfile},
    session::Session,
    store::TaskStore,
    StoreError,
};

use crate::util::{make_request, Endpoints, RequestError};

/// [`TaskStore`] over the service's `/v1/todo` routes, authenticated with
/// the session token.
pub struct HttpTaskStore {
    request_client: Client,
    endpoints: Endpoints,
    token: Option<String>,
}

impl HttpTaskStore {
    pub fn new(request_client: Client, endpoints: Endpoints, session: Option<&Session>) -> Self {
        HttpTaskStore {
            request_client,
            endpoints,
            token: session.map(|session| session.token.clone()),
        }
    }
}

#[async_trait]
impl TaskStore for HttpTaskStore {
    async fn list_all(&self) -> Result<Vec<TaskRecord>, StoreError> {
        let data: TodoListData = make_request::<(), _>(
            &self.request_client,
            Method::GET,
            &self.endpoints.todo_all,
            self.token.as_deref(),
            None,
        )
        .await?;
        Ok(data.todos)
    }

    async fn create(&self, fields: &TaskFields) -> Result<CreatedTask, StoreError> {
        let created = make_request(
            &self.request_client,
            Method::POST,
            &self.endpoints.todo_new,
            self.token.as_deref(),
            Some(fields),
        )
        .await?;
        Ok(created)
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<(), StoreError> {
        let payload = UpdateTaskPayload {
            id: id.to_string(),
            fields: patch.clone(),
        };
        let _: IgnoredAny = make_request(
            &self.request_client,
            Method::POST,
            &self.endpoints.todo_update,
            self.token.as_deref(),
            Some(&payload),
        )
        .await
        .map_err(|err| keyed_by(id, err))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let payload = DeleteTaskPayload { id: id.to_string() };
        let _: IgnoredAny = make_request(
            &self.request_client,
            Method::POST,
            &self.endpoints.todo_delete,
            self.token.as_deref(),
            Some(&payload),
        )
        .await
        .map_err(|err| keyed_by(id, err))?;
        Ok(())
    }
}

/// A missing record is reported by its id, not by the service's sentence.
fn keyed_by(id: &str, err: RequestError) -> StoreError {
    match StoreError::from(err) {
        StoreError::NotFound(_) => StoreError::NotFound(id.to_string()),
        other => other,
    }
}

pub async fn sign_up(
    request_client: &Client,
    endpoints: &Endpoints,
    payload: &SignupPayload,
) -> Result<UserProfile, RequestError> {
    let data: SignupData = make_request(
        request_client,
        Method::POST,
        &endpoints.signup,
        None,
        Some(payload),
    )
    .await?;
    Ok(data.user)
}

pub async fn log_in(
    request_client: &Client,
    endpoints: &Endpoints,
    payload: &LoginPayload,
) -> Result<Session, RequestError> {
    let data: LoginData = make_request(
        request_client,
        Method::POST,
        &endpoints.login,
        None,
        Some(payload),
    )
    .await?;
    Ok(Session::from(data))
}
