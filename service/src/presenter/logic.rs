use chrono::Utc;
use serde::Serialize;

use libs::{
    payload::{CreatedTask, LoginData, LoginPayload, SignupPayload, UpdateTaskPayload},
    record::{normalize_email, TaskFields, TaskRecord, UserProfile},
    Collection, DocumentField, ValidationFailure,
};

use super::RuntimeError;
use crate::{
    auth::{hash_password, verify_password, Claims, StoredUser},
    store::{Document, DocumentStore},
    AppState,
};

fn to_document<T: Serialize>(value: &T) -> Result<Document, RuntimeError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(doc) => Ok(doc),
        _ => Err(RuntimeError::SerdeError(serde::ser::Error::custom(
            "expected a JSON object",
        ))),
    }
}

fn from_document<T: serde::de::DeserializeOwned>(doc: Document) -> Result<T, RuntimeError> {
    Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
}

/// Loads a to-do owned by `owner`. Someone else's record is reported as
/// missing so ids of other users cannot be discovered.
async fn owned_todo(
    store: &dyn DocumentStore,
    id: &str,
    owner: &str,
) -> Result<TaskRecord, RuntimeError> {
    let doc = store
        .get(Collection::Todos, id)
        .await?
        .ok_or_else(|| RuntimeError::TaskNotFound(id.to_string()))?;
    let record: TaskRecord = from_document(doc)?;
    if record.created_by != owner {
        tracing::warn!("{} asked for {} owned by someone else", owner, id);
        return Err(RuntimeError::TaskNotFound(id.to_string()));
    }
    Ok(record)
}

pub(super) async fn perform_signup(
    payload: SignupPayload,
    app_state: &AppState,
) -> Result<UserProfile, RuntimeError> {
    let payload = payload.validated()?;

    let user = StoredUser {
        id: String::new(),
        username: payload.username,
        email: payload.email,
        password_hash: hash_password(&payload.password, app_state.hash_iterations),
        created_at: Utc::now(),
    };
    let mut doc = to_document(&user)?;
    doc.remove(&DocumentField::Id.to_string());

    let id = app_state
        .store
        .insert_unique(Collection::Users, DocumentField::Email, doc)
        .await?;
    tracing::info!("new user {} ({})", user.email, id);

    Ok(user.profile())
}

pub(super) async fn perform_login(
    payload: LoginPayload,
    app_state: &AppState,
) -> Result<LoginData, RuntimeError> {
    let email = normalize_email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(ValidationFailure::EmptyField("password").into());
    }

    let doc = app_state
        .store
        .find_by_field(Collection::Users, DocumentField::Email, &email)
        .await?
        .into_iter()
        .next()
        .ok_or(RuntimeError::UnknownEmail)?;
    let user: StoredUser = from_document(doc)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        tracing::info!("wrong password for {}", email);
        return Err(RuntimeError::IncorrectPassword);
    }

    let profile = user.profile();
    let (token, expires_at) = app_state.tokens.issue(&profile, Utc::now())?;
    Ok(LoginData {
        token,
        expires_at,
        user: profile,
    })
}

pub(super) async fn perform_list_todos(
    claims: &Claims,
    app_state: &AppState,
) -> Result<Vec<TaskRecord>, RuntimeError> {
    let docs = app_state.store.list_all(Collection::Todos).await?;

    let mut todos = Vec::new();
    for doc in docs {
        let record: TaskRecord = from_document(doc)?;
        if record.created_by == claims.sub {
            todos.push(record);
        }
    }
    todos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(todos)
}

pub(super) async fn perform_create_todo(
    fields: TaskFields,
    claims: &Claims,
    app_state: &AppState,
) -> Result<CreatedTask, RuntimeError> {
    let fields = fields.validated()?;
    let created_at = Utc::now();

    let mut doc = to_document(&fields)?;
    doc.insert(
        DocumentField::CreatedBy.to_string(),
        serde_json::json!(claims.sub),
    );
    doc.insert(
        DocumentField::CreatedAt.to_string(),
        serde_json::json!(created_at),
    );

    let id = app_state.store.insert(Collection::Todos, doc).await?;
    tracing::debug!("{} created {}", claims.sub, id);
    Ok(CreatedTask { id, created_at })
}

pub(super) async fn perform_update_todo(
    payload: UpdateTaskPayload,
    claims: &Claims,
    app_state: &AppState,
) -> Result<(), RuntimeError> {
    let patch = payload.fields.validated()?;
    owned_todo(app_state.store.as_ref(), &payload.id, &claims.sub).await?;
    if patch.is_empty() {
        return Ok(());
    }

    app_state
        .store
        .update_fields(Collection::Todos, &payload.id, patch.to_fields())
        .await?;
    tracing::debug!("{} updated {}", claims.sub, payload.id);
    Ok(())
}

pub(super) async fn perform_delete_todo(
    id: &str,
    claims: &Claims,
    app_state: &AppState,
) -> Result<(), RuntimeError> {
    owned_todo(app_state.store.as_ref(), id, &claims.sub).await?;

    if !app_state.store.delete(Collection::Todos, id).await? {
        return Err(RuntimeError::TaskNotFound(id.to_string()));
    }
    tracing::debug!("{} deleted {}", claims.sub, id);
    Ok(())
}
