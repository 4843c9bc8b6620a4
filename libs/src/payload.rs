use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationFailure,
    record::{normalize_email, TaskPatch, TaskRecord, UserProfile},
};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignupPayload {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupPayload {
    /// Checks the required inputs and returns the payload with the username
    /// trimmed and the email normalized.
    pub fn validated(self) -> Result<Self, ValidationFailure> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(ValidationFailure::EmptyField("username"));
        }
        let email = normalize_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationFailure::EmptyField("password"));
        }
        if self.password != self.confirm_password {
            return Err(ValidationFailure::PasswordMismatch);
        }
        Ok(SignupPayload {
            username,
            email,
            ..self
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateTaskPayload {
    pub id: String,
    pub fields: TaskPatch,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeleteTaskPayload {
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTask {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignupData {
    pub user: UserProfile,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TodoListData {
    pub todos: Vec<TaskRecord>,
}

/// Envelope every service response is wrapped in:
/// `{"status": "ok", "data": ..}` or `{"status": "error", "message": ..}`.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
