use async_trait::async_trait;

use crate::{
    error::StoreError,
    payload::CreatedTask,
    record::{TaskFields, TaskPatch, TaskRecord},
};

/// Call-through to the remote `todos` collection. Each call is independent:
/// no transactions, no retries.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Every record the store is willing to return; no ordering guarantee.
    async fn list_all(&self) -> Result<Vec<TaskRecord>, StoreError>;

    async fn create(&self, fields: &TaskFields) -> Result<CreatedTask, StoreError>;

    /// Overwrites the fields present in `patch`. `NotFound` when `id` is gone.
    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}
