use chrono::NaiveDate;

use crate::{
    error::TaskError,
    record::{Priority, TaskPatch, TaskRecord},
    state::TaskList,
    store::TaskStore,
};

/// Editable copy of a record's mutable fields, detached from the list
/// until saved.
#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffer {
    pub task: String,
    pub description: String,
    pub priority: Priority,
    pub date: Option<NaiveDate>,
}

impl From<&TaskRecord> for EditBuffer {
    fn from(record: &TaskRecord) -> Self {
        EditBuffer {
            task: record.task.clone(),
            description: record.description.clone(),
            priority: record.priority,
            date: record.date,
        }
    }
}

impl EditBuffer {
    /// Only the fields that differ from `original`.
    pub fn diff(&self, original: &TaskRecord) -> TaskPatch {
        TaskPatch {
            task: (self.task != original.task).then(|| self.task.clone()),
            description: (self.description != original.description)
                .then(|| self.description.clone()),
            priority: (self.priority != original.priority).then_some(self.priority),
            date: (self.date != original.date).then_some(self.date),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum EditState {
    Closed,
    Viewing(TaskRecord),
    Editing {
        selected: TaskRecord,
        buffer: EditBuffer,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("no task is open")]
    NotViewing,

    #[error("no edit is in progress")]
    NotEditing,

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Detail/edit dialog for a single record: closed, viewing, or editing.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    state: EditState,
}

impl Default for EditSession {
    fn default() -> Self {
        EditSession {
            state: EditState::Closed,
        }
    }
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.state == EditState::Closed
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, EditState::Editing { .. })
    }

    pub fn selected(&self) -> Option<&TaskRecord> {
        match &self.state {
            EditState::Closed => None,
            EditState::Viewing(selected) | EditState::Editing { selected, .. } => Some(selected),
        }
    }

    pub fn buffer(&self) -> Option<&EditBuffer> {
        match &self.state {
            EditState::Editing { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    pub fn buffer_mut(&mut self) -> Option<&mut EditBuffer> {
        match &mut self.state {
            EditState::Editing { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    /// Opens `record` read-only. Whatever was open before is closed and an
    /// unsaved buffer is dropped.
    pub fn select(&mut self, record: &TaskRecord) {
        self.state = EditState::Viewing(record.clone());
    }

    pub fn begin_edit(&mut self) -> Result<&mut EditBuffer, EditError> {
        let selected = match std::mem::replace(&mut self.state, EditState::Closed) {
            EditState::Viewing(selected) => selected,
            other => {
                self.state = other;
                return Err(EditError::NotViewing);
            }
        };
        let buffer = EditBuffer::from(&selected);
        self.state = EditState::Editing { selected, buffer };
        match &mut self.state {
            EditState::Editing { buffer, .. } => Ok(buffer),
            _ => Err(EditError::NotEditing),
        }
    }

    /// Sends the changed buffer fields through [`TaskList::replace`]. Closes
    /// on success; stays in editing with the buffer intact on failure.
    pub async fn save<S: TaskStore>(&mut self, list: &mut TaskList<S>) -> Result<(), EditError> {
        let (id, patch) = match &self.state {
            EditState::Editing { selected, buffer } => (selected.id.clone(), buffer.diff(selected)),
            _ => return Err(EditError::NotEditing),
        };
        list.replace(&id, patch).await?;
        self.state = EditState::Closed;
        Ok(())
    }

    /// Drops the buffer without touching the list.
    pub fn discard(&mut self) -> Result<(), EditError> {
        if !self.is_editing() {
            return Err(EditError::NotEditing);
        }
        self.state = EditState::Closed;
        Ok(())
    }

    pub fn close(&mut self) {
        self.state = EditState::Closed;
    }
}
