use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::ValidationFailure;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

/// A to-do as held by the document store. `id`, `created_by` and
/// `created_at` are assigned once at creation and never patched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub task: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn from_fields(
        id: String,
        fields: TaskFields,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        TaskRecord {
            id,
            task: fields.task,
            description: fields.description,
            priority: fields.priority,
            date: fields.date,
            created_by,
            created_at,
        }
    }

    /// Merges the present fields of `patch` over this record.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(task) = &patch.task {
            self.task = task.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
    }
}

/// Caller-supplied fields for a new to-do.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskFields {
    pub task: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl TaskFields {
    pub fn new(task: impl Into<String>, description: impl Into<String>) -> Self {
        TaskFields {
            task: task.into(),
            description: description.into(),
            ..TaskFields::default()
        }
    }

    pub fn with_priority(self, priority: Priority) -> Self {
        TaskFields { priority, ..self }
    }

    pub fn with_date(self, date: Option<NaiveDate>) -> Self {
        TaskFields { date, ..self }
    }

    /// Trims the text fields and rejects the ones left empty.
    pub fn validated(self) -> Result<Self, ValidationFailure> {
        Ok(TaskFields {
            task: required_text("task", &self.task)?,
            description: required_text("description", &self.description)?,
            ..self
        })
    }
}

/// Field-level partial update. Absent fields are left alone; `date` is
/// tri-state so a date can be cleared (`Some(None)`). Identity fields are
/// not patchable, so unknown fields are refused outright.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.task.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.date.is_none()
    }

    pub fn validated(self) -> Result<Self, ValidationFailure> {
        let task = match self.task {
            Some(task) => Some(required_text("task", &task)?),
            None => None,
        };
        let description = match self.description {
            Some(description) => Some(required_text("description", &description)?),
            None => None,
        };
        Ok(TaskPatch {
            task,
            description,
            ..self
        })
    }

    /// The patch as a JSON object holding only the present fields.
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(fields)) => fields,
            _ => serde_json::Map::new(),
        }
    }
}

// A present-but-null `date` must stay distinguishable from an absent one.
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn required_text(field: &'static str, value: &str) -> Result<String, ValidationFailure> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationFailure::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// What a user looks like to anything outside the service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
}

/// Emails are the identity key, so they are compared trimmed and lower-cased.
pub fn normalize_email(email: &str) -> Result<String, ValidationFailure> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationFailure::EmptyField("email"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ValidationFailure::InvalidEmail(email)),
    }
}
