/// A required input was missing or malformed. Raised before any remote call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("{0} is required")]
    EmptyField(&'static str),

    #[error("Passwords do not match!")]
    PasswordMismatch,

    #[error("`{0}` is not a valid email address")]
    InvalidEmail(String),
}

impl ValidationFailure {
    /// Name of the offending input, if the failure is tied to one.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationFailure::EmptyField(field) => field,
            ValidationFailure::PasswordMismatch => "confirmPassword",
            ValidationFailure::InvalidEmail(_) => "email",
        }
    }
}

/// Failure reported by a [`crate::store::TaskStore`] implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record `{0}` not found")]
    NotFound(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Failure of a task-list operation, phrased for the person using it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("The task store is unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Task `{0}` no longer exists.")]
    NotFound(String),

    #[error("The task store rejected the request: {0}")]
    Rejected(String),
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => TaskError::StoreUnavailable(reason),
            StoreError::NotFound(id) => TaskError::NotFound(id),
            StoreError::Rejected(reason) => TaskError::Rejected(reason),
        }
    }
}
