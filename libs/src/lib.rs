use strum_macros::{Display, EnumString};

pub mod edit;
pub mod error;
pub mod filter;
pub mod payload;
pub mod record;
pub mod session;
pub mod state;
pub mod store;

pub use error::{StoreError, TaskError, ValidationFailure};

/// Named collections of the document store. The `Display` form is the
/// collection name used on the wire and as the storage key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    Todos,
    Users,
}

/// Field names shared by the stored documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DocumentField {
    #[strum(serialize = "id")]
    Id,
    #[strum(serialize = "email")]
    Email,
    #[strum(serialize = "createdBy")]
    CreatedBy,
    #[strum(serialize = "createdAt")]
    CreatedAt,
}
