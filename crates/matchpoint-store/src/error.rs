use thiserror::Error;

/// Errors that can occur within the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No template with the given ID exists in the store.
    #[error("Template not found: {id}")]
    TemplateNotFound { id: String },

    /// No instance with the given ID exists in the store.
    #[error("Instance not found: {id}")]
    InstanceNotFound { id: String },

    /// A guarded status transition did not apply because the row was not in
    /// the required source state (e.g. cancelling an instance that is no
    /// longer pending).
    #[error("Invalid transition for instance {id}: expected status {expected}")]
    InvalidTransition { id: String, expected: String },

    /// A stored column could not be decoded into its domain type.
    #[error("Corrupt row {id}: {detail}")]
    CorruptRow { id: String, detail: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
