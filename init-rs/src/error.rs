#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Document failed validation for {collection}: {reason}")]
    Validation { collection: String, reason: String },

    #[error("Duplicate key in {collection} on index {index}")]
    DuplicateKey { collection: String, index: String },

    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Index {index} on {collection} conflicts with an existing index")]
    IndexConflict { collection: String, index: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InitResult<T> = Result<T, InitError>;
