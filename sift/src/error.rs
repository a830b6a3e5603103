use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Operation {0} has no permission mapped")]
    UnmappedOperation(String),

    #[error("Duplicate route: {method} {path}")]
    DuplicateRoute { method: String, path: String },

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    #[error("Invalid index name: {0}")]
    InvalidIndexName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, Error>;
