// src/error.rs

use crate::dep::ParseError;
use thiserror::Error;

/// Core error types for Entropy
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Malformed dependency string
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A bare package name resolved to more than one category/name key
    #[error("Ambiguous package name '{name}', candidates: {}", keys.join(", "))]
    AmbiguousKey { name: String, keys: Vec<String> },

    /// A repository store could not be opened
    #[error("Repository '{repository}' is unavailable: {reason}")]
    StoreUnavailable { repository: String, reason: String },

    /// Cache blob or repository index (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or unreadable settings
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using Entropy's Error type
pub type Result<T> = std::result::Result<T, Error>;
