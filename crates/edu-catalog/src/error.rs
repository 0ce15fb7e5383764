//! Error types for the document store seam and the catalog repository.

use thiserror::Error;

/// Errors raised by a [`DocumentStore`](crate::document::DocumentStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the operation failed for
    /// infrastructure reasons (locked database, I/O failure).
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// A document with the same key already exists.
    #[error("Document already exists: {0}")]
    Conflict(String),

    /// A stored document could not be read back.
    #[error("Corrupt document data: {0}")]
    Corrupt(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) => match e.code {
                rusqlite::ErrorCode::ConstraintViolation => StoreError::Conflict(err.to_string()),
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                    StoreError::Corrupt(err.to_string())
                }
                _ => StoreError::Unavailable(err.to_string()),
            },
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// Result type for document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the catalog repository to the presentation layer.
///
/// `StoreUnavailable` is transient and retryable, `NotFound` is permanent for
/// the requested id, `ValidationFailed` means the caller sent malformed input.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A stored record could not be decoded into its typed form.
    #[error("Failed to decode record: {0}")]
    Decode(String),
}

impl CatalogError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// Whether the caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "Course data is unavailable right now. Please try again.",
            Self::NotFound { .. } => "The requested item no longer exists.",
            Self::ValidationFailed(_) => "Some of the information entered is invalid.",
            Self::Decode(_) => "Stored course data could not be read.",
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CatalogError::StoreUnavailable(msg),
            StoreError::NotFound { collection, id } => CatalogError::NotFound { kind: collection, id },
            // A lost insert race: the retry takes the update branch.
            StoreError::Conflict(msg) => CatalogError::StoreUnavailable(msg),
            StoreError::Corrupt(msg) => CatalogError::Decode(msg),
            StoreError::InvalidQuery(msg) => CatalogError::ValidationFailed(msg),
            StoreError::Encoding(e) => CatalogError::Decode(e.to_string()),
        }
    }
}

/// Result type for catalog repository operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_catalog_taxonomy() {
        let err: CatalogError = StoreError::Unavailable("locked".into()).into();
        assert!(matches!(err, CatalogError::StoreUnavailable(_)));
        assert!(err.is_retryable());

        let err: CatalogError = StoreError::not_found("modules", "m1").into();
        assert!(matches!(err, CatalogError::NotFound { ref id, .. } if id == "m1"));
        assert!(!err.is_retryable());

        let err: CatalogError = StoreError::InvalidQuery("bad field".into()).into();
        assert!(matches!(err, CatalogError::ValidationFailed(_)));
    }

    #[test]
    fn test_user_messages() {
        assert!(CatalogError::StoreUnavailable("x".into())
            .user_message()
            .contains("try again"));
        assert!(CatalogError::not_found("module", "x")
            .user_message()
            .contains("no longer exists"));
    }
}
