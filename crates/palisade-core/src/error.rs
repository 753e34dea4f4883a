use thiserror::Error;

/// Canonical error type for entity data operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A filter expression referenced an operator outside the comparison vocabulary.
    #[error("unknown comparison operator `{operator}`")]
    InvalidOperator {
        /// Operator name as supplied by the caller.
        operator: String,
    },

    /// A flat filter expression referenced a field the datum does not carry.
    #[error("field `{field}` was not found")]
    FieldNotFound {
        /// Field name that could not be resolved.
        field: String,
    },

    /// A relative filter mask was evaluated without a reference record.
    #[error("relative comparison on `{field}` requires a reference record")]
    MissingReference {
        /// Field path whose comparison value could not be resolved.
        field: String,
    },

    /// Operation addressed an entity type that is not registered.
    #[error("entity type `{entity_type}` is not registered")]
    UnknownEntityType {
        /// Entity type name as supplied by the caller.
        entity_type: String,
    },

    /// Operation addressed a linkage that is not registered.
    #[error("linkage `{linkage}` is not registered")]
    UnknownLinkage {
        /// Linkage name as supplied by the caller.
        linkage: String,
    },

    /// The linkage strategy does not support the attempted operation.
    #[error("linkage `{linkage}` does not support {operation}")]
    UnsupportedLinkage {
        /// Linkage name.
        linkage: String,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// The backing store could not be reached or refused the connection.
    #[error("backend unavailable: {message}")]
    BackendUnavailable {
        /// Human-readable connectivity details.
        message: String,
    },

    /// A storage-level constraint (unique, not-null, foreign key) was violated.
    #[error("constraint violation: {message}")]
    Constraint {
        /// Constraint description reported by the backend.
        message: String,
    },

    /// Unexpected storage backend error.
    #[error("storage error: {message}")]
    Storage {
        /// Human-readable details for debugging purposes.
        message: String,
    },

    /// Validation error for profiles, masks or input data.
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable explanation of the invalid input.
        message: String,
    },

    /// Serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Creates an `InvalidOperator` variant.
    #[must_use]
    pub fn invalid_operator(operator: impl Into<String>) -> Self {
        Self::InvalidOperator {
            operator: operator.into(),
        }
    }

    /// Creates a `FieldNotFound` variant.
    #[must_use]
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            field: field.into(),
        }
    }

    /// Creates a `MissingReference` variant.
    #[must_use]
    pub fn missing_reference(field: impl Into<String>) -> Self {
        Self::MissingReference {
            field: field.into(),
        }
    }

    /// Creates an `UnknownEntityType` variant.
    #[must_use]
    pub fn unknown_entity_type(entity_type: impl Into<String>) -> Self {
        Self::UnknownEntityType {
            entity_type: entity_type.into(),
        }
    }

    /// Creates an `UnknownLinkage` variant.
    #[must_use]
    pub fn unknown_linkage(linkage: impl Into<String>) -> Self {
        Self::UnknownLinkage {
            linkage: linkage.into(),
        }
    }

    /// Creates an `UnsupportedLinkage` variant.
    #[must_use]
    pub fn unsupported_linkage(linkage: impl Into<String>, operation: &'static str) -> Self {
        Self::UnsupportedLinkage {
            linkage: linkage.into(),
            operation,
        }
    }

    /// Creates a `BackendUnavailable` variant.
    #[must_use]
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `Constraint` variant.
    #[must_use]
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }

    /// Creates a `Storage` variant.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a `Validation` variant.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenient result alias for entity data operations.
pub type CoreResult<T> = Result<T, CoreError>;
