use thiserror::Error;

/// Core error types for OctoFHIR resource model lookups
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid FHIR resource type: {0}")]
    InvalidResourceType(String),

    #[error("Invalid FHIR reference: {0}")]
    InvalidReference(String),

    #[error("Invalid FHIR ID: {0}")]
    InvalidId(String),
}

impl CoreError {
    /// Create a new InvalidResourceType error
    pub fn invalid_resource_type(resource_type: impl Into<String>) -> Self {
        Self::InvalidResourceType(resource_type.into())
    }

    /// Create a new InvalidReference error
    pub fn invalid_reference(reference: impl Into<String>) -> Self {
        Self::InvalidReference(reference.into())
    }

    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
