//! Authorization error types.
//!
//! This module defines the errors raised while parsing clinical scopes and
//! compiling them into access rules.

use std::fmt;

use crate::smart::scopes::ScopeError;

/// Errors that can occur while turning granted scopes into access rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The scope token does not follow the clinical scope grammar.
    #[error("{scope} is not a valid clinical scope: {reason}")]
    InvalidClinicalScope {
        /// The offending token, verbatim.
        scope: String,
        /// Which part of the grammar rejected it.
        #[source]
        reason: ScopeError,
    },

    /// The scope names a resource type this server does not support.
    #[error("Scope resource {resource} not supported")]
    UnsupportedScopeResource {
        /// The resource name from the scope.
        resource: String,
    },

    /// The scope grants a permission kind this deployment does not support.
    #[error("Scope operation {operation} not supported")]
    UnsupportedScopeOperation {
        /// The permission letter or operation name.
        operation: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidClinicalScope` error.
    #[must_use]
    pub fn invalid_clinical_scope(scope: impl Into<String>, reason: ScopeError) -> Self {
        Self::InvalidClinicalScope {
            scope: scope.into(),
            reason,
        }
    }

    /// Creates a new `UnsupportedScopeResource` error.
    #[must_use]
    pub fn unsupported_scope_resource(resource: impl Into<String>) -> Self {
        Self::UnsupportedScopeResource {
            resource: resource.into(),
        }
    }

    /// Creates a new `UnsupportedScopeOperation` error.
    #[must_use]
    pub fn unsupported_scope_operation(operation: impl Into<String>) -> Self {
        Self::UnsupportedScopeOperation {
            operation: operation.into(),
        }
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClinicalScope { .. } => ErrorCategory::Scope,
            Self::UnsupportedScopeResource { .. } | Self::UnsupportedScopeOperation { .. } => {
                ErrorCategory::Configuration
            }
        }
    }
}

/// Broad classification of [`AuthError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The token itself is malformed.
    Scope,
    /// Granted scopes and server configuration disagree.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scope => write!(f, "scope"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_clinical_scope_display() {
        let err = AuthError::invalid_clinical_scope(
            "patient/Patient.rx",
            ScopeError::InvalidPermission('x'),
        );
        assert_eq!(
            err.to_string(),
            "patient/Patient.rx is not a valid clinical scope: Invalid permission character: x"
        );
        assert_eq!(err.category(), ErrorCategory::Scope);
    }

    #[test]
    fn test_unsupported_scope_resource_display() {
        let err = AuthError::unsupported_scope_resource("Bogus");
        assert_eq!(err.to_string(), "Scope resource Bogus not supported");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_unsupported_scope_operation_display() {
        let err = AuthError::unsupported_scope_operation("d");
        assert_eq!(err.to_string(), "Scope operation d not supported");
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Scope.to_string(), "scope");
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
    }
}
