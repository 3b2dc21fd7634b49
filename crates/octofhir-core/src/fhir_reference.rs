//! FHIR relative references (`Type/id`).
//!
//! Compartment anchors and operation targets are expressed as relative
//! references to a single resource instance, e.g. `Patient/123`.
//!
//! # Example
//!
//! ```
//! use octofhir_core::fhir_reference::FhirReference;
//!
//! let reference: FhirReference = "Patient/123".parse().unwrap();
//! assert_eq!(reference.resource_type, "Patient");
//! assert_eq!(reference.id, "123");
//! assert_eq!(reference.to_string(), "Patient/123");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::fhir::is_valid_resource_type_name;

/// A relative reference to one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirReference {
    /// The resource type (e.g., "Patient", "Observation")
    pub resource_type: String,
    /// The resource ID
    pub id: String,
}

impl FhirReference {
    /// Creates a new FhirReference.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for FhirReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

impl FromStr for FhirReference {
    type Err = CoreError;

    /// Parse a relative `Type/id` reference.
    ///
    /// Absolute URLs, contained (`#id`) and URN references are rejected, as
    /// are versioned references: an anchor always names the current instance.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reference = s.trim();
        let Some((resource_type, id)) = reference.split_once('/') else {
            return Err(CoreError::invalid_reference(reference));
        };

        if !is_valid_resource_type_name(resource_type) {
            return Err(CoreError::invalid_reference(reference));
        }

        if id.is_empty() || id.contains('/') {
            return Err(CoreError::invalid_id(id));
        }

        Ok(Self::new(resource_type, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_relative_reference() {
        let r: FhirReference = "Patient/123".parse().unwrap();
        assert_eq!(r.resource_type, "Patient");
        assert_eq!(r.id, "123");
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        let r: FhirReference = "  Encounter/e-1 ".parse().unwrap();
        assert_eq!(r, FhirReference::new("Encounter", "e-1"));
    }

    #[test]
    fn test_versioned_reference_rejected() {
        let err = "Patient/123/_history/2".parse::<FhirReference>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidId(_)));
    }

    #[test]
    fn test_invalid_lowercase_type() {
        let err = "patient/123".parse::<FhirReference>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidReference(_)));
    }

    #[test]
    fn test_invalid_empty_id() {
        let err = "Patient/".parse::<FhirReference>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidId(_)));
    }

    #[test]
    fn test_invalid_no_slash() {
        assert!("Patient123".parse::<FhirReference>().is_err());
        assert!("#contained".parse::<FhirReference>().is_err());
        assert!("".parse::<FhirReference>().is_err());
    }

    #[test]
    fn test_display() {
        let r = FhirReference::new("Patient", "123");
        assert_eq!(format!("{r}"), "Patient/123");
        assert_ne!(r, FhirReference::new("Patient", "456"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let r = FhirReference::new("Patient", "123");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["resourceType"], "Patient");
        assert_eq!(json["id"], "123");
    }
}
