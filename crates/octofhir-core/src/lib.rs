//! Core FHIR model pieces shared by the OctoFHIR authorization crates.

pub mod error;
pub mod fhir;
pub mod fhir_reference;

pub use error::{CoreError, Result};
pub use fhir::{
    R4_RESOURCE_TYPES, ResourceType, ResourceTypeRegistry, ResourceTypeResolver,
    is_valid_resource_type_name,
};
pub use fhir_reference::FhirReference;
