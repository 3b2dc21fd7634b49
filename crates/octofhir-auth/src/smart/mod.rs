//! SMART on FHIR implementation.
//!
//! This module provides SMART on FHIR specific functionality:
//!
//! - Clinical scope parsing (SMART v1 `read`/`write` and v2 `cruds`)
//! - Lenient parsing of a token's full scope grant

pub mod scopes;

pub use scopes::{ClinicalScope, ClinicalScopes, Permissions, ResourceSelector, ScopeError};
