//! # octofhir-auth
//!
//! SMART on FHIR clinical scope authorization for the OctoFHIR server.
//!
//! This crate provides:
//! - Parsing of SMART v1 and v2 clinical scopes
//! - Compilation of granted scopes and a launch context into compartment rules
//! - First-match evaluation of compiled rules
//!
//! ## Overview
//!
//! A clinical scope such as `patient/Observation.rs` grants access to the
//! resources of one compartment. The compartment instance is fixed by the
//! launch context of the session, e.g. patient `123`. Compilation confines
//! every granted permission to `Patient/123`, and denies everything when no
//! launch context is present.
//!
//! ## Modules
//!
//! - [`config`] - Rule compilation configuration
//! - [`smart`] - SMART on FHIR clinical scopes
//! - [`policy`] - Rule model, rule builder and evaluation
//! - [`error`] - Authorization errors

pub mod config;
pub mod error;
pub mod policy;
pub mod smart;

pub use config::{ConfigError, SmartConfig, UnsupportedResourcePolicy};
pub use error::{AuthError, ErrorCategory};
pub use policy::{
    AccessRequest, AuthRule, BuildOptions, CompartmentResolver, CompartmentRuleBuilder,
    EVERYTHING_OPERATION, OperationConstraint, OperationName, ResourceScope, ResponsePolicy,
    RuleEffect, RuleSet, RuleVerb, SmartRuleCompiler, Verdict,
};
pub use smart::{ClinicalScope, ClinicalScopes, Permissions, ResourceSelector, ScopeError};

/// Type alias for authorization results.
pub type AuthResult<T> = Result<T, AuthError>;
