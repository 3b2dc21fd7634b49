//! Compartment-based access rules for SMART clinical scopes.
//!
//! This module turns granted scopes into rules an enforcement layer can apply:
//!
//! - [`rules`]: the rule model and the request facts rules match against
//! - [`builder`]: compiles one scope plus a launch context into rules
//! - [`engine`]: compiles a whole grant and evaluates requests first-match
//!
//! # Example
//!
//! ```
//! use octofhir_auth::config::SmartConfig;
//! use octofhir_auth::policy::{AccessRequest, RuleVerb, SmartRuleCompiler};
//! use octofhir_core::FhirReference;
//!
//! let compiler = SmartRuleCompiler::from_config(&SmartConfig::default()).unwrap();
//! let rules = compiler
//!     .compile_grants("openid patient/Observation.rs", Some("123"))
//!     .unwrap();
//!
//! let request = AccessRequest::new(RuleVerb::Read, "Observation")
//!     .in_compartment(FhirReference::new("Patient", "123"));
//! assert!(rules.evaluate(&request).is_allowed());
//! ```

pub mod builder;
pub mod engine;
pub mod rules;

pub use builder::{BuildOptions, CompartmentResolver, CompartmentRuleBuilder};
pub use engine::{RuleSet, SmartRuleCompiler, Verdict};
pub use rules::{
    AccessRequest, AuthRule, EVERYTHING_OPERATION, OperationConstraint, OperationName,
    ResourceScope, ResponsePolicy, RuleEffect, RuleVerb,
};
