//! Compiled authorization rules.
//!
//! An [`AuthRule`] is a plain value: an effect, the class of request it
//! governs and the constraints a request must satisfy for the rule to match.
//! Rules carry no reference to the scope that produced them.

use std::fmt;

use octofhir_core::{FhirReference, ResourceType};
use serde::Serialize;

/// Operation name `$everything`, granted alongside patient-wide search.
pub const EVERYTHING_OPERATION: &str = "$everything";

// =============================================================================
// Rule Parts
// =============================================================================

/// Whether a matching rule grants or refuses the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleEffect {
    Allow,
    Deny,
}

/// The class of request a rule governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleVerb {
    /// Every request. Only used by deny-all rules.
    All,
    Create,
    /// Read, vread, history and search.
    Read,
    /// Update and patch.
    Write,
    Delete,
    /// A named (`$name`) operation.
    Operation,
}

impl fmt::Display for RuleVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::All => "all",
            Self::Create => "create",
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Operation => "operation",
        };
        f.write_str(s)
    }
}

/// Which resource types a rule covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "resourceType")]
pub enum ResourceScope {
    AllResources,
    ResourceType(ResourceType),
}

impl ResourceScope {
    fn covers(&self, resource_type: &str) -> bool {
        match self {
            Self::AllResources => true,
            Self::ResourceType(rt) => rt.is(resource_type),
        }
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllResources => f.write_str("*"),
            Self::ResourceType(rt) => f.write_str(rt.name()),
        }
    }
}

/// Name constraint of an operation rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "name")]
pub enum OperationName {
    AnyName,
    Named(String),
}

impl OperationName {
    fn accepts(&self, name: &str) -> bool {
        match self {
            Self::AnyName => true,
            Self::Named(n) => n == name,
        }
    }
}

/// Constraint on a named operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationConstraint {
    pub name: OperationName,
    /// The instance the operation must be invoked on; `None` for type or
    /// system level invocations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<FhirReference>,
}

/// Whether responses of a matched operation are passed through unfiltered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponsePolicy {
    /// The response may contain resources the other rules would not grant.
    AllowAllResponses,
    #[default]
    Restricted,
}

// =============================================================================
// Auth Rule
// =============================================================================

/// One compiled authorization rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRule {
    pub effect: RuleEffect,
    pub verb: RuleVerb,
    pub resource_scope: ResourceScope,
    /// Restricts the rule to resources in the compartment of this instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compartment: Option<FhirReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationConstraint>,
    pub response_policy: ResponsePolicy,
    /// Human-readable explanation, set on deny rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuthRule {
    /// A rule refusing every request.
    #[must_use]
    pub fn deny_all(reason: impl Into<String>) -> Self {
        Self {
            effect: RuleEffect::Deny,
            verb: RuleVerb::All,
            resource_scope: ResourceScope::AllResources,
            compartment: None,
            operation: None,
            response_policy: ResponsePolicy::Restricted,
            reason: Some(reason.into()),
        }
    }

    /// Allow `verb` on `resource_scope` inside the compartment of `anchor`.
    #[must_use]
    pub fn allow_in_compartment(
        verb: RuleVerb,
        resource_scope: ResourceScope,
        anchor: FhirReference,
    ) -> Self {
        Self {
            effect: RuleEffect::Allow,
            verb,
            resource_scope,
            compartment: Some(anchor),
            operation: None,
            response_policy: ResponsePolicy::Restricted,
            reason: None,
        }
    }

    /// Allow an operation invoked on one instance, passing every response through.
    #[must_use]
    pub fn allow_operation_on_instance(name: OperationName, instance: FhirReference) -> Self {
        Self {
            effect: RuleEffect::Allow,
            verb: RuleVerb::Operation,
            resource_scope: ResourceScope::AllResources,
            compartment: None,
            operation: Some(OperationConstraint {
                name,
                instance: Some(instance),
            }),
            response_policy: ResponsePolicy::AllowAllResponses,
            reason: None,
        }
    }

    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.effect == RuleEffect::Allow
    }

    /// Check whether `request` falls under this rule.
    #[must_use]
    pub fn matches(&self, request: &AccessRequest) -> bool {
        if self.verb == RuleVerb::All {
            return true;
        }
        if self.verb != request.verb {
            return false;
        }

        if let Some(op) = &self.operation {
            let Some(name) = request.operation.as_deref() else {
                return false;
            };
            if !op.name.accepts(name) {
                return false;
            }
            if let Some(instance) = &op.instance
                && request.instance.as_ref() != Some(instance)
            {
                return false;
            }
        }

        if !self.resource_scope.covers(&request.resource_type) {
            return false;
        }

        match &self.compartment {
            Some(anchor) => request.is_in_compartment(anchor),
            None => true,
        }
    }
}

impl fmt::Display for AuthRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let effect = match self.effect {
            RuleEffect::Allow => "allow",
            RuleEffect::Deny => "deny",
        };
        write!(f, "{effect} {}", self.verb)?;
        if let Some(op) = &self.operation {
            match &op.name {
                OperationName::AnyName => write!(f, " (any)")?,
                OperationName::Named(n) => write!(f, " {n}")?,
            }
            if let Some(instance) = &op.instance {
                write!(f, " on {instance}")?;
            }
        } else if self.verb != RuleVerb::All {
            write!(f, " {}", self.resource_scope)?;
        }
        if let Some(anchor) = &self.compartment {
            write!(f, " in compartment {anchor}")?;
        }
        if let Some(reason) = &self.reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Access Request
// =============================================================================

/// The facts about one incoming request that rules are matched against.
///
/// Compartment membership of the target resource is computed by the caller;
/// rules only compare anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub verb: RuleVerb,
    pub resource_type: String,
    /// Operation name for `RuleVerb::Operation` requests, e.g. `$everything`.
    pub operation: Option<String>,
    /// The instance the request targets, if any.
    pub instance: Option<FhirReference>,
    /// Compartments the target resource belongs to.
    pub compartments: Vec<FhirReference>,
}

impl AccessRequest {
    /// A CRUD/search request against `resource_type`.
    #[must_use]
    pub fn new(verb: RuleVerb, resource_type: impl Into<String>) -> Self {
        Self {
            verb,
            resource_type: resource_type.into(),
            operation: None,
            instance: None,
            compartments: Vec::new(),
        }
    }

    /// An operation invoked on one instance.
    #[must_use]
    pub fn operation_on_instance(name: impl Into<String>, instance: FhirReference) -> Self {
        Self {
            verb: RuleVerb::Operation,
            resource_type: instance.resource_type.clone(),
            operation: Some(name.into()),
            instance: Some(instance),
            compartments: Vec::new(),
        }
    }

    #[must_use]
    pub fn on_instance(mut self, instance: FhirReference) -> Self {
        self.instance = Some(instance);
        self
    }

    #[must_use]
    pub fn in_compartment(mut self, anchor: FhirReference) -> Self {
        self.compartments.push(anchor);
        self
    }

    /// An anchor instance always belongs to its own compartment.
    #[must_use]
    pub fn is_in_compartment(&self, anchor: &FhirReference) -> bool {
        self.compartments.contains(anchor) || self.instance.as_ref() == Some(anchor)
    }
}
