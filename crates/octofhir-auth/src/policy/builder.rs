//! Compartment rule builder.
//!
//! Compiles one [`ClinicalScope`] plus the session's launch context into the
//! ordered list of [`AuthRule`]s that enforce it. Every allow rule is confined
//! to the compartment of the launch context resource, e.g. `Patient/123`.

use std::collections::HashMap;

use indexmap::IndexMap;
use octofhir_core::{FhirReference, ResourceTypeResolver};

use super::rules::{AuthRule, EVERYTHING_OPERATION, OperationName, ResourceScope, RuleVerb};
use crate::AuthResult;
use crate::config::{SmartConfig, UnsupportedResourcePolicy};
use crate::error::AuthError;
use crate::smart::scopes::{ClinicalScope, Permissions};

/// Anchor type of the compartment for which `$everything` is granted.
const PATIENT: &str = "Patient";

/// Maps a scope compartment (e.g. `patient`) to the resource type its launch
/// context identifies (e.g. `Patient`).
pub trait CompartmentResolver: Send + Sync {
    fn anchor_type(&self, compartment: &str) -> Option<String>;
}

impl CompartmentResolver for SmartConfig {
    fn anchor_type(&self, compartment: &str) -> Option<String> {
        self.compartments.get(compartment).cloned()
    }
}

impl CompartmentResolver for IndexMap<String, String> {
    fn anchor_type(&self, compartment: &str) -> Option<String> {
        self.get(compartment).cloned()
    }
}

impl CompartmentResolver for HashMap<String, String> {
    fn anchor_type(&self, compartment: &str) -> Option<String> {
        self.get(compartment).cloned()
    }
}

/// Deployment-specific knobs of rule compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub on_unsupported_resource: UnsupportedResourcePolicy,
    /// Permissions no scope may grant; scopes using them fail to compile.
    pub disabled_permissions: Permissions,
}

/// Builds the rules for one clinical scope.
pub struct CompartmentRuleBuilder<'a> {
    compartments: &'a dyn CompartmentResolver,
    resource_types: &'a dyn ResourceTypeResolver,
    options: BuildOptions,
}

impl<'a> CompartmentRuleBuilder<'a> {
    pub fn new(
        compartments: &'a dyn CompartmentResolver,
        resource_types: &'a dyn ResourceTypeResolver,
    ) -> Self {
        Self {
            compartments,
            resource_types,
            options: BuildOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Compile `scope` for a session whose launch context is `launch_ctx`.
    ///
    /// Without a launch context the scope compiles to a single deny-all rule.
    /// Otherwise each granted permission yields an allow rule confined to the
    /// launch context's compartment, in create, read, update, delete, search
    /// order, followed by the operation rules.
    ///
    /// # Errors
    ///
    /// - `UnsupportedScopeResource` if the scope names an unknown resource type
    ///   (unless configured to skip such scopes)
    /// - `UnsupportedScopeOperation` if the scope grants a disabled permission
    ///
    /// A scope whose compartment has no configured anchor type compiles to no
    /// rules. No partial rule list is ever returned alongside an error.
    pub fn build_rules(
        &self,
        launch_ctx: Option<&str>,
        scope: &ClinicalScope,
    ) -> AuthResult<Vec<AuthRule>> {
        let Some(launch_ctx) = launch_ctx.filter(|ctx| !ctx.is_empty()) else {
            return Ok(vec![AuthRule::deny_all(format!(
                "Deny ALL {} requests if no launch context is given!",
                scope.compartment()
            ))]);
        };

        let permissions = scope.permissions();
        if permissions.is_empty() {
            return Ok(Vec::new());
        }

        let Some(anchor_type) = self.compartments.anchor_type(scope.compartment()) else {
            // Scopes of other access contexts (e.g. `system`) are left to other rule sources
            tracing::warn!(
                scope = %scope,
                compartment = scope.compartment(),
                "Skipping scope of compartment without anchor type"
            );
            return Ok(Vec::new());
        };
        self.check_permissions(permissions)?;
        let anchor = FhirReference::new(anchor_type, launch_ctx);

        let resource_scope = match self.resource_scope(scope) {
            Ok(resource_scope) => resource_scope,
            Err(e) if self.options.on_unsupported_resource == UnsupportedResourcePolicy::Skip => {
                tracing::warn!(
                    scope = %scope,
                    error = %e,
                    "Skipping scope with unsupported resource"
                );
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::warn!(scope = %scope, error = %e, "Cannot compile scope");
                return Err(e);
            }
        };

        let scoped =
            |verb| AuthRule::allow_in_compartment(verb, resource_scope.clone(), anchor.clone());
        let mut rules = Vec::new();

        if scope.can_create() {
            rules.push(scoped(RuleVerb::Create));
        }
        if scope.can_read() {
            rules.push(scoped(RuleVerb::Read));
        }
        if scope.can_update() {
            rules.push(scoped(RuleVerb::Write));
        }
        if scope.can_delete() {
            rules.push(scoped(RuleVerb::Delete));
        }
        if scope.can_search() {
            rules.push(scoped(RuleVerb::Read));
            if scope.resource().is_wildcard() && anchor.resource_type == PATIENT {
                rules.push(AuthRule::allow_operation_on_instance(
                    OperationName::Named(EVERYTHING_OPERATION.to_string()),
                    anchor.clone(),
                ));
            }
        }
        // Custom operations may read, alter or delete anything; only full access grants them
        if scope.is_full_cruds() {
            rules.push(AuthRule::allow_operation_on_instance(
                OperationName::AnyName,
                anchor.clone(),
            ));
        }

        tracing::debug!(
            scope = %scope,
            anchor = %anchor,
            rules = rules.len(),
            "Compiled clinical scope"
        );
        Ok(rules)
    }

    fn check_permissions(&self, granted: Permissions) -> AuthResult<()> {
        let disabled = self.options.disabled_permissions;
        match ['c', 'r', 'u', 'd', 's']
            .into_iter()
            .find(|&p| granted.has(p) && disabled.has(p))
        {
            Some(p) => Err(AuthError::unsupported_scope_operation(p.to_string())),
            None => Ok(()),
        }
    }

    fn resource_scope(&self, scope: &ClinicalScope) -> AuthResult<ResourceScope> {
        if scope.resource().is_wildcard() {
            return Ok(ResourceScope::AllResources);
        }
        let name = scope.resource().to_string();
        self.resource_types
            .resolve(&name)
            .map(ResourceScope::ResourceType)
            .ok_or_else(|| AuthError::unsupported_scope_resource(name))
    }
}
