//! Rule compilation for a whole grant, and first-match evaluation.
//!
//! [`SmartRuleCompiler`] turns every clinical scope of a token into rules and
//! concatenates them in grant order. [`RuleSet::evaluate`] walks the result
//! the way an enforcement layer would: the first matching rule decides, and a
//! request matched by nothing is denied.

use std::sync::Arc;

use indexmap::IndexMap;
use octofhir_core::ResourceTypeResolver;
use serde::Serialize;

use super::builder::{BuildOptions, CompartmentResolver, CompartmentRuleBuilder};
use super::rules::{AccessRequest, AuthRule, RuleEffect};
use crate::AuthResult;
use crate::config::{ConfigError, SmartConfig};
use crate::smart::scopes::{ClinicalScope, ClinicalScopes};

// =============================================================================
// Compiler
// =============================================================================

/// Compiles granted clinical scopes into a [`RuleSet`].
///
/// Holds no per-request state and can be shared across threads.
#[derive(Clone)]
pub struct SmartRuleCompiler {
    compartments: Arc<dyn CompartmentResolver>,
    resource_types: Arc<dyn ResourceTypeResolver>,
    options: BuildOptions,
}

impl SmartRuleCompiler {
    pub fn new(
        compartments: Arc<dyn CompartmentResolver>,
        resource_types: Arc<dyn ResourceTypeResolver>,
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

    /// Build a compiler from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error of `config`.
    pub fn from_config(config: &SmartConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = config.resource_type_registry()?;
        let compartments: IndexMap<String, String> = config.compartments.clone();
        let options = BuildOptions {
            on_unsupported_resource: config.on_unsupported_resource,
            disabled_permissions: config.disabled_permissions()?,
        };

        tracing::debug!(
            compartments = compartments.len(),
            resource_types = registry.len(),
            "Configured SMART rule compiler"
        );

        Ok(Self::new(Arc::new(compartments), Arc::new(registry)).with_options(options))
    }

    /// Compile a single scope.
    pub fn compile(
        &self,
        scope: &ClinicalScope,
        launch_ctx: Option<&str>,
    ) -> AuthResult<Vec<AuthRule>> {
        CompartmentRuleBuilder::new(self.compartments.as_ref(), self.resource_types.as_ref())
            .with_options(self.options)
            .build_rules(launch_ctx, scope)
    }

    /// Compile every scope of a grant and concatenate the rules in grant order.
    ///
    /// # Errors
    ///
    /// Fails on the first scope that fails; no rules are returned then.
    pub fn compile_all(
        &self,
        scopes: &ClinicalScopes,
        launch_ctx: Option<&str>,
    ) -> AuthResult<RuleSet> {
        let mut rules = Vec::new();
        for scope in scopes {
            rules.extend(self.compile(scope, launch_ctx)?);
        }
        tracing::debug!(scopes = scopes.len(), rules = rules.len(), "Compiled grant");
        Ok(RuleSet { rules })
    }

    /// Parse a raw scope string and compile its clinical scopes.
    pub fn compile_grants(
        &self,
        scope_string: &str,
        launch_ctx: Option<&str>,
    ) -> AuthResult<RuleSet> {
        self.compile_all(&ClinicalScopes::parse(scope_string), launch_ctx)
    }
}

impl std::fmt::Debug for SmartRuleCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartRuleCompiler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Rule Set
// =============================================================================

/// An ordered list of compiled rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<AuthRule>,
}

impl RuleSet {
    pub fn iter(&self) -> std::slice::Iter<'_, AuthRule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn into_rules(self) -> Vec<AuthRule> {
        self.rules
    }

    /// Decide `request`: the first matching rule wins, no match denies.
    #[must_use]
    pub fn evaluate(&self, request: &AccessRequest) -> Verdict {
        match self
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(request))
        {
            Some((index, rule)) => Verdict {
                effect: rule.effect,
                rule: Some(index),
                reason: rule.reason.clone().unwrap_or_else(|| rule.to_string()),
            },
            None => Verdict {
                effect: RuleEffect::Deny,
                rule: None,
                reason: "No rule matched the request".to_string(),
            },
        }
    }
}

impl From<Vec<AuthRule>> for RuleSet {
    fn from(rules: Vec<AuthRule>) -> Self {
        Self { rules }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a AuthRule;
    type IntoIter = std::slice::Iter<'a, AuthRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

// =============================================================================
// Verdict
// =============================================================================

/// Outcome of evaluating a request against a [`RuleSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub effect: RuleEffect,
    /// Index of the deciding rule; `None` for the implicit deny.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<usize>,
    pub reason: String,
}

impl Verdict {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.effect == RuleEffect::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnsupportedResourcePolicy;
    use crate::error::AuthError;
    use crate::policy::rules::RuleVerb;
    use octofhir_core::FhirReference;

    fn compiler() -> SmartRuleCompiler {
        SmartRuleCompiler::from_config(&SmartConfig::default()).unwrap()
    }

    fn patient(id: &str) -> FhirReference {
        FhirReference::new("Patient", id)
    }

    #[test]
    fn test_compile_all_concatenates_in_order() {
        let rules = compiler()
            .compile_grants("patient/Observation.r patient/Condition.c", Some("123"))
            .unwrap();
        assert_eq!(rules.len(), 2);
        let verbs: Vec<RuleVerb> = rules.iter().map(|r| r.verb).collect();
        assert_eq!(verbs, [RuleVerb::Read, RuleVerb::Create]);
    }

    #[test]
    fn test_compile_all_skips_non_clinical_tokens() {
        let rules = compiler()
            .compile_grants("openid fhirUser launch/patient patient/*.read", Some("123"))
            .unwrap();
        assert_eq!(rules.len(), 3);
    }

    #[test]
    fn test_compile_all_fails_without_partial_result() {
        let err = compiler()
            .compile_grants("patient/Observation.r patient/Bogus.r", Some("123"))
            .unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedScopeResource { .. }));
    }

    #[test]
    fn test_from_config_applies_options() {
        let config = SmartConfig {
            on_unsupported_resource: UnsupportedResourcePolicy::Skip,
            resource_types: vec!["Wearable".to_string()],
            ..SmartConfig::default()
        };
        let compiler = SmartRuleCompiler::from_config(&config).unwrap();
        let rules = compiler
            .compile_grants("patient/Bogus.r patient/Wearable.r", Some("123"))
            .unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let config = SmartConfig {
            disabled_permissions: "x".to_string(),
            ..SmartConfig::default()
        };
        assert!(SmartRuleCompiler::from_config(&config).is_err());
    }

    #[test]
    fn test_evaluate_first_match() {
        let rules = compiler().compile_grants("patient/*.read", Some("123")).unwrap();

        let own =
            AccessRequest::new(RuleVerb::Read, "Observation").in_compartment(patient("123"));
        let verdict = rules.evaluate(&own);
        assert!(verdict.is_allowed());
        assert_eq!(verdict.rule, Some(0));

        let other =
            AccessRequest::new(RuleVerb::Read, "Observation").in_compartment(patient("456"));
        let verdict = rules.evaluate(&other);
        assert!(!verdict.is_allowed());
        assert_eq!(verdict.rule, None);

        let everything = AccessRequest::operation_on_instance("$everything", patient("123"));
        let verdict = rules.evaluate(&everything);
        assert!(verdict.is_allowed());
        assert_eq!(verdict.rule, Some(2));
    }

    #[test]
    fn test_evaluate_deny_all_without_launch() {
        let rules = compiler().compile_grants("patient/*.read", None).unwrap();
        let request =
            AccessRequest::new(RuleVerb::Read, "Observation").in_compartment(patient("123"));
        let verdict = rules.evaluate(&request);
        assert!(!verdict.is_allowed());
        assert_eq!(verdict.rule, Some(0));
        assert!(verdict.reason.contains("no launch context"));
    }

    #[test]
    fn test_empty_rule_set_denies() {
        let verdict = RuleSet::default().evaluate(&AccessRequest::new(RuleVerb::Read, "Patient"));
        assert_eq!(verdict.effect, RuleEffect::Deny);
    }

    #[test]
    fn test_rule_set_serializes_as_array() {
        let rules = compiler().compile_grants("patient/Patient.r", Some("1")).unwrap();
        let json = serde_json::to_value(&rules).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["verb"], "read");
    }

    #[test]
    fn test_compiler_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SmartRuleCompiler>();
    }
}
