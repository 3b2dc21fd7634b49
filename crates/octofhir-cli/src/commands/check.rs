use anyhow::{Context, Result};
use octofhir_auth::policy::{AccessRequest, RuleVerb, SmartRuleCompiler, Verdict};
use octofhir_core::FhirReference;
use serde::Serialize;

use super::compile::compile_rules;
use crate::cli::{CheckArgs, OutputFormat};
use crate::output::{print_denied, print_json, print_success};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckOutput<'a> {
    allowed: bool,
    #[serde(flatten)]
    verdict: &'a Verdict,
}

fn parse_reference(s: &str) -> Result<FhirReference> {
    s.parse()
        .with_context(|| format!("Invalid reference '{s}', expected Type/id"))
}

/// Build the request described by the command line.
pub fn build_request(args: &CheckArgs) -> Result<AccessRequest> {
    let verb = RuleVerb::from(args.verb);
    let instance = args.instance.as_deref().map(parse_reference).transpose()?;

    let mut request = if verb == RuleVerb::Operation {
        let name = args
            .operation
            .as_deref()
            .context("--verb operation requires --operation")?;
        let instance = instance.context("--verb operation requires --instance")?;
        AccessRequest::operation_on_instance(name, instance)
    } else {
        let resource_type = match (&args.resource_type, &instance) {
            (Some(rt), _) => rt.clone(),
            (None, Some(instance)) => instance.resource_type.clone(),
            (None, None) => anyhow::bail!("--type or --instance is required"),
        };
        let request = AccessRequest::new(verb, resource_type);
        match instance {
            Some(instance) => request.on_instance(instance),
            None => request,
        }
    };

    for compartment in &args.compartments {
        request = request.in_compartment(parse_reference(compartment)?);
    }
    Ok(request)
}

/// Evaluate the request; returns whether it was allowed.
pub fn check(
    compiler: &SmartRuleCompiler,
    grant: &str,
    args: &CheckArgs,
    format: OutputFormat,
) -> Result<bool> {
    let request = build_request(args)?;
    let rules = compile_rules(compiler, grant, args.launch.as_deref())?;
    let verdict = rules.evaluate(&request);
    tracing::debug!(rule = ?verdict.rule, effect = ?verdict.effect, "Evaluated request");

    match format {
        OutputFormat::Json => print_json(&CheckOutput {
            allowed: verdict.is_allowed(),
            verdict: &verdict,
        })?,
        OutputFormat::Table => {
            let by = verdict
                .rule
                .map_or_else(|| "implicit deny".to_string(), |i| format!("rule #{i}"));
            let msg = format!("{} ({by})", verdict.reason);
            if verdict.is_allowed() {
                print_success(&msg);
            } else {
                print_denied(&msg);
            }
        }
    }
    Ok(verdict.is_allowed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Verb;
    use octofhir_auth::config::SmartConfig;

    fn args(verb: Verb) -> CheckArgs {
        CheckArgs {
            launch: Some("123".to_string()),
            verb,
            resource_type: None,
            instance: None,
            operation: None,
            compartments: Vec::new(),
            scopes: vec!["patient/*.read".to_string()],
        }
    }

    fn compiler() -> SmartRuleCompiler {
        SmartRuleCompiler::from_config(&SmartConfig::default()).unwrap()
    }

    #[test]
    fn test_build_read_request() {
        let mut a = args(Verb::Read);
        a.resource_type = Some("Observation".to_string());
        a.compartments = vec!["Patient/123".to_string()];
        let request = build_request(&a).unwrap();
        assert_eq!(request.resource_type, "Observation");
        assert_eq!(request.compartments, vec![FhirReference::new("Patient", "123")]);
    }

    #[test]
    fn test_type_defaults_to_instance_type() {
        let mut a = args(Verb::Read);
        a.instance = Some("Patient/123".to_string());
        let request = build_request(&a).unwrap();
        assert_eq!(request.resource_type, "Patient");
        assert!(request.is_in_compartment(&FhirReference::new("Patient", "123")));
    }

    #[test]
    fn test_operation_needs_name_and_instance() {
        let mut a = args(Verb::Operation);
        assert!(build_request(&a).is_err());
        a.operation = Some("$everything".to_string());
        assert!(build_request(&a).is_err());
        a.instance = Some("Patient/123".to_string());
        let request = build_request(&a).unwrap();
        assert_eq!(request.operation.as_deref(), Some("$everything"));
    }

    #[test]
    fn test_bad_reference() {
        let mut a = args(Verb::Read);
        a.resource_type = Some("Observation".to_string());
        a.compartments = vec!["Patient".to_string()];
        let err = build_request(&a).unwrap_err();
        assert!(err.to_string().contains("'Patient'"));
    }

    #[test]
    fn test_check_verdicts() {
        let compiler = compiler();
        let mut a = args(Verb::Read);
        a.resource_type = Some("Observation".to_string());
        a.compartments = vec!["Patient/123".to_string()];
        let grant = a.scopes.join(" ");
        assert!(check(&compiler, &grant, &a, OutputFormat::Json).unwrap());

        a.compartments = vec!["Patient/456".to_string()];
        assert!(!check(&compiler, &grant, &a, OutputFormat::Table).unwrap());

        a.launch = None;
        a.compartments = vec!["Patient/123".to_string()];
        assert!(!check(&compiler, &grant, &a, OutputFormat::Json).unwrap());
    }
}
