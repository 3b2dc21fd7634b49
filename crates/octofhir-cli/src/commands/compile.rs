use anyhow::Result;
use octofhir_auth::policy::{AuthRule, OperationName, ResponsePolicy, RuleSet, SmartRuleCompiler};
use octofhir_auth::smart::ClinicalScopes;
use tabled::builder::Builder;

use crate::cli::OutputFormat;
use crate::output::{print_json, print_table};

pub fn compile_rules(
    compiler: &SmartRuleCompiler,
    grant: &str,
    launch: Option<&str>,
) -> Result<RuleSet> {
    let scopes = ClinicalScopes::parse(grant);
    if scopes.is_empty() {
        tracing::warn!(grant, "No clinical scopes in grant; every request will be denied");
    }
    compiler.compile_all(&scopes, launch).map_err(|e| {
        let category = e.category();
        anyhow::Error::new(e).context(format!("Cannot compile granted scopes ({category} error)"))
    })
}

pub fn compile(
    compiler: &SmartRuleCompiler,
    grant: &str,
    launch: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let rules = compile_rules(compiler, grant, launch)?;

    match format {
        OutputFormat::Json => print_json(&rules)?,
        OutputFormat::Table => {
            if rules.is_empty() {
                println!("No rules. Every request is denied.");
                return Ok(());
            }
            print_table(rules_table(&rules));
        }
    }
    Ok(())
}

pub fn rules_table(rules: &RuleSet) -> Builder {
    let mut builder = Builder::default();
    builder.push_record([
        "#",
        "Effect",
        "Verb",
        "Resources",
        "Compartment",
        "Operation",
        "Responses",
    ]);
    for (i, rule) in rules.iter().enumerate() {
        builder.push_record(rule_row(i, rule));
    }
    builder
}

fn rule_row(index: usize, rule: &AuthRule) -> [String; 7] {
    let effect = if rule.is_allow() { "allow" } else { "deny" };
    let compartment = rule
        .compartment
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    let operation = match &rule.operation {
        Some(op) => {
            let name = match &op.name {
                OperationName::AnyName => "(any)".to_string(),
                OperationName::Named(n) => n.clone(),
            };
            match &op.instance {
                Some(instance) => format!("{name} on {instance}"),
                None => name,
            }
        }
        None => "-".to_string(),
    };
    let responses = match rule.response_policy {
        ResponsePolicy::AllowAllResponses => "all",
        ResponsePolicy::Restricted => "restricted",
    };
    [
        index.to_string(),
        effect.to_string(),
        rule.verb.to_string(),
        rule.resource_scope.to_string(),
        compartment,
        operation,
        responses.to_string(),
    ]
}
