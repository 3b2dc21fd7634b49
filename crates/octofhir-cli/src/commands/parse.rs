use anyhow::Result;
use octofhir_auth::smart::ClinicalScope;
use serde::Serialize;
use tabled::builder::Builder;

use crate::cli::OutputFormat;
use crate::output::{print_json, print_table};

/// How one granted token was understood.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeReport {
    pub scope: String,
    pub clinical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compartment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

pub fn report(grant: &str) -> Vec<ScopeReport> {
    grant
        .split_whitespace()
        .map(|token| match ClinicalScope::parse(token) {
            Ok(scope) => ScopeReport {
                scope: token.to_string(),
                clinical: true,
                compartment: Some(scope.compartment().to_string()),
                resource: Some(scope.resource().to_string()),
                permissions: Some(scope.permissions().to_string()),
                error: None,
                category: None,
            },
            Err(e) => ScopeReport {
                scope: token.to_string(),
                clinical: false,
                compartment: None,
                resource: None,
                permissions: None,
                error: Some(e.to_string()),
                category: Some(e.category().to_string()),
            },
        })
        .collect()
}

pub fn parse(grant: &str, format: OutputFormat) -> Result<()> {
    let reports = report(grant);

    match format {
        OutputFormat::Json => print_json(&reports)?,
        OutputFormat::Table => {
            let mut builder = Builder::default();
            builder.push_record(["Scope", "Compartment", "Resource", "Permissions", "Status"]);
            for r in &reports {
                let status = if r.clinical { "ok" } else { "ignored" };
                builder.push_record([
                    r.scope.as_str(),
                    r.compartment.as_deref().unwrap_or("-"),
                    r.resource.as_deref().unwrap_or("-"),
                    r.permissions.as_deref().unwrap_or("-"),
                    status,
                ]);
            }
            print_table(builder);
        }
    }
    Ok(())
}
