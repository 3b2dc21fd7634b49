use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use octofhir_auth::policy::RuleVerb;

#[derive(Parser)]
#[command(name = "octofhir-authz")]
#[command(about = "OctoFHIR authz: inspect SMART clinical scopes and the rules they compile to")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML file with a [smart] table (defaults are used if omitted)
    #[arg(short, long, global = true, env = "OCTOFHIR_AUTHZ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log level for diagnostics on stderr (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse scopes and show which are clinical scopes
    Parse(ParseArgs),
    /// Compile granted scopes into access rules
    Compile(CompileArgs),
    /// Evaluate one request against the compiled rules
    Check(CheckArgs),
}

#[derive(clap::Args)]
pub struct ParseArgs {
    /// Scope tokens (space-separated strings are split)
    #[arg(required = true)]
    pub scopes: Vec<String>,
}

#[derive(clap::Args)]
pub struct CompileArgs {
    /// Launch context id, e.g. the patient id of an EHR launch
    #[arg(short, long)]
    pub launch: Option<String>,
    /// Granted scope tokens (space-separated strings are split)
    #[arg(required = true)]
    pub scopes: Vec<String>,
}

/// Request kind, as seen by the rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Verb {
    Create,
    /// Read, vread, history and search
    Read,
    /// Update and patch
    Write,
    Delete,
    /// A named operation on an instance (requires --operation and --instance)
    Operation,
}

impl From<Verb> for RuleVerb {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Create => RuleVerb::Create,
            Verb::Read => RuleVerb::Read,
            Verb::Write => RuleVerb::Write,
            Verb::Delete => RuleVerb::Delete,
            Verb::Operation => RuleVerb::Operation,
        }
    }
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Launch context id
    #[arg(short, long)]
    pub launch: Option<String>,
    /// Request kind
    #[arg(long)]
    pub verb: Verb,
    /// Resource type of the target (e.g. Observation)
    #[arg(short = 't', long = "type")]
    pub resource_type: Option<String>,
    /// Target instance reference (e.g. Patient/123)
    #[arg(long)]
    pub instance: Option<String>,
    /// Operation name for --verb operation (e.g. $everything)
    #[arg(long)]
    pub operation: Option<String>,
    /// Compartment the target belongs to (repeatable, e.g. Patient/123)
    #[arg(long = "in")]
    pub compartments: Vec<String>,
    /// Granted scope tokens (space-separated strings are split)
    #[arg(required = true)]
    pub scopes: Vec<String>,
}

/// Join scope arguments into one grant string.
pub fn grant_string(scopes: &[String]) -> String {
    scopes.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compile_args() {
        let cli = Cli::try_parse_from([
            "octofhir-authz",
            "compile",
            "--launch",
            "123",
            "patient/*.read openid",
            "user/Observation.rs",
        ])
        .unwrap();
        let Commands::Compile(args) = cli.command else {
            panic!("expected compile");
        };
        assert_eq!(args.launch.as_deref(), Some("123"));
        assert_eq!(
            grant_string(&args.scopes),
            "patient/*.read openid user/Observation.rs"
        );
        assert_eq!(cli.log_level, "warn");
        assert!(cli.format.is_none());
    }

    #[test]
    fn test_parse_check_args() {
        let cli = Cli::try_parse_from([
            "octofhir-authz",
            "--format",
            "table",
            "check",
            "--verb",
            "read",
            "--type",
            "Observation",
            "--in",
            "Patient/123",
            "--in",
            "Encounter/9",
            "patient/*.read",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Table));
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.verb, Verb::Read);
        assert_eq!(args.compartments.len(), 2);
        assert!(args.launch.is_none());
    }

    #[test]
    fn test_scopes_required() {
        assert!(Cli::try_parse_from(["octofhir-authz", "parse"]).is_err());
    }

    #[test]
    fn test_verb_conversion() {
        assert_eq!(RuleVerb::from(Verb::Write), RuleVerb::Write);
        assert_eq!(RuleVerb::from(Verb::Operation), RuleVerb::Operation);
    }
}
