mod cli;
mod commands;
mod config;
mod observability;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use octofhir_auth::policy::SmartRuleCompiler;

use cli::{Cli, Commands, grant_string};
use output::print_error;

/// Exit code of `check` when the request is denied.
const DENIED: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    observability::init_tracing_with_level(&cli.log_level);
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Parse(args) => {
            commands::parse::parse(&grant_string(&args.scopes), format)?;
        }
        Commands::Compile(args) => {
            let compiler = make_compiler(&cli)?;
            commands::compile::compile(
                &compiler,
                &grant_string(&args.scopes),
                args.launch.as_deref(),
                format,
            )?;
        }
        Commands::Check(args) => {
            let compiler = make_compiler(&cli)?;
            let allowed =
                commands::check::check(&compiler, &grant_string(&args.scopes), args, format)?;
            if !allowed {
                return Ok(ExitCode::from(DENIED));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn make_compiler(cli: &Cli) -> Result<SmartRuleCompiler> {
    let config = config::load_smart_config(cli.config.as_deref())?;
    config::ensure_enabled(&config)?;
    Ok(SmartRuleCompiler::from_config(&config)?)
}
