use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_table(builder: Builder) {
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_denied(msg: &str) {
    println!("{} {}", "✗".red(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}
