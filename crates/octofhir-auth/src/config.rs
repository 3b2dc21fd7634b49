//! SMART rule compilation configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [smart]
//! enabled = true
//! on_unsupported_resource = "fail"
//! disabled_permissions = "d"
//! resource_types = ["Wearable"]
//!
//! [smart.compartments]
//! patient = "Patient"
//! user = "Practitioner"
//! ```

use std::path::Path;

use indexmap::IndexMap;
use octofhir_core::ResourceTypeRegistry;
use serde::{Deserialize, Serialize};

use crate::smart::scopes::Permissions;

/// Configuration of the SMART clinical scope rule compiler.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SmartConfig {
    /// Enable SMART rule compilation.
    /// When disabled, granted clinical scopes are not turned into rules.
    pub enabled: bool,

    /// Compartment name (as written in scopes) to the anchor resource type
    /// that the launch context identifies.
    pub compartments: IndexMap<String, String>,

    /// Custom resource types supported in addition to FHIR R4.
    pub resource_types: Vec<String>,

    /// What to do with a scope naming an unknown resource type.
    pub on_unsupported_resource: UnsupportedResourcePolicy,

    /// CRUDS letters this deployment refuses to grant, e.g. `"d"`.
    /// Scopes granting one of them fail to compile.
    pub disabled_permissions: String,
}

impl Default for SmartConfig {
    fn default() -> Self {
        let compartments = [
            ("patient", "Patient"),
            ("user", "Practitioner"),
            ("encounter", "Encounter"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            enabled: true,
            compartments,
            resource_types: Vec::new(),
            on_unsupported_resource: UnsupportedResourcePolicy::default(),
            disabled_permissions: String::new(),
        }
    }
}

/// Handling of scopes that name a resource type the server does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedResourcePolicy {
    /// Abort compilation with `UnsupportedScopeResource`.
    #[default]
    Fail,
    /// Compile the scope to no rules and log a warning.
    Skip,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level layout of a configuration file: settings live under `[smart]`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    smart: SmartConfig,
}

impl SmartConfig {
    /// Parse configuration from TOML text containing a `[smart]` table.
    ///
    /// A missing table yields the defaults. The result is validated.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(s)?;
        file.smart.validate()?;
        Ok(file.smart)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - A compartment name contains anything but letters
    /// - A compartment anchor is not a supported resource type
    /// - A custom resource type name is not a valid FHIR type name
    /// - `disabled_permissions` is not an ordered CRUDS letter run
    ///
    /// Returns `ConfigError::Missing` if no compartment is configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compartments.is_empty() {
            return Err(ConfigError::Missing("smart.compartments".to_string()));
        }

        let registry = self.resource_type_registry()?;

        for (compartment, anchor) in &self.compartments {
            if !compartment.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid compartment name: '{}'. Must contain letters only",
                    compartment
                )));
            }
            if !registry.contains(anchor) {
                return Err(ConfigError::InvalidValue(format!(
                    "Compartment '{}' is anchored to unsupported resource type '{}'",
                    compartment, anchor
                )));
            }
        }

        self.disabled_permissions()?;
        Ok(())
    }

    /// The permissions this deployment refuses to grant.
    pub fn disabled_permissions(&self) -> Result<Permissions, ConfigError> {
        self.disabled_permissions.parse().map_err(|e| {
            ConfigError::InvalidValue(format!(
                "Invalid disabled_permissions '{}': {}",
                self.disabled_permissions, e
            ))
        })
    }

    /// The FHIR R4 registry extended with `resource_types`.
    pub fn resource_type_registry(&self) -> Result<ResourceTypeRegistry, ConfigError> {
        let mut registry = ResourceTypeRegistry::r4();
        for name in &self.resource_types {
            registry
                .register(name)
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }
        Ok(registry)
    }
}
