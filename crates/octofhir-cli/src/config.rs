use std::path::Path;

use anyhow::{Context, Result};
use octofhir_auth::config::SmartConfig;

/// Load the SMART configuration from `path`, or the validated defaults.
pub fn load_smart_config(path: Option<&Path>) -> Result<SmartConfig> {
    let Some(path) = path else {
        let config = SmartConfig::default();
        config.validate()?;
        return Ok(config);
    };

    let config = SmartConfig::load(path)
        .with_context(|| format!("Cannot load configuration from {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Loaded SMART configuration");
    Ok(config)
}

/// Refuse to compile rules when SMART compilation is switched off.
pub fn ensure_enabled(config: &SmartConfig) -> Result<()> {
    if !config.enabled {
        anyhow::bail!("SMART rule compilation is disabled (smart.enabled = false)");
    }
    Ok(())
}
