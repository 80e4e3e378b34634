//! Example of loading a target configuration from a YAML file and routing
//! `tracing` output through it.
//!
//! Run with:
//! ```bash
//! cargo run --example config_yaml
//! ```

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Read the YAML configuration file
    let config_path = "demos/config.yaml";
    let config_content = fs::read_to_string(config_path)
        .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));

    // Parse the YAML configuration
    let root: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(&config_content)?;
    let config: rotalog::TargetConfig = serde_yaml::from_value(root["log"].clone())?;

    let target = Arc::new(rotalog::LogTarget::new(config)?);
    rotalog::init_logging(Arc::clone(&target), "debug", None)?;

    tracing::trace!("This is a trace message (filtered out)");
    tracing::debug!("This is a debug message");
    tracing::info!("This is an info message");
    tracing::warn!(error_code = 404, path = "/api/users", "Resource not found");

    target.shutdown()?;
    Ok(())
}
