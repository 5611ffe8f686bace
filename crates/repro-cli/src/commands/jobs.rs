//! Supported job types listing

use anyhow::{Context, Result};
use repro_config::{ConfigLoader, Definition};
use serde_json::{json, Map, Value};

pub fn run(json_output: bool) -> Result<()> {
    let config = ConfigLoader::new()
        .load()
        .context("Failed to load configuration")?;

    if json_output {
        let mut jobs = Map::new();
        for (name, definition) in config.catalog.iter() {
            jobs.insert(name.to_string(), serde_json::to_value(definition)?);
        }
        let listing = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "jobs": Value::Object(jobs),
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("repro {}", env!("CARGO_PKG_VERSION"));
    println!("Supported job types:");
    for (name, definition) in config.catalog.iter() {
        println!("  {:<32} {}", name, describe(definition));
    }
    Ok(())
}

fn describe(definition: &Definition) -> String {
    let mut parts = vec![definition.project.to_string()];
    if let Some(sanitizer) = definition.sanitizer {
        parts.push(sanitizer.to_string());
    }
    if definition.arch != Default::default() {
        parts.push(format!("{:?}", definition.arch).to_lowercase());
    }
    parts.join(" ")
}
