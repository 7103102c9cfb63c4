//! Configuration management commands

use indexmap::IndexMap;
use serde_json::json;
use stratum_core::{ConfigLoader, Declaration, LayerDeclaration, Result, StratumError};
use std::path::PathBuf;
use tracing::{debug, error};

use crate::ConfigFormat;

/// Config init command implementation
pub fn init_command(format: ConfigFormat, force: bool) -> Result<()> {
    debug!("Initializing declaration file with format: {:?}", format);

    let filename = match format {
        ConfigFormat::Yaml => "stratum.yaml",
        ConfigFormat::Json => ".stratumrc.json",
        ConfigFormat::Toml => ".stratumrc.toml",
    };
    let config_path = PathBuf::from(filename);

    if config_path.exists() && !force {
        error!(
            "Declaration file '{}' already exists. Use --force to overwrite.",
            filename
        );
        return Err(StratumError::config_error(format!(
            "Declaration file '{filename}' already exists"
        )));
    }

    let declaration = starter_declaration();
    let content = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&declaration).map_err(|e| {
            StratumError::config_error(format!("Failed to serialize YAML: {e}"))
        })?,
        ConfigFormat::Json => serde_json::to_string_pretty(&declaration).map_err(|e| {
            StratumError::config_error(format!("Failed to serialize JSON: {e}"))
        })?,
        ConfigFormat::Toml => toml::to_string_pretty(&declaration).map_err(|e| {
            StratumError::config_error(format!("Failed to serialize TOML: {e}"))
        })?,
    };

    std::fs::write(&config_path, content).map_err(|e| StratumError::io_error(&config_path, e))?;

    println!("✅ Created declaration file: {filename}");
    println!("   Edit the layers to describe your project.");
    Ok(())
}

/// Config validate command implementation
pub fn validate_command(path: Option<PathBuf>) -> Result<()> {
    debug!("Validating declaration file: {:?}", path);

    let config_path = ConfigLoader::locate(path.as_deref(), None)?;
    let validated = ConfigLoader::load_from_file(&config_path)
        .and_then(|declaration| declaration.build_resolver().map(|r| (declaration, r)));

    match validated {
        Ok((declaration, resolver)) => {
            let ignore_layers = resolver.layers().iter().filter(|l| l.is_ignore()).count();
            println!("✅ Declaration is valid: {}", config_path.display());
            println!(
                "   Layers: {} ({} ignore)",
                resolver.len(),
                ignore_layers
            );
            println!("   Policies: {}", declaration.policies.len());
            Ok(())
        }
        Err(e) => {
            error!("❌ Declaration validation failed");
            Err(e)
        }
    }
}

/// Config show command implementation
pub fn show_command(config_path: Option<PathBuf>) -> Result<()> {
    let path = ConfigLoader::locate(config_path.as_deref(), None)?;
    debug!("Showing declaration {}", path.display());

    let declaration = ConfigLoader::load_from_file(&path)?;
    let json = serde_json::to_string_pretty(&declaration)
        .map_err(|e| StratumError::config_error(format!("Failed to serialize declaration: {e}")))?;
    println!("{json}");
    Ok(())
}

/// Config schema command implementation
pub fn schema_command() -> Result<()> {
    let schema = serde_json::to_string_pretty(&Declaration::json_schema())
        .map_err(|e| StratumError::config_error(format!("Failed to serialize schema: {e}")))?;
    println!("{schema}");
    Ok(())
}

/// A small cascade showing each kind of layer
fn starter_declaration() -> Declaration {
    let mut policies = IndexMap::new();
    policies.insert("globals".to_string(), "merge".to_string());

    Declaration {
        policies,
        layers: vec![
            LayerDeclaration {
                name: Some("base".to_string()),
                files: vec!["**/*.{js,ts,tsx}".to_string()],
                settings: IndexMap::from([
                    ("no-debugger".to_string(), json!("error")),
                    (
                        "no-console".to_string(),
                        json!(["error", {"allow": ["warn", "error"]}]),
                    ),
                ]),
                ..Default::default()
            },
            LayerDeclaration {
                name: Some("tests".to_string()),
                files: vec!["**/*.test.{ts,tsx}".to_string()],
                settings: IndexMap::from([
                    ("no-console".to_string(), json!("off")),
                    ("globals".to_string(), json!({"describe": "readonly", "it": "readonly"})),
                ]),
                ..Default::default()
            },
            LayerDeclaration {
                ignores: vec!["**/dist/".to_string(), "**/node_modules/".to_string()],
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}
