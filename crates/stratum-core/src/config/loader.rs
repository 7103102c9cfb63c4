//! Declaration file discovery and loading

use super::declaration::Declaration;
use crate::error::{Result, StratumError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Declaration file names in discovery priority order
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".stratumrc.json",
    ".stratumrc.toml",
    "stratum.yaml",
    "stratum.yml",
    "stratum.json",
    "stratum.jsonc",
];

/// Loader for discovering and reading declaration files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Auto-discover a declaration file by traversing upward from `start_path`
    ///
    /// Every directory is checked for the names in [`CONFIG_FILE_NAMES`], in
    /// order, until one is found or the filesystem root is reached.
    pub fn auto_discover(start_path: &Path) -> Result<Option<PathBuf>> {
        let mut current = start_path
            .canonicalize()
            .map_err(|e| StratumError::config_error(format!("Invalid path: {e}")))?;

        loop {
            for filename in CONFIG_FILE_NAMES {
                let config_path = current.join(filename);
                if config_path.is_file() {
                    debug!("Found config: {}", config_path.display());
                    return Ok(Some(config_path));
                }
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    /// Pick the declaration file to use: `custom_path` when given, otherwise
    /// the nearest discovered file above `start_dir` (or the current
    /// directory).
    pub fn locate(custom_path: Option<&Path>, start_dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = custom_path {
            if !path.exists() {
                return Err(StratumError::config_error(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Ok(path.to_path_buf());
        }

        let search_dir = start_dir.unwrap_or_else(|| Path::new("."));
        Self::auto_discover(search_dir)?.ok_or_else(|| {
            StratumError::config_error(format!(
                "No config file found ({}). Run 'stratum config init' to create one",
                CONFIG_FILE_NAMES.join(", ")
            ))
        })
    }

    /// Load a declaration from path or auto-discovery
    pub fn load(custom_path: Option<&Path>, start_dir: Option<&Path>) -> Result<Declaration> {
        let config_path = Self::locate(custom_path, start_dir)?;
        Self::load_from_file(&config_path)
    }

    /// Load a declaration file and everything it extends
    pub fn load_from_file(path: &Path) -> Result<Declaration> {
        let mut chain = Vec::new();
        Self::load_with_chain(path, &mut chain)
    }

    fn load_with_chain(path: &Path, chain: &mut Vec<PathBuf>) -> Result<Declaration> {
        let canonical = path
            .canonicalize()
            .map_err(|e| StratumError::io_error(path, e))?;

        if chain.contains(&canonical) {
            let cycle = chain
                .iter()
                .chain(std::iter::once(&canonical))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(StratumError::config_error(format!(
                "Circular extends: {cycle}"
            )));
        }

        let content =
            fs::read_to_string(&canonical).map_err(|e| StratumError::io_error(&canonical, e))?;
        let mut declaration = Self::parse_content(&content, &canonical)?;
        declaration.mark_origin(&canonical);
        debug!(
            "Loaded {} layers from {}",
            declaration.layers.len(),
            canonical.display()
        );

        if declaration.extends.is_empty() {
            return Ok(declaration);
        }

        let base_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        chain.push(canonical.clone());
        let mut inherited = Declaration::default();
        for target in &declaration.extends {
            let target_path = if Path::new(target).is_absolute() {
                PathBuf::from(target)
            } else {
                base_dir.join(target)
            };

            if !target_path.exists() {
                return Err(StratumError::config_error(format!(
                    "Extended config '{}' not found (referenced from '{}')",
                    target_path.display(),
                    canonical.display()
                )));
            }

            // Later entries in `extends` take precedence over earlier ones
            let mut parent = Self::load_with_chain(&target_path, chain)?;
            parent.merge_with(inherited);
            inherited = parent;
        }
        chain.pop();

        declaration.merge_with(inherited);
        Ok(declaration)
    }

    /// Parse declaration content based on file extension
    pub fn parse_content(content: &str, path: &Path) -> Result<Declaration> {
        let parse_error = |message: String| StratumError::parse_error(path, message);

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") | Some("jsonc") => {
                json5::from_str(content).map_err(|e| parse_error(e.to_string()))
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))
            }
            Some("toml") => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            _ => {
                // Detect format by content
                if content.trim_start().starts_with('{') {
                    json5::from_str(content).map_err(|e| parse_error(e.to_string()))
                } else {
                    toml::from_str(content).map_err(|e| parse_error(e.to_string()))
                }
            }
        }
    }
}
