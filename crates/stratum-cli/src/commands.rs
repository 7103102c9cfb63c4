//! CLI command implementations
//!
//! Path-level commands (resolve, explain, scan) live in this file;
//! declaration management is in `commands/config.rs`.

pub mod config;

use stratum_core::path::relative_to;
use stratum_core::{ConfigLoader, LayerResolver, Result, StratumError};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::OutputFormat;
use crate::output::{OutputFormatter, ScanEntry, ScanSummary};

/// A loaded declaration together with the directory its selectors are
/// relative to
pub(crate) struct Workspace {
    root: PathBuf,
    cwd: PathBuf,
    pub resolver: LayerResolver,
}

impl Workspace {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let cwd = std::env::current_dir()?.canonicalize()?;
        let located = ConfigLoader::locate(config_path.as_deref(), Some(&cwd))?;
        let config_path = located
            .canonicalize()
            .map_err(|e| StratumError::io_error(&located, e))?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        let declaration = ConfigLoader::load_from_file(&config_path)?;
        let resolver = declaration.build_resolver()?;
        info!(
            "Loaded {} layers from {}",
            resolver.len(),
            config_path.display()
        );

        Ok(Self {
            root,
            cwd,
            resolver,
        })
    }

    /// Selector-relative form of a path given on the command line
    pub fn relative(&self, path: &Path) -> String {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        };
        let relative = relative_to(&absolute, &self.root);
        if absolute.strip_prefix(&self.root).is_err() {
            warn!(
                "{} is outside {}; resolving it as '{}'",
                path.display(),
                self.root.display(),
                relative
            );
        }
        relative
    }
}

/// Resolve command implementation
pub fn resolve_command(
    paths: Vec<PathBuf>,
    format: OutputFormat,
    use_colors: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let relative: Vec<String> = paths.iter().map(|p| workspace.relative(p)).collect();
    debug!("Resolving {} paths", relative.len());

    let resolutions = workspace.resolver.resolve_many(&relative);
    let formatter = OutputFormatter::new(format, use_colors);
    formatter.print_resolutions(&relative, &resolutions)
}

/// Explain command implementation
pub fn explain_command(
    path: PathBuf,
    format: OutputFormat,
    use_colors: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let relative = workspace.relative(&path);
    let explanation = workspace.resolver.explain(&relative);

    let formatter = OutputFormatter::new(format, use_colors);
    formatter.print_explanation(&explanation, &workspace.resolver)
}

/// Scan command implementation
pub fn scan_command(
    dir: PathBuf,
    format: OutputFormat,
    excluded_only: bool,
    use_colors: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let start = Instant::now();
    let workspace = Workspace::load(config_path)?;

    if !dir.is_dir() {
        return Err(StratumError::config_error(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let files = collect_files(&dir)?;
    let relative: Vec<String> = files.iter().map(|f| workspace.relative(f)).collect();
    info!("Scanning {} files under {}", relative.len(), dir.display());

    let resolutions = workspace.resolver.resolve_many(&relative);

    let mut summary = ScanSummary::new();
    let entries: Vec<ScanEntry> = relative
        .into_iter()
        .zip(resolutions)
        .filter_map(|(path, resolution)| {
            summary.record(&resolution);
            if excluded_only && !resolution.is_excluded() {
                return None;
            }
            Some(ScanEntry { path, resolution })
        })
        .collect();
    summary.duration = start.elapsed();

    let formatter = OutputFormatter::new(format, use_colors);
    formatter.print_scan(&entries, &summary)
}

/// Every regular file below `dir`, sorted for stable output
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            match e.into_io_error() {
                Some(source) => StratumError::io_error(path, source),
                None => StratumError::config_error(format!(
                    "Filesystem loop detected at {}",
                    path.display()
                )),
            }
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
