//! Output formatting and reporting
//!
//! Human-readable and JSON renderings of resolutions, explanations and scans

use colored::*;
use serde::Serialize;
use stratum_core::{
    EffectiveConfig, Explanation, LayerMatch, LayerResolver, Resolution, Result, SettingValue,
    Severity, StratumError,
};
use std::time::Duration;

use crate::OutputFormat;

/// Counts collected while scanning a directory
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub files_scanned: usize,
    pub excluded: usize,
    pub unmatched: usize,
    pub duration: Duration,
}

impl ScanSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, resolution: &Resolution) {
        self.files_scanned += 1;
        match resolution {
            Resolution::Excluded => self.excluded += 1,
            Resolution::Effective(config) if config.is_empty() => self.unmatched += 1,
            Resolution::Effective(_) => {}
        }
    }

    pub fn included(&self) -> usize {
        self.files_scanned - self.excluded
    }
}

/// One scanned file
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub path: String,
    #[serde(flatten)]
    pub resolution: Resolution,
}

#[derive(Serialize)]
struct PathResolution<'a> {
    path: &'a str,
    #[serde(flatten)]
    resolution: &'a Resolution,
}

/// Output formatter for different formats
pub struct OutputFormatter {
    format: OutputFormat,
    use_colors: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, use_colors: bool) -> Self {
        Self { format, use_colors }
    }

    /// Print the effective configuration of every path
    pub fn print_resolutions(&self, paths: &[String], resolutions: &[Resolution]) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let items: Vec<PathResolution<'_>> = paths
                    .iter()
                    .zip(resolutions)
                    .map(|(path, resolution)| PathResolution { path, resolution })
                    .collect();
                print_json(&items)
            }
            OutputFormat::Human => {
                for (i, (path, resolution)) in paths.iter().zip(resolutions).enumerate() {
                    if i > 0 {
                        println!();
                    }
                    self.print_resolution_human(path, resolution);
                }
                Ok(())
            }
        }
    }

    fn print_resolution_human(&self, path: &str, resolution: &Resolution) {
        match resolution {
            Resolution::Excluded => {
                println!("{} {}", path.bold(), "excluded".dimmed());
            }
            Resolution::Effective(config) if config.is_empty() => {
                println!("{} {}", path.bold(), "(no matching layers)".dimmed());
            }
            Resolution::Effective(config) => {
                println!("{}", path.bold());
                self.print_settings(config);
            }
        }
    }

    fn print_settings(&self, config: &EffectiveConfig) {
        let width = config.keys().map(str::len).max().unwrap_or(0);
        for (key, value) in config.iter() {
            println!("  {key:<width$}  {}", self.paint_value(value));
        }
    }

    fn paint_value(&self, value: &SettingValue) -> String {
        let text = value.to_string();
        if !self.use_colors {
            return text;
        }
        match value.severity() {
            Some(Severity::Error) => text.red().to_string(),
            Some(Severity::Warn) => text.yellow().to_string(),
            Some(Severity::Off) => text.dimmed().to_string(),
            None => text,
        }
    }

    /// Print which layers matched a path and where each key came from
    pub fn print_explanation(
        &self,
        explanation: &Explanation,
        resolver: &LayerResolver,
    ) -> Result<()> {
        if self.format == OutputFormat::Json {
            return print_json(explanation);
        }

        println!("{}", explanation.path.bold());

        if explanation.matched.is_empty() {
            println!("  {}", "No layers match this path".dimmed());
        } else {
            println!("\n{}", "Matched layers:".bold());
            for layer in &explanation.matched {
                let patterns = resolver
                    .layers()
                    .get(layer.index)
                    .map(|l| l.selectors().include_patterns().collect::<Vec<_>>().join(", "))
                    .unwrap_or_default();
                let marker = if layer.ignore {
                    " ignore".red().to_string()
                } else {
                    String::new()
                };
                println!("  {}{}  {}", layer_label(layer), marker, patterns.dimmed());
            }
        }

        if let Some(layer) = &explanation.excluded_by {
            println!(
                "\n{} by {}",
                "Excluded".red().bold(),
                layer_label(layer)
            );
            return Ok(());
        }

        if let Some(config) = explanation.resolution.effective()
            && !config.is_empty()
        {
            println!("\n{}", "Effective settings:".bold());
            let width = config.keys().map(str::len).max().unwrap_or(0);
            for (key, value) in config.iter() {
                let origins = explanation
                    .origins
                    .get(key)
                    .map(|layers| {
                        layers
                            .iter()
                            .map(|i| format!("#{i}"))
                            .collect::<Vec<_>>()
                            .join(" -> ")
                    })
                    .unwrap_or_default();
                println!(
                    "  {key:<width$}  {}  {}",
                    self.paint_value(value),
                    format!("from {origins}").dimmed()
                );
            }
        }

        Ok(())
    }

    /// Print scan results followed by a summary
    pub fn print_scan(&self, entries: &[ScanEntry], summary: &ScanSummary) -> Result<()> {
        if self.format == OutputFormat::Json {
            let result = serde_json::json!({
                "files": entries,
                "summary": {
                    "scanned": summary.files_scanned,
                    "included": summary.included(),
                    "excluded": summary.excluded,
                    "unmatched": summary.unmatched,
                }
            });
            return print_json(&result);
        }

        for entry in entries {
            match &entry.resolution {
                Resolution::Excluded => {
                    println!("  {} {}", "-".red(), entry.path.dimmed());
                }
                Resolution::Effective(config) => {
                    println!(
                        "  {} {} {}",
                        "+".green(),
                        entry.path,
                        format!("({} settings)", config.len()).dimmed()
                    );
                }
            }
        }

        println!("\n{}", "Summary:".bold());
        println!("  Files scanned: {}", summary.files_scanned);
        println!("  Included: {}", summary.included().to_string().green());
        if summary.excluded > 0 {
            println!("  Excluded: {}", summary.excluded.to_string().red());
        }
        if summary.unmatched > 0 {
            println!(
                "  Without settings: {}",
                summary.unmatched.to_string().yellow()
            );
        }
        println!("  Time: {:.2}s", summary.duration.as_secs_f64());
        Ok(())
    }
}

fn layer_label(layer: &LayerMatch) -> String {
    match &layer.name {
        Some(name) => format!("#{} {}", layer.index, name.cyan()),
        None => format!("#{}", layer.index),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StratumError::ConfigError {
        message: format!("Failed to serialize JSON: {e}"),
    })?;
    println!("{json}");
    Ok(())
}
