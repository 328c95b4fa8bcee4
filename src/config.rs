use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Input log formats understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InputFormat {
    /// Delimited text with one header row.
    Csv,
    /// Newline-delimited JSON; the first line carries build metadata.
    Json,
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputFormat::Csv => write!(f, "csv"),
            InputFormat::Json => write!(f, "json"),
        }
    }
}

/// Output backends for composed figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Write one SVG file per figure.
    Svg,
    /// Print a textual panel summary to stdout.
    Text,
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Svg
    }
}

/// Which charts contribute to a suite's shared time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WindowPolicy {
    /// Every renderable chart of the suite, filtered out or not.
    #[value(name = "all")]
    AllCharts,
    /// Only the charts that survive filtering.
    #[value(name = "filtered")]
    FilteredCharts,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        WindowPolicy::AllCharts
    }
}

/// User configuration for suitechart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub window: WindowPolicy,
    #[serde(default)]
    pub plot: PlotSettings,
    #[serde(default)]
    pub filter: FilterDefaults,
    #[serde(default)]
    pub logging: LogSettings,
}

impl Settings {
    /// Load settings from disk, writing defaults if missing. Files ending in
    /// `.toml` are read as TOML, everything else as JSON.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Unable to read config at {}", path.display()))?;
            let parsed: Self = if is_toml(path) {
                toml::from_str(&raw)
                    .with_context(|| format!("Malformed config at {}", path.display()))?
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("Malformed config at {}", path.display()))?
            };
            Ok(parsed)
        } else {
            let settings = Self::default();
            settings.save(path)?;
            Ok(settings)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let serialised = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        fs::write(path, serialised)
            .with_context(|| format!("Failed to persist config to {}", path.display()))
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Figure geometry, font sizes and output selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSettings {
    #[serde(default)]
    pub backend: BackendKind,
    /// Tick labels and legends.
    #[serde(default = "PlotSettings::default_small_font")]
    pub small_font: u32,
    /// Panel captions and axis descriptions.
    #[serde(default = "PlotSettings::default_medium_font")]
    pub medium_font: u32,
    /// Figure title.
    #[serde(default = "PlotSettings::default_large_font")]
    pub large_font: u32,
    #[serde(default = "PlotSettings::default_width")]
    pub width: u32,
    #[serde(default = "PlotSettings::default_panel_height")]
    pub panel_height: u32,
    /// Optional override for where rendered figures are written.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl PlotSettings {
    const fn default_small_font() -> u32 {
        8
    }

    const fn default_medium_font() -> u32 {
        10
    }

    const fn default_large_font() -> u32 {
        12
    }

    const fn default_width() -> u32 {
        1200
    }

    const fn default_panel_height() -> u32 {
        180
    }

    /// Resolve the directory that receives rendered figures.
    pub fn resolve_output_dir(&self) -> Result<PathBuf> {
        if let Some(path) = &self.output_dir {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from("dev", "suitechart", "SuiteChart")
            .context("Unable to resolve platform data directory")?;
        Ok(dirs.data_dir().join("charts"))
    }
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            small_font: Self::default_small_font(),
            medium_font: Self::default_medium_font(),
            large_font: Self::default_large_font(),
            width: Self::default_width(),
            panel_height: Self::default_panel_height(),
            output_dir: None,
        }
    }
}

/// Chart name lists applied when the command line supplies none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterDefaults {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub skip: Vec<String>,
}

/// Controls console logging and the optional JSON trace file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub trace_file: bool,
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Compute the default path to the configuration file.
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("dev", "suitechart", "SuiteChart")
        .context("Unable to resolve platform config directory")?;
    Ok(dirs.config_dir().join("config.json"))
}
