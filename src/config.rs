use crate::bucket::BUCKET_COUNT;
use crate::error::MapError;
use crate::types::{Rgb, Unit};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub join: JoinConfig,
    #[serde(default)]
    pub style: StyleConfig,
    pub indicators: Vec<IndicatorConfig>,
    pub map: MapConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub data_csv: PathBuf,
    pub geometry: PathBuf, // GeoJSON or shapefile
    pub join_column_csv: String,
    pub name_column_csv: String,
    pub join_column_shape: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JoinConfig {
    #[serde(default = "default_strict")]
    pub strict: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

fn default_strict() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct StyleConfig {
    #[serde(default = "default_gradient_start")]
    pub gradient_start: String,
    #[serde(default = "default_gradient_end")]
    pub gradient_end: String,
    #[serde(default = "default_no_data_color")]
    pub no_data_color: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            gradient_start: default_gradient_start(),
            gradient_end: default_gradient_end(),
            no_data_color: default_no_data_color(),
        }
    }
}

fn default_gradient_start() -> String {
    "#CCCCCC".to_string()
}

fn default_gradient_end() -> String {
    "#660066".to_string()
}

fn default_no_data_color() -> String {
    "#FFFFFF".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndicatorConfig {
    pub key: String,
    pub name: String,   // layer name shown in the map's layer control
    pub column: String, // CSV header
    pub unit: Unit,
    // Range labels computed offline from one data snapshot; see `check-legends`.
    pub legend: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    pub center: [f64; 2], // [lat, lon]
    pub zoom: u8,
    pub tile_url: String,
    #[serde(default)]
    pub attribution: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub preview_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.indicators.is_empty() {
            return Err(anyhow!("At least one [[indicators]] entry is required"));
        }

        let mut keys = HashSet::new();
        let mut names = HashSet::new();
        for indicator in &self.indicators {
            if !keys.insert(indicator.key.as_str()) {
                return Err(anyhow!("Duplicate indicator key '{}'", indicator.key));
            }
            if !names.insert(indicator.name.as_str()) {
                return Err(anyhow!("Duplicate indicator name '{}'", indicator.name));
            }
            if indicator.legend.len() != BUCKET_COUNT {
                return Err(anyhow!(
                    "Indicator '{}' has {} legend labels, expected {}",
                    indicator.key,
                    indicator.legend.len(),
                    BUCKET_COUNT
                ));
            }
        }

        self.style.colors()?;
        Ok(())
    }
}

impl StyleConfig {
    /// (gradient start, gradient end, no-data color)
    pub fn colors(&self) -> Result<(Rgb, Rgb, Rgb), MapError> {
        Ok((
            Rgb::from_hex(&self.gradient_start)?,
            Rgb::from_hex(&self.gradient_end)?,
            Rgb::from_hex(&self.no_data_color)?,
        ))
    }
}
