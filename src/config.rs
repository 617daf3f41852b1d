// ⚙️ Configuration - Layered settings for the CLI and server
//
// Sources, lowest precedence first: built-in defaults, an optional TOML
// file, then `EXPEDITION_*` environment variables.

use crate::query::{ActivityThreshold, AnalysisParams, SpeciesNameFilter};
use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use config::builder::DefaultState;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "analytics.toml";
pub const ENV_PREFIX: &str = "EXPEDITION";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalyticsConfig {
    /// NDJSON input file; the CLI's positional argument wins over this
    pub input_path: Option<PathBuf>,
    pub target_activity: String,
    pub min_activity_count: i64,
    pub target_species: Vec<String>,
    /// Records per ingestion chunk
    pub chunk_size: usize,
    /// Expeditions per parallel shard; unset runs the single-pass summary
    pub shard_size: Option<usize>,
    pub csv_dir: Option<PathBuf>,
    pub server_addr: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            input_path: None,
            target_activity: "hunting".to_string(),
            min_activity_count: 2,
            target_species: vec!["polyphemus".to_string(), "dromedarius".to_string()],
            chunk_size: 1024,
            shard_size: None,
            csv_dir: None,
            server_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AnalyticsConfig {
    /// Load defaults, then `path` (required) or `analytics.toml` (optional),
    /// then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let builder = defaults()?.add_source(file).add_source(environment());
        let cfg = builder.build().context("Failed to build configuration")?;
        cfg.try_deserialize().context("Invalid configuration")
    }

    /// Defaults overlaid with an in-memory TOML document, no environment
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg = defaults()?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;
        cfg.try_deserialize().context("Invalid configuration")
    }

    pub fn to_params(&self) -> AnalysisParams {
        AnalysisParams {
            activity: ActivityThreshold::new(self.target_activity.clone(), self.min_activity_count),
            species_filter: SpeciesNameFilter::new(&self.target_species),
        }
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    let d = AnalyticsConfig::default();
    let builder = Config::builder()
        .set_default("target_activity", d.target_activity)?
        .set_default("min_activity_count", d.min_activity_count)?
        .set_default("target_species", d.target_species)?
        .set_default("chunk_size", d.chunk_size as i64)?
        .set_default("server_addr", d.server_addr)?;
    Ok(builder)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("target_species")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let cfg = AnalyticsConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AnalyticsConfig::default());
        assert_eq!(cfg.to_params(), AnalysisParams::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let cfg = AnalyticsConfig::from_toml_str(
            r#"
            input_path = "data/expeditions.jsonl"
            target_activity = "grazing"
            min_activity_count = -1
            target_species = ["Okapi"]
            shard_size = 256
            csv_dir = "out"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.input_path, Some(PathBuf::from("data/expeditions.jsonl")));
        assert_eq!(cfg.shard_size, Some(256));
        assert_eq!(cfg.chunk_size, 1024);
        assert_eq!(cfg.server_addr, "0.0.0.0:3000");

        let params = cfg.to_params();
        assert_eq!(params.activity, ActivityThreshold::new("grazing", -1));
        assert!(params.species_filter.matches("okapi"));
        assert!(!params.species_filter.matches("polyphemus"));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let err = AnalyticsConfig::from_toml_str("chunk_size = \"lots\"").unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(AnalyticsConfig::load(Some(Path::new("/no/such/analytics.toml"))).is_err());
    }
}
