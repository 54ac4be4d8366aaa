//! Application configuration for berclean.
//!
//! User config lives at `~/.berclean/berclean.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BerCleanError, Result};
use crate::types::UnknownTypologyPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "berclean.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".berclean";

// ---------------------------------------------------------------------------
// Config structs (matching berclean.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Plausibility rule settings.
    #[serde(default)]
    pub rules: RulesConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Rows per chunk when streaming the input file.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Whether to split implausible rows into the excluded file.
    #[serde(default = "default_true")]
    pub filter: bool,

    /// Suffix appended to the output file stem for excluded rows.
    #[serde(default = "default_excluded_suffix")]
    pub excluded_suffix: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            filter: true,
            excluded_suffix: default_excluded_suffix(),
        }
    }
}

fn default_chunk_size() -> usize {
    10_000
}
fn default_true() -> bool {
    true
}
fn default_excluded_suffix() -> String {
    "_excluded".into()
}

/// `[rules]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Handling of dwelling types absent from the typology table.
    #[serde(default)]
    pub unknown_typology: UnknownTypologyPolicy,

    /// Optional TOML file replacing the built-in reference tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Pipeline options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Rows per chunk.
    pub chunk_size: usize,
    /// Run the row classifier and split kept/excluded.
    pub filter: bool,
    /// Suffix for the excluded output file.
    pub excluded_suffix: String,
    /// Unknown typology handling.
    pub unknown_typology: UnknownTypologyPolicy,
    /// Reference table override file, if any.
    pub tables_path: Option<PathBuf>,
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            chunk_size: config.defaults.chunk_size,
            filter: config.defaults.filter,
            excluded_suffix: config.defaults.excluded_suffix.clone(),
            unknown_typology: config.rules.unknown_typology,
            tables_path: config.rules.tables_path.as_ref().map(PathBuf::from),
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl PipelineOptions {
    /// Reject option combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BerCleanError::config("chunk_size must be at least 1"));
        }
        if self.excluded_suffix.is_empty() {
            return Err(BerCleanError::config(
                "excluded_suffix must not be empty (kept and excluded files would collide)",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.berclean/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BerCleanError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.berclean/berclean.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BerCleanError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        BerCleanError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BerCleanError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BerCleanError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BerCleanError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("chunk_size = 10000"));
        assert!(toml_str.contains("unknown_typology = \"exclude\""));
        assert!(!toml_str.contains("tables_path"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.chunk_size, 10_000);
        assert!(parsed.defaults.filter);
        assert_eq!(parsed.defaults.excluded_suffix, "_excluded");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[rules]
unknown_typology = "pass"
tables_path = "/etc/berclean/tables.toml"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.chunk_size, 10_000);
        assert_eq!(config.rules.unknown_typology, UnknownTypologyPolicy::Pass);

        let options = PipelineOptions::from(&config);
        assert_eq!(
            options.tables_path,
            Some(PathBuf::from("/etc/berclean/tables.toml"))
        );
        assert!(options.filter);
    }

    #[test]
    fn options_validation() {
        let mut options = PipelineOptions::default();
        assert!(options.validate().is_ok());

        options.chunk_size = 0;
        assert!(options.validate().unwrap_err().to_string().contains("chunk_size"));

        options.chunk_size = 10;
        options.excluded_suffix.clear();
        assert!(options.validate().is_err());
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let path = std::env::temp_dir().join(format!(
            "berclean-config-test-{}.toml",
            uuid::Uuid::now_v7()
        ));
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, BerCleanError::Io { .. }));
    }
}
