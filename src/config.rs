//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.carsales.toml` files.

use crate::error::GatewayError;
use crate::llm::LlmSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".carsales.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Completion API settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Query handling settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Sales CSV to analyze.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            verbose: false,
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/car_sales.csv")
}

/// Completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Use the LLM gateway at all. When false, LLM-only paths degrade.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for generation. Kept near zero for determinism.
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens in a response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_api_url(),
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama3-70b-8192".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout() -> u64 {
    10
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

/// How projection questions are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMode {
    /// Compound the historical growth rate from the last known year
    #[default]
    Extrapolate,
    /// Ask the completion API with a data excerpt
    Llm,
}

/// Query handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub projection_mode: ProjectionMode,

    /// Years projected forward.
    #[serde(default = "default_projection_years")]
    pub projection_years: u32,

    /// Ranking size when the question names none.
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    /// Sample records sent with general questions.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,

    /// Records sent with LLM projection requests.
    #[serde(default = "default_projection_sample_rows")]
    pub projection_sample_rows: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            projection_mode: ProjectionMode::default(),
            projection_years: default_projection_years(),
            default_top_n: default_top_n(),
            sample_rows: default_sample_rows(),
            projection_sample_rows: default_projection_sample_rows(),
        }
    }
}

fn default_projection_years() -> u32 {
    3
}

fn default_top_n() -> usize {
    3
}

fn default_sample_rows() -> usize {
    3
}

fn default_projection_sample_rows() -> usize {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if let Err(e) = config.validate() {
            anyhow::bail!("Invalid config file {}: {}", path.display(), e);
        }

        Ok(config)
    }

    /// Range checks on file values, matching the ones applied to CLI flags.
    pub fn validate(&self) -> Result<(), String> {
        if !self.llm.api_url.starts_with("http://") && !self.llm.api_url.starts_with("https://") {
            return Err("llm.api_url must start with 'http://' or 'https://'".to_string());
        }

        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err("llm.temperature must be between 0.0 and 1.0".to_string());
        }

        if self.llm.timeout_seconds == 0 {
            return Err("llm.timeout_seconds must be at least 1".to_string());
        }

        if self.llm.max_tokens == 0 {
            return Err("llm.max_tokens must be at least 1".to_string());
        }

        if self.analysis.projection_years == 0 {
            return Err("analysis.projection_years must be at least 1".to_string());
        }

        if self.analysis.default_top_n == 0 {
            return Err("analysis.default_top_n must be at least 1".to_string());
        }

        Ok(())
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data) = args.data {
            self.general.data_path = data.clone();
        }
        if let Some(ref model) = args.model {
            self.llm.model = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.llm.api_url = api_url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.llm.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.llm.timeout_seconds = timeout;
        }
        if let Some(mode) = args.projection {
            self.analysis.projection_mode = mode;
        }

        // Flags always override
        if args.offline {
            self.llm.enabled = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Build the gateway settings, taking the key from `explicit_key` or the
    /// configured environment variable.
    pub fn llm_settings(&self, explicit_key: Option<&str>) -> Result<LlmSettings, GatewayError> {
        let api_key = match explicit_key {
            Some(key) => key.to_string(),
            None => std::env::var(&self.llm.api_key_env).unwrap_or_default(),
        };

        if api_key.trim().is_empty() {
            return Err(GatewayError::MissingCredential(self.llm.api_key_env.clone()));
        }

        Ok(LlmSettings {
            api_url: self.llm.api_url.clone(),
            model: self.llm.model.clone(),
            api_key,
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
            timeout: Duration::from_secs(self.llm.timeout_seconds),
        })
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.data_path, PathBuf::from("data/car_sales.csv"));
        assert_eq!(config.llm.model, "llama3-70b-8192");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.llm.timeout_seconds, 10);
        assert_eq!(config.analysis.projection_mode, ProjectionMode::Extrapolate);
        assert_eq!(config.analysis.default_top_n, 3);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
data_path = "sales/2024.csv"
verbose = true

[llm]
model = "llama3-8b-8192"
timeout_seconds = 30

[analysis]
projection_mode = "llm"
default_top_n = 5
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.data_path, PathBuf::from("sales/2024.csv"));
        assert!(config.general.verbose);
        assert_eq!(config.llm.model, "llama3-8b-8192");
        assert_eq!(config.llm.timeout_seconds, 30);
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.analysis.projection_mode, ProjectionMode::Llm);
        assert_eq!(config.analysis.default_top_n, 5);
        assert_eq!(config.analysis.projection_years, 3);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[llm]"));
        assert!(toml_str.contains("[analysis]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.llm.api_key_env, "GROQ_API_KEY");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[analysis]\nprojection_years = 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.analysis.projection_years, 5);
        assert!(config.llm.enabled);
    }

    #[test]
    fn test_load_rejects_out_of_range_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, "[llm]\ntemperature = 5.0\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("llm.temperature"));

        std::fs::write(&path, "[llm]\ntimeout_seconds = 0\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("llm.timeout_seconds"));
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.llm.api_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.analysis.default_top_n = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_llm_settings_with_explicit_key() {
        let config = Config::default();
        let settings = config.llm_settings(Some("abc")).unwrap();
        assert_eq!(settings.api_key, "abc");
        assert_eq!(settings.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_llm_settings_missing_key() {
        let mut config = Config::default();
        config.llm.api_key_env = "CARSALES_TEST_UNSET_KEY_VAR".to_string();
        let err = config.llm_settings(None).unwrap_err();
        assert!(matches!(err, GatewayError::MissingCredential(ref var) if var == "CARSALES_TEST_UNSET_KEY_VAR"));
    }
}
