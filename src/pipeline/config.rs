//! Pipeline configuration.
//!
//! This module provides the settings for a cleaning run: where the dataset
//! comes from, where snapshots go, how the model is asked, and the limits
//! the sandbox enforces.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::llm::DEFAULT_MODEL;
use crate::sandbox::SandboxConfig;
use crate::synthesis::{CleaningRules, SynthesisConfig};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Source and storage
    /// CSV file the ingest stage reads.
    pub input_path: PathBuf,
    /// SQLite database holding the snapshots.
    pub database_path: PathBuf,
    /// Table for the dataset as loaded.
    pub raw_table: String,
    /// Table for the dataset after cleaning.
    pub clean_table: String,

    // Synthesis
    /// Model (or Azure deployment) asked for the procedure.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token cap.
    pub max_tokens: Option<u32>,
    /// Skip the model call when the report has no issues.
    pub skip_model_when_clean: bool,

    // Sandbox
    /// Wall-clock limit for running the procedure.
    pub procedure_timeout: Duration,
    /// Maximum number of statements in a procedure.
    pub max_statements: usize,
    /// Maximum procedure size in bytes.
    pub max_source_bytes: usize,
    /// Deepest expression nesting a procedure may use.
    pub max_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let sandbox = SandboxConfig::default();
        Self {
            input_path: PathBuf::from("titanic.csv"),
            database_path: PathBuf::from("pipeline.db"),
            raw_table: "dataset_raw".to_string(),
            clean_table: "dataset_clean".to_string(),

            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: Some(1024),
            skip_model_when_clean: true,

            procedure_timeout: sandbox.timeout,
            max_statements: sandbox.max_statements,
            max_source_bytes: sandbox.max_source_bytes,
            max_depth: sandbox.max_depth,
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PIPELINE_INPUT_PATH`: CSV source (default: titanic.csv)
    /// - `PIPELINE_DATABASE_PATH`: SQLite file (default: pipeline.db)
    /// - `PIPELINE_RAW_TABLE`: raw snapshot table (default: dataset_raw)
    /// - `PIPELINE_CLEAN_TABLE`: cleaned snapshot table (default: dataset_clean)
    /// - `PIPELINE_MODEL`: model or deployment name (default: gpt-4o)
    /// - `PIPELINE_TEMPERATURE`: sampling temperature (default: 0.0)
    /// - `PIPELINE_MAX_TOKENS`: completion token cap, 0 for none (default: 1024)
    /// - `PIPELINE_SKIP_MODEL_WHEN_CLEAN`: skip the model for clean data (default: true)
    /// - `PIPELINE_PROCEDURE_TIMEOUT_SECS`: sandbox timeout (default: 10)
    /// - `PIPELINE_MAX_STATEMENTS`: procedure statement limit (default: 1000)
    /// - `PIPELINE_MAX_SOURCE_BYTES`: procedure size limit (default: 65536)
    /// - `PIPELINE_MAX_DEPTH`: procedure nesting limit (default: 64)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Source and storage
        if let Ok(val) = std::env::var("PIPELINE_INPUT_PATH") {
            config.input_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("PIPELINE_DATABASE_PATH") {
            config.database_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("PIPELINE_RAW_TABLE") {
            config.raw_table = val;
        }

        if let Ok(val) = std::env::var("PIPELINE_CLEAN_TABLE") {
            config.clean_table = val;
        }

        // Synthesis
        if let Ok(val) = std::env::var("PIPELINE_MODEL") {
            config.model = val;
        }

        if let Ok(val) = std::env::var("PIPELINE_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "PIPELINE_TEMPERATURE")?;
        }

        if let Ok(val) = std::env::var("PIPELINE_MAX_TOKENS") {
            let tokens: u32 = parse_env_value(&val, "PIPELINE_MAX_TOKENS")?;
            config.max_tokens = (tokens > 0).then_some(tokens);
        }

        if let Ok(val) = std::env::var("PIPELINE_SKIP_MODEL_WHEN_CLEAN") {
            config.skip_model_when_clean = parse_env_bool(&val, "PIPELINE_SKIP_MODEL_WHEN_CLEAN")?;
        }

        // Sandbox
        if let Ok(val) = std::env::var("PIPELINE_PROCEDURE_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "PIPELINE_PROCEDURE_TIMEOUT_SECS")?;
            config.procedure_timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("PIPELINE_MAX_STATEMENTS") {
            config.max_statements = parse_env_value(&val, "PIPELINE_MAX_STATEMENTS")?;
        }

        if let Ok(val) = std::env::var("PIPELINE_MAX_SOURCE_BYTES") {
            config.max_source_bytes = parse_env_value(&val, "PIPELINE_MAX_SOURCE_BYTES")?;
        }

        if let Ok(val) = std::env::var("PIPELINE_MAX_DEPTH") {
            config.max_depth = parse_env_value(&val, "PIPELINE_MAX_DEPTH")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.raw_table.is_empty() || self.clean_table.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "table names cannot be empty".to_string(),
            ));
        }

        if self.raw_table == self.clean_table {
            return Err(ConfigError::ValidationFailed(
                "raw_table and clean_table must differ".to_string(),
            ));
        }

        if self.model.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.procedure_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "procedure_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_statements == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_statements must be greater than 0".to_string(),
            ));
        }

        if self.max_source_bytes == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_source_bytes must be greater than 0".to_string(),
            ));
        }

        if self.max_depth == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_depth must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Synthesis settings derived from this configuration.
    pub fn synthesis_config(&self, rules: CleaningRules) -> SynthesisConfig {
        SynthesisConfig::new()
            .with_model(self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_rules(rules)
            .with_skip_model_when_clean(self.skip_model_when_clean)
    }

    /// Sandbox limits derived from this configuration.
    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig::default()
            .with_timeout(self.procedure_timeout)
            .with_max_statements(self.max_statements)
            .with_max_source_bytes(self.max_source_bytes)
            .with_max_depth(self.max_depth)
    }

    /// Builder method to set the CSV source.
    pub fn with_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = path.into();
        self
    }

    /// Builder method to set the SQLite database path.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Builder method to set the raw snapshot table.
    pub fn with_raw_table(mut self, table: impl Into<String>) -> Self {
        self.raw_table = table.into();
        self
    }

    /// Builder method to set the cleaned snapshot table.
    pub fn with_clean_table(mut self, table: impl Into<String>) -> Self {
        self.clean_table = table.into();
        self
    }

    /// Builder method to set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder method to set the temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Builder method to toggle skipping the model for clean data.
    pub fn with_skip_model_when_clean(mut self, skip: bool) -> Self {
        self.skip_model_when_clean = skip;
        self
    }

    /// Builder method to set the sandbox timeout.
    pub fn with_procedure_timeout(mut self, timeout: Duration) -> Self {
        self.procedure_timeout = timeout;
        self
    }
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.input_path, PathBuf::from("titanic.csv"));
        assert_eq!(config.database_path, PathBuf::from("pipeline.db"));
        assert_eq!(config.raw_table, "dataset_raw");
        assert_eq!(config.clean_table, "dataset_clean");
        assert_eq!(config.model, "gpt-4o");
        assert!(config.temperature.abs() < f64::EPSILON);
        assert!(config.skip_model_when_clean);
        assert_eq!(config.max_statements, 1000);
        assert_eq!(config.max_source_bytes, 64 * 1024);
        assert_eq!(config.max_depth, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::new()
            .with_input_path("/data/in.csv")
            .with_database_path("/data/out.db")
            .with_raw_table("raw")
            .with_clean_table("clean")
            .with_model("gpt-4o-mini")
            .with_temperature(0.42)
            .with_skip_model_when_clean(false)
            .with_procedure_timeout(Duration::from_secs(3));

        assert_eq!(config.input_path, PathBuf::from("/data/in.csv"));
        assert_eq!(config.database_path, PathBuf::from("/data/out.db"));
        assert_eq!(config.raw_table, "raw");
        assert_eq!(config.clean_table, "clean");
        assert_eq!(config.model, "gpt-4o-mini");
        assert!((config.temperature - 0.42).abs() < f64::EPSILON);
        assert!(!config.skip_model_when_clean);
        assert_eq!(config.procedure_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_validation() {
        let same_tables = PipelineConfig::new().with_clean_table("dataset_raw");
        assert!(same_tables.validate().is_err());

        let hot = PipelineConfig::new().with_temperature(2.5);
        assert!(hot.validate().is_err());

        let no_time = PipelineConfig::new().with_procedure_timeout(Duration::ZERO);
        assert!(no_time.validate().is_err());

        let no_model = PipelineConfig::new().with_model("");
        assert!(no_model.validate().is_err());
    }

    #[test]
    fn test_derived_configs() {
        let config = PipelineConfig::new()
            .with_model("deployment-a")
            .with_procedure_timeout(Duration::from_secs(2));

        let synthesis = config.synthesis_config(CleaningRules::new());
        assert_eq!(synthesis.model, "deployment-a");
        assert!(synthesis.rules.is_empty());
        assert!(synthesis.skip_model_when_clean);

        let sandbox = config.sandbox_config();
        assert_eq!(sandbox.timeout, Duration::from_secs(2));
        assert_eq!(sandbox.result_binding, "df");
        assert_eq!(sandbox.max_depth, 64);
    }

    #[test]
    fn test_parse_env_bool() {
        assert!(parse_env_bool("true", "TEST").unwrap());
        assert!(parse_env_bool("TRUE", "TEST").unwrap());
        assert!(parse_env_bool("1", "TEST").unwrap());
        assert!(parse_env_bool("yes", "TEST").unwrap());
        assert!(!parse_env_bool("false", "TEST").unwrap());
        assert!(!parse_env_bool("off", "TEST").unwrap());
        assert!(parse_env_bool("invalid", "TEST").is_err());
    }

    #[test]
    fn test_parse_env_value() {
        let v: u64 = parse_env_value("30", "TEST").unwrap();
        assert_eq!(v, 30);
        let err = parse_env_value::<u64>("thirty", "PIPELINE_X").unwrap_err();
        assert!(err.to_string().contains("PIPELINE_X"));
    }
}
