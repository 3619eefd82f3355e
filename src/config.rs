//! Analysis configuration.
//!
//! Every section and field has a default, so an empty YAML document (or no
//! file at all) yields a working configuration for the standard
//! `<protocol>.flomonitor.<scale>` / `<protocol>.custom.<scale>` layout.

use std::fs::File;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::flowmon::{RatioGuard, DATA_PORT, FLOW_MONITOR_TAG};

/// Placeholder for the protocol name in file patterns
pub const PROTOCOL_PLACEHOLDER: &str = "{protocol}";
/// Placeholder for the network scale in file patterns
pub const SCALE_PLACEHOLDER: &str = "{scale}";

/// Top-level configuration that mirrors the YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Where the per-protocol, per-scale logs live and how they are named
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_protocols")]
    pub protocols: Vec<String>,
    #[serde(default = "default_network_sizes")]
    pub network_sizes: Vec<u32>,
    #[serde(default = "default_flowmon_pattern")]
    pub flowmon_pattern: String,
    /// Set to null to skip counters logs entirely
    #[serde(default = "default_counters_pattern")]
    pub counters_pattern: Option<String>,
}

/// Parsing and aggregation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Destination port identifying data flows (default 9)
    #[serde(default = "default_data_port")]
    pub data_port: u16,
    /// Keep flows that received nothing (default false)
    #[serde(default)]
    pub retain_silent_flows: bool,
    #[serde(default)]
    pub ratio_guard: RatioGuard,
    /// Keep per-flow detail in each simulation (default true)
    #[serde(default = "default_true")]
    pub keep_flows: bool,
    /// Tag of one simulation record (default "FlowMonitor")
    #[serde(default = "default_record_tag")]
    pub record_tag: String,
    /// Depth at which record tags close (default 0, i.e. document roots)
    #[serde(default)]
    pub record_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid input configuration: {0}")]
    InvalidInput(String),
    #[error("Invalid metrics configuration: {0}")]
    InvalidMetrics(String),
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_protocols() -> Vec<String> {
    ["sally", "olsr", "aodv", "chained"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_network_sizes() -> Vec<u32> {
    vec![5, 10, 15, 20, 25, 50, 75, 100]
}

fn default_flowmon_pattern() -> String {
    "{protocol}.flomonitor.{scale}".to_string()
}

fn default_counters_pattern() -> Option<String> {
    Some("{protocol}.custom.{scale}".to_string())
}

fn default_data_port() -> u16 {
    DATA_PORT
}

fn default_true() -> bool {
    true
}

fn default_record_tag() -> String {
    FLOW_MONITOR_TAG.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("analysis_output")
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            protocols: default_protocols(),
            network_sizes: default_network_sizes(),
            flowmon_pattern: default_flowmon_pattern(),
            counters_pattern: default_counters_pattern(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            data_port: DATA_PORT,
            retain_silent_flows: false,
            ratio_guard: RatioGuard::default(),
            keep_flows: true,
            record_tag: default_record_tag(),
            record_depth: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
        }
    }
}

impl InputConfig {
    /// Resolve the flow monitor log path for a protocol and scale
    pub fn flowmon_path(&self, protocol: &str, scale: u32) -> PathBuf {
        self.data_dir.join(expand_pattern(&self.flowmon_pattern, protocol, scale))
    }

    /// Resolve the counters log path, if counters are configured
    pub fn counters_path(&self, protocol: &str, scale: u32) -> Option<PathBuf> {
        self.counters_pattern
            .as_ref()
            .map(|pattern| self.data_dir.join(expand_pattern(pattern, protocol, scale)))
    }
}

fn expand_pattern(pattern: &str, protocol: &str, scale: u32) -> String {
    pattern
        .replace(PROTOCOL_PLACEHOLDER, protocol)
        .replace(SCALE_PLACEHOLDER, &scale.to_string())
}

fn validate_pattern(name: &str, pattern: &str) -> Result<(), ValidationError> {
    for placeholder in [PROTOCOL_PLACEHOLDER, SCALE_PLACEHOLDER] {
        if !pattern.contains(placeholder) {
            return Err(ValidationError::InvalidInput(format!(
                "{} '{}' must contain {}",
                name, pattern, placeholder
            )));
        }
    }
    Ok(())
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.input.protocols.is_empty() {
            return Err(ValidationError::InvalidInput(
                "protocols cannot be an empty list".to_string(),
            ));
        }
        if self.input.protocols.iter().any(|p| p.trim().is_empty()) {
            return Err(ValidationError::InvalidInput(
                "protocol names cannot be empty".to_string(),
            ));
        }
        if self.input.network_sizes.is_empty() {
            return Err(ValidationError::InvalidInput(
                "network_sizes cannot be an empty list".to_string(),
            ));
        }
        validate_pattern("flowmon_pattern", &self.input.flowmon_pattern)?;
        if let Some(pattern) = &self.input.counters_pattern {
            validate_pattern("counters_pattern", pattern)?;
        }

        if self.metrics.record_tag.trim().is_empty() {
            return Err(ValidationError::InvalidMetrics(
                "record_tag cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load and validate configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<AnalysisConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open config file '{}'", config_path.display()))?;
    let config: AnalysisConfig = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config file '{}'", config_path.display()))?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: AnalysisConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.metrics.data_port, 9);
        assert!(!config.metrics.retain_silent_flows);
        assert!(config.metrics.keep_flows);
        assert_eq!(config.metrics.ratio_guard, RatioGuard::ReceivedAndSent);
        assert_eq!(config.input.protocols.len(), 4);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_config_parsing() {
        let yaml = r#"
general:
  log_level: debug
input:
  data_dir: "/data/runs"
  protocols: [olsr, aodv]
  network_sizes: [10, 20]
  counters_pattern: null
metrics:
  retain_silent_flows: true
  ratio_guard: sent_only
  record_depth: 1
"#;
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.input.protocols, vec!["olsr", "aodv"]);
        assert_eq!(config.metrics.ratio_guard, RatioGuard::SentOnly);
        assert_eq!(config.metrics.record_depth, 1);
        assert_eq!(
            config.input.flowmon_path("olsr", 20),
            PathBuf::from("/data/runs/olsr.flomonitor.20")
        );
        assert!(config.input.counters_path("olsr", 20).is_none());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AnalysisConfig::default();
        config.input.protocols.clear();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidInput(_))));

        let mut config = AnalysisConfig::default();
        config.input.flowmon_pattern = "flows.xml".to_string();
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.metrics.record_tag = " ".to_string();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidMetrics(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "metrics:\n  data_port: 5000").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.metrics.data_port, 5000);
        assert_eq!(
            config.input.counters_path("aodv", 5),
            Some(PathBuf::from("./aodv.custom.5"))
        );
    }
}
