use serde::Deserialize;
use std::path::Path;

/// Root application configuration. Loaded from an optional
/// `campaign-report.toml` file and environment variables with the prefix
/// `CAMPAIGN_REPORT__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_report_type")]
    pub default_report_type: String,
    /// Extra report variant definitions (JSON) registered next to the built-ins.
    #[serde(default)]
    pub variant_files: Vec<String>,
    #[serde(default)]
    pub patch: PatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchConfig {
    /// Prefix of the derived workbook written next to the master file.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

// Default functions
fn default_report_type() -> String {
    "a-b-report".to_string()
}
fn default_output_prefix() -> String {
    "updated_".to_string()
}
fn default_log_filter() -> String {
    "campaign_report=info,campaign_reporting=info".to_string()
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            output_prefix: default_output_prefix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_report_type: default_report_type(),
            variant_files: Vec::new(),
            patch: PatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `campaign-report.toml` (if present) and the
    /// environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(Path::new("campaign-report.toml"), false)
    }

    /// Load configuration from an explicit file, then the environment.
    pub fn load_from(path: &Path, required: bool) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path).required(required))
            .add_source(
                config::Environment::with_prefix("CAMPAIGN_REPORT")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("variant_files"),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.default_report_type, "a-b-report");
        assert_eq!(config.patch.output_prefix, "updated_");
        assert!(!config.logging.json);
        assert!(config.variant_files.is_empty());
    }

    #[test]
    fn test_missing_optional_file_falls_back_to_defaults() {
        let config =
            AppConfig::load_from(Path::new("definitely-not-here.toml"), false).unwrap();
        assert_eq!(config.patch.output_prefix, "updated_");
    }

    #[test]
    fn test_missing_required_file_is_an_error() {
        assert!(AppConfig::load_from(Path::new("definitely-not-here.toml"), true).is_err());
    }
}
