#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Settings for the register pipeline.
//!
//! A complete default document is embedded at compile time via
//! [`include_str!`]. A user settings file is merged over it table by
//! table, so it only has to contain the keys it wants to change. The
//! `SRA_API_KEY` environment variable overrides the configured API key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default location of the user settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.toml";

/// Environment variable that overrides `data_sources.sra_api.api_key`.
pub const API_KEY_ENV: &str = "SRA_API_KEY";

const DEFAULT_SETTINGS: &str = include_str!("default_settings.toml");

/// Errors that can occur while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings document is not valid TOML or does not match the schema.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value required at runtime is absent or empty.
    #[error("Missing setting: {key}")]
    Missing {
        /// Dotted path of the missing key.
        key: String,
    },
}

/// Root of the settings tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_sources: DataSources,
    /// Validation rules keyed by record type (`sra_organization`, ...).
    #[serde(default)]
    pub validation: BTreeMap<String, ValidationRules>,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSources {
    pub sra_api: SraApiSettings,
}

/// Connection settings for the SRA data share API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SraApiSettings {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub endpoints: Endpoints,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub max_retries: u32,
    /// Base retry delay in seconds.
    pub retry_delay: f64,
    pub subscription_key_header: String,
    pub rate_limit: RateLimitSettings,
}

impl SraApiSettings {
    /// Returns the API key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if the key is empty.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(ConfigError::Missing {
                key: "data_sources.sra_api.api_key".to_string(),
            });
        }
        Ok(key)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        seconds(self.retry_delay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub organizations: String,
}

/// Client-side request quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub requests_per_period: usize,
    pub period_minutes: f64,
    /// Minimum gap between two consecutive requests, in seconds.
    pub delay_between_requests: f64,
}

impl RateLimitSettings {
    #[must_use]
    pub fn period(&self) -> Duration {
        seconds(self.period_minutes * 60.0)
    }

    #[must_use]
    pub fn min_delay(&self) -> Duration {
        seconds(self.delay_between_requests)
    }
}

/// Filesystem locations used by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root for collected register data.
    pub raw_dir: PathBuf,
    /// Root for generated output artifacts.
    pub output_dir: PathBuf,
}

/// Structural rules for one record type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub field_types: BTreeMap<String, FieldType>,
}

impl ValidationRules {
    /// Whether this rule set declares anything to check.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required_fields.is_empty() && self.field_types.is_empty()
    }
}

/// Declared JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    /// Integer or floating point.
    Number,
    Boolean,
    List,
    #[serde(alias = "mapping", alias = "object")]
    Dict,
    /// Unrecognised type name; always passes.
    #[serde(other)]
    Unknown,
}

impl Settings {
    /// Returns the built-in default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the embedded document is malformed.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_toml_str("")
    }

    /// Parses a user settings document and merges it over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if either document is not valid TOML
    /// or the merged result does not match the settings schema.
    pub fn from_toml_str(user: &str) -> Result<Self, ConfigError> {
        let mut merged: toml::Table = toml::from_str(DEFAULT_SETTINGS)?;
        let overlay: toml::Table = toml::from_str(user)?;
        merge_tables(&mut merged, overlay);

        Ok(toml::Value::Table(merged).try_into()?)
    }

    /// Loads settings from `path`, merged over the defaults, and applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading settings from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let mut settings = Self::from_toml_str(&contents)?;
        settings.apply_env();
        Ok(settings)
    }

    /// Like [`Settings::load`], but falls back to the defaults (plus
    /// environment overrides) when `path` does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an existing file cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }

        log::debug!(
            "No settings file at {}, using built-in defaults",
            path.display()
        );
        let mut settings = Self::defaults()?;
        settings.apply_env();
        Ok(settings)
    }

    /// Applies environment variable overrides.
    pub fn apply_env(&mut self) {
        self.override_api_key(std::env::var(API_KEY_ENV).ok());
    }

    /// Replaces the API key when `key` is present and non-empty.
    pub fn override_api_key(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            log::debug!("Using API key from {API_KEY_ENV}");
            self.data_sources.sra_api.api_key = key;
        }
    }

    /// Validation rules for `record_type`, if any are configured.
    #[must_use]
    pub fn rules_for(&self, record_type: &str) -> Option<&ValidationRules> {
        self.validation.get(record_type)
    }
}

/// Recursively merges `overlay` into `base`. Nested tables are merged key
/// by key; every other value in `overlay` replaces the one in `base`.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let settings = Settings::defaults().unwrap();
        let api = &settings.data_sources.sra_api;
        assert_eq!(api.base_url, "https://sra-prod-apim.azure-api.net");
        assert_eq!(
            api.endpoints.organizations,
            "/datashare/api/V1/organisation/GetAll"
        );
        assert_eq!(api.timeout(), Duration::from_secs(30));
        assert_eq!(api.max_retries, 3);
        assert_eq!(api.retry_delay(), Duration::from_secs(2));
        assert_eq!(api.subscription_key_header, "Ocp-Apim-Subscription-Key");
        assert_eq!(api.rate_limit.requests_per_period, 600);
        assert_eq!(api.rate_limit.period(), Duration::from_secs(300));
        assert_eq!(api.rate_limit.min_delay(), Duration::from_millis(500));
        assert_eq!(settings.paths.raw_dir, PathBuf::from("data/raw/sra"));
        assert_eq!(settings.paths.output_dir, PathBuf::from("data/output"));
    }

    #[test]
    fn default_validation_rules_cover_register_records() {
        let settings = Settings::defaults().unwrap();
        let org = settings.rules_for("sra_organization").unwrap();
        assert_eq!(org.required_fields, vec!["Id", "SraNumber", "PracticeName"]);
        assert_eq!(org.field_types.get("Offices"), Some(&FieldType::List));

        let office = settings.rules_for("sra_office").unwrap();
        assert!(office.required_fields.contains(&"Town".to_string()));
        assert!(settings.rules_for("google_places_record").is_none());
    }

    #[test]
    fn user_document_merges_over_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [data_sources.sra_api]
            api_key = "secret"
            max_retries = 5

            [data_sources.sra_api.rate_limit]
            requests_per_period = 10

            [validation.sra_office]
            required_fields = ["OfficeId"]
            "#,
        )
        .unwrap();

        let api = &settings.data_sources.sra_api;
        assert_eq!(api.api_key().unwrap(), "secret");
        assert_eq!(api.max_retries, 5);
        assert_eq!(api.timeout, 30);
        assert_eq!(api.rate_limit.requests_per_period, 10);
        assert_eq!(api.rate_limit.min_delay(), Duration::from_millis(500));

        let office = settings.rules_for("sra_office").unwrap();
        assert_eq!(office.required_fields, vec!["OfficeId"]);
        assert_eq!(office.field_types.get("Name"), Some(&FieldType::String));
    }

    #[test]
    fn unknown_field_type_is_tolerated() {
        let settings = Settings::from_toml_str(
            r#"
            [validation.custom.field_types]
            when = "timestamp"
            meta = "mapping"
            "#,
        )
        .unwrap();
        let rules = settings.rules_for("custom").unwrap();
        assert_eq!(rules.field_types.get("when"), Some(&FieldType::Unknown));
        assert_eq!(rules.field_types.get("meta"), Some(&FieldType::Dict));
    }

    #[test]
    fn empty_api_key_is_missing() {
        let settings = Settings::defaults().unwrap();
        assert!(matches!(
            settings.data_sources.sra_api.api_key(),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn api_key_override_ignores_blank_values() {
        let mut settings = Settings::from_toml_str(
            r#"
            [data_sources.sra_api]
            api_key = "from-file"
            "#,
        )
        .unwrap();

        settings.override_api_key(Some("  ".to_string()));
        assert_eq!(settings.data_sources.sra_api.api_key, "from-file");

        settings.override_api_key(Some("from-env".to_string()));
        assert_eq!(settings.data_sources.sra_api.api_key, "from-env");
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            Settings::from_toml_str("[data_sources"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("uk_solicitors_config_missing/settings.toml");
        let settings = Settings::load_or_default(&path).unwrap();
        assert_eq!(settings.data_sources.sra_api.max_retries, 3);
    }
}
