use crate::core::engine::{DisplayData, SessionOptions};
use crate::core::error::{Error, Result};
use crate::core::registrar::NamespaceDisplay;
use crate::utils::default_config_path;
use crate::validators::{validate_display_name, validate_display_text};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Weight of the first filter in a batch when nothing else is configured
pub const DEFAULT_WEIGHT_BASE: u64 = 10;

/// Display metadata for the engine objects and the batch weight base.
///
/// Every field has a default, so `{}` is a valid config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_session")]
    pub session: DisplayData,
    #[serde(default = "default_provider")]
    pub provider: DisplayData,
    #[serde(default = "default_sublayer")]
    pub sublayer: DisplayData,
    /// Weight of the first filter in a batch; entry `i` gets `weight_base + i`
    #[serde(default = "default_weight_base")]
    pub weight_base: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: default_session(),
            provider: default_provider(),
            sublayer: default_sublayer(),
            weight_base: DEFAULT_WEIGHT_BASE,
        }
    }
}

fn default_session() -> DisplayData {
    DisplayData::new("wfprules", "wfprules dynamic session")
}

fn default_provider() -> DisplayData {
    NamespaceDisplay::default().provider
}

fn default_sublayer() -> DisplayData {
    NamespaceDisplay::default().sublayer
}

fn default_weight_base() -> u64 {
    DEFAULT_WEIGHT_BASE
}

impl AppConfig {
    /// Dynamic session with an infinite wait timeout
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::dynamic(self.session.clone())
    }

    pub fn namespace_display(&self) -> NamespaceDisplay {
        NamespaceDisplay {
            provider: self.provider.clone(),
            sublayer: self.sublayer.clone(),
        }
    }

    /// Checks every display name and description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (field, display) in [
            ("session", &self.session),
            ("provider", &self.provider),
            ("sublayer", &self.sublayer),
        ] {
            validate_display_name(&display.name)
                .map_err(|e| Error::Config(format!("{field}.name: {e}")))?;
            validate_display_text(&display.description)
                .map_err(|e| Error::Config(format!("{field}.description: {e}")))?;
        }
        Ok(())
    }
}

/// Loads and validates the config.
///
/// An explicit `path` must exist and parse. Without one, `config.json` in the
/// platform config directory is used when present, defaults otherwise.
///
/// # Errors
///
/// Returns `Err` if the file cannot be read or parsed, or fails validation.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => match default_config_path() {
            Some(path) if path.is_file() => load_config_from(&path)?,
            _ => {
                debug!("No config file found, using defaults");
                AppConfig::default()
            }
        },
    };
    config.validate()?;
    Ok(config)
}

fn load_config_from(path: &Path) -> Result<AppConfig> {
    info!("Loading config from {}", path.display());
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_object_yields_defaults() {
        let file = write_config("{}");
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.weight_base, 10);
    }

    #[test]
    fn test_partial_config_overrides_fields() {
        let file = write_config(
            r#"{ "weight_base": 200, "provider": { "name": "Acme" } }"#,
        );
        let config = load_config(Some(file.path())).unwrap();

        assert_eq!(config.weight_base, 200);
        assert_eq!(config.provider.name, "Acme");
        assert_eq!(config.provider.description, "");
        assert_eq!(config.sublayer, AppConfig::default().sublayer);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_malformed_json_is_error() {
        let file = write_config("{ weight_base: ");
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_blank_name_fails_validation() {
        let file = write_config(r#"{ "sublayer": { "name": "  " } }"#);
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.starts_with("sublayer.name")));
    }

    #[test]
    fn test_session_options_are_dynamic_and_infinite() {
        let options = AppConfig::default().session_options();
        assert!(options.dynamic);
        assert!(options.txn_wait_timeout.is_none());
        assert_eq!(options.display.name, "wfprules");
    }
}
