//! Reading configuration files from disk.

use std::path::Path;

use tracing::debug;

use crate::config::Config;
use crate::error::{ConfigError, ConfigResult};

/// Load and validate a configuration file.
///
/// Files ending in `.toml` are parsed as TOML; everything else as JSON.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let config = if is_toml {
        Config::from_toml_str(&content)?
    } else {
        Config::from_json_str(&content)?
    };
    config.validate()?;

    debug!(
        path = %path.display(),
        watches = config.watch.len(),
        sinks = config.sinks.len(),
        "config loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_json_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "timeZone": "UTC", "watch": [] }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.watch.is_empty());
    }

    #[test]
    fn loads_toml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostwatch.toml");
        std::fs::write(&path, "timeFormat = \"%H:%M\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.time_format, "%H:%M");
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn invalid_config_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "timeZone": "somewhere" }"#).unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::TimeZone(_))));
    }
}
