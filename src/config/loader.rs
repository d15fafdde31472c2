//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: ProxyConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [listener]
            bind_address = "127.0.0.1:7600"

            [[auth.verification_keys]]
            id = "primary"
            secret_base64 = "c2VjcmV0LWtleQ=="

            [[targets]]
            name = "auth"
            address = "127.0.0.1:7610"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:7600");
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].name, "auth");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "listener = not valid toml").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn semantic_errors_are_collected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // No verification keys and a duplicate target name.
        write!(
            file,
            r#"
            [[targets]]
            name = "auth"
            address = "127.0.0.1:7610"

            [[targets]]
            name = "auth"
            address = "not-an-address"
            "#
        )
        .unwrap();

        match load_config(file.path()).unwrap_err() {
            ConfigError::Validation(errors) => assert!(errors.len() >= 3),
            other => panic!("expected validation failure, got {other}"),
        }
    }
}
