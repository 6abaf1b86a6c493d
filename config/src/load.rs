use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Supported extensions for configuration files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Trait implemented by configuration structures that require list parsing help.
pub trait Config {
    /// Keys whose values should be parsed as lists when loading the configuration.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors that can occur while loading the configuration file and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// The configuration file does not exist.
    #[error("configuration file `{0}` does not exist")]
    MissingConfigurationFile(PathBuf),

    /// The configuration file has an extension that cannot be parsed.
    #[error("configuration file `{path}` has an unsupported extension; expected one of: {expected}")]
    UnsupportedExtension { path: PathBuf, expected: String },

    /// The configuration file existed but could not be parsed.
    #[error("failed to load configuration from `{path}`: {source}")]
    ConfigurationFileLoad {
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    /// Environment variable overrides failed to merge into the configuration.
    #[error("failed to load configuration from environment variables: {0}")]
    EnvironmentVariables(#[source] rust_cli_config::ConfigError),

    /// The configuration was parsed but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),
}

/// Loads configuration from `path` and applies environment-variable overrides.
///
/// The file format is derived from its extension (`yaml`, `yml` or `json`). Overrides use
/// the `APP_` prefix with double underscores for nesting (`APP_SOURCE__HOST`), and list
/// values for keys in [`Config::LIST_PARSE_KEYS`] are comma-separated.
pub fn load_config_from_file<T>(path: &Path) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !path.is_file() {
        return Err(LoadConfigError::MissingConfigurationFile(
            path.to_path_buf(),
        ));
    }

    let has_supported_extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| CONFIG_FILE_EXTENSIONS.contains(&extension));
    if !has_supported_extension {
        return Err(LoadConfigError::UnsupportedExtension {
            path: path.to_path_buf(),
            expected: CONFIG_FILE_EXTENSIONS.join(", "),
        });
    }

    let file_source = rust_cli_config::File::from(path.to_path_buf());
    let builder = rust_cli_config::Config::builder().add_source(file_source);

    // We build once with only the file, so that parse errors point at the file rather
    // than being reported as environment override failures.
    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            path: path.to_path_buf(),
            source,
        })?;

    let settings = builder
        .add_source(environment_source::<T>())
        .build()
        .map_err(LoadConfigError::EnvironmentVariables)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Builds the `APP_`-prefixed environment source for `T`.
fn environment_source<T: Config>() -> rust_cli_config::Environment {
    let mut environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in T::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    environment_source
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct SampleConfig {
        name: String,
        tables: Vec<String>,
    }

    impl Config for SampleConfig {
        const LIST_PARSE_KEYS: &'static [&'static str] = &["tables"];
    }

    fn write_config(extension: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_file() {
        let file = write_config("yaml", "name: shop\ntables:\n  - orders\n  - order_items\n");

        let config: SampleConfig = load_config_from_file(file.path()).unwrap();

        assert_eq!(config.name, "shop");
        assert_eq!(config.tables, vec!["orders", "order_items"]);
    }

    #[test]
    fn test_load_json_file() {
        let file = write_config("json", r#"{"name": "shop", "tables": ["orders"]}"#);

        let config: SampleConfig = load_config_from_file(file.path()).unwrap();

        assert_eq!(config.tables, vec!["orders"]);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let result = load_config_from_file::<SampleConfig>(Path::new("/nonexistent/app.yaml"));

        assert!(matches!(
            result,
            Err(LoadConfigError::MissingConfigurationFile(_))
        ));
    }

    #[test]
    fn test_unsupported_extension_is_reported() {
        let file = write_config("toml", "name = \"shop\"\n");

        let result = load_config_from_file::<SampleConfig>(file.path());

        assert!(matches!(
            result,
            Err(LoadConfigError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn test_missing_field_fails_deserialization() {
        let file = write_config("yaml", "name: shop\n");

        let result = load_config_from_file::<SampleConfig>(file.path());

        assert!(matches!(result, Err(LoadConfigError::Deserialization(_))));
    }
}
