use mysql_async::{Opts as MySqlAsyncOpts, OptsBuilder as MySqlAsyncOptsBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions as SqlxConnectOptions;

use crate::Config;
use crate::shared::ValidationError;

const fn default_port() -> u16 {
    MySqlConnectionConfig::DEFAULT_PORT
}

/// Configuration for connecting to the source MySQL server.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking the password into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct MySqlConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Name of the database whose tables are replicated.
    pub name: String,
    pub username: String,
    pub password: Option<SecretString>,
}

impl MySqlConnectionConfig {
    pub const DEFAULT_PORT: u16 = 3306;

    /// Validates that every field needed to open a connection is present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::EmptyField("source.host"));
        }

        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("source.name"));
        }

        if self.username.trim().is_empty() {
            return Err(ValidationError::EmptyField("source.username"));
        }

        Ok(())
    }
}

impl Config for MySqlConnectionConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

/// Same as [`MySqlConnectionConfig`] but without the password, safe to serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MySqlConnectionConfigWithoutSecrets {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
}

impl From<MySqlConnectionConfig> for MySqlConnectionConfigWithoutSecrets {
    fn from(value: MySqlConnectionConfig) -> Self {
        MySqlConnectionConfigWithoutSecrets {
            host: value.host,
            port: value.port,
            name: value.name,
            username: value.username,
        }
    }
}

/// Conversion of a [`MySqlConnectionConfig`] into client specific connect options.
pub trait IntoConnectOptions<Output> {
    fn without_db(&self) -> Output;
    fn with_db(&self) -> Output;
}

impl IntoConnectOptions<SqlxConnectOptions> for MySqlConnectionConfig {
    fn without_db(&self) -> SqlxConnectOptions {
        let mut connect_options = SqlxConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username);

        if let Some(password) = &self.password {
            connect_options = connect_options.password(password.expose_secret());
        }

        connect_options
    }

    fn with_db(&self) -> SqlxConnectOptions {
        let connect_options: SqlxConnectOptions = self.without_db();
        connect_options.database(&self.name)
    }
}

impl IntoConnectOptions<MySqlAsyncOpts> for MySqlConnectionConfig {
    fn without_db(&self) -> MySqlAsyncOpts {
        let builder = MySqlAsyncOptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .tcp_port(self.port)
            .user(Some(self.username.clone()))
            .pass(
                self.password
                    .as_ref()
                    .map(|password| password.expose_secret().clone()),
            );

        MySqlAsyncOpts::from(builder)
    }

    fn with_db(&self) -> MySqlAsyncOpts {
        let opts: MySqlAsyncOpts = self.without_db();
        let builder = MySqlAsyncOptsBuilder::from_opts(opts).db_name(Some(self.name.clone()));

        MySqlAsyncOpts::from(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_config() -> MySqlConnectionConfig {
        MySqlConnectionConfig {
            host: "localhost".to_string(),
            port: 3306,
            name: "shop".to_string(),
            username: "replicator".to_string(),
            password: Some(SecretString::new("secret".to_string())),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(connection_config().validate().is_ok());
    }

    #[test]
    fn test_mysql_async_opts_select_database() {
        let config = connection_config();

        let without_db: MySqlAsyncOpts = config.without_db();
        assert_eq!(without_db.db_name(), None);

        let with_db: MySqlAsyncOpts = config.with_db();
        assert_eq!(with_db.db_name(), Some("shop"));
        assert_eq!(with_db.ip_or_hostname(), "localhost");
        assert_eq!(with_db.tcp_port(), 3306);
        assert_eq!(with_db.user(), Some("replicator"));
    }

    #[test]
    fn test_validate_missing_fields() {
        let config = MySqlConnectionConfig {
            host: " ".to_string(),
            ..connection_config()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::EmptyField("source.host"))
        );

        let config = MySqlConnectionConfig {
            username: String::new(),
            ..connection_config()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::EmptyField("source.username"))
        );
    }

    #[test]
    fn test_without_secrets_drops_password() {
        let config: MySqlConnectionConfigWithoutSecrets = connection_config().into();
        assert_eq!(config.username, "replicator");
        assert_eq!(config.name, "shop");
    }
}
