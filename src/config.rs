//! Configuration handling for schemadb.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS_SQLITE: u32 = 1;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

/// Connection pool configuration options parsed from database URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 1)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 1)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// How long SQLite waits on a locked database, in seconds (default: 5)
    pub busy_timeout_secs: Option<u64>,
}

impl PoolOptions {
    pub fn max_connections_or_default(&self) -> u32 {
        self.max_connections
            .unwrap_or(DEFAULT_MAX_CONNECTIONS_SQLITE)
    }

    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    pub fn idle_timeout_or_default(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS))
    }

    pub fn acquire_timeout_or_default(&self) -> Duration {
        Duration::from_secs(
            self.acquire_timeout_secs
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        )
    }

    pub fn busy_timeout_or_default(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs.unwrap_or(DEFAULT_BUSY_TIMEOUT_SECS))
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == Some(0) {
            return Err("max_connections must be greater than 0".to_string());
        }
        if let Some(min) = self.min_connections {
            let max = self.max_connections_or_default();
            if min > max {
                return Err(format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    min, max
                ));
            }
        }
        if self.acquire_timeout_secs == Some(0) {
            return Err("acquire_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Database connection configuration parsed from CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Connection URL with pool options removed.
    pub connection_string: String,
    /// Connection pool configuration options parsed from URL query parameters.
    pub pool_options: PoolOptions,
}

impl DatabaseConfig {
    /// Pool option keys that we extract from URL query parameters.
    const POOL_OPTION_KEYS: &'static [&'static str] = &[
        "max_connections",
        "min_connections",
        "idle_timeout",
        "acquire_timeout",
        "busy_timeout",
    ];

    /// Parse a database config from a connection URL.
    ///
    /// # Examples
    ///
    /// ```text
    /// sqlite:data.db
    /// sqlite:///var/lib/app/data.db?busy_timeout=10
    /// sqlite::memory:?max_connections=1
    /// ```
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut url = Url::parse(s).map_err(|e| format!("Invalid URL: {e}"))?;

        if !url.scheme().eq_ignore_ascii_case("sqlite") {
            return Err(format!(
                "Unsupported database scheme '{}'; use sqlite:path/to/db.sqlite",
                url.scheme()
            ));
        }

        let mut opts = Self::extract_options(&mut url, Self::POOL_OPTION_KEYS);
        let pool_options = Self::parse_pool_options(&mut opts)?;
        pool_options.validate()?;

        let path = url.path();
        if path.is_empty() || path == "/" {
            return Err("SQLite requires a database file path or :memory:".to_string());
        }

        Ok(Self {
            connection_string: url.to_string(),
            pool_options,
        })
    }

    /// Parse pool options from extracted URL query parameters.
    fn parse_pool_options(opts: &mut HashMap<String, String>) -> Result<PoolOptions, String> {
        fn number<T: std::str::FromStr>(
            opts: &mut HashMap<String, String>,
            key: &str,
        ) -> Result<Option<T>, String> {
            opts.remove(key)
                .map(|v| {
                    v.parse()
                        .map_err(|_| format!("{} must be a non-negative integer, got '{}'", key, v))
                })
                .transpose()
        }

        Ok(PoolOptions {
            max_connections: number(opts, "max_connections")?,
            min_connections: number(opts, "min_connections")?,
            idle_timeout_secs: number(opts, "idle_timeout")?,
            acquire_timeout_secs: number(opts, "acquire_timeout")?,
            busy_timeout_secs: number(opts, "busy_timeout")?,
        })
    }

    /// Extract pool options from URL query params, keeping others for the driver.
    fn extract_options(url: &mut Url, keys: &[&str]) -> HashMap<String, String> {
        let mut opts = HashMap::new();
        let remaining: Vec<(String, String)> = url
            .query_pairs()
            .filter_map(|(k, v)| {
                let key_lower = k.to_ascii_lowercase();
                if keys.contains(&key_lower.as_str()) {
                    opts.insert(key_lower, v.into_owned());
                    None
                } else {
                    Some((k.into_owned(), v.into_owned()))
                }
            })
            .collect();

        if remaining.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(remaining);
        }
        opts
    }
}

/// Configuration for the schemadb command-line tool.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "schemadb",
    about = "Manage records of a schema-defined SQLite table",
    version
)]
pub struct Config {
    /// Database connection URL, e.g. "sqlite:data.db?busy_timeout=10"
    #[arg(
        short = 'd',
        long = "database",
        value_name = "URL",
        env = "SCHEMADB_DATABASE",
        value_parser = DatabaseConfig::parse
    )]
    pub database: DatabaseConfig,

    /// Table definition file (JSON)
    #[arg(
        short = 't',
        long = "definition",
        value_name = "FILE",
        env = "SCHEMADB_DEFINITION"
    )]
    pub definition: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "SCHEMADB_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "SCHEMADB_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create the table
    Create,
    /// Drop the table
    Drop,
    /// List primary keys, optionally only those of rows where FIELD equals VALUE
    List {
        #[arg(long, requires = "equals")]
        field: Option<String>,
        #[arg(long, requires = "field")]
        equals: Option<String>,
    },
    /// Print a record as JSON
    Get { key: String },
    /// Insert a JSON record, or replace it if its key already exists
    Put { record: String },
    /// Update some fields of a record from a partial JSON record
    Patch { key: String, record: String },
    /// Delete a record
    Delete { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_sqlite_url() {
        let config = DatabaseConfig::parse("sqlite:data.db").unwrap();
        assert_eq!(config.connection_string, "sqlite:data.db");
        assert_eq!(config.pool_options, PoolOptions::default());
    }

    #[test]
    fn test_parse_memory_url() {
        let config = DatabaseConfig::parse("sqlite::memory:").unwrap();
        assert_eq!(config.connection_string, "sqlite::memory:");
    }

    #[test]
    fn test_pool_options_are_extracted() {
        let config = DatabaseConfig::parse(
            "sqlite:///tmp/data.db?max_connections=4&busy_timeout=10&mode=rwc",
        )
        .unwrap();
        assert_eq!(config.pool_options.max_connections, Some(4));
        assert_eq!(
            config.pool_options.busy_timeout_or_default(),
            Duration::from_secs(10)
        );
        assert!(!config.connection_string.contains("max_connections"));
        assert!(!config.connection_string.contains("busy_timeout"));
        assert!(config.connection_string.contains("mode=rwc"));
    }

    #[test]
    fn test_pool_option_defaults() {
        let opts = PoolOptions::default();
        assert_eq!(opts.max_connections_or_default(), 1);
        assert_eq!(opts.min_connections_or_default(), 1);
        assert_eq!(opts.acquire_timeout_or_default(), Duration::from_secs(30));
        assert_eq!(opts.busy_timeout_or_default(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_pool_options() {
        assert!(DatabaseConfig::parse("sqlite:data.db?max_connections=0").is_err());
        assert!(DatabaseConfig::parse("sqlite:data.db?min_connections=3").is_err());
        assert!(DatabaseConfig::parse("sqlite:data.db?busy_timeout=soon").is_err());
        assert!(DatabaseConfig::parse("sqlite:data.db?acquire_timeout=0").is_err());
    }

    #[test]
    fn test_rejects_other_schemes() {
        let err = DatabaseConfig::parse("postgres://user@host/db").unwrap_err();
        assert!(err.contains("postgres"));
        assert!(DatabaseConfig::parse("not a url").is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let config = Config::try_parse_from([
            "schemadb",
            "--database",
            "sqlite:data.db",
            "--definition",
            "foo.json",
            "get",
            "42",
        ])
        .unwrap();
        assert_eq!(config.definition, PathBuf::from("foo.json"));
        assert_eq!(
            config.command,
            Command::Get {
                key: "42".to_string()
            }
        );
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_cli_list_filter_requires_both_parts() {
        let base = ["schemadb", "-d", "sqlite:data.db", "-t", "foo.json", "list"];
        assert!(Config::try_parse_from(base).is_ok());

        let mut with_field = base.to_vec();
        with_field.extend(["--field", "int"]);
        assert!(Config::try_parse_from(with_field).is_err());

        let mut full = base.to_vec();
        full.extend(["--field", "int", "--equals", "3"]);
        let config = Config::try_parse_from(full).unwrap();
        assert_eq!(
            config.command,
            Command::List {
                field: Some("int".to_string()),
                equals: Some("3".to_string())
            }
        );
    }
}
