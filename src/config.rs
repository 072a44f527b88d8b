//! Server configuration loaded from an optional TOML file.
//!
//! Resolution order, lowest to highest precedence: built-in defaults, the
//! config file, then explicit overrides from the command line.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::DEFAULT_ADJACENCY_CAPACITY;
use crate::graph::CostModel;
use crate::store::StoreOptions;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "GRAPHION_CONFIG";

/// Fully resolved server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// SQLite database holding the `edges` table.
    pub database: PathBuf,
    /// Interface to bind.
    pub host: IpAddr,
    /// Port to bind.
    pub port: u16,
    /// Maximum adjacency cache entries.
    pub adjacency_capacity: usize,
    /// Edge cost policy used by route lookups.
    pub cost_model: CostModel,
    /// Writer lock wait before an update fails.
    pub busy_timeout: Duration,
    /// Idle SQLite connections kept for reuse.
    pub pool_size: usize,
    /// `tracing` filter directive, e.g. `info` or `graphion=debug`.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("graphion.db"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            adjacency_capacity: DEFAULT_ADJACENCY_CAPACITY,
            cost_model: CostModel::Distance,
            busy_timeout: Duration::from_millis(5_000),
            pool_size: 8,
            log_filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads defaults merged with the config file, if one exists.
    ///
    /// `explicit` wins over `$GRAPHION_CONFIG`, which wins over the platform
    /// config directory. A missing file at the default location is not an
    /// error; a missing file named by `explicit` or the environment is.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::load_from(explicit, from_env.as_deref(), default_config_path())
    }

    fn load_from(
        explicit: Option<&Path>,
        from_env: Option<&Path>,
        fallback: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = explicit.or(from_env) {
            config.merge(read_file(path)?);
        } else if let Some(path) = fallback.filter(|path| path.exists()) {
            config.merge(read_file(&path)?);
        }
        Ok(config)
    }

    /// Parses a TOML document and merges it over the defaults.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        let mut config = Self::default();
        config.merge(raw);
        Ok(config)
    }

    /// Applies command-line overrides.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(database) = overrides.database {
            self.database = database;
        }
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(capacity) = overrides.adjacency_capacity {
            self.adjacency_capacity = capacity;
        }
        if let Some(model) = overrides.cost_model {
            self.cost_model = model;
        }
        if let Some(filter) = overrides.log_filter {
            self.log_filter = filter;
        }
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Store options derived from this config.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: self.busy_timeout,
            pool_size: self.pool_size,
        }
    }

    fn merge(&mut self, raw: RawConfig) {
        if let Some(database) = raw.database.path {
            self.database = database;
        }
        if let Some(ms) = raw.database.busy_timeout_ms {
            self.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(pool_size) = raw.database.pool_size {
            self.pool_size = pool_size;
        }
        if let Some(host) = raw.server.host {
            self.host = host;
        }
        if let Some(port) = raw.server.port {
            self.port = port;
        }
        if let Some(capacity) = raw.cache.adjacency_capacity {
            self.adjacency_capacity = capacity;
        }
        if let Some(model) = raw.routing.cost_model {
            self.cost_model = model;
        }
        if let Some(filter) = raw.log.filter {
            self.log_filter = filter;
        }
    }
}

/// Values supplied on the command line; `None` keeps the loaded value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Database path.
    pub database: Option<PathBuf>,
    /// Bind host.
    pub host: Option<IpAddr>,
    /// Bind port.
    pub port: Option<u16>,
    /// Adjacency cache capacity.
    pub adjacency_capacity: Option<usize>,
    /// Cost policy.
    pub cost_model: Option<CostModel>,
    /// Log filter.
    pub log_filter: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    routing: RoutingSection,
    #[serde(default)]
    log: LogSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct DatabaseSection {
    path: Option<PathBuf>,
    busy_timeout_ms: Option<u64>,
    pool_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    host: Option<IpAddr>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct CacheSection {
    adjacency_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RoutingSection {
    cost_model: Option<CostModel>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    filter: Option<String>,
}

/// Failure to load the server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Platform default location of the server config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("graphion").join("server.toml"))
}
