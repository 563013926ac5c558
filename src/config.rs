/*!
Configuration file handling.

The configuration is a TOML file. Every section and every key is optional, missing values fall
back to the defaults of the demo fabric (2 spines, 3 leaves, link cost 10).

```toml
[fabric]
spines = 2
leaves = 4
spine_leaf_cost = 10
loopback_pool = "10.255.0.0/24"
vtep_pool = "10.0.0.0/24"

[[overlay.segments]]
vni = 100
name = "V100"
members = ["L1", "L3"]

[logging]
filter = "fabric_sim=debug"
```
*/

use std::{net::Ipv4Addr, path::Path};

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fabric: FabricConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    /// Load the configuration from `path`, or return the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Parameters of the generated spine-leaf fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricConfig {
    #[serde(default = "default_spines")]
    pub spines: u32,

    #[serde(default = "default_leaves")]
    pub leaves: u32,

    #[serde(default = "default_link_cost")]
    pub spine_leaf_cost: u32,

    /// When set, spines are also meshed together with this cost.
    #[serde(default)]
    pub spine_spine_cost: Option<u32>,

    #[serde(default = "default_loopback_pool")]
    pub loopback_pool: Ipv4Network,

    #[serde(default = "default_vtep_pool")]
    pub vtep_pool: Ipv4Network,
}

fn default_spines() -> u32 {
    2
}

fn default_leaves() -> u32 {
    3
}

fn default_link_cost() -> u32 {
    10
}

fn default_loopback_pool() -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(10, 255, 0, 0), 24).expect("valid prefix length")
}

fn default_vtep_pool() -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 0), 24).expect("valid prefix length")
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            spines: default_spines(),
            leaves: default_leaves(),
            spine_leaf_cost: default_link_cost(),
            spine_spine_cost: None,
            loopback_pool: default_loopback_pool(),
            vtep_pool: default_vtep_pool(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Overlay segments. When empty, a default pair of segments spanning the leaves is used.
    #[serde(default)]
    pub segments: Vec<SegmentConfig>,

    /// Endpoints in addition to the one created for every leaf with a VTEP address.
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    pub vni: u32,

    #[serde(default)]
    pub name: Option<String>,

    /// Member endpoint ids. `None` means every leaf endpoint.
    #[serde(default)]
    pub members: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub id: String,
    pub router: String,

    #[serde(default)]
    pub ip: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives, overridden by `RUST_LOG`.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_interval() -> u64 {
    5
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.fabric.spines, 2);
        assert_eq!(config.fabric.leaves, 3);
        assert_eq!(config.fabric.spine_leaf_cost, 10);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.watch.interval_secs, 5);
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml(
            r#"
            [fabric]
            leaves = 4
            spine_leaf_cost = 1
            vtep_pool = "192.168.10.0/24"

            [[overlay.segments]]
            vni = 100
            name = "V100"
            members = ["L1", "L3"]

            [[overlay.segments]]
            vni = 300

            [[overlay.endpoints]]
            id = "host-vtep"
            router = "S1"
            ip = "192.168.99.1"
            "#,
        )
        .unwrap();

        assert_eq!(config.fabric.spines, 2);
        assert_eq!(config.fabric.leaves, 4);
        assert_eq!(config.fabric.spine_leaf_cost, 1);
        assert_eq!(config.fabric.vtep_pool.to_string(), "192.168.10.0/24");
        assert_eq!(config.overlay.segments.len(), 2);
        assert_eq!(
            config.overlay.segments[0].members,
            Some(vec!["L1".to_string(), "L3".to_string()])
        );
        assert_eq!(config.overlay.segments[1].members, None);
        assert_eq!(config.overlay.endpoints[0].ip, Some(Ipv4Addr::new(192, 168, 99, 1)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load(Some(Path::new("/nonexistent/fabric-sim.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[fabric]\nspines = \"two\"\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
