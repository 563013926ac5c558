/*!
Topology provider interface.

This module defines:
- `TopologyError`: error type for topology retrieval.
- `TopologySource`: an async trait that yields a validated `Fabric`.
- `FabricSource`: generates a spine-leaf fabric from configuration.
- `FileSource`: reads a `TopologySpec` from a JSON or TOML file.

Consumers (CLI watch loop, dashboard) only see `TopologySource` and re-run the pipeline on every
fetch.
*/

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    config::FabricConfig,
    network::fabric::{ConfigurationError, Fabric, TopologySpec},
};

/// Error type for topology retrieval.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("failed to read topology file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse topology file {path}: {message}")]
    Parse { path: String, message: String },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Convenience result alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// A small async interface for providing the underlay topology.
#[async_trait]
pub trait TopologySource: Send + Sync {
    async fn fetch_topology(&mut self) -> TopologyResult<Fabric>;

    /// Short human readable description, used in logs and the dashboard header.
    fn describe(&self) -> String;
}

/// Generated spine-leaf fabric.
#[derive(Debug, Clone)]
pub struct FabricSource {
    config: FabricConfig,
}

impl FabricSource {
    pub fn new(config: FabricConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TopologySource for FabricSource {
    async fn fetch_topology(&mut self) -> TopologyResult<Fabric> {
        Ok(Fabric::spine_leaf(&self.config)?)
    }

    fn describe(&self) -> String {
        format!(
            "spine-leaf {}x{} (cost {})",
            self.config.spines, self.config.leaves, self.config.spine_leaf_cost
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecFormat {
    Json,
    Toml,
}

impl SpecFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => SpecFormat::Toml,
            _ => SpecFormat::Json,
        }
    }
}

/// Topology read from a file on every fetch, so edits are picked up by the watch loop.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse(&self, content: &str) -> TopologyResult<TopologySpec> {
        let parsed = match SpecFormat::from_path(&self.path) {
            SpecFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            SpecFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| TopologyError::Parse {
            path: self.path.display().to_string(),
            message,
        })
    }
}

#[async_trait]
impl TopologySource for FileSource {
    async fn fetch_topology(&mut self) -> TopologyResult<Fabric> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| TopologyError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let spec = self.parse(&content)?;
        tracing::debug!(path = %self.path.display(), nodes = spec.nodes.len(), links = spec.links.len(), "read topology file");
        Ok(Fabric::from_spec(&spec)?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Source selected by the command line: a topology file when given, the generated fabric
/// otherwise.
pub fn select_source(topology: Option<&Path>, fabric: &FabricConfig) -> Box<dyn TopologySource> {
    match topology {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(FabricSource::new(fabric.clone())),
    }
}
