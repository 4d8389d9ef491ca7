use std::path::Path;

use anyhow::{Context, Result};
use flotilla_federation::{Cluster, ConditionStatus};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Read a YAML (or JSON) document from `path`.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// One entry of a `--clusters` file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterEntry {
    pub name: String,
    #[serde(default = "ready_by_default")]
    pub ready: bool,
    /// Object currently stored in the cluster; absent means not found.
    #[serde(default)]
    pub observed: Option<serde_json::Value>,
}

fn ready_by_default() -> bool {
    true
}

impl ClusterEntry {
    pub fn cluster(&self) -> Cluster {
        let status = if self.ready { ConditionStatus::True } else { ConditionStatus::False };
        Cluster::new(&self.name, status)
    }

    pub fn observed_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.observed
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .with_context(|| format!("decoding observed object for cluster {}", self.name))
    }
}
