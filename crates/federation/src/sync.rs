//! Per-cluster operation planning for a single federated object.
//!
//! One lookup is issued per ready cluster and all lookups run concurrently.
//! A failed lookup fails the whole pass: in-flight lookups are dropped and no
//! operations are returned, so callers never act on a partial picture.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use futures::future::try_join_all;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};

use crate::adapter::FederatedTypeAdapter;
use crate::cluster::Cluster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum OperationType {
    Add,
    Update,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Add => "add",
            OperationType::Update => "update",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corrective action for one cluster. `object` is owned by the operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FederatedOperation<T> {
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub cluster_name: String,
    pub key: String,
    pub object: T,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to get {kind} {key:?} from cluster {cluster:?}: {source}")]
    Lookup {
        kind: &'static str,
        key: String,
        cluster: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Looks up the observed object for `key` in one member cluster.
///
/// Implementations bound their own latency; the reconciler drops the future
/// when another cluster's lookup fails.
#[async_trait::async_trait]
pub trait ClusterObjectAccessor<T: Send + 'static>: Send + Sync {
    async fn get(&self, cluster: &str, key: &str) -> anyhow::Result<Option<T>>;
}

/// Accessor backed by a plain function.
pub struct FnAccessor<F>(pub F);

#[async_trait::async_trait]
impl<T, F> ClusterObjectAccessor<T> for FnAccessor<F>
where
    T: Send + 'static,
    F: Fn(&str, &str) -> anyhow::Result<Option<T>> + Send + Sync,
{
    async fn get(&self, cluster: &str, key: &str) -> anyhow::Result<Option<T>> {
        (self.0)(cluster, key)
    }
}

/// In-memory accessor: objects per cluster and key, with clusters marked as failing.
#[derive(Debug, Clone)]
pub struct StaticAccessor<T> {
    objects: BTreeMap<String, BTreeMap<String, T>>,
    failing: BTreeSet<String>,
}

impl<T> Default for StaticAccessor<T> {
    fn default() -> Self {
        Self { objects: BTreeMap::new(), failing: BTreeSet::new() }
    }
}

impl<T> StaticAccessor<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cluster: &str, key: &str, obj: T) {
        self.objects.entry(cluster.to_string()).or_default().insert(key.to_string(), obj);
    }

    /// Every lookup against `cluster` fails from now on.
    pub fn fail(&mut self, cluster: &str) {
        self.failing.insert(cluster.to_string());
    }
}

#[async_trait::async_trait]
impl<T> ClusterObjectAccessor<T> for StaticAccessor<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, cluster: &str, key: &str) -> anyhow::Result<Option<T>> {
        if self.failing.contains(cluster) {
            return Err(anyhow!("cluster {} is unreachable", cluster));
        }
        Ok(self.objects.get(cluster).and_then(|m| m.get(key)).cloned())
    }
}

/// Operations needed to bring every ready cluster in line with `desired`.
///
/// Output follows the order of `clusters`; consumers treat it as a set keyed
/// by cluster name. `desired` is never modified.
pub async fn cluster_operations<A, C>(
    adapter: &A,
    clusters: &[Cluster],
    desired: &A::Object,
    key: &str,
    accessor: &C,
) -> Result<Vec<FederatedOperation<A::Object>>, ReconcileError>
where
    A: FederatedTypeAdapter,
    C: ClusterObjectAccessor<A::Object> + ?Sized,
{
    let lookups = clusters.iter().filter(|c| c.is_ready()).map(|cluster| async move {
        let observed = accessor.get(&cluster.name, key).await.map_err(|source| {
            warn!(kind = adapter.kind(), key, cluster = %cluster.name, error = %source, "cluster lookup failed");
            counter!("federation_lookup_errors_total", 1u64, "kind" => adapter.kind());
            ReconcileError::Lookup { kind: adapter.kind(), key: key.to_string(), cluster: cluster.name.clone(), source }
        })?;
        let op_type = match observed {
            None => Some(OperationType::Add),
            Some(obj) if !adapter.equivalent(desired, &obj) => Some(OperationType::Update),
            Some(_) => None,
        };
        debug!(kind = adapter.kind(), key, cluster = %cluster.name, op = ?op_type, "cluster decision");
        Ok::<_, ReconcileError>(op_type.map(|op_type| FederatedOperation {
            op_type,
            cluster_name: cluster.name.clone(),
            key: key.to_string(),
            object: adapter.copy(desired),
        }))
    });

    let decisions = try_join_all(lookups).await?;
    let operations: Vec<_> = decisions.into_iter().flatten().collect();
    for op in &operations {
        counter!("federation_operations_total", 1u64, "kind" => adapter.kind(), "type" => op.op_type.as_str());
    }
    Ok(operations)
}

/// An adapter and accessor pair for one resource kind.
pub struct ClusterReconciler<A, C: ?Sized> {
    adapter: Arc<A>,
    accessor: Arc<C>,
}

impl<A, C> ClusterReconciler<A, C>
where
    A: FederatedTypeAdapter,
    C: ClusterObjectAccessor<A::Object> + ?Sized,
{
    pub fn new(adapter: Arc<A>, accessor: Arc<C>) -> Self {
        Self { adapter, accessor }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub async fn cluster_operations(
        &self,
        clusters: &[Cluster],
        desired: &A::Object,
        key: &str,
    ) -> Result<Vec<FederatedOperation<A::Object>>, ReconcileError> {
        cluster_operations(self.adapter.as_ref(), clusters, desired, key, self.accessor.as_ref()).await
    }
}
