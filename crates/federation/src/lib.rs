//! Flotilla federation: decide, per member cluster, whether a desired object
//! must be created, updated, or left alone.
//!
//! Applying the resulting operations is the executor's job, not this crate's.

#![forbid(unsafe_code)]

pub mod adapter;
pub mod cluster;
pub mod sync;

pub use adapter::{
    get_annotation, object_meta_equivalent, set_annotation, DaemonSetAdapter, FederatedTypeAdapter, SecretAdapter,
};
pub use cluster::{Cluster, ClusterCondition, ClusterConditionType, ConditionStatus};
pub use sync::{
    cluster_operations, ClusterObjectAccessor, ClusterReconciler, FederatedOperation, FnAccessor, OperationType,
    ReconcileError, StaticAccessor,
};
