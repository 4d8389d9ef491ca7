//! DaemonSet resource model.
//!
//! Sub-objects (pod template, selector, status, update strategy) are the
//! upstream `k8s-openapi` types; `DaemonSetSpec` keeps the `templateGeneration`
//! counter that rollout logic keys on.

use std::borrow::Cow;

use k8s_openapi::api::apps::v1::{DaemonSetStatus, DaemonSetUpdateStrategy};
use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::{Deserialize, Serialize};

pub const KIND: &str = "DaemonSet";
pub const PLURAL: &str = "daemonsets";
/// Storage group/version the registry persists under.
pub const STORAGE_GROUP: &str = "extensions";
pub const STORAGE_VERSION: &str = "v1beta1";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSet {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DaemonSetSpec,
    #[serde(default)]
    pub status: DaemonSetStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSetSpec {
    /// Label query over the pods managed by this DaemonSet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    #[serde(default)]
    pub template: PodTemplateSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<DaemonSetUpdateStrategy>,
    #[serde(default)]
    pub min_ready_seconds: i32,
    /// Bumped only when `template` changes; pods are replaced when it moves.
    #[serde(default)]
    pub template_generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_history_limit: Option<i32>,
}

impl DaemonSet {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// `metadata.generation`, zero when unset.
    pub fn generation(&self) -> i64 {
        self.metadata.generation.unwrap_or(0)
    }

    pub fn set_generation(&mut self, generation: i64) {
        self.metadata.generation = Some(generation);
    }

    pub fn pod_spec(&self) -> Option<&PodSpec> {
        self.spec.template.spec.as_ref()
    }

    pub fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        self.spec.template.spec.as_mut()
    }

    /// `namespace/name` key used by caches and operation logs.
    pub fn key(&self) -> String {
        let name = self.metadata.name.as_deref().unwrap_or("");
        match self.metadata.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{}/{}", ns, name),
            _ => name.to_string(),
        }
    }
}

impl Resource for DaemonSet {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(KIND)
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(STORAGE_GROUP)
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(STORAGE_VERSION)
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(PLURAL)
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
