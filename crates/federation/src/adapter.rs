//! Resource-kind adapters: copy, equivalence and annotation access for the
//! generic federation logic. Each supported kind gets one implementation.
//!
//! Equivalence ignores system-managed state. From `ObjectMeta` only name,
//! namespace, labels and annotations take part (absent and empty maps are
//! the same); uid, resourceVersion, generation, timestamps, managed fields,
//! owner references and finalizers are ignored, as is status.

use std::collections::BTreeMap;

use flotilla_core::{semantic_eq, DaemonSet};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::ByteString;
use kube::{Resource, ResourceExt};

pub trait FederatedTypeAdapter: Send + Sync {
    type Object: Resource + Clone + Send + Sync + 'static;

    /// Lower-case kind name used in logs and errors.
    fn kind(&self) -> &'static str;

    /// Independent copy of `obj`; mutating it never affects the original.
    fn copy(&self, obj: &Self::Object) -> Self::Object {
        obj.clone()
    }

    /// Whether `a` and `b` describe the same desired state.
    fn equivalent(&self, a: &Self::Object, b: &Self::Object) -> bool;

    /// A minimal valid object in `namespace` for exercising the adapter.
    fn new_test_object(&self, namespace: &str) -> Self::Object;

    fn annotation(&self, obj: &Self::Object, key: &str) -> Option<String> {
        get_annotation(obj, key)
    }

    fn set_annotation(&self, obj: &mut Self::Object, key: &str, value: &str) {
        set_annotation(obj, key, value)
    }
}

pub fn get_annotation<K: Resource>(obj: &K, key: &str) -> Option<String> {
    obj.annotations().get(key).cloned()
}

pub fn set_annotation<K: Resource>(obj: &mut K, key: &str, value: &str) {
    obj.annotations_mut().insert(key.to_string(), value.to_string());
}

fn maps_equivalent(a: Option<&BTreeMap<String, String>>, b: Option<&BTreeMap<String, String>>) -> bool {
    let empty = BTreeMap::new();
    a.unwrap_or(&empty) == b.unwrap_or(&empty)
}

/// Name, namespace, labels and annotations match.
pub fn object_meta_equivalent(a: &ObjectMeta, b: &ObjectMeta) -> bool {
    a.name == b.name
        && a.namespace == b.namespace
        && maps_equivalent(a.labels.as_ref(), b.labels.as_ref())
        && maps_equivalent(a.annotations.as_ref(), b.annotations.as_ref())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SecretAdapter;

impl FederatedTypeAdapter for SecretAdapter {
    type Object = Secret;

    fn kind(&self) -> &'static str {
        "secret"
    }

    /// `stringData` is write-only and folded into `data` by the apiserver, so it is not compared.
    fn equivalent(&self, a: &Secret, b: &Secret) -> bool {
        object_meta_equivalent(&a.metadata, &b.metadata) && semantic_eq(&a.data, &b.data) && a.type_ == b.type_
    }

    fn new_test_object(&self, namespace: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                generate_name: Some("test-secret-".into()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("token".to_string(), ByteString(b"not-so-secret".to_vec()))])),
            type_: Some("Opaque".into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DaemonSetAdapter;

impl FederatedTypeAdapter for DaemonSetAdapter {
    type Object = DaemonSet;

    fn kind(&self) -> &'static str {
        "daemonset"
    }

    /// `spec.templateGeneration` is advanced by each member apiserver on its own,
    /// so it never takes part in the comparison.
    fn equivalent(&self, a: &DaemonSet, b: &DaemonSet) -> bool {
        if !object_meta_equivalent(&a.metadata, &b.metadata) {
            return false;
        }
        let mut a_spec = a.spec.clone();
        a_spec.template_generation = b.spec.template_generation;
        semantic_eq(&a_spec, &b.spec)
    }

    fn new_test_object(&self, namespace: &str) -> DaemonSet {
        let labels = BTreeMap::from([("app".to_string(), "test-daemonset".to_string())]);
        let mut ds = DaemonSet::default();
        ds.metadata = ObjectMeta {
            generate_name: Some("test-daemonset-".into()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        };
        ds.spec.selector = Some(LabelSelector { match_labels: Some(labels.clone()), ..Default::default() });
        ds.spec.template = PodTemplateSpec {
            metadata: Some(ObjectMeta { labels: Some(labels), ..Default::default() }),
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "agent".into(),
                    image: Some("registry.local/agent:1".into()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        };
        ds.spec.template_generation = 1;
        ds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DaemonSetStatus;

    #[test]
    fn secret_equivalence_ignores_system_managed_metadata() {
        let adapter = SecretAdapter;
        let a = adapter.new_test_object("default");
        let mut b = adapter.copy(&a);
        b.metadata.uid = Some("0b0e5ad5-6c9f-4d5e-8f51-2fd0f4a1c0de".into());
        b.metadata.resource_version = Some("12345".into());
        b.metadata.generation = Some(7);
        b.metadata.labels = Some(BTreeMap::new());
        assert!(adapter.equivalent(&a, &b));
    }

    #[test]
    fn secret_equivalence_sees_annotations_data_and_type() {
        let adapter = SecretAdapter;
        let a = adapter.new_test_object("default");

        let mut annotated = adapter.copy(&a);
        adapter.set_annotation(&mut annotated, "foo", "bar");
        assert_eq!(adapter.annotation(&annotated, "foo").as_deref(), Some("bar"));
        assert_eq!(adapter.annotation(&a, "foo"), None);
        assert!(!adapter.equivalent(&a, &annotated));

        let mut data = adapter.copy(&a);
        data.data = Some(BTreeMap::from([("token".to_string(), ByteString(b"rotated".to_vec()))]));
        assert!(!adapter.equivalent(&a, &data));

        let mut typed = adapter.copy(&a);
        typed.type_ = Some("kubernetes.io/tls".into());
        assert!(!adapter.equivalent(&a, &typed));
    }

    #[test]
    fn daemonset_equivalence_ignores_status_and_template_generation() {
        let adapter = DaemonSetAdapter;
        let a = adapter.new_test_object("kube-system");
        let mut b = adapter.copy(&a);
        b.status = DaemonSetStatus { number_ready: 4, desired_number_scheduled: 4, ..Default::default() };
        b.spec.template_generation = 9;
        assert!(adapter.equivalent(&a, &b));

        b.spec.min_ready_seconds = 30;
        assert!(!adapter.equivalent(&a, &b));
    }

    #[test]
    fn copies_are_independent() {
        let adapter = DaemonSetAdapter;
        let a = adapter.new_test_object("kube-system");
        let mut b = adapter.copy(&a);
        adapter.set_annotation(&mut b, "cluster", "east");
        assert!(a.metadata.annotations.is_none());
    }
}
