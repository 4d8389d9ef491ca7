//! Stripping of pod-spec fields whose feature gate is off.

use flotilla_core::{Feature, FeatureGates};
use k8s_openapi::api::core::v1::PodSpec;

/// Removes fields that the current gate configuration does not allow.
pub trait DisabledFieldDropper: Send + Sync {
    fn drop_disabled_fields(&self, spec: &mut PodSpec);
}

impl DisabledFieldDropper for FeatureGates {
    fn drop_disabled_fields(&self, spec: &mut PodSpec) {
        if !self.enabled(Feature::PodPriority) {
            spec.priority = None;
            spec.priority_class_name = None;
        }
        if !self.enabled(Feature::LocalStorageCapacityIsolation) {
            for volume in spec.volumes.iter_mut().flatten() {
                if let Some(empty_dir) = volume.empty_dir.as_mut() {
                    empty_dir.size_limit = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, Volume};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    fn spec() -> PodSpec {
        PodSpec {
            priority: Some(100),
            priority_class_name: Some("high".into()),
            volumes: Some(vec![Volume {
                name: "scratch".into(),
                empty_dir: Some(EmptyDirVolumeSource { size_limit: Some(Quantity("1Gi".into())), ..Default::default() }),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn disabled_gates_strip_alpha_fields() {
        let mut s = spec();
        FeatureGates::default().drop_disabled_fields(&mut s);
        assert_eq!(s.priority, None);
        assert_eq!(s.priority_class_name, None);
        let vols = s.volumes.unwrap();
        assert_eq!(vols[0].empty_dir.as_ref().unwrap().size_limit, None);
    }

    #[test]
    fn enabled_gates_keep_fields() {
        let mut s = spec();
        FeatureGates::all_enabled().drop_disabled_fields(&mut s);
        assert_eq!(s, spec());
    }
}
