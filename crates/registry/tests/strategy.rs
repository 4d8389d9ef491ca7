#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use flotilla_core::request::{apps_v1beta2, extensions_v1beta1, group_version};
use flotilla_core::{DaemonSet, Feature, FeatureGates, RequestContext};
use flotilla_registry::strategy::served_group_versions;
use flotilla_registry::{
    DaemonSetStatusStrategy, DaemonSetStrategy, GarbageCollectionPolicy, ImmutabilityPolicy, PolicyError, RestStrategy,
    StandardRules,
};
use k8s_openapi::api::apps::v1::DaemonSetStatus;
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, ResourceRequirements, Toleration};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

fn labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), app.to_string())])
}

fn ds(image: &str) -> DaemonSet {
    let mut d = DaemonSet::new("kube-system", "node-agent");
    d.spec.selector = Some(LabelSelector { match_labels: Some(labels("agent")), ..Default::default() });
    d.spec.template = PodTemplateSpec {
        metadata: Some(ObjectMeta { labels: Some(labels("agent")), ..Default::default() }),
        spec: Some(PodSpec {
            containers: vec![Container { name: "agent".into(), image: Some(image.into()), ..Default::default() }],
            ..Default::default()
        }),
    };
    d
}

fn reported_status(ready: i32) -> DaemonSetStatus {
    DaemonSetStatus {
        current_number_scheduled: 3,
        desired_number_scheduled: 3,
        number_ready: ready,
        observed_generation: Some(1),
        ..Default::default()
    }
}

fn created(strategy: &DaemonSetStrategy, image: &str) -> DaemonSet {
    let mut d = ds(image);
    strategy.prepare_for_create(&RequestContext::internal(), &mut d);
    d
}

/// Run an update the way the registry does and return the stored result.
fn update(strategy: &DaemonSetStrategy, stored: &DaemonSet, mut new: DaemonSet) -> DaemonSet {
    let mut old = stored.clone();
    strategy.prepare_for_update(&RequestContext::internal(), &mut new, &mut old);
    new
}

#[test]
fn create_resets_status_and_counters() {
    let strategy = DaemonSetStrategy::default();
    let mut d = ds("agent:1");
    d.status = reported_status(3);
    d.set_generation(42);
    d.spec.template_generation = 0;
    strategy.prepare_for_create(&RequestContext::internal(), &mut d);
    assert_eq!(d.status, DaemonSetStatus::default());
    assert_eq!(d.generation(), 1);
    assert_eq!(d.spec.template_generation, 1);

    let mut keep = ds("agent:1");
    keep.spec.template_generation = 7;
    strategy.prepare_for_create(&RequestContext::internal(), &mut keep);
    assert_eq!(keep.spec.template_generation, 7);
}

#[test]
fn create_normalization_is_idempotent() {
    let strategy = DaemonSetStrategy::default();
    let once = created(&strategy, "agent:1");
    let mut twice = once.clone();
    strategy.prepare_for_create(&RequestContext::internal(), &mut twice);
    assert_eq!(once, twice);
    assert_eq!(twice.status, DaemonSetStatus::default());
}

#[test]
fn generation_is_monotonic_and_tracks_spec_changes() {
    let strategy = DaemonSetStrategy::default();
    let mut stored = created(&strategy, "agent:1");

    // (next object, spec changed?, template changed?)
    let mut steps: Vec<(DaemonSet, bool, bool)> = Vec::new();
    steps.push((ds("agent:1"), false, false));
    steps.push((ds("agent:2"), true, true));
    let mut tolerant = ds("agent:2");
    tolerant.spec.min_ready_seconds = 15;
    steps.push((tolerant.clone(), true, false));
    steps.push((tolerant.clone(), false, false));
    let mut retolerated = tolerant.clone();
    if let Some(pod) = retolerated.pod_spec_mut() {
        pod.tolerations = Some(vec![Toleration { operator: Some("Exists".into()), ..Default::default() }]);
    }
    steps.push((retolerated, true, true));

    for (i, (next, spec_changed, template_changed)) in steps.into_iter().enumerate() {
        let result = update(&strategy, &stored, next);
        assert!(result.generation() >= stored.generation(), "step {i}: generation decreased");
        assert!(result.spec.template_generation >= stored.spec.template_generation, "step {i}: template generation decreased");
        assert_eq!(result.generation() > stored.generation(), spec_changed, "step {i}: generation");
        assert_eq!(
            result.spec.template_generation > stored.spec.template_generation,
            template_changed,
            "step {i}: template generation"
        );
        assert!(result.spec.template_generation >= 1);
        stored = result;
    }
    assert_eq!(stored.generation(), 4);
    assert_eq!(stored.spec.template_generation, 3);
}

#[test]
fn exhausted_template_generation_rejects_template_changes() {
    let strategy = DaemonSetStrategy::default();
    let mut d = ds("agent:1");
    d.spec.template_generation = i64::MAX;
    strategy.prepare_for_create(&RequestContext::internal(), &mut d);
    assert_eq!(d.spec.template_generation, i64::MAX);
    assert!(strategy.validate(&RequestContext::internal(), &d).is_empty());

    let mut old = d.clone();
    let mut new = ds("agent:2");
    strategy.prepare_for_update(&RequestContext::internal(), &mut new, &mut old);
    assert_eq!(new.spec.template_generation, i64::MAX);
    let errs = strategy.validate_update(&RequestContext::internal(), &new, &old);
    assert_eq!(errs.len(), 1, "errors: {errs:?}");
    assert_eq!(errs[0].path.to_string(), "spec.templateGeneration");
}

#[test]
fn equal_quantities_in_another_unit_do_not_roll_out() {
    let strategy = DaemonSetStrategy::default();
    let with_memory = |memory: &str| {
        let mut d = ds("agent:1");
        if let Some(pod) = d.pod_spec_mut() {
            pod.containers[0].resources = Some(ResourceRequirements {
                limits: Some(BTreeMap::from([("memory".to_string(), Quantity(memory.into()))])),
                ..Default::default()
            });
        }
        d
    };
    let mut stored = with_memory("1Gi");
    strategy.prepare_for_create(&RequestContext::internal(), &mut stored);
    let result = update(&strategy, &stored, with_memory("1024Mi"));
    assert_eq!(result.generation(), stored.generation());
    assert_eq!(result.spec.template_generation, stored.spec.template_generation);
    assert!(strategy.validate_update(&RequestContext::internal(), &result, &stored).is_empty());
}

#[test]
fn client_cannot_set_template_generation() {
    let strategy = DaemonSetStrategy::default();
    let stored = created(&strategy, "agent:1");
    let mut new = ds("agent:1");
    new.spec.template_generation = 50;
    let result = update(&strategy, &stored, new);
    assert_eq!(result.spec.template_generation, stored.spec.template_generation);
    assert_eq!(result.generation(), stored.generation());
}

#[test]
fn update_keeps_stored_status() {
    let strategy = DaemonSetStrategy::default();
    let mut stored = created(&strategy, "agent:1");
    stored.status = reported_status(2);
    let mut new = ds("agent:2");
    new.status = reported_status(99);
    let result = update(&strategy, &stored, new);
    assert_eq!(result.status, stored.status);
}

#[test]
fn disabled_fields_are_stripped_on_both_sides() {
    let strategy = DaemonSetStrategy::with_gates(FeatureGates::default());
    let mut stored = created(&strategy, "agent:1");
    // stored before the gate was turned off
    if let Some(pod) = stored.pod_spec_mut() {
        pod.priority_class_name = Some("system-node-critical".into());
    }
    let mut new = ds("agent:1");
    if let Some(pod) = new.pod_spec_mut() {
        pod.priority_class_name = Some("system-node-critical".into());
    }
    let result = update(&strategy, &stored, new);
    assert_eq!(result.pod_spec().and_then(|p| p.priority_class_name.clone()), None);
    assert_eq!(result.generation(), stored.generation());

    let permissive = DaemonSetStrategy::with_gates(FeatureGates::default().with(Feature::PodPriority, true));
    let mut kept = ds("agent:1");
    if let Some(pod) = kept.pod_spec_mut() {
        pod.priority_class_name = Some("system-node-critical".into());
    }
    permissive.prepare_for_create(&RequestContext::internal(), &mut kept);
    assert_eq!(kept.pod_spec().and_then(|p| p.priority_class_name.clone()).as_deref(), Some("system-node-critical"));
}

#[test]
fn selector_immutability_depends_on_request_version() {
    let strategy = DaemonSetStrategy::default();
    let stored = created(&strategy, "agent:1");
    let mut new = stored.clone();
    new.spec.selector = Some(LabelSelector { match_labels: Some(labels("agent-v2")), ..Default::default() });
    if let Some(meta) = new.spec.template.metadata.as_mut() {
        meta.labels = Some(labels("agent-v2"));
    }
    let mut old = stored.clone();
    strategy.prepare_for_update(&RequestContext::internal(), &mut new, &mut old);

    let current = strategy.validate_update(&RequestContext::for_group_version(&apps_v1beta2()), &new, &old);
    assert!(current.iter().any(|e| e.path.to_string() == "spec.selector"), "errors: {current:?}");

    let legacy = strategy.validate_update(&RequestContext::for_group_version(&extensions_v1beta1()), &new, &old);
    assert!(legacy.iter().all(|e| e.path.to_string() != "spec.selector"), "errors: {legacy:?}");
    assert!(legacy.is_empty(), "errors: {legacy:?}");
}

#[test]
#[should_panic(expected = "unexpected group/version")]
fn unreviewed_version_aborts_update_validation() {
    let strategy = DaemonSetStrategy::default();
    let stored = created(&strategy, "agent:1");
    strategy.validate_update(&RequestContext::for_group_version(&group_version("apps", "v1")), &stored, &stored);
}

#[test]
fn construction_fails_when_a_served_version_has_no_rule() {
    let mut served = served_group_versions();
    served.push(group_version("apps", "v1"));
    let res = DaemonSetStrategy::new(
        Arc::new(FeatureGates::default()),
        Arc::new(StandardRules),
        ImmutabilityPolicy::daemonset(),
        &served,
    );
    assert!(matches!(res, Err(PolicyError::MissingRule(ref gv)) if gv == "apps/v1"));

    let ok = DaemonSetStrategy::new(
        Arc::new(FeatureGates::default()),
        Arc::new(StandardRules),
        ImmutabilityPolicy::daemonset(),
        &served_group_versions(),
    );
    assert!(ok.is_ok());
}

#[test]
fn registry_policy_flags() {
    let strategy = DaemonSetStrategy::default();
    assert!(strategy.namespace_scoped());
    assert!(!strategy.allow_create_on_update());
    assert!(strategy.allow_unconditional_update());
    assert_eq!(strategy.default_garbage_collection_policy(), GarbageCollectionPolicy::OrphanDependents);

    let mut d = created(&strategy, "agent:1");
    let before = d.clone();
    strategy.canonicalize(&mut d);
    assert_eq!(d, before);
    assert!(strategy.validate(&RequestContext::internal(), &d).is_empty());
}

#[test]
fn status_strategy_ignores_spec_and_forwards_the_rest() {
    let base = Arc::new(DaemonSetStrategy::default());
    let status = DaemonSetStatusStrategy::new(Arc::clone(&base));
    let stored = created(&base, "agent:1");

    let mut new = ds("agent:2");
    new.set_generation(9);
    new.status = reported_status(3);
    let mut old = stored.clone();
    status.prepare_for_update(&RequestContext::internal(), &mut new, &mut old);
    assert_eq!(new.spec, stored.spec);
    assert_eq!(new.generation(), stored.generation());
    assert_eq!(new.status, reported_status(3));
    assert!(status.validate_update(&RequestContext::internal(), &new, &old).is_empty());

    new.status.number_misscheduled = -1;
    let errs = status.validate_update(&RequestContext::internal(), &new, &old);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].path.to_string(), "status.numberMisscheduled");

    assert!(!status.allow_create_on_update());
    assert!(status.allow_unconditional_update());
    assert!(status.namespace_scoped());
    assert_eq!(status.default_garbage_collection_policy(), GarbageCollectionPolicy::OrphanDependents);
}
