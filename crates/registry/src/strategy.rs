//! DaemonSet create/update strategies.

use std::sync::Arc;

use flotilla_core::request::{apps_v1beta2, extensions_v1beta1};
use flotilla_core::{DaemonSet, ErrorList, FeatureGates, GroupVersion, RequestContext};
use k8s_openapi::api::apps::v1::DaemonSetStatus;
use metrics::counter;
use tracing::{debug, info};

use crate::generation::{track_generation, GenerationChange};
use crate::immutability::{ImmutabilityPolicy, PolicyError};
use crate::pod::DisabledFieldDropper;
use crate::validation::{Rules, StandardRules};
use crate::{GarbageCollectionPolicy, RestStrategy};

/// Group/versions the DaemonSet API is served under.
pub fn served_group_versions() -> Vec<GroupVersion> {
    vec![extensions_v1beta1(), apps_v1beta2()]
}

/// Main-path strategy: users write spec and metadata, never status.
pub struct DaemonSetStrategy {
    dropper: Arc<dyn DisabledFieldDropper>,
    rules: Arc<dyn Rules>,
    policy: ImmutabilityPolicy,
}

impl DaemonSetStrategy {
    /// Build a strategy and check that `policy` has a rule for every served group/version.
    pub fn new(
        dropper: Arc<dyn DisabledFieldDropper>,
        rules: Arc<dyn Rules>,
        policy: ImmutabilityPolicy,
        served: &[GroupVersion],
    ) -> Result<Self, PolicyError> {
        policy.ensure_covers(served)?;
        Ok(Self { dropper, rules, policy })
    }

    /// Standard rules and the DaemonSet selector policy over the given gates.
    pub fn with_gates(gates: FeatureGates) -> Self {
        Self { dropper: Arc::new(gates), rules: Arc::new(StandardRules), policy: ImmutabilityPolicy::daemonset() }
    }

    pub fn policy(&self) -> &ImmutabilityPolicy {
        &self.policy
    }

    pub(crate) fn rules(&self) -> &dyn Rules {
        self.rules.as_ref()
    }

    fn drop_disabled_fields(&self, ds: &mut DaemonSet) {
        if let Some(pod) = ds.pod_spec_mut() {
            self.dropper.drop_disabled_fields(pod);
        }
    }
}

impl Default for DaemonSetStrategy {
    fn default() -> Self {
        Self::with_gates(FeatureGates::default())
    }
}

impl RestStrategy<DaemonSet> for DaemonSetStrategy {
    fn namespace_scoped(&self) -> bool {
        true
    }

    fn prepare_for_create(&self, _ctx: &RequestContext, obj: &mut DaemonSet) {
        obj.status = DaemonSetStatus::default();
        obj.set_generation(1);
        if obj.spec.template_generation < 1 {
            obj.spec.template_generation = 1;
        }
        self.drop_disabled_fields(obj);
        debug!(key = %obj.key(), template_generation = obj.spec.template_generation, "prepared daemonset for create");
    }

    fn prepare_for_update(&self, _ctx: &RequestContext, new: &mut DaemonSet, old: &mut DaemonSet) {
        self.drop_disabled_fields(new);
        self.drop_disabled_fields(old);

        // status only moves through the status subresource
        new.status = old.status.clone();
        new.spec.template_generation = old.spec.template_generation;

        let change = track_generation(old, new);
        if change != GenerationChange::Unchanged {
            info!(
                key = %new.key(),
                ?change,
                generation = new.generation(),
                template_generation = new.spec.template_generation,
                "daemonset spec changed"
            );
        }
    }

    fn validate(&self, _ctx: &RequestContext, obj: &DaemonSet) -> ErrorList {
        let errs = self.rules.validate(obj);
        record_validation(&errs);
        errs
    }

    fn validate_update(&self, ctx: &RequestContext, new: &DaemonSet, old: &DaemonSet) -> ErrorList {
        let mut errs = self.rules.validate_update(new, old);
        errs.extend(self.policy.validate(ctx, new, old));
        record_validation(&errs);
        errs
    }

    fn allow_create_on_update(&self) -> bool {
        false
    }

    fn allow_unconditional_update(&self) -> bool {
        true
    }

    /// Orphan was the behaviour before server-side garbage collection existed.
    fn default_garbage_collection_policy(&self) -> GarbageCollectionPolicy {
        GarbageCollectionPolicy::OrphanDependents
    }
}

/// Status-subresource strategy. Spec changes submitted here are discarded.
pub struct DaemonSetStatusStrategy {
    base: Arc<DaemonSetStrategy>,
}

impl DaemonSetStatusStrategy {
    pub fn new(base: Arc<DaemonSetStrategy>) -> Self {
        Self { base }
    }
}

impl RestStrategy<DaemonSet> for DaemonSetStatusStrategy {
    fn namespace_scoped(&self) -> bool {
        self.base.namespace_scoped()
    }

    fn prepare_for_create(&self, ctx: &RequestContext, obj: &mut DaemonSet) {
        self.base.prepare_for_create(ctx, obj)
    }

    fn prepare_for_update(&self, _ctx: &RequestContext, new: &mut DaemonSet, old: &mut DaemonSet) {
        new.spec = old.spec.clone();
        new.metadata.generation = old.metadata.generation;
    }

    fn validate(&self, ctx: &RequestContext, obj: &DaemonSet) -> ErrorList {
        self.base.validate(ctx, obj)
    }

    fn validate_update(&self, _ctx: &RequestContext, new: &DaemonSet, old: &DaemonSet) -> ErrorList {
        let errs = self.base.rules().validate_status_update(new, old);
        record_validation(&errs);
        errs
    }

    fn canonicalize(&self, obj: &mut DaemonSet) {
        self.base.canonicalize(obj)
    }

    fn allow_create_on_update(&self) -> bool {
        self.base.allow_create_on_update()
    }

    fn allow_unconditional_update(&self) -> bool {
        self.base.allow_unconditional_update()
    }

    fn default_garbage_collection_policy(&self) -> GarbageCollectionPolicy {
        self.base.default_garbage_collection_policy()
    }
}

fn record_validation(errs: &ErrorList) {
    if !errs.is_empty() {
        counter!("admission_validation_errors_total", errs.len() as u64);
        debug!(count = errs.len(), first = %errs[0], "validation failed");
    }
}
