//! Generation bookkeeping on update.
//!
//! `metadata.generation` moves on any spec change; `spec.templateGeneration`
//! moves only when the pod template changes. Rollout logic keys on the latter
//! to decide when pods are replaced.

use flotilla_core::{semantic_eq, DaemonSet};
use metrics::counter;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GenerationChange {
    /// Spec unchanged; counters carried over.
    Unchanged,
    /// Spec changed outside the template; only `generation` moved.
    Spec,
    /// Template changed; both counters moved.
    Template,
}

/// Advance `new`'s counters relative to `old`.
///
/// `new.spec.template_generation` is expected to already hold the stored value.
/// Counters saturate at `i64::MAX`; a template change that cannot advance
/// `templateGeneration` is then rejected by update validation.
pub fn track_generation(old: &DaemonSet, new: &mut DaemonSet) -> GenerationChange {
    let change = if !semantic_eq(&old.spec.template, &new.spec.template) {
        new.spec.template_generation = old.spec.template_generation.saturating_add(1);
        new.set_generation(old.generation().saturating_add(1));
        GenerationChange::Template
    } else if !semantic_eq(&old.spec, &new.spec) {
        new.set_generation(old.generation().saturating_add(1));
        GenerationChange::Spec
    } else {
        new.metadata.generation = old.metadata.generation;
        GenerationChange::Unchanged
    };

    match change {
        GenerationChange::Template => {
            counter!("admission_generation_bumps_total", 1u64);
            counter!("admission_template_generation_bumps_total", 1u64);
        }
        GenerationChange::Spec => {
            counter!("admission_generation_bumps_total", 1u64);
        }
        GenerationChange::Unchanged => {}
    }
    debug!(
        key = %new.key(),
        ?change,
        generation = new.generation(),
        template_generation = new.spec.template_generation,
        "tracked generation"
    );
    change
}
