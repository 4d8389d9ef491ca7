//! Flotilla registry: create/update strategies for DaemonSets.
//!
//! A strategy normalizes and validates an object before the storage layer
//! persists it. Storage, optimistic concurrency and HTTP mapping live elsewhere.

#![forbid(unsafe_code)]

use flotilla_core::{ErrorList, RequestContext};
use serde::{Deserialize, Serialize};

pub mod generation;
pub mod immutability;
pub mod pod;
pub mod strategy;
pub mod validation;

pub use generation::{track_generation, GenerationChange};
pub use immutability::{ImmutabilityPolicy, PolicyError, SelectorRule};
pub use pod::DisabledFieldDropper;
pub use strategy::{DaemonSetStatusStrategy, DaemonSetStrategy};
pub use validation::{Rules, StandardRules};

/// What the garbage collector does with dependents when no policy is given on delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GarbageCollectionPolicy {
    OrphanDependents,
    DeleteDependents,
}

/// Hooks the registry runs around create and update of `T`.
pub trait RestStrategy<T>: Send + Sync {
    fn namespace_scoped(&self) -> bool;

    /// Normalize a new object before validation. Never fails.
    fn prepare_for_create(&self, ctx: &RequestContext, obj: &mut T);

    /// Normalize `new` against the stored `old`. Both may be rewritten.
    fn prepare_for_update(&self, ctx: &RequestContext, new: &mut T, old: &mut T);

    fn validate(&self, ctx: &RequestContext, obj: &T) -> ErrorList;

    fn validate_update(&self, ctx: &RequestContext, new: &T, old: &T) -> ErrorList;

    /// Runs after validation succeeds.
    fn canonicalize(&self, _obj: &mut T) {}

    /// Whether an update of a missing object may create it.
    fn allow_create_on_update(&self) -> bool;

    /// Whether updates without a resourceVersion precondition are accepted.
    fn allow_unconditional_update(&self) -> bool;

    fn default_garbage_collection_policy(&self) -> GarbageCollectionPolicy;
}
