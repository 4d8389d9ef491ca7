//! Flotilla core types: the DaemonSet model, request context, field errors,
//! semantic equality and feature gates shared by the registry and federation crates.

#![forbid(unsafe_code)]

pub mod daemonset;
pub mod features;
pub mod field;
pub mod quantity;
pub mod request;
pub mod semantic;

pub use daemonset::{DaemonSet, DaemonSetSpec};
pub use features::{Feature, FeatureGateError, FeatureGates};
pub use field::{ErrorList, FieldError, FieldErrorKind, FieldPath};
pub use request::{GroupVersion, RequestContext, RequestInfo};
pub use quantity::{canonical_quantity, quantity_eq};
pub use semantic::semantic_eq;

pub mod prelude {
    pub use super::{
        semantic_eq, DaemonSet, DaemonSetSpec, ErrorList, Feature, FeatureGates, FieldError, FieldErrorKind,
        FieldPath, GroupVersion, RequestContext, RequestInfo,
    };
}
