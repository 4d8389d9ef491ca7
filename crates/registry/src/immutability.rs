//! Selector immutability, decided per API group/version.
//!
//! `extensions/v1beta1` clients historically could rewrite `spec.selector`;
//! newer groups cannot. Every served group/version needs an explicit rule:
//! a missing one is caught by [`ImmutabilityPolicy::ensure_covers`] at startup
//! and is a panic if it is ever reached at request time.

use flotilla_core::request::{apps_v1beta2, display_group_version, extensions_v1beta1};
use flotilla_core::{DaemonSet, ErrorList, FieldError, FieldPath, GroupVersion, RequestContext};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectorRule {
    /// Selector may change (legacy compatibility).
    Mutable,
    /// Any selector change is rejected.
    Immutable,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("no selector immutability rule registered for served version {0}")]
    MissingRule(String),
    #[error("selector immutability rule registered twice for {0}")]
    DuplicateRule(String),
}

#[derive(Debug, Clone, Default)]
pub struct ImmutabilityPolicy {
    rules: Vec<(GroupVersion, SelectorRule)>,
}

impl ImmutabilityPolicy {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules for the DaemonSet API surface.
    pub fn daemonset() -> Self {
        Self {
            rules: vec![
                (extensions_v1beta1(), SelectorRule::Mutable),
                (apps_v1beta2(), SelectorRule::Immutable),
            ],
        }
    }

    pub fn with_rule(mut self, gv: GroupVersion, rule: SelectorRule) -> Result<Self, PolicyError> {
        if self.rule_for(&gv).is_some() {
            return Err(PolicyError::DuplicateRule(display_group_version(&gv)));
        }
        self.rules.push((gv, rule));
        Ok(self)
    }

    pub fn rule_for(&self, gv: &GroupVersion) -> Option<SelectorRule> {
        self.rules.iter().find(|(g, _)| g == gv).map(|(_, r)| *r)
    }

    pub fn group_versions(&self) -> impl Iterator<Item = &GroupVersion> {
        self.rules.iter().map(|(g, _)| g)
    }

    /// Fail if any served group/version has no rule.
    pub fn ensure_covers<'a>(&self, served: impl IntoIterator<Item = &'a GroupVersion>) -> Result<(), PolicyError> {
        for gv in served {
            if self.rule_for(gv).is_none() {
                return Err(PolicyError::MissingRule(display_group_version(gv)));
            }
        }
        Ok(())
    }

    /// Errors for a selector change that the request's group/version forbids.
    ///
    /// Requests without request info (internal callers) keep the legacy behaviour.
    ///
    /// # Panics
    ///
    /// When the request's group/version has no rule.
    pub fn validate(&self, ctx: &RequestContext, new: &DaemonSet, old: &DaemonSet) -> ErrorList {
        let Some(info) = ctx.request_info() else {
            return ErrorList::new();
        };
        let gv = info.group_version();
        let rule = match self.rule_for(&gv) {
            Some(rule) => rule,
            None => panic!("unexpected group/version: {}", display_group_version(&gv)),
        };
        match rule {
            SelectorRule::Mutable => ErrorList::new(),
            SelectorRule::Immutable if new.spec.selector == old.spec.selector => ErrorList::new(),
            SelectorRule::Immutable => {
                debug!(key = %new.key(), gv = %display_group_version(&gv), "selector change rejected");
                vec![FieldError::invalid(
                    FieldPath::new("spec").child("selector"),
                    &new.spec.selector,
                    "field is immutable",
                )]
            }
        }
    }
}
