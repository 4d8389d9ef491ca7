//! Feature gates controlling which alpha fields survive admission.
//!
//! Parsed from `Name=bool` pairs, e.g. `PodPriority=true,LocalStorageCapacityIsolation=false`.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Env var holding the gate list for binaries.
pub const FEATURE_GATES_ENV: &str = "FLOTILLA_FEATURE_GATES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    /// `priority` and `priorityClassName` on pod specs.
    PodPriority,
    /// `sizeLimit` on emptyDir volumes.
    LocalStorageCapacityIsolation,
}

impl Feature {
    pub const ALL: [Feature; 2] = [Feature::PodPriority, Feature::LocalStorageCapacityIsolation];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::PodPriority => "PodPriority",
            Feature::LocalStorageCapacityIsolation => "LocalStorageCapacityIsolation",
        }
    }

    /// Both gates are alpha and off unless enabled explicitly.
    pub fn default_enabled(&self) -> bool {
        false
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = FeatureGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| FeatureGateError::UnknownFeature(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FeatureGateError {
    #[error("unrecognized feature gate: {0}")]
    UnknownFeature(String),
    #[error("invalid value of {feature}={value}, expected true or false")]
    InvalidValue { feature: String, value: String },
    #[error("missing bool value for {0}")]
    MissingValue(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureGates {
    overrides: FxHashMap<Feature, bool>,
}

impl FeatureGates {
    pub fn enabled(&self, feature: Feature) -> bool {
        self.overrides.get(&feature).copied().unwrap_or_else(|| feature.default_enabled())
    }

    pub fn set(&mut self, feature: Feature, on: bool) {
        self.overrides.insert(feature, on);
    }

    pub fn with(mut self, feature: Feature, on: bool) -> Self {
        self.set(feature, on);
        self
    }

    /// Everything on; handy for tests that want fields preserved.
    pub fn all_enabled() -> Self {
        Feature::ALL.iter().fold(Self::default(), |g, f| g.with(*f, true))
    }

    /// Read gates from `FLOTILLA_FEATURE_GATES`; unset means defaults.
    pub fn from_env() -> Result<Self, FeatureGateError> {
        match std::env::var(FEATURE_GATES_ENV) {
            Ok(v) => v.parse(),
            Err(_) => Ok(Self::default()),
        }
    }
}

impl FromStr for FeatureGates {
    type Err = FeatureGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut gates = FeatureGates::default();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| FeatureGateError::MissingValue(pair.to_string()))?;
            let feature: Feature = name.trim().parse()?;
            let on = value.trim().parse::<bool>().map_err(|_| FeatureGateError::InvalidValue {
                feature: name.trim().to_string(),
                value: value.trim().to_string(),
            })?;
            gates.set(feature, on);
        }
        Ok(gates)
    }
}

impl fmt::Display for FeatureGates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = Feature::ALL.iter().map(|g| format!("{}={}", g, self.enabled(*g))).collect();
        f.write_str(&rendered.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_disabled() {
        let g = FeatureGates::default();
        assert!(!g.enabled(Feature::PodPriority));
        assert!(!g.enabled(Feature::LocalStorageCapacityIsolation));
    }

    #[test]
    fn parses_pairs_with_whitespace() {
        let g: FeatureGates = " PodPriority=true , LocalStorageCapacityIsolation=false ".parse().unwrap();
        assert!(g.enabled(Feature::PodPriority));
        assert!(!g.enabled(Feature::LocalStorageCapacityIsolation));
        assert_eq!(g.to_string(), "PodPriority=true,LocalStorageCapacityIsolation=false");
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert_eq!("Nope=true".parse::<FeatureGates>().unwrap_err(), FeatureGateError::UnknownFeature("Nope".into()));
        assert!(matches!("PodPriority=yes".parse::<FeatureGates>(), Err(FeatureGateError::InvalidValue { .. })));
        assert!(matches!("PodPriority".parse::<FeatureGates>(), Err(FeatureGateError::MissingValue(_))));
        assert_eq!("".parse::<FeatureGates>().unwrap(), FeatureGates::default());
    }
}
