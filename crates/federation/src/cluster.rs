//! Member cluster model. Health is reported by an external monitor; only
//! clusters whose `Ready` condition is `True` take part in reconciliation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterConditionType {
    Ready,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    #[serde(rename = "type")]
    pub type_: ClusterConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
}

impl Cluster {
    /// Cluster with a single `Ready` condition in the given state.
    pub fn new(name: &str, ready: ConditionStatus) -> Self {
        Self {
            name: name.to_string(),
            conditions: vec![ClusterCondition {
                type_: ClusterConditionType::Ready,
                status: ready,
                reason: None,
                message: None,
            }],
        }
    }

    /// Status of the `Ready` condition; `Unknown` when none was reported.
    pub fn readiness(&self) -> ConditionStatus {
        self.conditions
            .iter()
            .find(|c| c.type_ == ClusterConditionType::Ready)
            .map(|c| c.status)
            .unwrap_or(ConditionStatus::Unknown)
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == ConditionStatus::True
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_from_conditions() {
        assert!(Cluster::new("east", ConditionStatus::True).is_ready());
        assert!(!Cluster::new("west", ConditionStatus::False).is_ready());
        assert!(!Cluster::new("north", ConditionStatus::Unknown).is_ready());
        let bare = Cluster { name: "south".into(), conditions: vec![] };
        assert_eq!(bare.readiness(), ConditionStatus::Unknown);
    }

    #[test]
    fn offline_condition_does_not_count_as_ready() {
        let c = Cluster {
            name: "east".into(),
            conditions: vec![ClusterCondition {
                type_: ClusterConditionType::Offline,
                status: ConditionStatus::True,
                reason: Some("ClusterNotReachable".into()),
                message: None,
            }],
        };
        assert!(!c.is_ready());
    }

    #[test]
    fn deserializes_conditions() {
        let c: Cluster = serde_json::from_value(serde_json::json!({
            "name": "east",
            "conditions": [{ "type": "Ready", "status": "True" }]
        }))
        .unwrap();
        assert!(c.is_ready());
    }
}
