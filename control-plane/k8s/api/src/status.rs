//! Reconciliation status reported on every resource.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The condition set on a resource once it has been written to Consul.
pub const SYNCED: &str = "Synced";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition.
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    /// The last time the condition transitioned from one status to another.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// The reason for the condition's last transition.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// A human readable message indicating details about the transition.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn is_false(&self) -> bool {
        self.status == ConditionStatus::False
    }

    pub fn is_unknown(&self) -> bool {
        self.status == ConditionStatus::Unknown
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct Conditions(pub Vec<Condition>);

impl Conditions {
    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    pub fn is_true(&self, type_: &str) -> bool {
        self.get(type_).is_some_and(Condition::is_true)
    }

    pub fn is_false(&self, type_: &str) -> bool {
        self.get(type_).is_some_and(Condition::is_false)
    }

    /// A missing condition is unknown.
    pub fn is_unknown(&self, type_: &str) -> bool {
        self.get(type_).map_or(true, Condition::is_unknown)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
    /// The last time the resource successfully synced with Consul.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_time: Option<DateTime<Utc>>,
}

impl Conditions {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Status {
    /// Replaces all conditions with a single `Synced` condition.
    pub fn set_synced(
        &mut self,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.conditions = Conditions(vec![Condition {
            type_: SYNCED.to_string(),
            status,
            last_transition_time: Some(Utc::now()),
            reason: reason.into(),
            message: message.into(),
        }]);
    }

    /// Returns the `Synced` condition's status, reason and message.
    pub fn synced(&self) -> (ConditionStatus, &str, &str) {
        match self.conditions.get(SYNCED) {
            Some(c) => (c.status, &c.reason, &c.message),
            None => (ConditionStatus::Unknown, "", ""),
        }
    }
}
