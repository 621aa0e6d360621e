use crate::{
    common::{is_default, EntryMeta, Meta},
    router::HttpHeaderMatch,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A `service-intentions` entry. Its name is the destination service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceIntentionsConfigEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceIntention>,
    #[serde(flatten)]
    pub entry_meta: EntryMeta,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SourceIntention {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sameness_group: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<IntentionPermission>,
    #[serde(skip_serializing_if = "is_default")]
    pub precedence: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub r#type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "LegacyID", skip_serializing_if = "String::is_empty")]
    pub legacy_id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub legacy_meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_update_time: Option<String>,
}

impl SourceIntention {
    /// Drops the fields Consul computes or carries over from legacy
    /// intentions.
    pub fn clear_computed_fields(&mut self) {
        self.legacy_id.clear();
        self.legacy_meta.clear();
        self.legacy_create_time = None;
        self.legacy_update_time = None;
        self.precedence = 0;
        self.r#type.clear();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IntentionPermission {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(rename = "HTTP", skip_serializing_if = "Option::is_none")]
    pub http: Option<IntentionHttpPermission>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IntentionHttpPermission {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_exact: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_regex: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<HttpHeaderMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clears_computed_fields() {
        let mut source = SourceIntention {
            name: "web".to_string(),
            action: "allow".to_string(),
            precedence: 9,
            r#type: "consul".to_string(),
            legacy_id: "1234".to_string(),
            legacy_create_time: Some("2021-01-01T00:00:00Z".to_string()),
            ..Default::default()
        };
        source.clear_computed_fields();
        assert_eq!(
            source,
            SourceIntention {
                name: "web".to_string(),
                action: "allow".to_string(),
                ..Default::default()
            }
        );
    }
}
