//! Pieces shared by several config-entry kinds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Meta = BTreeMap<String, String>;

pub(crate) fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Fields Consul tracks for every entry that are not part of its desired
/// configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EntryMeta {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: Meta,
    #[serde(skip_serializing_if = "is_default")]
    pub create_index: u64,
    #[serde(skip_serializing_if = "is_default")]
    pub modify_index: u64,
}

impl EntryMeta {
    pub fn with_meta(meta: Meta) -> Self {
        Self {
            meta,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MeshGatewayConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExposeConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub checks: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<ExposePath>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExposePath {
    #[serde(skip_serializing_if = "is_default")]
    pub listener_port: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "is_default")]
    pub local_path_port: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(skip_serializing_if = "is_default")]
    pub parsed_from_check: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TransparentProxyConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub outbound_listener_port: i32,
    #[serde(skip_serializing_if = "is_default")]
    pub dialed_directly: bool,
}

/// Compares transparent proxy settings, treating an absent block as equal to
/// an empty one.
pub fn transparent_proxy_eq(
    a: &Option<TransparentProxyConfig>,
    b: &Option<TransparentProxyConfig>,
) -> bool {
    let empty = TransparentProxyConfig::default();
    a.as_ref().unwrap_or(&empty) == b.as_ref().unwrap_or(&empty)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HttpHeaderModifiers {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EnvoyExtension {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "is_default")]
    pub required: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub consul_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub envoy_version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FailoverPolicy {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PrioritizeByLocality {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_transparent_proxy_equals_empty() {
        let empty = Some(TransparentProxyConfig::default());
        assert!(transparent_proxy_eq(&None, &empty));
        assert!(transparent_proxy_eq(&empty, &None));
        assert!(transparent_proxy_eq(&None, &None));

        let set = Some(TransparentProxyConfig {
            outbound_listener_port: 15001,
            dialed_directly: true,
        });
        assert!(!transparent_proxy_eq(&None, &set));
        assert!(!transparent_proxy_eq(&set, &empty));
    }

    #[test]
    fn omits_empty_fields() {
        let meta = EntryMeta::with_meta([("k".to_string(), "v".to_string())].into());
        assert_eq!(
            serde_json::to_value(&meta).unwrap(),
            serde_json::json!({ "Meta": { "k": "v" } })
        );
        assert_eq!(
            serde_json::to_value(ExposeConfig::default()).unwrap(),
            serde_json::json!({})
        );
    }
}
