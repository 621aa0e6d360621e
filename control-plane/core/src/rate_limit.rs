use crate::common::{is_default, EntryMeta};
use serde::{Deserialize, Serialize};

/// A `control-plane-request-limit` entry, limiting the rate of requests
/// Consul servers accept per source IP.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RateLimitIpConfigEntry {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(skip_serializing_if = "is_default")]
    pub read_rate: f64,
    #[serde(skip_serializing_if = "is_default")]
    pub write_rate: f64,
    #[serde(rename = "ACL", skip_serializing_if = "Option::is_none")]
    pub acl: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_entry: Option<ReadWriteRatesConfig>,
    #[serde(rename = "ConnectCA", skip_serializing_if = "Option::is_none")]
    pub connect_ca: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_chain: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intention: Option<ReadWriteRatesConfig>,
    #[serde(rename = "KV", skip_serializing_if = "Option::is_none")]
    pub kv: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenancy: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepared_query: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn: Option<ReadWriteRatesConfig>,
    #[serde(flatten)]
    pub entry_meta: EntryMeta,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReadWriteRatesConfig {
    pub read_rate: f64,
    pub write_rate: f64,
}
