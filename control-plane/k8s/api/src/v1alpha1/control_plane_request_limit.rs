use crate::{
    field::{self, ErrorList, Invalid, Path},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::is_default,
    status::Status,
};
use consul_k8s_core::{common::EntryMeta, rate_limit as consul, ConfigEntry, RATE_LIMIT_IP};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const MODES: &[&str] = &["permissive", "enforcing", "disabled"];

/// Rate limits applied by Consul servers to requests from a single source
/// IP, overall and per API category.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "ControlPlaneRequestLimit",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlPlaneRequestLimitSpec {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(flatten)]
    pub rates: ReadWriteRatesConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_entry: Option<ReadWriteRatesConfig>,
    #[serde(rename = "connectCA", skip_serializing_if = "Option::is_none")]
    pub connect_ca: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_chain: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intention: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kv: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenancy: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepared_query: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<ReadWriteRatesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn: Option<ReadWriteRatesConfig>,
}

/// Requests per second.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadWriteRatesConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub read_rate: f64,
    #[serde(skip_serializing_if = "is_default")]
    pub write_rate: f64,
}

impl ConfigEntryResource for ControlPlaneRequestLimit {
    const KUBE_KIND: &'static str = "controlplanerequestlimit";
    const CONSUL_KIND: &'static str = RATE_LIMIT_IP;
    const GLOBAL: bool = true;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        let spec = &self.spec;
        let rates = |c: &Option<ReadWriteRatesConfig>| c.as_ref().map(ReadWriteRatesConfig::to_consul);
        ConfigEntry::RateLimitIp(consul::RateLimitIpConfigEntry {
            name: self.consul_name(),
            mode: spec.mode.clone(),
            read_rate: spec.rates.read_rate,
            write_rate: spec.rates.write_rate,
            acl: rates(&spec.acl),
            catalog: rates(&spec.catalog),
            config_entry: rates(&spec.config_entry),
            connect_ca: rates(&spec.connect_ca),
            coordinate: rates(&spec.coordinate),
            discovery_chain: rates(&spec.discovery_chain),
            health: rates(&spec.health),
            intention: rates(&spec.intention),
            kv: rates(&spec.kv),
            tenancy: rates(&spec.tenancy),
            prepared_query: rates(&spec.prepared_query),
            session: rates(&spec.session),
            txn: rates(&spec.txn),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |_| {})
    }

    fn validate(&self, _: &ConsulMeta) -> Result<(), Invalid> {
        let path = Path::new("spec");
        let mut errs = ErrorList::new();
        if !MODES.contains(&self.spec.mode.as_str()) {
            errs.push(field::invalid(
                &path.child("mode"),
                &self.spec.mode,
                "mode must be one of: permissive, enforcing, disabled",
            ));
        }
        errs.extend(self.spec.rates.validate(&path));
        for (name, rates) in self.spec.categories() {
            if let Some(rates) = rates {
                errs.extend(rates.validate(&path.child(name)));
            }
        }
        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }
}

impl ControlPlaneRequestLimitSpec {
    fn categories(&self) -> [(&'static str, &Option<ReadWriteRatesConfig>); 13] {
        [
            ("acl", &self.acl),
            ("catalog", &self.catalog),
            ("configEntry", &self.config_entry),
            ("connectCA", &self.connect_ca),
            ("coordinate", &self.coordinate),
            ("discoveryChain", &self.discovery_chain),
            ("health", &self.health),
            ("intention", &self.intention),
            ("kv", &self.kv),
            ("tenancy", &self.tenancy),
            ("preparedQuery", &self.prepared_query),
            ("session", &self.session),
            ("txn", &self.txn),
        ]
    }
}

impl ReadWriteRatesConfig {
    fn to_consul(&self) -> consul::ReadWriteRatesConfig {
        consul::ReadWriteRatesConfig {
            read_rate: self.read_rate,
            write_rate: self.write_rate,
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        let mut errs = ErrorList::new();
        if self.read_rate < 0.0 {
            errs.push(field::invalid(
                &path.child("readRate"),
                self.read_rate,
                "readRate must be >= 0",
            ));
        }
        if self.write_rate <= 0.0 {
            errs.push(field::invalid(
                &path.child("writeRate"),
                self.write_rate,
                "writeRate must be > 0",
            ));
        }
        errs
    }
}
