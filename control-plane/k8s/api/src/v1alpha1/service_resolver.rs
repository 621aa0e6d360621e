use crate::{
    field::{self, Error, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::{is_default, not_in_slice_message, FailoverPolicy, PrioritizeByLocality},
    status::Status,
};
use consul_k8s_core::{
    common::EntryMeta,
    filter,
    namespace::{normalize_empty_to_default, DEFAULT_PARTITION},
    resolver as consul, ConfigEntry, GoDuration, SERVICE_RESOLVER,
};
use kube::{CustomResource, ResourceExt};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::LazyLock};

/// Controls which service instances satisfy requests for a service, and
/// where requests go when none are healthy.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "ServiceResolver",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceResolverSpec {
    /// The subset used when a request doesn't name one.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_subset: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub subsets: BTreeMap<String, ServiceResolverSubset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<ServiceResolverRedirect>,
    /// Failover targets keyed by subset name, or `*` for any subset.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failover: BTreeMap<String, ServiceResolverFailover>,
    #[serde(skip_serializing_if = "GoDuration::is_zero")]
    pub connect_timeout: GoDuration,
    #[serde(skip_serializing_if = "GoDuration::is_zero")]
    pub request_timeout: GoDuration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<LoadBalancer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioritize_by_locality: Option<PrioritizeByLocality>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceResolverSubset {
    /// A filter expression over service instances, e.g.
    /// `Service.Meta.version == v1`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filter: String,
    #[serde(skip_serializing_if = "is_default")]
    pub only_passing: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceResolverRedirect {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_subset: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub datacenter: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sameness_group: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceResolverFailover {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_subset: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub datacenters: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<ServiceResolverFailoverTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<FailoverPolicy>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sameness_group: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceResolverFailoverTarget {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_subset: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub datacenter: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadBalancer {
    /// The load balancing policy, e.g. `ring_hash` or `least_request`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ring_hash_config: Option<RingHashConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub least_request_config: Option<LeastRequestConfig>,
    /// Only used by hash-based policies.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hash_policies: Vec<HashPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RingHashConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub minimum_ring_size: u64,
    #[serde(skip_serializing_if = "is_default")]
    pub maximum_ring_size: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LeastRequestConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub choice_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct HashPolicy {
    /// `header`, `cookie` or `query_parameter`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub field_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_config: Option<CookieConfig>,
    /// Hashes on the source IP address; exclusive with `field`.
    #[serde(rename = "sourceIP", skip_serializing_if = "is_default")]
    pub source_ip: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub terminal: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CookieConfig {
    /// Generates a session cookie with no expiration.
    #[serde(skip_serializing_if = "is_default")]
    pub session: bool,
    #[serde(skip_serializing_if = "GoDuration::is_zero")]
    pub ttl: GoDuration,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
}

static SUBSET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("subset name regex must compile")
});

impl ConfigEntryResource for ServiceResolver {
    const KUBE_KIND: &'static str = "serviceresolver";
    const CONSUL_KIND: &'static str = SERVICE_RESOLVER;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        let spec = &self.spec;
        ConfigEntry::ServiceResolver(consul::ServiceResolverConfigEntry {
            name: self.consul_name(),
            default_subset: spec.default_subset.clone(),
            subsets: spec
                .subsets
                .iter()
                .map(|(name, s)| {
                    let subset = consul::ServiceResolverSubset {
                        filter: s.filter.clone(),
                        only_passing: s.only_passing,
                    };
                    (name.clone(), subset)
                })
                .collect(),
            redirect: spec.redirect.as_ref().map(ServiceResolverRedirect::to_consul),
            failover: spec
                .failover
                .iter()
                .map(|(name, f)| (name.clone(), f.to_consul()))
                .collect(),
            connect_timeout: spec.connect_timeout,
            request_timeout: spec.request_timeout,
            prioritize_by_locality: spec
                .prioritize_by_locality
                .as_ref()
                .map(PrioritizeByLocality::to_consul),
            load_balancer: spec.load_balancer.as_ref().map(LoadBalancer::to_consul),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |entry| {
            let ConfigEntry::ServiceResolver(sr) = entry else {
                return;
            };
            if let Some(redirect) = &mut sr.redirect {
                normalize_empty_to_default(&mut redirect.namespace);
                normalize_empty_to_default(&mut redirect.partition);
            }
            for target in sr.failover.values_mut().flat_map(|f| &mut f.targets) {
                normalize_empty_to_default(&mut target.namespace);
                normalize_empty_to_default(&mut target.partition);
            }
        })
    }

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid> {
        let spec = &self.spec;
        let path = Path::new("spec");
        let mut errs = ErrorList::new();

        for (subset, failover) in &spec.failover {
            errs.extend(failover.validate(&path.child("failover").key(subset), meta));
        }
        if !spec.failover.is_empty() && spec.redirect.is_some() {
            errs.push(field::invalid(
                &path,
                Value::json_string(self),
                "service resolver redirect and failover cannot both be set",
            ));
        }
        if let Some(redirect) = &spec.redirect {
            errs.extend(redirect.validate(&path.child("redirect"), meta));
        }
        if let Some(prio) = &spec.prioritize_by_locality {
            errs.extend(prio.validate(&path.child("prioritizeByLocality")));
        }
        errs.extend(validate_subsets(&spec.subsets, &path.child("subsets")));
        if let Some(lb) = &spec.load_balancer {
            let path = path.child("loadBalancer").child("hashPolicies");
            for (i, policy) in lb.hash_policies.iter().enumerate() {
                errs.extend(policy.validate(&path.index(i)));
            }
        }
        errs.extend(self.validate_enterprise(meta));

        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }
}

impl ServiceResolver {
    fn validate_enterprise(&self, meta: &ConsulMeta) -> ErrorList {
        let path = Path::new("spec");
        let mut errs = ErrorList::new();
        let redirect = self.spec.redirect.as_ref();
        if !meta.namespaces_enabled {
            if let Some(r) = redirect.filter(|r| !r.namespace.is_empty()) {
                errs.push(field::invalid(
                    &path.child("redirect").child("namespace"),
                    &r.namespace,
                    "Consul Enterprise namespaces must be enabled to set redirect.namespace",
                ));
            }
            for (key, f) in &self.spec.failover {
                if !f.namespace.is_empty() {
                    errs.push(field::invalid(
                        &path.child("failover").key(key).child("namespace"),
                        &f.namespace,
                        "Consul Enterprise namespaces must be enabled to set failover.namespace",
                    ));
                }
            }
        }
        if !meta.partitions_enabled {
            if let Some(r) = redirect.filter(|r| !r.partition.is_empty()) {
                errs.push(field::invalid(
                    &path.child("redirect").child("partition"),
                    &r.partition,
                    "Consul Enterprise partitions must be enabled to set redirect.partition",
                ));
            }
        }
        errs
    }
}

fn validate_subsets(subsets: &BTreeMap<String, ServiceResolverSubset>, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    for (name, subset) in subsets {
        let path = path.key(name);
        if name.is_empty() {
            errs.push(field::invalid(&path, name, "subset defined with empty name"));
        }
        if !SUBSET_NAME.is_match(name) {
            errs.push(field::invalid(
                &path,
                name,
                "subset name must begin or end with lower case alphanumeric characters, and contain lower case alphanumeric characters or '-' in between",
            ));
        }
        if !subset.filter.is_empty() && filter::validate(&subset.filter).is_err() {
            errs.push(field::invalid(
                &path.child("filter"),
                &subset.filter,
                "filter for subset is not a valid expression",
            ));
        }
    }
    errs
}

impl ServiceResolverRedirect {
    fn to_consul(&self) -> consul::ServiceResolverRedirect {
        consul::ServiceResolverRedirect {
            service: self.service.clone(),
            service_subset: self.service_subset.clone(),
            namespace: self.namespace.clone(),
            partition: self.partition.clone(),
            datacenter: self.datacenter.clone(),
            peer: self.peer.clone(),
            sameness_group: self.sameness_group.clone(),
        }
    }

    fn validate(&self, path: &Path, meta: &ConsulMeta) -> ErrorList {
        let mut errs = ErrorList::new();
        if *self == Self::default() {
            errs.push(field::invalid(
                path,
                "{}",
                "service resolver redirect cannot be empty",
            ));
        }
        let local_default = meta.partition.is_empty() || meta.partition == DEFAULT_PARTITION;
        if !local_default && !self.datacenter.is_empty() {
            errs.push(field::invalid(
                &path.child("datacenter"),
                &self.datacenter,
                "cross-datacenter redirect is only supported in the default partition",
            ));
        }
        if meta.partition != self.partition && !self.datacenter.is_empty() {
            errs.push(field::invalid(
                &path.child("partition"),
                &self.partition,
                "cross-datacenter and cross-partition redirect is not supported",
            ));
        }

        let invalid = |detail: &str| field::invalid(path, Value::json_string(self), detail);
        let sg = !self.sameness_group.is_empty();
        let peer = !self.peer.is_empty();
        let subset = !self.service_subset.is_empty();
        let partition = !self.partition.is_empty();
        let dc = !self.datacenter.is_empty();
        if sg && subset {
            errs.push(invalid("samenessGroup cannot be set with serviceSubset"));
        } else if sg && partition {
            errs.push(invalid("partition cannot be set with samenessGroup"));
        } else if sg && dc {
            errs.push(invalid("samenessGroup cannot be set with datacenter"));
        } else if peer && subset {
            errs.push(invalid("peer cannot be set with serviceSubset"));
        } else if peer && partition {
            errs.push(invalid("partition cannot be set with peer"));
        } else if peer && dc {
            errs.push(invalid("peer cannot be set with datacenter"));
        } else if self.service.is_empty() {
            for (name, value) in [
                ("serviceSubset", &self.service_subset),
                ("namespace", &self.namespace),
                ("partition", &self.partition),
                ("peer", &self.peer),
            ] {
                if !value.is_empty() {
                    errs.push(invalid(&format!("{name} defined without service")));
                }
            }
        }
        errs
    }
}

impl ServiceResolverFailover {
    fn to_consul(&self) -> consul::ServiceResolverFailover {
        consul::ServiceResolverFailover {
            service: self.service.clone(),
            service_subset: self.service_subset.clone(),
            namespace: self.namespace.clone(),
            datacenters: self.datacenters.clone(),
            targets: self
                .targets
                .iter()
                .map(|t| consul::ServiceResolverFailoverTarget {
                    service: t.service.clone(),
                    service_subset: t.service_subset.clone(),
                    partition: t.partition.clone(),
                    namespace: t.namespace.clone(),
                    datacenter: t.datacenter.clone(),
                    peer: t.peer.clone(),
                })
                .collect(),
            policy: self.policy.as_ref().map(FailoverPolicy::to_consul),
            sameness_group: self.sameness_group.clone(),
        }
    }

    fn validate(&self, path: &Path, meta: &ConsulMeta) -> ErrorList {
        let mut errs = ErrorList::new();
        if *self == Self::default() {
            errs.push(field::invalid(
                path,
                "{}",
                "service, serviceSubset, namespace, datacenters, policy, and targets cannot all be empty at once",
            ));
        }
        if meta.partition != DEFAULT_PARTITION && !self.datacenters.is_empty() {
            errs.push(field::invalid(
                &path.child("datacenters"),
                Value::json(&self.datacenters),
                "cross-datacenter failover is only supported in the default partition",
            ));
        }
        if let Some(policy) = &self.policy {
            errs.extend(policy.validate(&path.child("policy")));
        }

        let invalid = |detail: &str| field::invalid(path, Value::json_string(self), detail);
        if !self.sameness_group.is_empty() {
            if !self.datacenters.is_empty() {
                errs.push(invalid("samenessGroup cannot be set with datacenters"));
            } else if !self.service_subset.is_empty() {
                errs.push(invalid("samenessGroup cannot be set with serviceSubset"));
            } else if !self.targets.is_empty() {
                errs.push(invalid("samenessGroup cannot be set with targets"));
            }
        }
        if !self.targets.is_empty() {
            if !self.datacenters.is_empty() {
                errs.push(invalid("targets cannot be set with datacenters"));
            }
            if !self.service_subset.is_empty() {
                errs.push(invalid("targets cannot be set with serviceSubset"));
            }
            if !self.service.is_empty() {
                errs.push(invalid("targets cannot be set with service"));
            }
        }
        for (i, target) in self.targets.iter().enumerate() {
            errs.extend(target.validate(&path.child("targets").index(i)));
        }
        for (i, dc) in self.datacenters.iter().enumerate() {
            if dc.is_empty() {
                errs.push(field::invalid(
                    &path.child("datacenters").index(i),
                    "",
                    "found empty datacenter",
                ));
            }
        }
        errs
    }
}

impl ServiceResolverFailoverTarget {
    fn validate(&self, path: &Path) -> Option<Error> {
        let peer = !self.peer.is_empty();
        let partition = !self.partition.is_empty();
        let dc = !self.datacenter.is_empty();
        let detail = if peer && !self.service_subset.is_empty() {
            "target.peer cannot be set with target.serviceSubset"
        } else if peer && partition {
            "target.partition cannot be set with target.peer"
        } else if peer && dc {
            "target.peer cannot be set with target.datacenter"
        } else if partition && dc {
            "target.partition cannot be set with target.datacenter"
        } else {
            return None;
        };
        Some(field::invalid(path, Value::json_string(self), detail))
    }
}

impl LoadBalancer {
    fn to_consul(&self) -> consul::LoadBalancer {
        consul::LoadBalancer {
            policy: self.policy.clone(),
            ring_hash_config: self.ring_hash_config.as_ref().map(|r| consul::RingHashConfig {
                minimum_ring_size: r.minimum_ring_size,
                maximum_ring_size: r.maximum_ring_size,
            }),
            least_request_config: self.least_request_config.as_ref().map(|l| {
                consul::LeastRequestConfig {
                    choice_count: l.choice_count,
                }
            }),
            hash_policies: self
                .hash_policies
                .iter()
                .map(|p| consul::HashPolicy {
                    field: p.field.clone(),
                    field_value: p.field_value.clone(),
                    cookie_config: p.cookie_config.as_ref().map(|c| consul::CookieConfig {
                        session: c.session,
                        ttl: c.ttl,
                        path: c.path.clone(),
                    }),
                    source_ip: p.source_ip,
                    terminal: p.terminal,
                })
                .collect(),
        }
    }
}

impl HashPolicy {
    fn validate(&self, path: &Path) -> ErrorList {
        const FIELDS: &[&str] = &["header", "cookie", "query_parameter"];
        let mut errs = ErrorList::new();
        if !self.field.is_empty() {
            if !FIELDS.contains(&self.field.as_str()) {
                errs.push(field::invalid(
                    &path.child("field"),
                    &self.field,
                    not_in_slice_message(FIELDS),
                ));
            }
            if self.source_ip {
                errs.push(field::invalid(
                    path,
                    Value::json_string(self),
                    "cannot set both field and sourceIP",
                ));
            } else if self.field_value.is_empty() {
                errs.push(field::invalid(
                    &path.child("fieldValue"),
                    &self.field_value,
                    "fieldValue cannot be empty if field is set",
                ));
            }
        }
        if let Some(cookie) = &self.cookie_config {
            if cookie.session && !cookie.ttl.is_zero() && !cookie.ttl.is_negative() {
                errs.push(field::invalid(
                    &path.child("cookieConfig"),
                    Value::json_string(cookie),
                    "cannot set both session and ttl",
                ));
            }
        }
        errs
    }
}
