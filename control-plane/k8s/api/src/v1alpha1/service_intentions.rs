use super::service_router::{count_set, HttpHeaderMatch};
use crate::{
    field::{self, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::{invalid_path_prefix, not_in_slice_message},
    status::Status,
};
use consul_k8s_core::{
    common::EntryMeta, intentions as consul, ConfigEntry, SERVICE_INTENTIONS,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const ACTIONS: &[&str] = &["allow", "deny"];

const METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "CONNECT", "OPTIONS", "TRACE",
];

/// Controls which services may connect to a destination service.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "ServiceIntentions",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceIntentionsSpec {
    pub destination: IntentionDestination,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceIntention>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentionDestination {
    /// The destination service. `*` matches every service.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceIntention {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    /// `allow` or `deny`. Exclusive with `permissions`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<IntentionPermission>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentionPermission {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<IntentionHttpPermission>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
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

impl ConfigEntryResource for ServiceIntentions {
    const KUBE_KIND: &'static str = "serviceintentions";
    const CONSUL_KIND: &'static str = SERVICE_INTENTIONS;

    status_accessors!();

    fn consul_name(&self) -> String {
        self.spec.destination.name.clone()
    }

    fn consul_mirroring_ns(&self) -> String {
        self.spec.destination.namespace.clone()
    }

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        ConfigEntry::ServiceIntentions(consul::ServiceIntentionsConfigEntry {
            name: self.spec.destination.name.clone(),
            sources: self.spec.sources.iter().map(SourceIntention::to_consul).collect(),
            entry_meta: EntryMeta {
                namespace: self.spec.destination.namespace.clone(),
                ..EntryMeta::with_meta(source_meta(datacenter))
            },
        })
    }

    /// Sources are compared as a set; Consul may return them in any order.
    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |entry| {
            let ConfigEntry::ServiceIntentions(ixn) = entry else {
                return;
            };
            for source in &mut ixn.sources {
                source.clear_computed_fields();
            }
            ixn.sources
                .sort_by_cached_key(|s| serde_json::to_string(s).unwrap_or_default());
        })
    }

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid> {
        let spec = Path::new("spec");
        let sources = spec.child("sources");
        let mut errs = ErrorList::new();

        if self.spec.sources.is_empty() {
            errs.push(field::required(&sources, "at least one source must be specified"));
        }
        for (i, source) in self.spec.sources.iter().enumerate() {
            let path = sources.index(i);
            if !source.permissions.is_empty() && !source.action.is_empty() {
                errs.push(field::invalid(
                    &path,
                    Value::json_string(source),
                    "action and permissions are mutually exclusive and only one of them can be specified",
                ));
            } else if source.permissions.is_empty() {
                errs.extend(validate_action(&source.action, &path));
            } else {
                for (j, perm) in source.permissions.iter().enumerate() {
                    errs.extend(perm.validate(&path.child("permissions").index(j)));
                }
            }
        }

        if !meta.namespaces_enabled {
            let ns = &self.spec.destination.namespace;
            if !ns.is_empty() {
                errs.push(field::invalid(
                    &spec.child("destination").child("namespace"),
                    ns,
                    "Consul Enterprise namespaces must be enabled to set destination.namespace",
                ));
            }
            for (i, source) in self.spec.sources.iter().enumerate() {
                if !source.namespace.is_empty() {
                    errs.push(field::invalid(
                        &sources.index(i).child("namespace"),
                        &source.namespace,
                        "Consul Enterprise namespaces must be enabled to set source.namespace",
                    ));
                }
            }
        }

        for (i, source) in self.spec.sources.iter().enumerate() {
            if !source.partition.is_empty() && !meta.partitions_enabled {
                errs.push(field::invalid(
                    &sources.index(i).child("partition"),
                    &source.partition,
                    "Consul Enterprise Admin Partitions must be enabled to set source.partition",
                ));
            }
            if !source.peer.is_empty() && !source.partition.is_empty() {
                errs.push(field::invalid(
                    &sources.index(i),
                    Value::json(source),
                    "Both source.peer and source.partition cannot be set.",
                ));
            }
        }

        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }

    fn default_namespace_fields(&mut self, meta: &ConsulMeta) {
        if meta.namespaces_enabled && self.spec.destination.namespace.is_empty() {
            self.spec.destination.namespace =
                meta.consul_namespace(&self.namespace().unwrap_or_default());
        }
    }
}

fn validate_action(action: &str, path: &Path) -> Option<field::Error> {
    (!ACTIONS.contains(&action)).then(|| {
        field::invalid(&path.child("action"), action, not_in_slice_message(ACTIONS))
    })
}

impl SourceIntention {
    fn to_consul(&self) -> consul::SourceIntention {
        consul::SourceIntention {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            partition: self.partition.clone(),
            peer: self.peer.clone(),
            action: self.action.clone(),
            permissions: self
                .permissions
                .iter()
                .map(|p| consul::IntentionPermission {
                    action: p.action.clone(),
                    http: p.http.as_ref().map(IntentionHttpPermission::to_consul),
                })
                .collect(),
            description: self.description.clone(),
            ..Default::default()
        }
    }
}

impl IntentionPermission {
    fn validate(&self, path: &Path) -> ErrorList {
        let mut errs = ErrorList::new();
        errs.extend(validate_action(&self.action, path));
        if let Some(http) = &self.http {
            errs.extend(http.validate(path));
        }
        errs
    }
}

impl IntentionHttpPermission {
    fn to_consul(&self) -> consul::IntentionHttpPermission {
        consul::IntentionHttpPermission {
            path_exact: self.path_exact.clone(),
            path_prefix: self.path_prefix.clone(),
            path_regex: self.path_regex.clone(),
            header: self.header.iter().map(HttpHeaderMatch::to_consul).collect(),
            methods: self.methods.clone(),
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        let mut errs = ErrorList::new();
        if !self.path_prefix.is_empty() && invalid_path_prefix(&self.path_prefix) {
            errs.push(field::invalid(
                &path.child("pathPrefix"),
                &self.path_prefix,
                "must begin with a '/'",
            ));
        }
        if !self.path_exact.is_empty() && invalid_path_prefix(&self.path_exact) {
            errs.push(field::invalid(
                &path.child("pathExact"),
                &self.path_exact,
                "must begin with a '/'",
            ));
        }
        if count_set(&[&self.path_exact, &self.path_prefix, &self.path_regex], &[]) > 1 {
            errs.push(field::invalid(
                path,
                Value::json_string(self),
                "at most only one of pathExact, pathPrefix, or pathRegex may be configured.",
            ));
        }

        let mut seen = HashSet::new();
        for (i, method) in self.methods.iter().enumerate() {
            let path = path.child("methods").index(i);
            if !METHODS.contains(&method.as_str()) {
                errs.push(field::invalid(&path, method, not_in_slice_message(METHODS)));
            }
            if !seen.insert(method.as_str()) {
                errs.push(field::invalid(&path, method, "method listed more than once."));
            }
        }

        let header = path.child("header");
        for (i, h) in self.header.iter().enumerate() {
            errs.extend(h.validate(
                &header.index(i),
                "at most only one of exact, prefix, suffix, regex, or present may be configured.",
            ));
        }
        errs
    }
}
