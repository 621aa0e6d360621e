use crate::{
    field::{self, Error, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::is_default,
    status::Status,
};
use consul_k8s_core::{
    common::EntryMeta,
    namespace::{normalize_empty_to_default, DEFAULT_NAMESPACE},
    sameness as consul, ConfigEntry, SAMENESS_GROUP,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A set of partitions and peers that Consul treats as interchangeable for
/// failover and intentions.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "SamenessGroup",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct SamenessGroupSpec {
    #[serde(skip_serializing_if = "is_default")]
    pub default_for_failover: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub include_local: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<SamenessGroupMember>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SamenessGroupMember {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
}

impl ConfigEntryResource for SamenessGroup {
    const KUBE_KIND: &'static str = "samenessgroup";
    const CONSUL_KIND: &'static str = SAMENESS_GROUP;

    status_accessors!();

    /// Sameness groups are unique across the cluster, so they are always
    /// written to the default namespace.
    fn consul_mirroring_ns(&self) -> String {
        DEFAULT_NAMESPACE.to_string()
    }

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        ConfigEntry::SamenessGroup(consul::SamenessGroupConfigEntry {
            name: self.consul_name(),
            default_for_failover: self.spec.default_for_failover,
            include_local: self.spec.include_local,
            members: self
                .spec
                .members
                .iter()
                .map(|m| consul::SamenessGroupMember {
                    partition: m.partition.clone(),
                    peer: m.peer.clone(),
                })
                .collect(),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |entry| {
            let ConfigEntry::SamenessGroup(sg) = entry else {
                return;
            };
            for member in &mut sg.members {
                normalize_empty_to_default(&mut member.partition);
            }
        })
    }

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid> {
        let path = Path::new("spec");
        let mut errs = ErrorList::new();
        let name = self.name_any();
        if name.is_empty() {
            errs.push(field::invalid(
                &path.child("name"),
                &name,
                "sameness groups must have a name defined",
            ));
        }
        let namespace = self.namespace().unwrap_or_default();
        if !namespace.is_empty() && namespace != DEFAULT_NAMESPACE {
            errs.push(field::invalid(
                &path.child("name"),
                &meta.destination_namespace,
                "sameness groups must reside in the default namespace",
            ));
        }

        let members = path.child("members");
        if self.spec.members.is_empty() {
            errs.push(field::invalid(
                &members,
                Value::json_string(&self.spec.members),
                "sameness groups must have at least one member",
            ));
        }

        let mut includes_local = self.spec.include_local;
        let mut seen = HashSet::new();
        for (i, member) in self.spec.members.iter().enumerate() {
            if member.partition == meta.partition {
                includes_local = true;
            }
            errs.extend(member.validate(&members.index(i)));
            if !seen.insert(member) {
                errs.push(field::invalid(
                    &members.index(i),
                    Value::json_string(member),
                    "sameness group members must be unique",
                ));
            }
        }
        if !includes_local {
            errs.push(field::invalid(
                &members,
                self.spec.include_local,
                "the local partition must be a member of sameness groups",
            ));
        }

        errs.into_result(Self::KUBE_KIND, &name)
    }
}

impl SamenessGroupMember {
    fn validate(&self, path: &Path) -> Option<Error> {
        let detail = match (self.partition.is_empty(), self.peer.is_empty()) {
            (true, true) => "sameness group members must specify either partition or peer",
            (false, false) => {
                "sameness group members cannot specify both partition and peer in the same entry"
            }
            _ => return None,
        };
        Some(field::invalid(path, Value::json_string(self), detail))
    }
}
