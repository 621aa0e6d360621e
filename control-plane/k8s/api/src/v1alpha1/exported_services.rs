use super::service_router::count_set;
use crate::{
    field::{self, Error, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    status::Status,
};
use consul_k8s_core::{
    common::EntryMeta,
    exported as consul,
    namespace::{normalize_empty_to_default, WILDCARD},
    ConfigEntry, EXPORTED_SERVICES,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Services a partition exports to other partitions, peers or sameness
/// groups. The resource is named after the partition.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "ExportedServices",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportedServicesSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ExportedService>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportedService {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub consumers: Vec<ServiceConsumer>,
}

/// Exactly one of the fields must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConsumer {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sameness_group: String,
}

impl ConfigEntryResource for ExportedServices {
    const KUBE_KIND: &'static str = "exportedservices";
    const CONSUL_KIND: &'static str = EXPORTED_SERVICES;
    const GLOBAL: bool = true;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        ConfigEntry::ExportedServices(consul::ExportedServicesConfigEntry {
            name: self.consul_name(),
            services: self
                .spec
                .services
                .iter()
                .map(|svc| consul::ExportedService {
                    name: svc.name.clone(),
                    namespace: svc.namespace.clone(),
                    consumers: svc
                        .consumers
                        .iter()
                        .map(|c| consul::ServiceConsumer {
                            partition: c.partition.clone(),
                            peer: c.peer.clone(),
                            sameness_group: c.sameness_group.clone(),
                        })
                        .collect(),
                })
                .collect(),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |entry| {
            let ConfigEntry::ExportedServices(es) = entry else {
                return;
            };
            for consumer in es.services.iter_mut().flat_map(|s| s.consumers.iter_mut()) {
                normalize_empty_to_default(&mut consumer.partition);
            }
        })
    }

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid> {
        let mut errs = ErrorList::new();
        let name = self.name_any();
        if meta.partitions_enabled && name != meta.partition {
            errs.push(field::invalid(
                &Path::new("name"),
                &name,
                format!(
                    "{} resource name must be the same name as the partition, \"{}\"",
                    Self::KUBE_KIND,
                    meta.partition
                ),
            ));
        } else if !meta.partitions_enabled && name != "default" {
            errs.push(field::invalid(
                &Path::new("name"),
                &name,
                format!("{} resource name must be \"default\"", Self::KUBE_KIND),
            ));
        }

        let services = Path::new("spec").child("services");
        if self.spec.services.is_empty() {
            errs.push(field::invalid(
                &services,
                Value::json(&self.spec.services),
                "at least one service must be exported",
            ));
        }
        for (i, svc) in self.spec.services.iter().enumerate() {
            errs.extend(svc.validate(&services.index(i), meta));
        }

        errs.into_result(Self::KUBE_KIND, &name)
    }
}

impl ExportedService {
    fn validate(&self, path: &Path, meta: &ConsulMeta) -> ErrorList {
        let mut errs = ErrorList::new();
        if self.consumers.is_empty() {
            errs.push(field::invalid(
                path,
                Value::json(&self.consumers),
                "service must have at least 1 consumer.",
            ));
        }
        if !meta.namespaces_enabled && !self.namespace.is_empty() {
            errs.push(field::invalid(
                path,
                &self.namespace,
                "Consul Namespaces must be enabled to specify service namespace.",
            ));
        }
        for (i, consumer) in self.consumers.iter().enumerate() {
            errs.extend(consumer.validate(&path.child("consumers").index(i), meta));
        }
        errs
    }
}

impl ServiceConsumer {
    /// Reports the first problem found.
    fn validate(&self, path: &Path, meta: &ConsulMeta) -> Option<Error> {
        match count_set(&[&self.partition, &self.peer, &self.sameness_group], &[]) {
            0 => {
                return Some(field::invalid(
                    path,
                    Value::json(self),
                    "service consumer must define at least one of Peer, Partition, or SamenessGroup",
                ))
            }
            1 => {}
            _ => {
                return Some(field::invalid(
                    path,
                    Value::json(self),
                    "service consumer must define at most one of Peer, Partition, or SamenessGroup",
                ))
            }
        }
        if !meta.partitions_enabled && !self.partition.is_empty() {
            return Some(field::invalid(
                &path.child("partition"),
                &self.partition,
                "Consul Admin Partitions need to be enabled to specify partition.",
            ));
        }
        let wildcard = [
            ("partition", &self.partition, "partitions"),
            ("peer", &self.peer, "peers"),
            ("samenessgroup", &self.sameness_group, "sameness groups"),
        ]
        .into_iter()
        .find(|(_, value, _)| *value == WILDCARD);
        wildcard.map(|(child, _, plural)| {
            field::invalid(
                &path.child(child),
                "",
                format!("exporting to all {plural} (wildcard) is not supported"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn exported(name: &str, services: Vec<ExportedService>) -> ExportedServices {
        let mut es = ExportedServices::new(name, ExportedServicesSpec { services });
        es.metadata.namespace = Some("default".to_string());
        es
    }

    fn service(consumers: Vec<ServiceConsumer>) -> ExportedService {
        ExportedService {
            name: "frontend".to_string(),
            namespace: String::new(),
            consumers,
        }
    }

    fn peer(name: &str) -> ServiceConsumer {
        ServiceConsumer {
            peer: name.to_string(),
            ..Default::default()
        }
    }

    fn partition(name: &str) -> ServiceConsumer {
        ServiceConsumer {
            partition: name.to_string(),
            ..Default::default()
        }
    }

    fn partitions() -> ConsulMeta {
        ConsulMeta {
            partitions_enabled: true,
            partition: "default".to_string(),
            namespaces_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn to_consul() {
        let es = exported("default", vec![service(vec![peer("east"), partition("web")])]);
        let ConfigEntry::ExportedServices(entry) = es.to_consul("dc1") else {
            panic!("unexpected kind");
        };
        assert_eq!(entry.name, "default");
        assert_eq!(entry.services[0].name, "frontend");
        assert_eq!(entry.services[0].consumers[0].peer, "east");
        assert_eq!(entry.services[0].consumers[1].partition, "web");
        assert_eq!(entry.entry_meta.meta, source_meta("dc1"));
        assert!(es.consul_global_resource());
        assert_eq!(es.consul_mirroring_ns(), "default");
    }

    #[test]
    fn matches_normalized_partitions() {
        let es = exported("default", vec![service(vec![peer("east")])]);
        let ConfigEntry::ExportedServices(mut candidate) = es.to_consul("dc1") else {
            panic!("unexpected kind");
        };
        candidate.services[0].consumers[0].partition = "default".to_string();
        assert!(es.matches_consul(&ConfigEntry::ExportedServices(candidate.clone())));

        candidate.services[0].consumers[0].peer = "west".to_string();
        assert!(!es.matches_consul(&ConfigEntry::ExportedServices(candidate)));
    }

    #[rstest]
    #[case::name(
        exported("foo", vec![service(vec![peer("east")])]),
        ConsulMeta::default(),
        r#"exportedservices.consul.hashicorp.com "foo" is invalid: name: Invalid value: "foo": exportedservices resource name must be "default""#
    )]
    #[case::partition_name(
        exported("default", vec![service(vec![peer("east")])]),
        ConsulMeta { partition: "blah".to_string(), ..partitions() },
        r#"exportedservices.consul.hashicorp.com "default" is invalid: name: Invalid value: "default": exportedservices resource name must be the same name as the partition, "blah""#
    )]
    #[case::no_services(
        exported("default", vec![]),
        ConsulMeta::default(),
        r#"exportedservices.consul.hashicorp.com "default" is invalid: spec.services: Invalid value: []: at least one service must be exported"#
    )]
    #[case::no_consumers(
        exported("default", vec![service(vec![])]),
        ConsulMeta::default(),
        r#"exportedservices.consul.hashicorp.com "default" is invalid: spec.services[0]: Invalid value: []: service must have at least 1 consumer."#
    )]
    #[case::namespace(
        exported("default", vec![ExportedService { namespace: "frontend".to_string(), ..service(vec![peer("east")]) }]),
        ConsulMeta::default(),
        r#"exportedservices.consul.hashicorp.com "default" is invalid: spec.services[0]: Invalid value: "frontend": Consul Namespaces must be enabled to specify service namespace."#
    )]
    #[case::partition_disabled(
        exported("default", vec![service(vec![partition("test-partition")])]),
        ConsulMeta::default(),
        r#"exportedservices.consul.hashicorp.com "default" is invalid: spec.services[0].consumers[0].partition: Invalid value: "test-partition": Consul Admin Partitions need to be enabled to specify partition."#
    )]
    #[case::consumer_count(
        exported("default", vec![service(vec![
            ServiceConsumer { partition: "second".to_string(), peer: "second-peer".to_string(), ..Default::default() },
            ServiceConsumer::default(),
        ])]),
        partitions(),
        r#"exportedservices.consul.hashicorp.com "default" is invalid: [spec.services[0].consumers[0]: Invalid value: {"partition":"second","peer":"second-peer"}: service consumer must define at most one of Peer, Partition, or SamenessGroup, spec.services[0].consumers[1]: Invalid value: {}: service consumer must define at least one of Peer, Partition, or SamenessGroup]"#
    )]
    #[case::wildcards(
        exported("default", vec![service(vec![
            partition("*"),
            peer("*"),
            ServiceConsumer { sameness_group: "*".to_string(), ..Default::default() },
        ])]),
        partitions(),
        r#"exportedservices.consul.hashicorp.com "default" is invalid: [spec.services[0].consumers[0].partition: Invalid value: "": exporting to all partitions (wildcard) is not supported, spec.services[0].consumers[1].peer: Invalid value: "": exporting to all peers (wildcard) is not supported, spec.services[0].consumers[2].samenessgroup: Invalid value: "": exporting to all sameness groups (wildcard) is not supported]"#
    )]
    fn rejects_invalid(#[case] es: ExportedServices, #[case] meta: ConsulMeta, #[case] expected: &str) {
        let err = es.validate(&meta).unwrap_err();
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn accepts_partition_named_resource() {
        let meta = ConsulMeta {
            partition: "east".to_string(),
            ..partitions()
        };
        let es = exported("east", vec![service(vec![partition("west"), peer("dc2")])]);
        assert_eq!(es.validate(&meta), Ok(()));
    }
}
