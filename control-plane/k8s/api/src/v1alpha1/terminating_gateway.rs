use crate::{
    field::{self, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::is_default,
    status::Status,
};
use consul_k8s_core::{common::EntryMeta, gateway as consul, ConfigEntry, TERMINATING_GATEWAY};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Links external services to a terminating gateway.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "TerminatingGateway",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminatingGatewaySpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<LinkedService>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkedService {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// The service name, or `*` for every service in the namespace.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ca_file: String,
    /// Must be set together with `keyFile`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cert_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sni: String,
    #[serde(skip_serializing_if = "is_default")]
    pub disable_auto_host_rewrite: bool,
}

impl ConfigEntryResource for TerminatingGateway {
    const KUBE_KIND: &'static str = "terminatinggateway";
    const CONSUL_KIND: &'static str = TERMINATING_GATEWAY;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        ConfigEntry::TerminatingGateway(consul::TerminatingGatewayConfigEntry {
            name: self.consul_name(),
            services: self.spec.services.iter().map(LinkedService::to_consul).collect(),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |_| {})
    }

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid> {
        let path = Path::new("spec").child("services");
        let mut errs = ErrorList::new();
        for (i, svc) in self.spec.services.iter().enumerate() {
            if svc.cert_file.is_empty() != svc.key_file.is_empty() {
                errs.push(field::invalid(
                    &path.index(i),
                    Value::json_string(svc),
                    "if certFile or keyFile is set, the other must also be set",
                ));
            }
        }
        if !meta.namespaces_enabled {
            for (i, svc) in self.spec.services.iter().enumerate() {
                if !svc.namespace.is_empty() {
                    errs.push(field::invalid(
                        &path.index(i).child("namespace"),
                        &svc.namespace,
                        "Consul Enterprise namespaces must be enabled to set service.namespace",
                    ));
                }
            }
        }
        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }

    fn default_namespace_fields(&mut self, meta: &ConsulMeta) {
        if !meta.namespaces_enabled {
            return;
        }
        let namespace = meta.consul_namespace(&self.namespace().unwrap_or_default());
        for svc in self.spec.services.iter_mut().filter(|s| s.namespace.is_empty()) {
            svc.namespace = namespace.clone();
        }
    }
}

impl LinkedService {
    fn to_consul(&self) -> consul::LinkedService {
        consul::LinkedService {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            ca_file: self.ca_file.clone(),
            cert_file: self.cert_file.clone(),
            key_file: self.key_file.clone(),
            sni: self.sni.clone(),
            disable_auto_host_rewrite: self.disable_auto_host_rewrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn gateway(services: Vec<LinkedService>) -> TerminatingGateway {
        let mut tg = TerminatingGateway::new("foo", TerminatingGatewaySpec { services });
        tg.metadata.namespace = Some("bar".to_string());
        tg
    }

    fn linked(name: &str) -> LinkedService {
        LinkedService {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn to_consul() {
        let tg = gateway(vec![LinkedService {
            ca_file: "/etc/ca.pem".to_string(),
            sni: "db.example.com".to_string(),
            disable_auto_host_rewrite: true,
            ..linked("db")
        }]);
        let ConfigEntry::TerminatingGateway(entry) = tg.to_consul("dc1") else {
            panic!("unexpected kind");
        };
        assert_eq!(entry.name, "foo");
        assert_eq!(
            entry.services,
            [consul::LinkedService {
                name: "db".to_string(),
                ca_file: "/etc/ca.pem".to_string(),
                sni: "db.example.com".to_string(),
                disable_auto_host_rewrite: true,
                ..Default::default()
            }]
        );
        assert_eq!(entry.entry_meta.meta, source_meta("dc1"));
    }

    #[test]
    fn matches_consul() {
        let tg = gateway(vec![linked("db")]);
        let ConfigEntry::TerminatingGateway(mut candidate) = tg.to_consul("dc1") else {
            panic!("unexpected kind");
        };
        candidate.entry_meta.namespace = "default".to_string();
        assert!(tg.matches_consul(&ConfigEntry::TerminatingGateway(candidate.clone())));

        candidate.services[0].sni = "other".to_string();
        assert!(!tg.matches_consul(&ConfigEntry::TerminatingGateway(candidate)));
    }

    #[rstest]
    #[case::cert_only(
        LinkedService { cert_file: "certFile".to_string(), ..linked("foo") },
        r#"spec.services[0]: Invalid value: "{\"name\":\"foo\",\"certFile\":\"certFile\"}": if certFile or keyFile is set, the other must also be set"#
    )]
    #[case::key_only(
        LinkedService { key_file: "keyFile".to_string(), ..linked("foo") },
        r#"spec.services[0]: Invalid value: "{\"name\":\"foo\",\"keyFile\":\"keyFile\"}": if certFile or keyFile is set, the other must also be set"#
    )]
    #[case::namespace(
        LinkedService { namespace: "ns".to_string(), ..linked("foo") },
        r#"spec.services[0].namespace: Invalid value: "ns": Consul Enterprise namespaces must be enabled to set service.namespace"#
    )]
    fn rejects_invalid(#[case] svc: LinkedService, #[case] detail: &str) {
        let err = gateway(vec![svc]).validate(&ConsulMeta::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(r#"terminatinggateway.consul.hashicorp.com "foo" is invalid: {detail}"#)
        );
    }

    #[test]
    fn accepts_cert_and_key() {
        let tg = gateway(vec![LinkedService {
            cert_file: "certFile".to_string(),
            key_file: "keyFile".to_string(),
            ..linked("foo")
        }]);
        assert_eq!(tg.validate(&ConsulMeta::default()), Ok(()));
    }

    #[test]
    fn defaults_service_namespaces() {
        let meta = ConsulMeta {
            namespaces_enabled: true,
            mirroring: true,
            prefix: "k8s-".to_string(),
            ..Default::default()
        };
        let mut tg = gateway(vec![linked("db")]);
        tg.default_namespace_fields(&meta);
        assert_eq!(tg.spec.services[0].namespace, "k8s-bar");
    }
}
