use super::service_defaults::PassiveHealthCheck;
use crate::{
    field::{self, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::{is_default, not_in_slice_message, validate_tls_versions, HttpHeaderModifiers},
    status::Status,
};
use consul_k8s_core::{
    common::EntryMeta,
    gateway as consul,
    namespace::{normalize_empty_to_default, WILDCARD},
    ConfigEntry, INGRESS_GATEWAY,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const PROTOCOLS: &[&str] = &["tcp", "http", "http2", "grpc"];

/// Configures the listeners of an ingress gateway and the services exposed
/// on each.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "IngressGateway",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressGatewaySpec {
    /// TLS for every listener.
    pub tls: GatewayTlsConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<IngressListener>,
    /// Limits for every service not configuring its own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<IngressServiceConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayTlsConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sds: Option<GatewayTlsSdsConfig>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tls_min_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tls_max_version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cipher_suites: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayServiceTlsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sds: Option<GatewayTlsSdsConfig>,
}

/// Certificates served by an SDS cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayTlsSdsConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cluster_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cert_resource: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressListener {
    #[serde(skip_serializing_if = "is_default")]
    pub port: i32,
    /// One of `tcp`, `http`, `http2` or `grpc`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<GatewayTlsConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<IngressService>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressService {
    /// The service to expose, or `*` for every service on an HTTP listener.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<GatewayServiceTlsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<HttpHeaderModifiers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<HttpHeaderModifiers>,
    #[serde(flatten)]
    pub config: IngressServiceConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pending_requests: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_requests: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passive_health_check: Option<PassiveHealthCheck>,
}

impl ConfigEntryResource for IngressGateway {
    const KUBE_KIND: &'static str = "ingressgateway";
    const CONSUL_KIND: &'static str = INGRESS_GATEWAY;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        ConfigEntry::IngressGateway(consul::IngressGatewayConfigEntry {
            name: self.consul_name(),
            tls: self.spec.tls.to_consul(),
            listeners: self
                .spec
                .listeners
                .iter()
                .map(IngressListener::to_consul)
                .collect(),
            defaults: self.spec.defaults.as_ref().map(IngressServiceConfig::to_consul),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |entry| {
            let ConfigEntry::IngressGateway(ig) = entry else {
                return;
            };
            for svc in ig.listeners.iter_mut().flat_map(|l| l.services.iter_mut()) {
                normalize_empty_to_default(&mut svc.namespace);
                normalize_empty_to_default(&mut svc.partition);
            }
        })
    }

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid> {
        let path = Path::new("spec");
        let mut errs = self.spec.tls.validate(&path.child("tls"));
        for (i, listener) in self.spec.listeners.iter().enumerate() {
            errs.extend(listener.validate(&path.child("listeners").index(i), meta));
        }
        if let Some(defaults) = &self.spec.defaults {
            errs.extend(defaults.validate(&path.child("defaults")));
        }
        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }

    fn default_namespace_fields(&mut self, meta: &ConsulMeta) {
        if !meta.namespaces_enabled {
            return;
        }
        let namespace = meta.consul_namespace(&self.namespace().unwrap_or_default());
        let services = self
            .spec
            .listeners
            .iter_mut()
            .flat_map(|l| l.services.iter_mut());
        for svc in services.filter(|s| s.namespace.is_empty()) {
            svc.namespace = namespace.clone();
        }
    }
}

impl GatewayTlsConfig {
    fn to_consul(&self) -> consul::GatewayTlsConfig {
        consul::GatewayTlsConfig {
            enabled: self.enabled,
            sds: self.sds.as_ref().map(GatewayTlsSdsConfig::to_consul),
            tls_min_version: self.tls_min_version.clone(),
            tls_max_version: self.tls_max_version.clone(),
            cipher_suites: self.cipher_suites.clone(),
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        validate_tls_versions(&self.tls_min_version, &self.tls_max_version, path)
    }
}

impl GatewayTlsSdsConfig {
    fn to_consul(&self) -> consul::GatewayTlsSdsConfig {
        consul::GatewayTlsSdsConfig {
            cluster_name: self.cluster_name.clone(),
            cert_resource: self.cert_resource.clone(),
        }
    }
}

impl IngressListener {
    fn to_consul(&self) -> consul::IngressListener {
        consul::IngressListener {
            port: self.port,
            protocol: self.protocol.clone(),
            tls: self.tls.as_ref().map(GatewayTlsConfig::to_consul),
            services: self.services.iter().map(IngressService::to_consul).collect(),
        }
    }

    fn validate(&self, path: &Path, meta: &ConsulMeta) -> ErrorList {
        let mut errs = ErrorList::new();
        let protocol = self.protocol.as_str();
        if !PROTOCOLS.contains(&protocol) {
            errs.push(field::invalid(
                &path.child("protocol"),
                protocol,
                not_in_slice_message(PROTOCOLS),
            ));
        }
        let services = path.child("services");
        if protocol == "tcp" && self.services.len() > 1 {
            errs.push(field::invalid(
                &services,
                Value::json_string(&self.services),
                format!(
                    "if protocol is \"tcp\", only a single service is allowed, found {}",
                    self.services.len()
                ),
            ));
        }
        if let Some(tls) = &self.tls {
            errs.extend(tls.validate(&path.child("tls")));
        }

        for (i, svc) in self.services.iter().enumerate() {
            let svc_path = services.index(i);
            if svc.name == WILDCARD && protocol != "http" {
                errs.push(field::invalid(
                    &svc_path.child("name"),
                    &svc.name,
                    format!("if name is \"{WILDCARD}\", protocol must be \"http\" but was {}", field::quote(protocol)),
                ));
            }
            if svc.name == WILDCARD && !svc.hosts.is_empty() {
                errs.push(field::invalid(
                    &svc_path.child("hosts"),
                    Value::json_string(&svc.hosts),
                    format!("hosts must be empty if name is \"{WILDCARD}\""),
                ));
            }
            if !svc.partition.is_empty() && !meta.partitions_enabled {
                errs.push(field::invalid(
                    &svc_path.child("partition"),
                    &svc.partition,
                    "Consul Enterprise admin-partitions must be enabled to set service.partition",
                ));
            }
            if !svc.namespace.is_empty() && !meta.namespaces_enabled {
                errs.push(field::invalid(
                    &svc_path.child("namespace"),
                    &svc.namespace,
                    "Consul Enterprise namespaces must be enabled to set service.namespace",
                ));
            }
            if !svc.hosts.is_empty() && protocol == "tcp" {
                errs.push(field::invalid(
                    &svc_path.child("hosts"),
                    Value::json_string(&svc.hosts),
                    "hosts must be empty if protocol is \"tcp\"",
                ));
            }
            // Per-service limits are reported against the listener.
            errs.extend(svc.config.validate(path));
        }
        errs
    }
}

impl IngressService {
    fn to_consul(&self) -> consul::IngressService {
        consul::IngressService {
            name: self.name.clone(),
            hosts: self.hosts.clone(),
            namespace: self.namespace.clone(),
            partition: self.partition.clone(),
            tls: self.tls.as_ref().map(|tls| consul::GatewayServiceTlsConfig {
                sds: tls.sds.as_ref().map(GatewayTlsSdsConfig::to_consul),
            }),
            request_headers: self.request_headers.as_ref().map(HttpHeaderModifiers::to_consul),
            response_headers: self
                .response_headers
                .as_ref()
                .map(HttpHeaderModifiers::to_consul),
            config: self.config.to_consul(),
        }
    }
}

impl IngressServiceConfig {
    fn to_consul(&self) -> consul::IngressServiceConfig {
        consul::IngressServiceConfig {
            max_connections: self.max_connections,
            max_pending_requests: self.max_pending_requests,
            max_concurrent_requests: self.max_concurrent_requests,
            passive_health_check: self
                .passive_health_check
                .as_ref()
                .map(PassiveHealthCheck::to_consul),
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        [
            ("maxconnections", self.max_connections, "MaxConnections"),
            (
                "maxconcurrentrequests",
                self.max_concurrent_requests,
                "MaxConcurrentRequests",
            ),
            ("maxpendingrequests", self.max_pending_requests, "MaxPendingRequests"),
        ]
        .into_iter()
        .filter(|(_, v, _)| *v == Some(0))
        .map(|(child, _, name)| field::invalid(&path.child(child), 0u32, format!("{name} must be > 0")))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn gateway(spec: IngressGatewaySpec) -> IngressGateway {
        let mut ig = IngressGateway::new("foo", spec);
        ig.metadata.namespace = Some("bar".to_string());
        ig
    }

    fn listener(protocol: &str, services: Vec<IngressService>) -> IngressGatewaySpec {
        IngressGatewaySpec {
            listeners: vec![IngressListener {
                port: 8080,
                protocol: protocol.to_string(),
                tls: None,
                services,
            }],
            ..Default::default()
        }
    }

    fn service(name: &str) -> IngressService {
        IngressService {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn with_hosts(name: &str) -> IngressService {
        IngressService {
            hosts: vec!["host1".to_string(), "host2".to_string()],
            ..service(name)
        }
    }

    fn limited(config: IngressServiceConfig) -> IngressService {
        IngressService {
            config,
            ..service("svc1")
        }
    }

    #[test]
    fn to_consul() {
        let mut spec = listener(
            "http",
            vec![IngressService {
                hosts: vec!["web.example.com".to_string()],
                config: IngressServiceConfig {
                    max_connections: Some(10),
                    ..Default::default()
                },
                ..service("web")
            }],
        );
        spec.tls.enabled = true;
        spec.defaults = Some(IngressServiceConfig {
            passive_health_check: Some(PassiveHealthCheck {
                max_failures: 3,
                ..Default::default()
            }),
            ..Default::default()
        });
        let ConfigEntry::IngressGateway(entry) = gateway(spec).to_consul("dc1") else {
            panic!("unexpected kind");
        };
        assert_eq!(entry.name, "foo");
        assert!(entry.tls.enabled);
        assert_eq!(entry.listeners[0].port, 8080);
        let svc = &entry.listeners[0].services[0];
        assert_eq!(svc.hosts, ["web.example.com"]);
        assert_eq!(svc.config.max_connections, Some(10));
        let check = entry.defaults.and_then(|d| d.passive_health_check).unwrap();
        assert_eq!(check.max_failures, 3);
        assert_eq!(entry.entry_meta.meta, source_meta("dc1"));
    }

    #[test]
    fn matches_normalized_service_namespaces() {
        let ig = gateway(listener("http", vec![service("web")]));
        let ConfigEntry::IngressGateway(mut candidate) = ig.to_consul("dc1") else {
            panic!("unexpected kind");
        };
        candidate.listeners[0].services[0].namespace = "default".to_string();
        candidate.listeners[0].services[0].partition = "default".to_string();
        assert!(ig.matches_consul(&ConfigEntry::IngressGateway(candidate.clone())));

        candidate.listeners[0].port = 9090;
        assert!(!ig.matches_consul(&ConfigEntry::IngressGateway(candidate)));
    }

    #[rstest]
    #[case::tls_min(
        IngressGatewaySpec {
            tls: GatewayTlsConfig { tls_min_version: "foo".to_string(), ..Default::default() },
            ..Default::default()
        },
        r#"spec.tls.tlsMinVersion: Invalid value: "foo": must be one of "TLS_AUTO", "TLSv1_0", "TLSv1_1", "TLSv1_2", "TLSv1_3", """#
    )]
    #[case::protocol(
        listener("invalid", vec![]),
        r#"spec.listeners[0].protocol: Invalid value: "invalid": must be one of "tcp", "http", "http2", "grpc""#
    )]
    #[case::tcp_services(
        listener("tcp", vec![service("svc1"), service("svc2")]),
        r#"spec.listeners[0].services: Invalid value: "[{\"name\":\"svc1\"},{\"name\":\"svc2\"}]": if protocol is "tcp", only a single service is allowed, found 2"#
    )]
    #[case::wildcard_protocol(
        listener("tcp", vec![service("*")]),
        r#"spec.listeners[0].services[0].name: Invalid value: "*": if name is "*", protocol must be "http" but was "tcp""#
    )]
    #[case::wildcard_hosts(
        listener("http", vec![with_hosts("*")]),
        r#"spec.listeners[0].services[0].hosts: Invalid value: "[\"host1\",\"host2\"]": hosts must be empty if name is "*""#
    )]
    #[case::tcp_hosts(
        listener("tcp", vec![with_hosts("name")]),
        r#"spec.listeners[0].services[0].hosts: Invalid value: "[\"host1\",\"host2\"]": hosts must be empty if protocol is "tcp""#
    )]
    #[case::namespace(
        listener("http", vec![IngressService { namespace: "foo".to_string(), ..service("name") }]),
        r#"spec.listeners[0].services[0].namespace: Invalid value: "foo": Consul Enterprise namespaces must be enabled to set service.namespace"#
    )]
    #[case::partition(
        listener("http", vec![IngressService { partition: "foo".to_string(), ..service("name") }]),
        r#"spec.listeners[0].services[0].partition: Invalid value: "foo": Consul Enterprise admin-partitions must be enabled to set service.partition"#
    )]
    #[case::defaults(
        IngressGatewaySpec {
            defaults: Some(IngressServiceConfig { max_connections: Some(0), ..Default::default() }),
            ..Default::default()
        },
        "spec.defaults.maxconnections: Invalid value: 0x0: MaxConnections must be > 0"
    )]
    #[case::service_limit(
        listener("http", vec![limited(IngressServiceConfig { max_pending_requests: Some(0), ..Default::default() })]),
        "spec.listeners[0].maxpendingrequests: Invalid value: 0x0: MaxPendingRequests must be > 0"
    )]
    #[case::multiple(
        listener("invalid", vec![service("*")]),
        r#"[spec.listeners[0].protocol: Invalid value: "invalid": must be one of "tcp", "http", "http2", "grpc", spec.listeners[0].services[0].name: Invalid value: "*": if name is "*", protocol must be "http" but was "invalid"]"#
    )]
    fn rejects_invalid(#[case] spec: IngressGatewaySpec, #[case] detail: &str) {
        let err = gateway(spec).validate(&ConsulMeta::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(r#"ingressgateway.consul.hashicorp.com "foo" is invalid: {detail}"#)
        );
    }

    #[test]
    fn defaults_service_namespaces() {
        let meta = ConsulMeta {
            namespaces_enabled: true,
            destination_namespace: "gateways".to_string(),
            ..Default::default()
        };
        let mut ig = gateway(listener(
            "http",
            vec![
                service("web"),
                IngressService {
                    namespace: "explicit".to_string(),
                    ..service("api")
                },
            ],
        ));
        ig.default_namespace_fields(&meta);
        let namespaces: Vec<_> = ig.spec.listeners[0]
            .services
            .iter()
            .map(|s| s.namespace.as_str())
            .collect();
        assert_eq!(namespaces, ["gateways", "explicit"]);
    }
}
