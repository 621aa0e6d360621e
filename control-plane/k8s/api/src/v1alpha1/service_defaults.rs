use crate::{
    field::{self, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::{
        envoy_extensions_to_consul, is_default, not_in_slice_message, validate_envoy_extensions,
        validate_mutual_tls_mode, validate_proxy_mode, EnvoyExtension, Expose, MeshGateway,
        TransparentProxy,
    },
    status::Status,
};
use consul_k8s_core::{
    common::{transparent_proxy_eq, EntryMeta},
    namespace::normalize_empty_to_default,
    service as consul, ConfigEntry, GoDuration, SERVICE_DEFAULTS,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::IpAddr};

/// Defaults for every instance of a service.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "ServiceDefaults",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDefaultsSpec {
    /// One of `tcp`, `http`, `http2` or `grpc`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    /// Rejected; the proxy mode is set with a pod annotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparent_proxy: Option<TransparentProxy>,
    #[serde(rename = "mutualTLSMode", skip_serializing_if = "String::is_empty")]
    pub mutual_tls_mode: String,
    #[serde(skip_serializing_if = "is_default")]
    pub mesh_gateway: MeshGateway,
    #[serde(skip_serializing_if = "is_default")]
    pub expose: Expose,
    /// The SNI that terminating gateways present when dialing this service.
    #[serde(rename = "externalSNI", skip_serializing_if = "String::is_empty")]
    pub external_sni: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_config: Option<Upstreams>,
    /// Makes the service a destination for traffic leaving the mesh through
    /// a terminating gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<ServiceDefaultsDestination>,
    #[serde(skip_serializing_if = "is_default")]
    pub max_inbound_connections: i32,
    #[serde(skip_serializing_if = "is_default")]
    pub local_connect_timeout_ms: i32,
    #[serde(skip_serializing_if = "is_default")]
    pub local_request_timeout_ms: i32,
    /// Empty or `exact_balance`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub balance_inbound_connections: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limits: Option<RateLimits>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envoy_extensions: Vec<EnvoyExtension>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Upstreams {
    /// Applies to all upstreams. Name, namespace, partition and peer must be
    /// empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Upstream>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<Upstream>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Upstream {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub partition: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer: String,
    #[serde(rename = "envoyListenerJSON", skip_serializing_if = "String::is_empty")]
    pub envoy_listener_json: String,
    #[serde(rename = "envoyClusterJSON", skip_serializing_if = "String::is_empty")]
    pub envoy_cluster_json: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(skip_serializing_if = "is_default")]
    pub connect_timeout_ms: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<UpstreamLimits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passive_health_check: Option<PassiveHealthCheck>,
    #[serde(skip_serializing_if = "is_default")]
    pub mesh_gateway: MeshGateway,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pending_requests: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_requests: Option<i32>,
}

/// Outlier detection for an upstream cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PassiveHealthCheck {
    /// Time between health check analysis sweeps.
    #[serde(skip_serializing_if = "GoDuration::is_zero")]
    pub interval: GoDuration,
    /// Consecutive failures before a host is ejected.
    #[serde(skip_serializing_if = "is_default")]
    pub max_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcing_consecutive_5xx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ejection_percent: Option<u32>,
    /// Defaults to 30s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_ejection_time: Option<GoDuration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDefaultsDestination {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(skip_serializing_if = "is_default")]
    pub port: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimits {
    pub instance_level: InstanceLevelRateLimits,
}

/// Rate limits enforced by each service instance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceLevelRateLimits {
    #[serde(skip_serializing_if = "is_default")]
    pub requests_per_second: i32,
    #[serde(skip_serializing_if = "is_default")]
    pub requests_max_burst: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<InstanceLevelRouteRateLimits>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceLevelRouteRateLimits {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_exact: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path_regex: String,
    #[serde(skip_serializing_if = "is_default")]
    pub requests_per_second: i32,
    #[serde(skip_serializing_if = "is_default")]
    pub requests_max_burst: i32,
}

const PROTOCOLS: &[&str] = &["tcp", "http", "http2", "grpc"];

impl ConfigEntryResource for ServiceDefaults {
    const KUBE_KIND: &'static str = "servicedefaults";
    const CONSUL_KIND: &'static str = SERVICE_DEFAULTS;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        let spec = &self.spec;
        ConfigEntry::ServiceDefaults(consul::ServiceConfigEntry {
            name: self.consul_name(),
            protocol: spec.protocol.clone(),
            mode: spec.mode.clone().unwrap_or_default(),
            transparent_proxy: spec.transparent_proxy.as_ref().map(TransparentProxy::to_consul),
            mutual_tls_mode: spec.mutual_tls_mode.clone(),
            mesh_gateway: spec.mesh_gateway.to_consul(),
            expose: spec.expose.to_consul(),
            external_sni: spec.external_sni.clone(),
            upstream_config: spec.upstream_config.as_ref().map(Upstreams::to_consul),
            destination: spec.destination.as_ref().map(|d| consul::DestinationConfig {
                addresses: d.addresses.clone(),
                port: i32::try_from(d.port).unwrap_or(i32::MAX),
            }),
            max_inbound_connections: spec.max_inbound_connections,
            local_connect_timeout_ms: spec.local_connect_timeout_ms,
            local_request_timeout_ms: spec.local_request_timeout_ms,
            balance_inbound_connections: spec.balance_inbound_connections.clone(),
            rate_limits: spec.rate_limits.as_ref().map(RateLimits::to_consul),
            envoy_extensions: envoy_extensions_to_consul(&spec.envoy_extensions),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |entry| {
            let ConfigEntry::ServiceDefaults(sd) = entry else {
                return;
            };
            if transparent_proxy_eq(&sd.transparent_proxy, &None) {
                sd.transparent_proxy = None;
            }
            if let Some(upstreams) = &mut sd.upstream_config {
                for o in &mut upstreams.overrides {
                    normalize_empty_to_default(&mut o.namespace);
                    normalize_empty_to_default(&mut o.partition);
                }
            }
        })
    }

    fn validate(&self, meta: &ConsulMeta) -> Result<(), Invalid> {
        let spec = &self.spec;
        let path = Path::new("spec");
        let mut errs = ErrorList::new();

        if !spec.protocol.is_empty() && !PROTOCOLS.contains(&spec.protocol.as_str()) {
            errs.push(field::invalid(
                &path.child("protocol"),
                &spec.protocol,
                not_in_slice_message(PROTOCOLS),
            ));
        }
        errs.extend(spec.mesh_gateway.validate(&path.child("meshGateway")));
        if let Some(tp) = &spec.transparent_proxy {
            errs.extend(tp.validate(&path.child("transparentProxy")));
        }
        errs.extend(validate_mutual_tls_mode(
            &spec.mutual_tls_mode,
            &path.child("mutualTLSMode"),
        ));
        errs.extend(validate_proxy_mode(spec.mode.as_ref(), &path.child("mode")));
        if let Some(dest) = &spec.destination {
            errs.extend(dest.validate(&path.child("destination")));
        }
        if spec.max_inbound_connections < 0 {
            errs.push(field::invalid(
                &path.child("maxinboundconnections"),
                spec.max_inbound_connections,
                "MaxInboundConnections must be > 0",
            ));
        }
        if spec.local_connect_timeout_ms < 0 {
            errs.push(field::invalid(
                &path.child("localConnectTimeoutMs"),
                spec.local_connect_timeout_ms,
                "LocalConnectTimeoutMs must be > 0",
            ));
        }
        if spec.local_request_timeout_ms < 0 {
            errs.push(field::invalid(
                &path.child("localRequestTimeoutMs"),
                spec.local_request_timeout_ms,
                "LocalRequestTimeoutMs must be > 0",
            ));
        }
        if !matches!(spec.balance_inbound_connections.as_str(), "" | "exact_balance") {
            errs.push(field::invalid(
                &path.child("balanceInboundConnections"),
                &spec.balance_inbound_connections,
                "BalanceInboundConnections must be an empty string or exact_balance",
            ));
        }
        if let Some(upstreams) = &spec.upstream_config {
            errs.extend(upstreams.validate(&path.child("upstreamConfig"), meta.partitions_enabled));
        }
        errs.extend(spec.expose.validate(&path.child("expose")));
        if let Some(rl) = &spec.rate_limits {
            errs.extend(rl.instance_level.validate(&path.child("rateLimits").child("instanceLevel")));
        }
        errs.extend(validate_envoy_extensions(
            &spec.envoy_extensions,
            &path.child("envoyExtensions"),
        ));

        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum UpstreamKind {
    Default,
    Override,
}

impl Upstreams {
    fn to_consul(&self) -> consul::UpstreamConfiguration {
        consul::UpstreamConfiguration {
            overrides: self.overrides.iter().map(Upstream::to_consul).collect(),
            defaults: self.defaults.as_ref().map(Upstream::to_consul),
        }
    }

    fn validate(&self, path: &Path, partitions_enabled: bool) -> ErrorList {
        let mut errs = ErrorList::new();
        if let Some(defaults) = &self.defaults {
            errs.extend(defaults.validate(
                &path.child("defaults"),
                UpstreamKind::Default,
                partitions_enabled,
            ));
        }
        for (i, o) in self.overrides.iter().enumerate() {
            errs.extend(o.validate(
                &path.child("overrides").index(i),
                UpstreamKind::Override,
                partitions_enabled,
            ));
        }
        errs
    }
}

impl Upstream {
    fn to_consul(&self) -> consul::UpstreamConfig {
        consul::UpstreamConfig {
            name: self.name.clone(),
            partition: self.partition.clone(),
            namespace: self.namespace.clone(),
            peer: self.peer.clone(),
            envoy_listener_json: self.envoy_listener_json.clone(),
            envoy_cluster_json: self.envoy_cluster_json.clone(),
            protocol: self.protocol.clone(),
            connect_timeout_ms: self.connect_timeout_ms,
            limits: self.limits.as_ref().map(|l| consul::UpstreamLimits {
                max_connections: l.max_connections,
                max_pending_requests: l.max_pending_requests,
                max_concurrent_requests: l.max_concurrent_requests,
            }),
            passive_health_check: self
                .passive_health_check
                .as_ref()
                .map(PassiveHealthCheck::to_consul),
            mesh_gateway: self.mesh_gateway.to_consul(),
            balance_outbound_connections: String::new(),
        }
    }

    fn validate(&self, path: &Path, kind: UpstreamKind, partitions_enabled: bool) -> ErrorList {
        let mut errs = ErrorList::new();
        match kind {
            UpstreamKind::Default => {
                for (name, value) in [
                    ("name", &self.name),
                    ("namespace", &self.namespace),
                    ("partition", &self.partition),
                    ("peer", &self.peer),
                ] {
                    if !value.is_empty() {
                        errs.push(field::invalid(
                            &path.child(name),
                            value,
                            format!("upstream.{name} for a default upstream must be \"\""),
                        ));
                    }
                }
            }
            UpstreamKind::Override => {
                if self.name.is_empty() {
                    errs.push(field::invalid(
                        &path.child("name"),
                        &self.name,
                        "upstream.name for an override upstream cannot be \"\"",
                    ));
                }
                if !self.namespace.is_empty() && !self.peer.is_empty() {
                    errs.push(field::invalid(
                        path,
                        Value::json(self),
                        "both namespace and peer cannot be specified.",
                    ));
                }
                if !self.partition.is_empty() && !self.peer.is_empty() {
                    errs.push(field::invalid(
                        path,
                        Value::json(self),
                        "both partition and peer cannot be specified.",
                    ));
                }
            }
        }
        if !partitions_enabled && !self.partition.is_empty() {
            errs.push(field::invalid(
                &path.child("partition"),
                &self.partition,
                "Consul Enterprise Admin Partitions must be enabled to set upstream.partition",
            ));
        }
        errs.extend(self.mesh_gateway.validate(&path.child("meshGateway")));
        errs
    }
}

impl PassiveHealthCheck {
    pub(crate) fn to_consul(&self) -> consul::PassiveHealthCheck {
        consul::PassiveHealthCheck {
            interval: self.interval,
            max_failures: self.max_failures,
            enforcing_consecutive_5xx: self.enforcing_consecutive_5xx,
            max_ejection_percent: self.max_ejection_percent,
            base_ejection_time: Some(
                self.base_ejection_time
                    .unwrap_or(GoDuration::from_secs(30)),
            ),
        }
    }
}

impl ServiceDefaultsDestination {
    fn validate(&self, path: &Path) -> ErrorList {
        let mut errs = ErrorList::new();
        let addresses = path.child("addresses");
        if self.addresses.is_empty() {
            errs.push(field::required(
                &addresses,
                "at least one address must be define per destination",
            ));
        }
        let mut seen = HashSet::with_capacity(self.addresses.len());
        for (i, address) in self.addresses.iter().enumerate() {
            if !seen.insert(address) {
                errs.push(field::duplicate(&addresses.index(i), address));
                continue;
            }
            if !valid_endpoint_address(address) {
                errs.push(field::invalid(
                    &addresses.index(i),
                    address,
                    format!("address {address} is not a valid IP or hostname"),
                ));
            }
        }
        if !(1..=65535).contains(&self.port) {
            errs.push(field::invalid(
                &path.child("port"),
                self.port,
                "invalid port number",
            ));
        }
        errs
    }
}

fn valid_endpoint_address(address: &str) -> bool {
    if address.is_empty() {
        return false;
    }
    if address.parse::<IpAddr>().is_ok() {
        return true;
    }
    !address.contains('*') && is_domain_name(address)
}

/// Accepts names whose labels are non-empty and within DNS length limits.
fn is_domain_name(name: &str) -> bool {
    if name == "." {
        return true;
    }
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    name.split('.').all(|label| !label.is_empty() && label.len() <= 63)
}

impl RateLimits {
    fn to_consul(&self) -> consul::RateLimits {
        let il = &self.instance_level;
        consul::RateLimits {
            instance_level: consul::InstanceLevelRateLimits {
                requests_per_second: il.requests_per_second,
                requests_max_burst: il.requests_max_burst,
                routes: il
                    .routes
                    .iter()
                    .map(|r| consul::InstanceLevelRouteRateLimits {
                        path_exact: r.path_exact.clone(),
                        path_prefix: r.path_prefix.clone(),
                        path_regex: r.path_regex.clone(),
                        requests_per_second: r.requests_per_second,
                        requests_max_burst: r.requests_max_burst,
                    })
                    .collect(),
            },
        }
    }
}

impl InstanceLevelRateLimits {
    fn validate(&self, path: &Path) -> ErrorList {
        let mut errs = ErrorList::new();
        let rps = path.child("requestsPerSecond");
        let mut rate_set = self.requests_per_second > 0;

        if self.requests_per_second < 0 {
            errs.push(field::invalid(
                &rps,
                self.requests_per_second,
                "RequestsPerSecond must be positive",
            ));
        }
        if self.requests_per_second == 0 && self.requests_max_burst > 0 {
            errs.push(field::invalid(
                &rps,
                self.requests_per_second,
                "RequestsPerSecond must be greater than 0 if RequestsMaxBurst is set",
            ));
        }
        if self.requests_max_burst < 0 {
            errs.push(field::invalid(
                &path.child("requestsMaxBurst"),
                self.requests_max_burst,
                "RequestsMaxBurst must be positive",
            ));
        }

        for (i, route) in self.routes.iter().enumerate() {
            let path = path.child("routes").index(i);
            let set = [&route.path_exact, &route.path_prefix, &route.path_regex]
                .into_iter()
                .filter(|p| !p.is_empty())
                .count();
            if set != 1 {
                errs.push(field::required(
                    &path,
                    "Route must define exactly one of PathExact, PathPrefix, or PathRegex",
                ));
            }
            rate_set = rate_set || route.requests_per_second > 0;
            if route.requests_per_second <= 0 {
                errs.push(field::invalid(
                    &path.child("requestsPerSecond"),
                    route.requests_per_second,
                    "RequestsPerSecond must be greater than 0",
                ));
            }
            if route.requests_max_burst < 0 {
                errs.push(field::invalid(
                    &path.child("requestsMaxBurst"),
                    route.requests_max_burst,
                    "RequestsMaxBurst must be positive",
                ));
            }
        }

        if !rate_set {
            errs.push(field::invalid(
                &rps,
                self.requests_per_second,
                "At least one of top-level or route-level RequestsPerSecond must be set",
            ));
        }
        errs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ExposePath;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn service_defaults(spec: ServiceDefaultsSpec) -> ServiceDefaults {
        let mut sd = ServiceDefaults::new("my-service", spec);
        sd.metadata.namespace = Some("default".to_string());
        sd
    }

    fn validate(spec: ServiceDefaultsSpec) -> Result<(), String> {
        validate_with(spec, &ConsulMeta::default())
    }

    fn validate_with(spec: ServiceDefaultsSpec, meta: &ConsulMeta) -> Result<(), String> {
        service_defaults(spec)
            .validate(meta)
            .map_err(|e| e.to_string())
    }

    #[test]
    fn to_consul_stamps_meta_and_defaults_ejection_time() {
        let sd = service_defaults(ServiceDefaultsSpec {
            protocol: "http".to_string(),
            mesh_gateway: MeshGateway {
                mode: "local".to_string(),
            },
            upstream_config: Some(Upstreams {
                defaults: Some(Upstream {
                    passive_health_check: Some(PassiveHealthCheck {
                        interval: GoDuration::from_secs(2),
                        max_failures: 3,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                overrides: vec![],
            }),
            destination: Some(ServiceDefaultsDestination {
                addresses: vec!["api.google.com".to_string()],
                port: 443,
            }),
            ..Default::default()
        });

        let ConfigEntry::ServiceDefaults(entry) = sd.to_consul("dc1") else {
            panic!("unexpected kind");
        };
        assert_eq!(entry.name, "my-service");
        assert_eq!(entry.protocol, "http");
        assert_eq!(entry.mesh_gateway.mode, "local");
        assert_eq!(entry.entry_meta.meta, source_meta("dc1"));
        assert_eq!(
            entry.destination,
            Some(consul::DestinationConfig {
                addresses: vec!["api.google.com".to_string()],
                port: 443,
            })
        );
        let phc = entry
            .upstream_config
            .and_then(|u| u.defaults)
            .and_then(|d| d.passive_health_check)
            .unwrap();
        assert_eq!(phc.base_ejection_time, Some(GoDuration::from_secs(30)));
        assert_eq!(phc.interval, GoDuration::from_secs(2));
    }

    #[test]
    fn matches_consul_ignores_server_fields() {
        let sd = service_defaults(ServiceDefaultsSpec {
            protocol: "http".to_string(),
            upstream_config: Some(Upstreams {
                defaults: None,
                overrides: vec![Upstream {
                    name: "backend".to_string(),
                    ..Default::default()
                }],
            }),
            ..Default::default()
        });

        let ConfigEntry::ServiceDefaults(mut candidate) = sd.to_consul("dc1") else {
            panic!("unexpected kind");
        };
        candidate.entry_meta = EntryMeta {
            namespace: "default".to_string(),
            partition: "default".to_string(),
            create_index: 1,
            modify_index: 2,
            ..Default::default()
        };
        candidate.transparent_proxy = Some(Default::default());
        if let Some(u) = &mut candidate.upstream_config {
            u.overrides[0].namespace = "default".to_string();
            u.overrides[0].partition = "default".to_string();
        }
        assert!(sd.matches_consul(&ConfigEntry::ServiceDefaults(candidate.clone())));

        candidate.protocol = "tcp".to_string();
        assert!(!sd.matches_consul(&ConfigEntry::ServiceDefaults(candidate)));

        assert!(!sd.matches_consul(&ConfigEntry::Mesh(Default::default())));
    }

    #[rstest]
    #[case::protocol(
        ServiceDefaultsSpec { protocol: "foo".to_string(), ..Default::default() },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.protocol: Invalid value: "foo": must be one of "tcp", "http", "http2", "grpc""#
    )]
    #[case::mutual_tls_mode(
        ServiceDefaultsSpec { mutual_tls_mode: "asdf".to_string(), ..Default::default() },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.mutualTLSMode: Invalid value: "asdf": Must be one of "", "strict", or "permissive"."#
    )]
    #[case::default_upstream_name(
        ServiceDefaultsSpec {
            upstream_config: Some(Upstreams {
                defaults: Some(Upstream { name: "foobar".to_string(), ..Default::default() }),
                overrides: vec![],
            }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.upstreamConfig.defaults.name: Invalid value: "foobar": upstream.name for a default upstream must be """#
    )]
    #[case::default_upstream_partition(
        ServiceDefaultsSpec {
            upstream_config: Some(Upstreams {
                defaults: Some(Upstream { partition: "upstream".to_string(), ..Default::default() }),
                overrides: vec![],
            }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: [spec.upstreamConfig.defaults.partition: Invalid value: "upstream": upstream.partition for a default upstream must be "", spec.upstreamConfig.defaults.partition: Invalid value: "upstream": Consul Enterprise Admin Partitions must be enabled to set upstream.partition]"#
    )]
    #[case::override_name(
        ServiceDefaultsSpec {
            upstream_config: Some(Upstreams {
                defaults: None,
                overrides: vec![Upstream::default()],
            }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.upstreamConfig.overrides[0].name: Invalid value: "": upstream.name for an override upstream cannot be """#
    )]
    #[case::override_namespace_and_peer(
        ServiceDefaultsSpec {
            upstream_config: Some(Upstreams {
                defaults: None,
                overrides: vec![Upstream {
                    name: "service".to_string(),
                    namespace: "namespace".to_string(),
                    peer: "peer".to_string(),
                    ..Default::default()
                }],
            }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.upstreamConfig.overrides[0]: Invalid value: {"name":"service","namespace":"namespace","peer":"peer"}: both namespace and peer cannot be specified."#
    )]
    #[case::destination_addresses(
        ServiceDefaultsSpec {
            destination: Some(ServiceDefaultsDestination { addresses: vec![], port: 443 }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.destination.addresses: Required value: at least one address must be define per destination"#
    )]
    #[case::destination_duplicate(
        ServiceDefaultsSpec {
            destination: Some(ServiceDefaultsDestination {
                addresses: vec!["google.com".to_string(), "google.com".to_string()],
                port: 443,
            }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.destination.addresses[1]: Duplicate value: "google.com""#
    )]
    #[case::destination_invalid_addresses(
        ServiceDefaultsSpec {
            destination: Some(ServiceDefaultsDestination {
                addresses: vec!["...".to_string(), String::new(), "*.google.com".to_string()],
                port: 443,
            }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: [spec.destination.addresses[0]: Invalid value: "...": address ... is not a valid IP or hostname, spec.destination.addresses[1]: Invalid value: "": address  is not a valid IP or hostname, spec.destination.addresses[2]: Invalid value: "*.google.com": address *.google.com is not a valid IP or hostname]"#
    )]
    #[case::destination_port(
        ServiceDefaultsSpec {
            destination: Some(ServiceDefaultsDestination {
                addresses: vec!["10.0.0.1".to_string()],
                port: 0,
            }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.destination.port: Invalid value: 0x0: invalid port number"#
    )]
    #[case::max_inbound_connections(
        ServiceDefaultsSpec { max_inbound_connections: -1, ..Default::default() },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.maxinboundconnections: Invalid value: -1: MaxInboundConnections must be > 0"#
    )]
    #[case::local_request_timeout(
        ServiceDefaultsSpec { local_request_timeout_ms: -1, ..Default::default() },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.localRequestTimeoutMs: Invalid value: -1: LocalRequestTimeoutMs must be > 0"#
    )]
    #[case::balance_inbound_connections(
        ServiceDefaultsSpec { balance_inbound_connections: "not_exact_balance".to_string(), ..Default::default() },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.balanceInboundConnections: Invalid value: "not_exact_balance": BalanceInboundConnections must be an empty string or exact_balance"#
    )]
    #[case::rate_limit_burst_without_rate(
        ServiceDefaultsSpec {
            rate_limits: Some(RateLimits {
                instance_level: InstanceLevelRateLimits {
                    requests_max_burst: 100,
                    routes: vec![InstanceLevelRouteRateLimits {
                        path_exact: "/foo".to_string(),
                        requests_per_second: 10,
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.rateLimits.instanceLevel.requestsPerSecond: Invalid value: 0: RequestsPerSecond must be greater than 0 if RequestsMaxBurst is set"#
    )]
    #[case::rate_limit_route_paths(
        ServiceDefaultsSpec {
            rate_limits: Some(RateLimits {
                instance_level: InstanceLevelRateLimits {
                    routes: vec![InstanceLevelRouteRateLimits {
                        path_exact: "/foo".to_string(),
                        path_prefix: "/bar".to_string(),
                        requests_per_second: 10,
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: spec.rateLimits.instanceLevel.routes[0]: Required value: Route must define exactly one of PathExact, PathPrefix, or PathRegex"#
    )]
    #[case::rate_limit_unset(
        ServiceDefaultsSpec {
            rate_limits: Some(RateLimits {
                instance_level: InstanceLevelRateLimits {
                    routes: vec![InstanceLevelRouteRateLimits {
                        path_prefix: "/admin".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            }),
            ..Default::default()
        },
        r#"servicedefaults.consul.hashicorp.com "my-service" is invalid: [spec.rateLimits.instanceLevel.routes[0].requestsPerSecond: Invalid value: 0: RequestsPerSecond must be greater than 0, spec.rateLimits.instanceLevel.requestsPerSecond: Invalid value: 0: At least one of top-level or route-level RequestsPerSecond must be set]"#
    )]
    fn rejects_invalid(#[case] spec: ServiceDefaultsSpec, #[case] expected: &str) {
        assert_eq!(validate(spec), Err(expected.to_string()));
    }

    #[test]
    fn reports_errors_in_order() {
        let spec = ServiceDefaultsSpec {
            protocol: "invalid".to_string(),
            mode: Some("transparent".to_string()),
            transparent_proxy: Some(TransparentProxy {
                outbound_listener_port: 1000,
                dialed_directly: false,
            }),
            mesh_gateway: MeshGateway {
                mode: "invalid-mode".to_string(),
            },
            expose: Expose {
                checks: false,
                paths: vec![ExposePath {
                    path: "invalid-path".to_string(),
                    protocol: "invalid-protocol".to_string(),
                    ..Default::default()
                }],
            },
            ..Default::default()
        };
        assert_eq!(
            validate(spec),
            Err("servicedefaults.consul.hashicorp.com \"my-service\" is invalid: [spec.protocol: Invalid value: \"invalid\": must be one of \"tcp\", \"http\", \"http2\", \"grpc\", spec.meshGateway.mode: Invalid value: \"invalid-mode\": must be one of \"remote\", \"local\", \"none\", \"\", spec.transparentProxy.outboundListenerPort: Invalid value: 1000: use the annotation `consul.hashicorp.com/transparent-proxy-outbound-listener-port` to configure the Outbound Listener Port, spec.mode: Invalid value: \"transparent\": use the annotation `consul.hashicorp.com/transparent-proxy` to configure the Transparent Proxy Mode, spec.expose.paths[0].path: Invalid value: \"invalid-path\": must begin with a '/', spec.expose.paths[0].protocol: Invalid value: \"invalid-protocol\": must be one of \"http\", \"http2\"]".to_string())
        );
    }

    #[test]
    fn accepts_valid() {
        let spec = ServiceDefaultsSpec {
            protocol: "http".to_string(),
            upstream_config: Some(Upstreams {
                defaults: None,
                overrides: vec![Upstream {
                    name: "backend".to_string(),
                    partition: "other".to_string(),
                    ..Default::default()
                }],
            }),
            destination: Some(ServiceDefaultsDestination {
                addresses: vec!["10.0.0.1".to_string(), "api.example.com".to_string()],
                port: 443,
            }),
            rate_limits: Some(RateLimits {
                instance_level: InstanceLevelRateLimits {
                    requests_per_second: 100,
                    requests_max_burst: 200,
                    routes: vec![],
                },
            }),
            ..Default::default()
        };
        let meta = ConsulMeta {
            partitions_enabled: true,
            ..Default::default()
        };
        assert_eq!(validate_with(spec, &meta), Ok(()));
    }

    #[rstest]
    #[case("10.0.0.1", true)]
    #[case("::1", true)]
    #[case("google.com", true)]
    #[case("google.com.", true)]
    #[case("*.google.com", false)]
    #[case("...", false)]
    #[case("", false)]
    fn endpoint_addresses(#[case] address: &str, #[case] valid: bool) {
        assert_eq!(valid_endpoint_address(address), valid);
    }
}
