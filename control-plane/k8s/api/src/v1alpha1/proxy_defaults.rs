use crate::{
    field::{self, Error, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::{
        envoy_extensions_to_consul, is_default, json_map, validate_envoy_extensions,
        validate_mutual_tls_mode, validate_proxy_mode, EnvoyExtension, Expose, FailoverPolicy,
        MeshGateway, PrioritizeByLocality, TransparentProxy,
    },
    status::Status,
};
use consul_k8s_core::{
    common::{transparent_proxy_eq, EntryMeta},
    proxy as consul, ConfigEntry, PROXY_DEFAULTS,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Defaults for every proxy in the datacenter. Consul accepts a single
/// entry named `global`.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "ProxyDefaults",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyDefaultsSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparent_proxy: Option<TransparentProxy>,
    #[serde(rename = "mutualTLSMode", skip_serializing_if = "String::is_empty")]
    pub mutual_tls_mode: String,
    /// Arbitrary proxy configuration. Must be a JSON object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "is_default")]
    pub mesh_gateway: MeshGateway,
    #[serde(skip_serializing_if = "is_default")]
    pub expose: Expose,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_logs: Option<AccessLogs>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envoy_extensions: Vec<EnvoyExtension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failover_policy: Option<FailoverPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioritize_by_locality: Option<PrioritizeByLocality>,
}

/// Where and how proxies write access logs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessLogs {
    #[serde(skip_serializing_if = "is_default")]
    pub enabled: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub disable_listener_logs: bool,
    /// One of `stdout`, `stderr` or `file`. Empty means `stdout`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub r#type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub json_format: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text_format: String,
}

impl ConfigEntryResource for ProxyDefaults {
    const KUBE_KIND: &'static str = "proxydefaults";
    const CONSUL_KIND: &'static str = PROXY_DEFAULTS;
    const GLOBAL: bool = true;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        let spec = &self.spec;
        ConfigEntry::ProxyDefaults(consul::ProxyConfigEntry {
            name: self.consul_name(),
            mode: spec.mode.clone().unwrap_or_default(),
            transparent_proxy: spec.transparent_proxy.as_ref().map(TransparentProxy::to_consul),
            mutual_tls_mode: spec.mutual_tls_mode.clone(),
            config: spec
                .config
                .as_ref()
                .and_then(|c| json_map(c).ok())
                .unwrap_or_default(),
            mesh_gateway: spec.mesh_gateway.to_consul(),
            expose: spec.expose.to_consul(),
            access_logs: spec.access_logs.as_ref().map(AccessLogs::to_consul),
            envoy_extensions: envoy_extensions_to_consul(&spec.envoy_extensions),
            failover_policy: spec.failover_policy.as_ref().map(FailoverPolicy::to_consul),
            prioritize_by_locality: spec
                .prioritize_by_locality
                .as_ref()
                .map(PrioritizeByLocality::to_consul),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |entry| {
            let ConfigEntry::ProxyDefaults(pd) = entry else {
                return;
            };
            if transparent_proxy_eq(&pd.transparent_proxy, &None) {
                pd.transparent_proxy = None;
            }
        })
    }

    fn validate(&self, _: &ConsulMeta) -> Result<(), Invalid> {
        let spec = &self.spec;
        let path = Path::new("spec");
        let mut errs = ErrorList::new();

        errs.extend(spec.mesh_gateway.validate(&path.child("meshGateway")));
        if let Some(tp) = &spec.transparent_proxy {
            errs.extend(tp.validate(&path.child("transparentProxy")));
        }
        errs.extend(validate_mutual_tls_mode(
            &spec.mutual_tls_mode,
            &path.child("mutualTLSMode"),
        ));
        errs.extend(validate_proxy_mode(spec.mode.as_ref(), &path.child("mode")));
        if let Some(config) = &spec.config {
            if let Err(error) = json_map(config) {
                errs.push(field::invalid(
                    &path.child("config"),
                    Value::json_string(config),
                    format!("must be valid map value: {error}"),
                ));
            }
        }
        if let Some(logs) = &spec.access_logs {
            errs.extend(logs.validate(&path.child("accessLogs")));
        }
        errs.extend(spec.expose.validate(&path.child("expose")));
        errs.extend(validate_envoy_extensions(
            &spec.envoy_extensions,
            &path.child("envoyExtensions"),
        ));
        if let Some(fp) = &spec.failover_policy {
            errs.extend(fp.validate(&path.child("failoverPolicy")));
        }
        if let Some(pbl) = &spec.prioritize_by_locality {
            errs.extend(pbl.validate(&path.child("prioritizeByLocality")));
        }

        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }
}

impl AccessLogs {
    fn to_consul(&self) -> consul::AccessLogsConfig {
        consul::AccessLogsConfig {
            enabled: self.enabled,
            disable_listener_logs: self.disable_listener_logs,
            r#type: self.r#type.clone(),
            path: self.path.clone(),
            json_format: self.json_format.clone(),
            text_format: self.text_format.clone(),
        }
    }

    /// Reports the first problem found.
    fn validate(&self, path: &Path) -> Option<Error> {
        match self.r#type.as_str() {
            "" | "stderr" | "stdout" => {}
            "file" if self.path.is_empty() => {
                return Some(field::invalid(
                    &path.child("path"),
                    &self.path,
                    "path must be specified when using file type access logs",
                ));
            }
            "file" => {}
            other => {
                return Some(field::invalid(
                    &path.child("type"),
                    other,
                    "invalid access log type (must be one of \"stdout\", \"stderr\", \"file\"",
                ));
            }
        }

        if !self.json_format.is_empty() && !self.text_format.is_empty() {
            return Some(field::invalid(
                &path.child("textFormat"),
                &self.text_format,
                "cannot specify both access log jsonFormat and textFormat",
            ));
        }
        if self.r#type != "file" && !self.path.is_empty() {
            return Some(field::invalid(
                &path.child("path"),
                &self.path,
                "path is only valid for file type access logs",
            ));
        }
        if !self.json_format.is_empty()
            && serde_json::from_str::<serde_json::Value>(&self.json_format).is_err()
        {
            return Some(field::invalid(
                &path.child("jsonFormat"),
                &self.json_format,
                "invalid access log json",
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ExposePath;
    use consul_k8s_core::common::TransparentProxyConfig;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn proxy_defaults(spec: ProxyDefaultsSpec) -> ProxyDefaults {
        let mut pd = ProxyDefaults::new("global", spec);
        pd.metadata.namespace = Some("default".to_string());
        pd
    }

    fn access_logs(r#type: &str, path: &str) -> AccessLogs {
        AccessLogs {
            r#type: r#type.to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn to_consul() {
        let pd = proxy_defaults(ProxyDefaultsSpec {
            config: Some(json!({"envoy_tracing_json": "{}", "local_connect_timeout_ms": 5000})),
            mesh_gateway: MeshGateway {
                mode: "local".to_string(),
            },
            access_logs: Some(AccessLogs {
                enabled: true,
                ..access_logs("file", "/var/log/envoy.log")
            }),
            ..Default::default()
        });
        let ConfigEntry::ProxyDefaults(entry) = pd.to_consul("dc1") else {
            panic!("unexpected kind");
        };
        assert_eq!(entry.name, "global");
        assert_eq!(entry.config["local_connect_timeout_ms"], json!(5000));
        assert_eq!(entry.mesh_gateway.mode, "local");
        assert_eq!(
            entry.access_logs.map(|l| (l.enabled, l.r#type, l.path)),
            Some((true, "file".to_string(), "/var/log/envoy.log".to_string()))
        );
        assert_eq!(entry.entry_meta.meta, source_meta("dc1"));
        assert!(pd.consul_global_resource());
        assert_eq!(pd.consul_mirroring_ns(), "default");
    }

    #[test]
    fn matches_empty_transparent_proxy() {
        let pd = proxy_defaults(ProxyDefaultsSpec::default());
        let candidate = ConfigEntry::ProxyDefaults(consul::ProxyConfigEntry {
            name: "global".to_string(),
            transparent_proxy: Some(TransparentProxyConfig::default()),
            ..Default::default()
        });
        assert!(pd.matches_consul(&candidate));

        let candidate = ConfigEntry::ProxyDefaults(consul::ProxyConfigEntry {
            name: "global".to_string(),
            mode: "transparent".to_string(),
            ..Default::default()
        });
        assert!(!pd.matches_consul(&candidate));
    }

    #[rstest]
    #[case::mesh_gateway(
        ProxyDefaultsSpec { mesh_gateway: MeshGateway { mode: "foobar".to_string() }, ..Default::default() },
        r#"spec.meshGateway.mode: Invalid value: "foobar": must be one of "remote", "local", "none", """#
    )]
    #[case::expose_path(
        ProxyDefaultsSpec {
            expose: Expose {
                paths: vec![ExposePath { path: "invalid-path".to_string(), protocol: "http".to_string(), ..Default::default() }],
                ..Default::default()
            },
            ..Default::default()
        },
        r#"spec.expose.paths[0].path: Invalid value: "invalid-path": must begin with a '/'"#
    )]
    #[case::mode(
        ProxyDefaultsSpec { mode: Some("transparent".to_string()), ..Default::default() },
        "spec.mode: Invalid value: \"transparent\": use the annotation `consul.hashicorp.com/transparent-proxy` to configure the Transparent Proxy Mode"
    )]
    #[case::mutual_tls(
        ProxyDefaultsSpec { mutual_tls_mode: "asdf".to_string(), ..Default::default() },
        r#"spec.mutualTLSMode: Invalid value: "asdf": Must be one of "", "strict", or "permissive"."#
    )]
    #[case::config(
        ProxyDefaultsSpec { config: Some(json!([1, 2])), ..Default::default() },
        r#"spec.config: Invalid value: "[1,2]": must be valid map value: json: cannot unmarshal array into Go value of type map[string]interface {}"#
    )]
    #[case::log_type(
        ProxyDefaultsSpec { access_logs: Some(access_logs("foo", "")), ..Default::default() },
        r#"spec.accessLogs.type: Invalid value: "foo": invalid access log type (must be one of "stdout", "stderr", "file""#
    )]
    #[case::file_without_path(
        ProxyDefaultsSpec { access_logs: Some(access_logs("file", "")), ..Default::default() },
        r#"spec.accessLogs.path: Invalid value: "": path must be specified when using file type access logs"#
    )]
    #[case::path_without_file(
        ProxyDefaultsSpec { access_logs: Some(access_logs("stdout", "/var/log/envoy.logs")), ..Default::default() },
        r#"spec.accessLogs.path: Invalid value: "/var/log/envoy.logs": path is only valid for file type access logs"#
    )]
    #[case::bad_json(
        ProxyDefaultsSpec {
            access_logs: Some(AccessLogs { json_format: r#"{ "start_time": "%START_TIME""#.to_string(), ..Default::default() }),
            ..Default::default()
        },
        r#"spec.accessLogs.jsonFormat: Invalid value: "{ \"start_time\": \"%START_TIME\"": invalid access log json"#
    )]
    #[case::both_formats(
        ProxyDefaultsSpec {
            access_logs: Some(AccessLogs {
                json_format: "{}".to_string(),
                text_format: "MY START TIME %START_TIME".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        },
        r#"spec.accessLogs.textFormat: Invalid value: "MY START TIME %START_TIME": cannot specify both access log jsonFormat and textFormat"#
    )]
    #[case::failover_policy(
        ProxyDefaultsSpec {
            failover_policy: Some(FailoverPolicy { mode: "wrong-mode".to_string(), ..Default::default() }),
            ..Default::default()
        },
        r#"spec.failoverPolicy.mode: Invalid value: "wrong-mode": must be one of "", "sequential", "order-by-locality""#
    )]
    #[case::prioritize_by_locality(
        ProxyDefaultsSpec {
            prioritize_by_locality: Some(PrioritizeByLocality { mode: "wrong-mode".to_string() }),
            ..Default::default()
        },
        r#"spec.prioritizeByLocality.mode: Invalid value: "wrong-mode": must be one of "", "none", "failover""#
    )]
    fn rejects_invalid(#[case] spec: ProxyDefaultsSpec, #[case] detail: &str) {
        let err = proxy_defaults(spec).validate(&ConsulMeta::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(r#"proxydefaults.consul.hashicorp.com "global" is invalid: {detail}"#)
        );
    }

    #[test]
    fn accepts_file_logs() {
        let pd = proxy_defaults(ProxyDefaultsSpec {
            config: Some(json!({"protocol": "http"})),
            access_logs: Some(AccessLogs {
                json_format: r#"{"start_time": "%START_TIME%"}"#.to_string(),
                ..access_logs("file", "/var/log/envoy.log")
            }),
            ..Default::default()
        });
        assert_eq!(pd.validate(&ConsulMeta::default()), Ok(()));
    }
}
