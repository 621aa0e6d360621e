//! Fields shared by several resource kinds.

use crate::field::{self, Error, ErrorList, Path, Value};
use consul_k8s_core::common as consul;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub(crate) fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Renders the allowed values as `must be one of "a", "b"`.
pub fn not_in_slice_message(slice: &[&str]) -> String {
    format!("must be one of \"{}\"", slice.join("\", \""))
}

/// A non-empty path that doesn't start with `/`.
pub fn invalid_path_prefix(path: &str) -> bool {
    !path.is_empty() && !path.starts_with('/')
}

/// Decodes a raw JSON value that must be an object, describing the failure
/// the way Go's JSON decoder would.
pub(crate) fn json_map(
    raw: &serde_json::Value,
) -> Result<BTreeMap<String, serde_json::Value>, String> {
    let kind = match raw {
        serde_json::Value::Object(map) => {
            return Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        }
        serde_json::Value::Null => return Ok(BTreeMap::new()),
        serde_json::Value::Array(_) => "array",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::Bool(_) => "bool",
    };
    Err(format!(
        "json: cannot unmarshal {kind} into Go value of type map[string]interface {{}}"
    ))
}

/// Controls how mesh gateways are used for upstream services.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MeshGateway {
    /// One of `none`, `local` or `remote`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
}

const MESH_GATEWAY_MODES: &[&str] = &["remote", "local", "none", ""];

impl MeshGateway {
    pub(crate) fn to_consul(&self) -> consul::MeshGatewayConfig {
        let mode = match self.mode.as_str() {
            m @ ("local" | "remote" | "none") => m.to_string(),
            _ => String::new(),
        };
        consul::MeshGatewayConfig { mode }
    }

    pub(crate) fn validate(&self, path: &Path) -> Option<Error> {
        if MESH_GATEWAY_MODES.contains(&self.mode.as_str()) {
            return None;
        }
        Some(field::invalid(
            &path.child("mode"),
            &self.mode,
            not_in_slice_message(MESH_GATEWAY_MODES),
        ))
    }
}

/// HTTP paths exposed through Envoy outside of the mesh.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Expose {
    /// Exposes the paths of all HTTP and gRPC checks registered for the
    /// service.
    #[serde(skip_serializing_if = "is_default")]
    pub checks: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<ExposePath>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ExposePath {
    #[serde(skip_serializing_if = "is_default")]
    pub listener_port: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "is_default")]
    pub local_path_port: i32,
    /// `http` or `http2`; defaults to `http`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
}

impl Expose {
    pub(crate) fn to_consul(&self) -> consul::ExposeConfig {
        consul::ExposeConfig {
            checks: self.checks,
            paths: self
                .paths
                .iter()
                .map(|p| consul::ExposePath {
                    listener_port: p.listener_port,
                    path: p.path.clone(),
                    local_path_port: p.local_path_port,
                    protocol: p.protocol.clone(),
                    parsed_from_check: false,
                })
                .collect(),
        }
    }

    pub(crate) fn validate(&self, path: &Path) -> ErrorList {
        const PROTOCOLS: &[&str] = &["http", "http2"];
        let mut errs = ErrorList::new();
        for (i, p) in self.paths.iter().enumerate() {
            let path = path.child("paths").index(i);
            if invalid_path_prefix(&p.path) {
                errs.push(field::invalid(
                    &path.child("path"),
                    &p.path,
                    "must begin with a '/'",
                ));
            }
            if !p.protocol.is_empty() && !PROTOCOLS.contains(&p.protocol.as_str()) {
                errs.push(field::invalid(
                    &path.child("protocol"),
                    &p.protocol,
                    not_in_slice_message(PROTOCOLS),
                ));
            }
        }
        errs
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct TransparentProxy {
    /// Must be configured through a pod annotation instead.
    #[serde(skip_serializing_if = "is_default")]
    pub outbound_listener_port: i32,
    /// Whether transparent proxies can dial this proxy instance directly,
    /// bypassing the discovery chain.
    #[serde(skip_serializing_if = "is_default")]
    pub dialed_directly: bool,
}

impl TransparentProxy {
    pub(crate) fn to_consul(&self) -> consul::TransparentProxyConfig {
        consul::TransparentProxyConfig {
            outbound_listener_port: self.outbound_listener_port,
            dialed_directly: self.dialed_directly,
        }
    }

    pub(crate) fn validate(&self, path: &Path) -> Option<Error> {
        if self.outbound_listener_port == 0 {
            return None;
        }
        Some(field::invalid(
            &path.child("outboundListenerPort"),
            self.outbound_listener_port,
            "use the annotation `consul.hashicorp.com/transparent-proxy-outbound-listener-port` to configure the Outbound Listener Port",
        ))
    }
}

/// The proxy mode can only be set through a pod annotation, so any value is
/// rejected.
pub(crate) fn validate_proxy_mode(mode: Option<&String>, path: &Path) -> Option<Error> {
    mode.map(|mode| {
        field::invalid(
            path,
            mode,
            "use the annotation `consul.hashicorp.com/transparent-proxy` to configure the Transparent Proxy Mode",
        )
    })
}

pub(crate) fn validate_mutual_tls_mode(mode: &str, path: &Path) -> Option<Error> {
    match mode {
        "" | "strict" | "permissive" => None,
        _ => Some(field::invalid(
            path,
            mode,
            "Must be one of \"\", \"strict\", or \"permissive\".",
        )),
    }
}

const TLS_VERSIONS: &[&str] = &["TLS_AUTO", "TLSv1_0", "TLSv1_1", "TLSv1_2", "TLSv1_3", ""];

/// Checks TLS version bounds, reporting the maximum first.
pub(crate) fn validate_tls_versions(min: &str, max: &str, path: &Path) -> ErrorList {
    [("tlsMaxVersion", max), ("tlsMinVersion", min)]
        .into_iter()
        .filter(|(_, v)| !TLS_VERSIONS.contains(v))
        .map(|(name, v)| field::invalid(&path.child(name), v, not_in_slice_message(TLS_VERSIONS)))
        .collect()
}

/// Header modifications applied to requests or responses as they pass
/// through a proxy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpHeaderModifiers {
    /// Headers appended, allowing duplicates.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, String>,
    /// Headers added, overwriting existing values.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

impl HttpHeaderModifiers {
    pub(crate) fn to_consul(&self) -> consul::HttpHeaderModifiers {
        consul::HttpHeaderModifiers {
            add: self.add.clone(),
            set: self.set.clone(),
            remove: self.remove.clone(),
        }
    }
}

/// Configures an extension that patches Envoy resources.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvoyExtension {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "is_default")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub consul_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub envoy_version: String,
}

pub(crate) fn envoy_extensions_to_consul(exts: &[EnvoyExtension]) -> Vec<consul::EnvoyExtension> {
    exts.iter()
        .map(|e| consul::EnvoyExtension {
            name: e.name.clone(),
            required: e.required,
            arguments: e
                .arguments
                .as_ref()
                .and_then(|args| json_map(args).ok())
                .unwrap_or_default(),
            consul_version: e.consul_version.clone(),
            envoy_version: e.envoy_version.clone(),
        })
        .collect()
}

pub(crate) fn validate_envoy_extensions(exts: &[EnvoyExtension], path: &Path) -> ErrorList {
    exts.iter()
        .enumerate()
        .filter_map(|(i, e)| {
            let path = path.child("envoyExtension").index(i).child("arguments");
            let Some(args) = &e.arguments else {
                return Some(field::required(&path, "arguments must be defined"));
            };
            json_map(args).err().map(|err| {
                field::invalid(
                    &path,
                    Value::json_string(args),
                    format!("must be valid map value: {err}"),
                )
            })
        })
        .collect()
}

/// How failover targets are ordered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FailoverPolicy {
    /// `sequential` (the default) or `order-by-locality`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
    /// The ordered regions of the failover targets.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<String>,
}

impl FailoverPolicy {
    pub(crate) fn to_consul(&self) -> consul::FailoverPolicy {
        consul::FailoverPolicy {
            mode: self.mode.clone(),
            regions: self.regions.clone(),
        }
    }

    pub(crate) fn validate(&self, path: &Path) -> ErrorList {
        validate_mode(&self.mode, &["", "sequential", "order-by-locality"], path)
    }
}

/// Whether locality is used to prioritize endpoints in the local partition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PrioritizeByLocality {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mode: String,
}

impl PrioritizeByLocality {
    pub(crate) fn to_consul(&self) -> consul::PrioritizeByLocality {
        consul::PrioritizeByLocality {
            mode: self.mode.clone(),
        }
    }

    pub(crate) fn validate(&self, path: &Path) -> ErrorList {
        validate_mode(&self.mode, &["", "none", "failover"], path)
    }
}

fn validate_mode(mode: &str, modes: &[&str], path: &Path) -> ErrorList {
    if modes.contains(&mode) {
        return ErrorList::new();
    }
    vec![field::invalid(
        &path.child("mode"),
        mode,
        not_in_slice_message(modes),
    )]
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn spec() -> Path {
        Path::new("spec")
    }

    #[test]
    fn not_in_slice() {
        assert_eq!(
            not_in_slice_message(&["remote", "local", "none", ""]),
            r#"must be one of "remote", "local", "none", """#
        );
    }

    #[rstest]
    #[case("", false)]
    #[case("/", false)]
    #[case("/health", false)]
    #[case("health", true)]
    fn path_prefix(#[case] path: &str, #[case] invalid: bool) {
        assert_eq!(invalid_path_prefix(path), invalid);
    }

    #[rstest]
    #[case("local", "local")]
    #[case("remote", "remote")]
    #[case("none", "none")]
    #[case("", "")]
    #[case("bogus", "")]
    fn mesh_gateway_modes(#[case] mode: &str, #[case] expected: &str) {
        let mgw = MeshGateway {
            mode: mode.to_string(),
        };
        assert_eq!(mgw.to_consul().mode, expected);
    }

    #[test]
    fn mesh_gateway_invalid() {
        let err = MeshGateway {
            mode: "foobar".to_string(),
        }
        .validate(&spec().child("meshGateway"))
        .unwrap();
        assert_eq!(
            err.to_string(),
            r#"spec.meshGateway.mode: Invalid value: "foobar": must be one of "remote", "local", "none", """#
        );
    }

    #[test]
    fn expose_invalid() {
        let expose = Expose {
            checks: false,
            paths: vec![ExposePath {
                path: "health".to_string(),
                protocol: "invalid-protocol".to_string(),
                ..Default::default()
            }],
        };
        let errs = expose.validate(&spec().child("expose"));
        let msgs = errs.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(
            msgs,
            [
                r#"spec.expose.paths[0].path: Invalid value: "health": must begin with a '/'"#,
                r#"spec.expose.paths[0].protocol: Invalid value: "invalid-protocol": must be one of "http", "http2""#,
            ]
        );
    }

    #[test]
    fn transparent_proxy_port() {
        let tp = TransparentProxy {
            outbound_listener_port: 1000,
            dialed_directly: false,
        };
        assert_eq!(
            tp.validate(&spec().child("transparentProxy")).unwrap().to_string(),
            "spec.transparentProxy.outboundListenerPort: Invalid value: 1000: use the annotation `consul.hashicorp.com/transparent-proxy-outbound-listener-port` to configure the Outbound Listener Port"
        );
        assert!(TransparentProxy::default()
            .validate(&spec().child("transparentProxy"))
            .is_none());
    }

    #[test]
    fn proxy_mode() {
        let mode = "transparent".to_string();
        assert_eq!(
            validate_proxy_mode(Some(&mode), &spec().child("mode"))
                .unwrap()
                .to_string(),
            "spec.mode: Invalid value: \"transparent\": use the annotation `consul.hashicorp.com/transparent-proxy` to configure the Transparent Proxy Mode"
        );
        assert!(validate_proxy_mode(None, &spec().child("mode")).is_none());
    }

    #[test]
    fn mutual_tls_mode() {
        assert!(validate_mutual_tls_mode("strict", &spec()).is_none());
        assert_eq!(
            validate_mutual_tls_mode("foo", &spec().child("mutualTLSMode"))
                .unwrap()
                .to_string(),
            r#"spec.mutualTLSMode: Invalid value: "foo": Must be one of "", "strict", or "permissive"."#
        );
    }

    #[test]
    fn envoy_extension_arguments() {
        let exts = vec![
            EnvoyExtension {
                name: "missing".to_string(),
                ..Default::default()
            },
            EnvoyExtension {
                name: "list".to_string(),
                arguments: Some(serde_json::json!(["a"])),
                ..Default::default()
            },
            EnvoyExtension {
                name: "ok".to_string(),
                arguments: Some(serde_json::json!({"Port": 8080})),
                ..Default::default()
            },
        ];
        let msgs = validate_envoy_extensions(&exts, &spec().child("envoyExtensions"))
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        assert_eq!(
            msgs,
            [
                "spec.envoyExtensions.envoyExtension[0].arguments: Required value: arguments must be defined",
                r#"spec.envoyExtensions.envoyExtension[1].arguments: Invalid value: "[\"a\"]": must be valid map value: json: cannot unmarshal array into Go value of type map[string]interface {}"#,
            ]
        );

        let consul = envoy_extensions_to_consul(&exts);
        assert!(consul[0].arguments.is_empty());
        assert!(consul[1].arguments.is_empty());
        assert_eq!(consul[2].arguments["Port"], serde_json::json!(8080));
    }

    #[test]
    fn policy_modes() {
        let policy = FailoverPolicy {
            mode: "wrong".to_string(),
            regions: vec![],
        };
        assert_eq!(
            policy.validate(&spec().child("policy")).iter().map(ToString::to_string).collect::<Vec<_>>(),
            [r#"spec.policy.mode: Invalid value: "wrong": must be one of "", "sequential", "order-by-locality""#]
        );
        let prio = PrioritizeByLocality {
            mode: "wrong".to_string(),
        };
        assert_eq!(
            prio.validate(&spec().child("prioritizeByLocality")).iter().map(ToString::to_string).collect::<Vec<_>>(),
            [r#"spec.prioritizeByLocality.mode: Invalid value: "wrong": must be one of "", "none", "failover""#]
        );
    }
}
