use super::service_router::count_set;
use crate::{
    field::{self, ErrorList, Invalid, Path, Value},
    meta::{source_meta, ConsulMeta},
    resource::{entries_match, status_accessors, ConfigEntryResource},
    shared::is_default,
    status::Status,
};
use base64::Engine;
use consul_k8s_core::{common::EntryMeta, jwt as consul, ConfigEntry, GoDuration, JWT_PROVIDER};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const DISCOVERY_TYPES: &[&str] = &["STRICT_DNS", "STATIC", "LOGICAL_DNS", "EDS", "ORIGINAL_DST"];

/// Describes how Consul obtains and checks JSON Web Tokens issued by an
/// identity provider.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "consul.hashicorp.com",
    version = "v1alpha1",
    kind = "JWTProvider",
    status = "Status",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct JwtProviderSpec {
    /// Where the provider's public keys come from. Required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_web_key_set: Option<JsonWebKeySet>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
    /// Where tokens are read from on a request. Defaults to the
    /// `Authorization` header.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<JwtLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarding: Option<JwtForwardingConfig>,
    #[serde(skip_serializing_if = "is_default")]
    pub clock_skew_seconds: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_config: Option<JwtCacheConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonWebKeySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalJwks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteJwks>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalJwks {
    /// Base64 encoded key set.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub jwks: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filename: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteJwks {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[serde(skip_serializing_if = "is_default")]
    pub request_timeout_ms: i32,
    pub cache_duration: GoDuration,
    #[serde(skip_serializing_if = "is_default")]
    pub fetch_asynchronously: bool,
    #[serde(rename = "UseSNI", skip_serializing_if = "is_default")]
    pub use_sni: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<JwksRetryPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_cluster: Option<JwksCluster>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JwksRetryPolicy {
    #[serde(skip_serializing_if = "is_default")]
    pub num_retries: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy_back_off: Option<RetryPolicyBackOff>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicyBackOff {
    pub base_interval: GoDuration,
    pub max_interval: GoDuration,
}

/// The cluster Envoy uses to fetch a remote key set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JwksCluster {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub discovery_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_certificates: Option<JwksTlsCertificate>,
    pub connect_timeout: GoDuration,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JwksTlsCertificate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificate_provider_instance: Option<JwksTlsCertProviderInstance>,
    #[serde(rename = "trustedCA", skip_serializing_if = "Option::is_none")]
    pub trusted_ca: Option<JwksTlsCertTrustedCa>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JwksTlsCertProviderInstance {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub certificate_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JwksTlsCertTrustedCa {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filename: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment_variable: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub inline_string: String,
    /// Base64 encoded, as Kubernetes encodes byte fields.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub inline_bytes: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JwtLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<JwtLocationHeader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_param: Option<JwtLocationName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<JwtLocationName>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JwtLocationHeader {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value_prefix: String,
    #[serde(skip_serializing_if = "is_default")]
    pub forward: bool,
}

/// A query parameter or cookie holding the token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JwtLocationName {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JwtForwardingConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub header_name: String,
    #[serde(skip_serializing_if = "is_default")]
    pub pad_forward_payload_header: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct JwtCacheConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub size: i32,
}

impl ConfigEntryResource for JWTProvider {
    const KUBE_KIND: &'static str = "jwtprovider";
    const CONSUL_KIND: &'static str = JWT_PROVIDER;
    const GLOBAL: bool = true;

    status_accessors!();

    fn to_consul(&self, datacenter: &str) -> ConfigEntry {
        let spec = &self.spec;
        ConfigEntry::JwtProvider(consul::JwtProviderConfigEntry {
            name: self.consul_name(),
            json_web_key_set: spec.json_web_key_set.as_ref().map(JsonWebKeySet::to_consul),
            issuer: spec.issuer.clone(),
            audiences: spec.audiences.clone(),
            locations: spec.locations.iter().map(JwtLocation::to_consul).collect(),
            forwarding: spec.forwarding.as_ref().map(|f| consul::JwtForwardingConfig {
                header_name: f.header_name.clone(),
                pad_forward_payload_header: f.pad_forward_payload_header,
            }),
            clock_skew_seconds: spec.clock_skew_seconds,
            cache_config: spec
                .cache_config
                .as_ref()
                .map(|c| consul::JwtCacheConfig { size: c.size }),
            entry_meta: EntryMeta::with_meta(source_meta(datacenter)),
        })
    }

    fn matches_consul(&self, candidate: &ConfigEntry) -> bool {
        entries_match(self.to_consul(""), candidate, |_| {})
    }

    fn validate(&self, _: &ConsulMeta) -> Result<(), Invalid> {
        let path = Path::new("spec");
        let mut errs = ErrorList::new();

        let jwks = path.child("jsonWebKeySet");
        match &self.spec.json_web_key_set {
            None => errs.push(field::invalid(&jwks, "null", "jsonWebKeySet is required")),
            Some(set) => errs.extend(set.validate(&jwks)),
        }

        for (i, location) in self.spec.locations.iter().enumerate() {
            errs.extend(location.validate(&path.child("locations").index(i)));
        }

        if let Some(forwarding) = &self.spec.forwarding {
            if forwarding.header_name.is_empty() {
                errs.push(field::invalid(
                    &path.child("forwarding").child("HeaderName"),
                    "",
                    "JWT forwarding header name is required",
                ));
            }
        }

        errs.into_result(Self::KUBE_KIND, &self.name_any())
    }
}

impl JsonWebKeySet {
    fn to_consul(&self) -> consul::JsonWebKeySet {
        consul::JsonWebKeySet {
            local: self.local.as_ref().map(|l| consul::LocalJwks {
                jwks: l.jwks.clone(),
                filename: l.filename.clone(),
            }),
            remote: self.remote.as_ref().map(RemoteJwks::to_consul),
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        if count_set(&[], &[self.local.is_some(), self.remote.is_some()]) != 1 {
            return ErrorList::from(vec![field::invalid(
                path,
                Value::json_string(self),
                "exactly one of 'local' or 'remote' is required",
            )]);
        }
        let mut errs = ErrorList::new();
        if let Some(local) = &self.local {
            errs.extend(local.validate(&path.child("local")));
        }
        if let Some(remote) = &self.remote {
            errs.extend(remote.validate(&path.child("remote")));
        }
        errs
    }
}

impl LocalJwks {
    fn validate(&self, path: &Path) -> Option<field::Error> {
        if count_set(&[&self.jwks, &self.filename], &[]) != 1 {
            return Some(field::invalid(
                path,
                Value::json_string(self),
                "Exactly one of 'jwks' or 'filename' is required",
            ));
        }
        if !self.jwks.is_empty()
            && base64::engine::general_purpose::STANDARD
                .decode(&self.jwks)
                .is_err()
        {
            return Some(field::invalid(
                &path.child("jwks"),
                &self.jwks,
                "JWKS must be a valid base64-encoded string",
            ));
        }
        None
    }
}

impl RemoteJwks {
    fn to_consul(&self) -> consul::RemoteJwks {
        consul::RemoteJwks {
            uri: self.uri.clone(),
            request_timeout_ms: self.request_timeout_ms,
            cache_duration: self.cache_duration,
            fetch_asynchronously: self.fetch_asynchronously,
            use_sni: self.use_sni,
            retry_policy: self.retry_policy.as_ref().map(|p| consul::JwksRetryPolicy {
                num_retries: p.num_retries,
                retry_policy_back_off: p.retry_policy_back_off.as_ref().map(|b| {
                    consul::RetryPolicyBackOff {
                        base_interval: b.base_interval,
                        max_interval: b.max_interval,
                    }
                }),
            }),
            jwks_cluster: self.jwks_cluster.as_ref().map(JwksCluster::to_consul),
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        let mut errs = ErrorList::new();
        if self.uri.is_empty() {
            errs.push(field::invalid(
                &path.child("uri"),
                "",
                "remote JWKS URI is required",
            ));
        } else if url::Url::parse(&self.uri).is_err() {
            errs.push(field::invalid(
                &path.child("uri"),
                &self.uri,
                "remote JWKS URI is invalid",
            ));
        }

        let back_off = self
            .retry_policy
            .as_ref()
            .and_then(|p| p.retry_policy_back_off.as_ref());
        if let Some(back_off) = back_off {
            if !back_off.max_interval.is_zero()
                && back_off.base_interval.as_duration() > back_off.max_interval.as_duration()
            {
                errs.push(field::invalid(
                    &path.child("retryPolicy").child("retryPolicyBackOff"),
                    Value::json_string(back_off),
                    "maxInterval should be greater or equal to baseInterval",
                ));
            }
        }

        if let Some(cluster) = &self.jwks_cluster {
            errs.extend(cluster.validate(&path.child("jwksCluster")));
        }
        errs
    }
}

impl JwksCluster {
    fn to_consul(&self) -> consul::JwksCluster {
        consul::JwksCluster {
            discovery_type: self.discovery_type.clone(),
            tls_certificates: self.tls_certificates.as_ref().map(|tls| {
                consul::JwksTlsCertificate {
                    ca_certificate_provider_instance: tls
                        .ca_certificate_provider_instance
                        .as_ref()
                        .map(|p| consul::JwksTlsCertProviderInstance {
                            instance_name: p.instance_name.clone(),
                            certificate_name: p.certificate_name.clone(),
                        }),
                    trusted_ca: tls.trusted_ca.as_ref().map(|ca| consul::JwksTlsCertTrustedCa {
                        filename: ca.filename.clone(),
                        environment_variable: ca.environment_variable.clone(),
                        inline_string: ca.inline_string.clone(),
                        inline_bytes: ca.inline_bytes.clone(),
                    }),
                }
            }),
            connect_timeout: self.connect_timeout,
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        let mut errs = ErrorList::new();
        if !DISCOVERY_TYPES.contains(&self.discovery_type.as_str()) {
            errs.push(field::invalid(
                &path.child("discoveryType"),
                &self.discovery_type,
                "unsupported jwks cluster discovery type.",
            ));
        }

        let Some(tls) = &self.tls_certificates else {
            return errs;
        };
        let path = path.child("tlsCertificates");
        let sources = [
            tls.trusted_ca.is_some(),
            tls.ca_certificate_provider_instance.is_some(),
        ];
        if count_set(&[], &sources) != 1 {
            errs.push(field::invalid(
                &path,
                Value::json_string(tls),
                "exactly one of 'trustedCa' or 'caCertificateProviderInstance' is required",
            ));
        }
        if let Some(ca) = &tls.trusted_ca {
            let set = [
                &ca.filename,
                &ca.environment_variable,
                &ca.inline_string,
                &ca.inline_bytes,
            ];
            if count_set(&set, &[]) != 1 {
                errs.push(field::invalid(
                    &path.child("trustedCa"),
                    Value::json_string(ca),
                    "exactly one of 'filename', 'environmentVariable', 'inlineString' or 'inlineBytes' is required",
                ));
            }
        }
        errs
    }
}

impl JwtLocation {
    fn to_consul(&self) -> consul::JwtLocation {
        consul::JwtLocation {
            header: self.header.as_ref().map(|h| consul::JwtLocationHeader {
                name: h.name.clone(),
                value_prefix: h.value_prefix.clone(),
                forward: h.forward,
            }),
            query_param: self
                .query_param
                .as_ref()
                .map(|q| consul::JwtLocationQueryParam { name: q.name.clone() }),
            cookie: self
                .cookie
                .as_ref()
                .map(|c| consul::JwtLocationCookie { name: c.name.clone() }),
        }
    }

    fn validate(&self, path: &Path) -> ErrorList {
        let set = [
            self.header.is_some(),
            self.query_param.is_some(),
            self.cookie.is_some(),
        ];
        if count_set(&[], &set) != 1 {
            return ErrorList::from(vec![field::invalid(
                path,
                Value::json_string(self),
                "exactly one of 'header', 'queryParam', or 'cookie' is required",
            )]);
        }

        let names = [
            (
                "header",
                self.header.as_ref().map(|h| &h.name),
                "JWT location header name is required",
            ),
            (
                "queryParam",
                self.query_param.as_ref().map(|q| &q.name),
                "JWT location query parameter name is required",
            ),
            (
                "cookie",
                self.cookie.as_ref().map(|c| &c.name),
                "JWT location cookie name is required",
            ),
        ];
        names
            .into_iter()
            .filter(|(_, name, _)| name.is_some_and(|n| n.is_empty()))
            .map(|(child, _, detail)| field::invalid(&path.child(child).child("name"), "", detail))
            .collect()
    }
}
